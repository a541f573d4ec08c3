use lifecycle_http::{from_fn, AuthDecision, Authorization, Client, ClientDefaults, RequestOptions};
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let webroot = std::env::var("API_WEBROOT")?;
    let token = std::env::var("API_TOKEN")?;

    let client = Client::new().with_defaults(
        ClientDefaults::default()
            .webroot(webroot)
            .header("Accept", "application/json")
            .authorizer(from_fn(move |req| {
                if req.unauthorized.is_some() {
                    // A refreshed token would be fetched here.
                    return AuthDecision::Reject(401);
                }
                Authorization::bearer(&token).into()
            })),
    );

    let created = client
        .post(
            "users",
            RequestOptions::default()
                .json(json!({ "name": "Kit" }))
                .retries(2),
        )
        .await?;
    println!("{} {}", created.status, created.status_text);

    let filter = serde_json::from_value(json!({ "filter": { "name": "Kit" }, "page": 1 }))?;
    let listed = client
        .get("users", RequestOptions::default().query(filter))
        .await?;
    println!("{:?}", listed.data);

    Ok(())
}
