use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{ClientError, Headers, Result};

/// Decoded response body.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponseData {
    /// Body of a response whose content-type is JSON.
    Json(Value),
    /// Any other body, as text.
    Text(String),
}

/// Settled outcome of a logical request.
#[derive(Clone, Debug, PartialEq)]
pub struct ClientResponse {
    /// `true` for 2xx statuses.
    pub ok: bool,
    pub status: u16,
    pub status_text: String,
    /// Response headers with lowercase keys.
    pub headers: Headers,
    /// `None` only for authorizer rejections.
    pub data: Option<ResponseData>,
}

impl ClientResponse {
    pub(crate) fn rejected(status: u16) -> Self {
        Self {
            ok: false,
            status,
            status_text: "Unauthorized".to_owned(),
            headers: Headers::new(),
            data: None,
        }
    }

    /// Returns the body as text when it was not JSON.
    pub fn text(&self) -> Option<&str> {
        match &self.data {
            Some(ResponseData::Text(text)) => Some(text),
            _ => None,
        }
    }

    /// Deserializes a JSON body into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        match &self.data {
            Some(ResponseData::Json(value)) => T::deserialize(value)
                .map_err(|err| ClientError::Decode(format!("unexpected response shape: {err}"))),
            Some(ResponseData::Text(_)) => Err(ClientError::Decode(
                "response body is not JSON".to_owned(),
            )),
            None => Err(ClientError::Decode("response has no body".to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use crate::{ClientError, ClientResponse, Headers, ResponseData};

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        id: u64,
        name: String,
    }

    fn response(data: Option<ResponseData>) -> ClientResponse {
        ClientResponse {
            ok: true,
            status: 200,
            status_text: "OK".to_owned(),
            headers: Headers::new(),
            data,
        }
    }

    #[test]
    fn rejected_response_shape() {
        let rejected = ClientResponse::rejected(401);
        assert!(!rejected.ok);
        assert_eq!(rejected.status, 401);
        assert_eq!(rejected.status_text, "Unauthorized");
        assert!(rejected.headers.is_empty());
        assert!(rejected.data.is_none());
    }

    #[test]
    fn typed_json_access() {
        let resp = response(Some(ResponseData::Json(json!({ "id": 1, "name": "Kit" }))));
        let user: User = resp.json().expect("must deserialize");
        assert_eq!(
            user,
            User {
                id: 1,
                name: "Kit".to_owned()
            }
        );
        assert!(resp.text().is_none());
    }

    #[test]
    fn typed_json_rejects_text_body() {
        let resp = response(Some(ResponseData::Text("hello".to_owned())));
        assert_eq!(resp.text(), Some("hello"));
        let err = resp.json::<User>().expect_err("must fail");
        assert!(matches!(err, ClientError::Decode(_)));
    }
}
