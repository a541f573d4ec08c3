//! Nested query-string codec.
//!
//! Serializes insertion-ordered JSON structures using the common "bracket"
//! convention: `parent[child]=value` for nested objects and
//! `parent[0]=value` for array elements.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{Map, Number, Value};

/// Query structure: an insertion-ordered JSON object.
pub type Query = Map<String, Value>;

/// Everything except `A-Z a-z 0-9 - _ . ! ~ * ' ( )` is percent-encoded,
/// matching ECMAScript `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encodes a single query component.
pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// Serializes `data` into `key=value` pairs joined by `&`.
pub fn stringify(data: &Query) -> String {
    let mut pairs = Vec::new();
    for (key, value) in data {
        push_pairs(value, key, &mut pairs);
    }
    pairs.join("&")
}

/// Appends `data` to `url`, using `&` when `url` already has a query.
///
/// Returns `url` unchanged when `data` is absent or serializes to nothing.
pub fn append(url: &str, data: Option<&Query>) -> String {
    let Some(data) = data.filter(|data| !data.is_empty()) else {
        return url.to_owned();
    };

    let query = stringify(data);
    if query.is_empty() {
        return url.to_owned();
    }

    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{query}")
}

fn push_pairs(value: &Value, prefix: &str, pairs: &mut Vec<String>) {
    match value {
        Value::Null => pairs.push(prefix.to_owned()),
        Value::Bool(flag) => pairs.push(format!("{prefix}={}", if *flag { 1 } else { 0 })),
        Value::Number(number) => {
            pairs.push(format!("{prefix}={}", encode_component(&format_number(number))))
        }
        Value::String(text) => pairs.push(format!("{prefix}={}", encode_component(text))),
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                push_pairs(item, &format!("{prefix}[{index}]"), pairs);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                let nested = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}[{key}]")
                };
                push_pairs(item, &nested, pairs);
            }
        }
    }
}

// Integral floats print without a fraction so `1.0` serializes as `1`.
fn format_number(number: &Number) -> String {
    match number.as_f64() {
        Some(float)
            if !number.is_i64()
                && !number.is_u64()
                && float.is_finite()
                && float.fract() == 0.0
                && float.abs() < 1e21 =>
        {
            format!("{float:.0}")
        }
        _ => number.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::{append, encode_component, stringify, Query};

    fn query(value: Value) -> Query {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn scalar_leaves() {
        assert_eq!(stringify(&query(json!({ "k": "v" }))), "k=v");
        assert_eq!(stringify(&query(json!({ "k": 42 }))), "k=42");
        assert_eq!(stringify(&query(json!({ "k": 1.5 }))), "k=1.5");
        assert_eq!(stringify(&query(json!({ "k": 2.0 }))), "k=2");
        assert_eq!(stringify(&query(json!({ "k": null }))), "k");
        assert_eq!(stringify(&query(json!({ "k": true }))), "k=1");
        assert_eq!(stringify(&query(json!({ "k": false }))), "k=0");
    }

    #[test]
    fn values_are_percent_encoded_keys_are_not() {
        assert_eq!(
            stringify(&query(json!({ "q[]": "a b&c=d/é" }))),
            "q[]=a%20b%26c%3Dd%2F%C3%A9"
        );
        assert_eq!(encode_component("-_.!~*'()"), "-_.!~*'()");
    }

    #[test]
    fn nested_objects_keep_insertion_order() {
        let data = query(json!({
            "zeta": { "b": 1, "a": 2 },
            "alpha": "x",
        }));
        assert_eq!(stringify(&data), "zeta[b]=1&zeta[a]=2&alpha=x");
    }

    #[test]
    fn arrays_use_ascending_indices() {
        let data = query(json!({ "ids": [3, 1, 2], "deep": [{ "n": "a" }, [true]] }));
        assert_eq!(
            stringify(&data),
            "ids[0]=3&ids[1]=1&ids[2]=2&deep[0][n]=a&deep[1][0]=1"
        );
    }

    #[test]
    fn empty_nested_structures_leave_no_trace() {
        let data = query(json!({ "a": {}, "b": [], "c": 1 }));
        assert_eq!(stringify(&data), "c=1");
    }

    #[test]
    fn append_picks_separator() {
        let data = query(json!({ "page": 2 }));
        assert_eq!(append("https://api/x", Some(&data)), "https://api/x?page=2");
        assert_eq!(
            append("https://api/x?sort=asc", Some(&data)),
            "https://api/x?sort=asc&page=2"
        );
    }

    #[test]
    fn append_without_pairs_is_identity() {
        let url = "https://api/x?y=1";
        assert_eq!(append(url, None), url);
        assert_eq!(append(url, Some(&Query::new())), url);
        assert_eq!(append(url, Some(&query(json!({ "a": {}, "b": [] })))), url);
    }
}
