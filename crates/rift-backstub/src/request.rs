//! Parsed view of an inbound request, shared by the dispatcher, the
//! fetcher and computed stub leaves.

use crate::error::RequestError;
use bytes::Bytes;
use hyper::header::CONTENT_TYPE;
use hyper::{HeaderMap, Method, Uri};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Request context handed to the merge engine and computed leaves.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    /// Path plus query string, as received.
    pub url: String,
    pub path: String,
    pub query: HashMap<String, String>,
    /// Path parameters captured by the matched route (`/users/:id`).
    pub params: HashMap<String, String>,
    pub headers: HeaderMap,
    /// Parsed JSON or form body. An empty object when the request carried
    /// no parseable body.
    pub body: Value,
    pub raw_body: Bytes,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self {
            method: Method::GET,
            url: "/".to_string(),
            path: "/".to_string(),
            query: HashMap::new(),
            params: HashMap::new(),
            headers: HeaderMap::new(),
            body: Value::Object(Map::new()),
            raw_body: Bytes::new(),
        }
    }
}

impl RequestContext {
    /// Build a context from request parts, parsing the body according to
    /// its content type.
    pub fn from_parts(
        method: Method,
        uri: &Uri,
        headers: HeaderMap,
        raw_body: Bytes,
    ) -> Result<Self, RequestError> {
        let path = uri.path().to_string();
        let url = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| path.clone());
        let query = uri.query().map(parse_query_string).unwrap_or_default();
        let body = parse_body(&headers, &raw_body)?;

        Ok(Self {
            method,
            url,
            path,
            query,
            params: HashMap::new(),
            headers,
            body,
            raw_body,
        })
    }

    pub fn with_params(mut self, params: HashMap<String, String>) -> Self {
        self.params = params;
        self
    }

    /// The parsed body when it is a non-empty object or array.
    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            Value::Object(map) if !map.is_empty() => Some(&self.body),
            Value::Array(items) if !items.is_empty() => Some(&self.body),
            _ => None,
        }
    }
}

/// Parse a query string into a map, decoding percent escapes and `+`.
pub fn parse_query_string(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or(spaced)
}

fn parse_body(headers: &HeaderMap, raw: &Bytes) -> Result<Value, RequestError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase())
        .unwrap_or_default();
    let mime = content_type.split(';').next().unwrap_or("").trim();

    if raw.is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    if mime == "application/json" || mime.ends_with("+json") {
        let value: Value = serde_json::from_slice(raw)
            .map_err(|e| RequestError::InvalidBody(e.to_string()))?;
        return match value {
            Value::Object(_) | Value::Array(_) => Ok(value),
            _ => Err(RequestError::InvalidBody(
                "request body must be a JSON object or array".to_string(),
            )),
        };
    }

    if mime == "application/x-www-form-urlencoded" {
        return Ok(parse_form(&String::from_utf8_lossy(raw)));
    }

    Ok(Value::Object(Map::new()))
}

/// Form fields become strings; repeated fields collect into an array.
fn parse_form(body: &str) -> Value {
    let mut fields = Map::new();
    for pair in body.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(key);
        let value = Value::String(decode_component(value));
        match fields.get_mut(&key) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                fields.insert(key, value);
            }
        }
    }
    Value::Object(fields)
}
