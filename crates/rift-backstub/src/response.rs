//! Response builders.

use crate::fetch::ResponseMeta;
use crate::headers::{copy_forwardable, VALUE_JSON_UTF8};
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub errors: Vec<ErrorDetail>,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// Build an HTTP response with status code and body.
pub fn build_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .body(Full::new(body.into()))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from("Internal Server Error"))))
}

/// Create an error response with a JSON body.
pub fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let error = ErrorResponse {
        errors: vec![ErrorDetail {
            code: status.as_str().to_string(),
            message: message.to_string(),
        }],
    };
    let body = serde_json::to_vec(&error).unwrap_or_default();
    let mut response = build_response(status, body);
    response
        .headers_mut()
        .insert(CONTENT_TYPE, VALUE_JSON_UTF8.clone());
    response
}

/// Write `data` as the response body on top of the upstream status and
/// headers in `meta`. A null body is written as an empty body.
pub fn send_data(data: &Value, meta: Option<&ResponseMeta>) -> Response<Full<Bytes>> {
    let body = if data.is_null() {
        Bytes::new()
    } else {
        match serde_json::to_vec(data) {
            Ok(bytes) => Bytes::from(bytes),
            Err(e) => {
                return error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &format!("failed to serialize response body: {e}"),
                )
            }
        }
    };

    let mut response = build_response(status_of(meta), body.clone());
    if let Some(meta) = meta {
        copy_forwardable(&meta.headers, response.headers_mut());
    }
    if !body.is_empty() {
        let headers = response.headers_mut();
        headers.insert(CONTENT_TYPE, VALUE_JSON_UTF8.clone());
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
    }
    response
}

/// Pass an upstream response through. JSON bodies go through
/// [`send_data`]; other bodies are forwarded byte for byte with the
/// upstream content type.
pub fn send_upstream(data: &Value, meta: &ResponseMeta) -> Response<Full<Bytes>> {
    if !data.is_null() || meta.raw_body.is_empty() {
        return send_data(data, Some(meta));
    }

    let mut response = build_response(status_of(Some(meta)), meta.raw_body.clone());
    copy_forwardable(&meta.headers, response.headers_mut());
    response
        .headers_mut()
        .insert(CONTENT_LENGTH, HeaderValue::from(meta.raw_body.len()));
    response
}

fn status_of(meta: Option<&ResponseMeta>) -> StatusCode {
    meta.and_then(|m| StatusCode::from_u16(m.status).ok())
        .unwrap_or(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use hyper::HeaderMap;
    use serde_json::json;

    async fn body_of(response: Response<Full<Bytes>>) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    fn upstream(status: u16, content_type: &'static str, raw: &'static str) -> ResponseMeta {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        headers.insert(CONTENT_LENGTH, HeaderValue::from(raw.len()));
        headers.insert("x-request-id", HeaderValue::from_static("abc"));
        ResponseMeta {
            status,
            headers,
            body: serde_json::from_str(raw).unwrap_or(Value::Null),
            raw_body: Bytes::from_static(raw.as_bytes()),
        }
    }

    #[tokio::test]
    async fn test_send_data_without_meta() {
        let response = send_data(&json!({"a": 1}), None);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json;charset=utf-8"
        );
        assert_eq!(response.headers().get(CONTENT_LENGTH).unwrap(), "7");
        assert_eq!(body_of(response).await, Bytes::from_static(b"{\"a\":1}"));
    }

    #[tokio::test]
    async fn test_send_data_layers_upstream_headers() {
        let meta = upstream(404, "application/json; charset=utf-8", r#"{"message":"Not Found"}"#);
        let response = send_data(&json!({"m": "x"}), Some(&meta));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers().get("x-request-id").unwrap(), "abc");
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json;charset=utf-8"
        );
        assert_eq!(response.headers().get(CONTENT_LENGTH).unwrap(), "9");
    }

    #[tokio::test]
    async fn test_null_body_is_empty() {
        let response = send_data(&Value::Null, None);
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(CONTENT_TYPE).is_none());
        assert!(body_of(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_send_upstream_forwards_non_json_bytes() {
        let meta = upstream(200, "text/html", "<h1>hi</h1>");
        let response = send_upstream(&Value::Null, &meta);
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "text/html");
        assert_eq!(response.headers().get(CONTENT_LENGTH).unwrap(), "11");
        assert_eq!(body_of(response).await, Bytes::from_static(b"<h1>hi</h1>"));
    }

    #[tokio::test]
    async fn test_error_response_shape() {
        let response = error_response(StatusCode::NOT_FOUND, "Cannot GET /nope");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: Value = serde_json::from_slice(&body_of(response).await).unwrap();
        assert_eq!(
            body,
            json!({"errors": [{"code": "404", "message": "Cannot GET /nope"}]})
        );
    }
}
