//! Header names and helpers shared by the fetcher and the dispatcher.

use hyper::header::{self, HeaderMap, HeaderName, HeaderValue};
use hyper::Response;

pub static X_BACKSTUB_UPSTREAM_ERROR: HeaderName =
    HeaderName::from_static("x-backstub-upstream-error");

pub static VALUE_TRUE: HeaderValue = HeaderValue::from_static("true");
pub static VALUE_JSON: HeaderValue = HeaderValue::from_static("application/json");
pub static VALUE_JSON_UTF8: HeaderValue =
    HeaderValue::from_static("application/json;charset=utf-8");
pub static VALUE_IDENTITY: HeaderValue = HeaderValue::from_static("identity");

/// Headers that describe a single connection or the framing of one body and
/// must not be copied between the client and upstream sides.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
    header::CONTENT_ENCODING,
    header::TE,
    header::TRAILER,
    header::UPGRADE,
    header::PROXY_AUTHORIZATION,
];

pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(name) || name.as_str() == "keep-alive"
}

/// Copy `src` into `dst`, skipping hop-by-hop headers and `host`.
pub fn copy_forwardable(src: &HeaderMap, dst: &mut HeaderMap) {
    for (name, value) in src {
        if name == header::HOST || is_hop_by_hop(name) {
            continue;
        }
        dst.append(name.clone(), value.clone());
    }
}

/// Extension trait for inserting headers into responses.
pub trait BackstubHeadersExt {
    fn set_header(&mut self, name: &HeaderName, value: &HeaderValue);
}

impl<B> BackstubHeadersExt for Response<B> {
    fn set_header(&mut self, name: &HeaderName, value: &HeaderValue) {
        self.headers_mut().insert(name.clone(), value.clone());
    }
}
