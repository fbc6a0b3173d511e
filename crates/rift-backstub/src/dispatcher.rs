//! Per-request handling.
//!
//! A request is parsed into a [`RequestContext`], matched against the
//! registry and answered according to the route kind. Upstream failures
//! never surface as transport errors: the client always gets a response.

use crate::fetch::{Fetcher, ResponseMeta, Service};
use crate::headers::{BackstubHeadersExt, VALUE_TRUE, X_BACKSTUB_UPSTREAM_ERROR};
use crate::registry::{Route, RouteKind, RouteStub, StatusStub, StubRegistry};
use crate::request::RequestContext;
use crate::response::{error_response, send_data, send_upstream};
use crate::transform::transform;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::{Request, Response, StatusCode};
use serde_json::Value;
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct RequestDispatcher {
    registry: Arc<StubRegistry>,
    fetcher: Fetcher,
}

impl RequestDispatcher {
    pub fn new(registry: Arc<StubRegistry>, fetcher: Fetcher) -> Self {
        Self { registry, fetcher }
    }

    pub async fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body,
        B::Error: Display,
    {
        let (parts, body) = req.into_parts();
        let raw_body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!(error = %e, "Failed to read request body");
                return error_response(StatusCode::BAD_REQUEST, "failed to read request body");
            }
        };

        let request = match RequestContext::from_parts(
            parts.method,
            &parts.uri,
            parts.headers,
            raw_body,
        ) {
            Ok(request) => request,
            Err(e) => {
                debug!(error = %e, "Rejecting request");
                return error_response(StatusCode::BAD_REQUEST, &e.to_string());
            }
        };

        let Some(found) = self.registry.lookup(&request.method, &request.path) else {
            info!(method = %request.method, path = %request.path, "No stub matched request");
            return error_response(
                StatusCode::NOT_FOUND,
                &format!("Cannot {} {}", request.method, request.path),
            );
        };

        let route = found.route;
        let request = request.with_params(found.params);
        debug!(
            method = %request.method,
            path = %request.path,
            route = route.path(),
            "Matched route"
        );
        self.dispatch(route, &request).await
    }

    pub async fn dispatch(&self, route: &Route, request: &RequestContext) -> Response<Full<Bytes>> {
        match &route.kind {
            RouteKind::Static(stub) => serve_stub(stub, request, &Value::Null, None),
            RouteKind::StatusDispatched { service, entries } => {
                self.serve_status_dispatched(service, entries, request).await
            }
            RouteKind::Proxy { service } => self.serve_proxy(service, request).await,
        }
    }

    async fn serve_status_dispatched(
        &self,
        service: &Service,
        entries: &[StatusStub],
        request: &RequestContext,
    ) -> Response<Full<Bytes>> {
        match self.fetcher.fetch(request, service).await {
            Ok((live, meta)) => match entries.iter().find(|e| e.pattern.matches(meta.status)) {
                Some(entry) => {
                    debug!(status = meta.status, pattern = %entry.pattern, "Merging stub with upstream response");
                    serve_stub(&entry.stub, request, &live, Some(meta))
                }
                None => {
                    debug!(
                        status = meta.status,
                        "No status stub matched, passing upstream response through"
                    );
                    send_upstream(&live, &meta)
                }
            },
            Err(e) => {
                warn!(
                    method = %request.method,
                    path = %request.path,
                    service = %service,
                    error = %e,
                    "Upstream unavailable, serving stub without live data"
                );
                let mut response = match entries.iter().find(|e| e.pattern.is_catch_all()) {
                    Some(entry) => serve_stub(&entry.stub, request, &Value::Null, None),
                    None => send_data(&Value::Null, None),
                };
                response.set_header(&X_BACKSTUB_UPSTREAM_ERROR, &VALUE_TRUE);
                response
            }
        }
    }

    async fn serve_proxy(
        &self,
        service: &Service,
        request: &RequestContext,
    ) -> Response<Full<Bytes>> {
        match self.fetcher.fetch(request, service).await {
            Ok((live, meta)) => send_upstream(&live, &meta),
            Err(e) => {
                warn!(
                    method = %request.method,
                    path = %request.path,
                    service = %service,
                    error = %e,
                    "Upstream unavailable for proxied request"
                );
                let mut response = send_data(&Value::Null, None);
                response.set_header(&X_BACKSTUB_UPSTREAM_ERROR, &VALUE_TRUE);
                response
            }
        }
    }
}

/// Serve a stub, merged with `live` when there is any. Literal stubs with
/// no live data are served from their pre-rendered body.
fn serve_stub(
    entry: &RouteStub,
    request: &RequestContext,
    live: &Value,
    mut meta: Option<ResponseMeta>,
) -> Response<Full<Bytes>> {
    let data = match (&entry.literal, live.is_null()) {
        (Some(rendered), true) => Ok(rendered.clone()),
        _ => transform(&entry.stub, live, request, meta.as_mut()),
    };

    match data {
        Ok(data) => send_data(&data, meta.as_ref()),
        Err(e) => {
            error!(
                method = %request.method,
                path = %request.path,
                error = %e,
                "Failed to compute stub response"
            );
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}
