//! Route table.
//!
//! Routes are kept in registration order and looked up linearly, the way an
//! express-style router tries its layers. Each (verb, path) pair resolves
//! to exactly one handler kind.

use crate::error::MountError;
use crate::fetch::Service;
use crate::route::RoutePattern;
use crate::status::StatusPattern;
use crate::stub::{Stub, StubFormat};
use hyper::Method;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Verbs a stub may be registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Head,
    Get,
    Post,
    Put,
    Delete,
    All,
}

impl Verb {
    pub const ALL_VERBS: [Verb; 6] = [
        Verb::Head,
        Verb::Get,
        Verb::Post,
        Verb::Put,
        Verb::Delete,
        Verb::All,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Head => "head",
            Verb::Get => "get",
            Verb::Post => "post",
            Verb::Put => "put",
            Verb::Delete => "delete",
            Verb::All => "all",
        }
    }

    /// Whether a route registered under this verb answers `method`.
    pub fn accepts(&self, method: &Method) -> bool {
        match self {
            Verb::All => true,
            Verb::Get => method == Method::GET || method == Method::HEAD,
            Verb::Head => method == Method::HEAD,
            Verb::Post => method == Method::POST,
            Verb::Put => method == Method::PUT,
            Verb::Delete => method == Method::DELETE,
        }
    }
}

impl FromStr for Verb {
    type Err = MountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Verb::ALL_VERBS
            .into_iter()
            .find(|verb| verb.as_str() == s)
            .ok_or_else(|| MountError::UnknownVerb(s.to_string()))
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stub together with how it is served when no live data exists.
#[derive(Debug, Clone)]
pub struct RouteStub {
    pub stub: Stub,
    /// Pre-rendered body for literal stubs.
    pub literal: Option<Value>,
}

impl RouteStub {
    pub fn new(stub: Stub, format: StubFormat) -> Self {
        let literal = match format {
            StubFormat::Literal => stub.render_literal(),
            StubFormat::Scripted => None,
        };
        Self { stub, literal }
    }
}

#[derive(Debug, Clone)]
pub struct StatusStub {
    pub pattern: StatusPattern,
    pub stub: RouteStub,
}

#[derive(Debug, Clone)]
pub enum RouteKind {
    /// Served from the stub alone.
    Static(RouteStub),
    /// Fetched from `service`, then merged with the first entry whose pattern
    /// matches the upstream status.
    StatusDispatched {
        service: Service,
        entries: Vec<StatusStub>,
    },
    /// Fetched from `service` and served as-is.
    Proxy { service: Service },
}

impl RouteKind {
    fn name(&self) -> &'static str {
        match self {
            RouteKind::Static(_) => "static",
            RouteKind::StatusDispatched { .. } => "status-dispatched",
            RouteKind::Proxy { .. } => "proxy",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Route {
    pub verb: Verb,
    pub pattern: RoutePattern,
    pub kind: RouteKind,
}

impl Route {
    pub fn path(&self) -> &str {
        self.pattern.as_str()
    }
}

/// Result of a successful lookup.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub route: &'a Route,
    pub params: HashMap<String, String>,
}

#[derive(Debug, Default)]
pub struct StubRegistry {
    routes: Vec<Route>,
    index: HashMap<(Verb, String), usize>,
}

impl StubRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    pub fn register_static(
        &mut self,
        verb: Verb,
        path: &str,
        stub: Stub,
        format: StubFormat,
    ) -> Result<(), MountError> {
        if self.index.contains_key(&(verb, path.to_string())) {
            return Err(duplicate(verb, path));
        }
        self.push(verb, path, RouteKind::Static(RouteStub::new(stub, format)))
    }

    /// Append a status entry to the service route for (verb, path), creating
    /// the route on first use. `status` defaults to the catch-all pattern.
    pub fn register_status_dispatched(
        &mut self,
        verb: Verb,
        path: &str,
        service: &Service,
        status: Option<&str>,
        stub: Stub,
        format: StubFormat,
    ) -> Result<(), MountError> {
        let pattern = match status {
            Some(spec) => StatusPattern::compile(spec)
                .map_err(|_| MountError::InvalidStatus(spec.to_string()))?,
            None => StatusPattern::any(),
        };
        let entry = StatusStub {
            pattern,
            stub: RouteStub::new(stub, format),
        };

        let Some(&position) = self.index.get(&(verb, path.to_string())) else {
            return self.push(
                verb,
                path,
                RouteKind::StatusDispatched {
                    service: service.clone(),
                    entries: vec![entry],
                },
            );
        };

        match &mut self.routes[position].kind {
            RouteKind::StatusDispatched {
                service: bound,
                entries,
            } => {
                if bound != service {
                    warn!(
                        verb = %verb,
                        path,
                        bound = %bound,
                        ignored = %service,
                        "Route already bound to a different service, keeping the first"
                    );
                }
                debug!(verb = %verb, path, status = %entry.pattern, "Added status stub");
                entries.push(entry);
                Ok(())
            }
            _ => Err(duplicate(verb, path)),
        }
    }

    /// Register a pass-through route answering every verb.
    pub fn register_proxy(&mut self, path: &str, service: &Service) -> Result<(), MountError> {
        if self.index.contains_key(&(Verb::All, path.to_string())) {
            return Err(duplicate(Verb::All, path));
        }
        self.push(
            Verb::All,
            path,
            RouteKind::Proxy {
                service: service.clone(),
            },
        )
    }

    /// First route, in registration order, answering `method` on `path`.
    pub fn lookup(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        self.routes
            .iter()
            .filter(|route| route.verb.accepts(method))
            .find_map(|route| {
                route
                    .pattern
                    .matches(path)
                    .map(|params| RouteMatch { route, params })
            })
    }

    fn push(&mut self, verb: Verb, path: &str, kind: RouteKind) -> Result<(), MountError> {
        let pattern = RoutePattern::compile(path)?;
        debug!(verb = %verb, path, kind = kind.name(), "Registered route");
        self.index.insert((verb, path.to_string()), self.routes.len());
        self.routes.push(Route {
            verb,
            pattern,
            kind,
        });
        Ok(())
    }
}

fn duplicate(verb: Verb, path: &str) -> MountError {
    MountError::DuplicateRoute {
        verb: verb.to_string(),
        path: path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn service(url: &str) -> Service {
        Service::parse(url).unwrap()
    }

    fn literal(value: Value) -> Stub {
        Stub::from(value)
    }

    #[test]
    fn test_verb_parse_and_accepts() {
        assert_eq!("get".parse::<Verb>().unwrap(), Verb::Get);
        assert_eq!("all".parse::<Verb>().unwrap(), Verb::All);
        assert!(matches!(
            "patch".parse::<Verb>(),
            Err(MountError::UnknownVerb(v)) if v == "patch"
        ));

        assert!(Verb::Get.accepts(&Method::HEAD));
        assert!(!Verb::Head.accepts(&Method::GET));
        assert!(Verb::All.accepts(&Method::PATCH));
        assert!(!Verb::Post.accepts(&Method::PUT));
    }

    #[test]
    fn test_static_registration_and_lookup() {
        let mut registry = StubRegistry::new();
        registry
            .register_static(
                Verb::Get,
                "/hello",
                literal(json!({"msg": "hi"})),
                StubFormat::Literal,
            )
            .unwrap();

        let found = registry.lookup(&Method::GET, "/hello").unwrap();
        let RouteKind::Static(route_stub) = &found.route.kind else {
            panic!("expected static route");
        };
        assert_eq!(route_stub.literal, Some(json!({"msg": "hi"})));

        assert!(registry.lookup(&Method::POST, "/hello").is_none());
        assert!(registry.lookup(&Method::GET, "/other").is_none());
    }

    #[test]
    fn test_duplicate_static_is_rejected() {
        let mut registry = StubRegistry::new();
        registry
            .register_static(Verb::Get, "/a", Stub::Null, StubFormat::Literal)
            .unwrap();
        let err = registry
            .register_static(Verb::Get, "/a", Stub::Null, StubFormat::Literal)
            .unwrap_err();
        assert!(matches!(err, MountError::DuplicateRoute { .. }));

        // Same path under another verb is a different route.
        registry
            .register_static(Verb::Post, "/a", Stub::Null, StubFormat::Literal)
            .unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_status_entries_accumulate_in_order() {
        let mut registry = StubRegistry::new();
        let upstream = service("http://localhost:9000");
        registry
            .register_status_dispatched(
                Verb::Get,
                "/u",
                &upstream,
                Some("3xx"),
                Stub::Null,
                StubFormat::Literal,
            )
            .unwrap();
        registry
            .register_status_dispatched(
                Verb::Get,
                "/u",
                &upstream,
                None,
                Stub::Null,
                StubFormat::Literal,
            )
            .unwrap();

        assert_eq!(registry.len(), 1);
        let found = registry.lookup(&Method::GET, "/u").unwrap();
        let RouteKind::StatusDispatched { entries, .. } = &found.route.kind else {
            panic!("expected status-dispatched route");
        };
        assert_eq!(entries.len(), 2);
        assert!(entries[0].pattern.matches(301));
        assert!(!entries[0].pattern.matches(404));
        assert!(entries[1].pattern.is_catch_all());
    }

    #[test]
    fn test_status_dispatch_keeps_first_service() {
        let mut registry = StubRegistry::new();
        let first = service("http://first.local");
        let second = service("http://second.local");
        registry
            .register_status_dispatched(
                Verb::Get,
                "/u",
                &first,
                None,
                Stub::Null,
                StubFormat::Literal,
            )
            .unwrap();
        registry
            .register_status_dispatched(
                Verb::Get,
                "/u",
                &second,
                Some("404"),
                Stub::Null,
                StubFormat::Literal,
            )
            .unwrap();

        let found = registry.lookup(&Method::GET, "/u").unwrap();
        let RouteKind::StatusDispatched { service, entries } = &found.route.kind else {
            panic!("expected status-dispatched route");
        };
        assert_eq!(service, &first);
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_mixing_kinds_on_one_route_is_rejected() {
        let mut registry = StubRegistry::new();
        let upstream = service("http://localhost:9000");
        registry
            .register_static(Verb::Get, "/a", Stub::Null, StubFormat::Literal)
            .unwrap();
        assert!(matches!(
            registry.register_status_dispatched(
                Verb::Get,
                "/a",
                &upstream,
                None,
                Stub::Null,
                StubFormat::Literal,
            ),
            Err(MountError::DuplicateRoute { .. })
        ));

        registry
            .register_status_dispatched(
                Verb::Get,
                "/b",
                &upstream,
                None,
                Stub::Null,
                StubFormat::Literal,
            )
            .unwrap();
        assert!(matches!(
            registry.register_static(Verb::Get, "/b", Stub::Null, StubFormat::Literal),
            Err(MountError::DuplicateRoute { .. })
        ));

        registry.register_proxy("*", &upstream).unwrap();
        assert!(matches!(
            registry.register_proxy("*", &upstream),
            Err(MountError::DuplicateRoute { .. })
        ));
    }

    #[test]
    fn test_invalid_status_is_rejected() {
        let mut registry = StubRegistry::new();
        let upstream = service("http://localhost:9000");
        assert!(matches!(
            registry.register_status_dispatched(
                Verb::Get,
                "/a",
                &upstream,
                Some("20"),
                Stub::Null,
                StubFormat::Literal,
            ),
            Err(MountError::InvalidStatus(s)) if s == "20"
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_lookup_uses_registration_order() {
        let mut registry = StubRegistry::new();
        let upstream = service("http://localhost:9000");
        registry
            .register_static(Verb::Get, "/users/:id", literal(json!(1)), StubFormat::Literal)
            .unwrap();
        registry.register_proxy("*", &upstream).unwrap();

        let found = registry.lookup(&Method::GET, "/users/7").unwrap();
        assert!(matches!(found.route.kind, RouteKind::Static(_)));
        assert_eq!(found.params.get("id"), Some(&"7".to_string()));

        let fallback = registry.lookup(&Method::DELETE, "/users/7").unwrap();
        assert!(matches!(fallback.route.kind, RouteKind::Proxy { .. }));
        assert_eq!(fallback.route.path(), "*");
    }

    #[test]
    fn test_scripted_stub_is_not_prerendered() {
        let route_stub = RouteStub::new(literal(json!({"a": 1})), StubFormat::Scripted);
        assert!(route_stub.literal.is_none());
    }
}
