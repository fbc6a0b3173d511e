//! Rhai scripts as computed stub leaves.
//!
//! Scripts run with three variables in scope:
//! - `data`: the live value at the leaf's position (`()` when absent)
//! - `request`: `#{ method, url, path, query, params, headers, body }`
//! - `response`: `#{ status, headers, body }` for service-backed routes,
//!   `()` otherwise
//!
//! The script's final expression is the leaf's value. Assignments to
//! `response.status` and `response.headers` are applied to the upstream
//! response that will be served.

use crate::error::{ComputeError, LoadError};
use crate::fetch::ResponseMeta;
use crate::request::RequestContext;
use crate::stub::Computed;
use hyper::header::{HeaderName, HeaderValue};
use hyper::HeaderMap;
use rhai::{Dynamic, Engine, Map, Scope, AST};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

static ENGINE: OnceLock<Engine> = OnceLock::new();

fn engine() -> &'static Engine {
    ENGINE.get_or_init(|| {
        let mut engine = Engine::new();
        engine.set_max_expr_depths(128, 64);
        engine.register_fn("to_json", |value: Dynamic| -> String {
            serde_json::to_string(&dynamic_to_json(value)).unwrap_or_default()
        });
        engine
    })
}

/// A compiled Rhai script evaluated at serve time.
#[derive(Clone)]
pub struct ScriptLeaf {
    ast: Arc<AST>,
    origin: String,
}

impl ScriptLeaf {
    pub fn compile(source: &str, origin: impl Into<String>) -> Result<Self, LoadError> {
        let origin = origin.into();
        let ast = engine()
            .compile(source)
            .map_err(|e| LoadError::Script(format!("{origin}: {e}")))?;
        Ok(Self {
            ast: Arc::new(ast),
            origin,
        })
    }
}

impl Computed for ScriptLeaf {
    fn evaluate(
        &self,
        live: &Value,
        request: &RequestContext,
        meta: Option<&mut ResponseMeta>,
    ) -> Result<Value, ComputeError> {
        let mut scope = Scope::new();
        scope.push_dynamic("data", json_to_dynamic(live.clone()));
        scope.push("request", request_map(request));

        let original = meta.as_deref().map(response_map);
        match &original {
            Some(map) => scope.push("response", map.clone()),
            None => scope.push_dynamic("response", Dynamic::UNIT),
        };

        let result: Dynamic = engine()
            .eval_ast_with_scope(&mut scope, &self.ast)
            .map_err(|e| ComputeError::new(format!("{}: {e}", self.origin)))?;

        if let (Some(meta), Some(original)) = (meta, original) {
            if let Some(updated) = scope.get_value::<Map>("response") {
                apply_response_changes(meta, &original, &updated, &self.origin);
            }
        }

        debug!(script = %self.origin, "Evaluated computed stub script");
        Ok(dynamic_to_json(result))
    }
}

fn string_map(entries: &HashMap<String, String>) -> Map {
    entries
        .iter()
        .map(|(k, v)| (k.as_str().into(), Dynamic::from(v.clone())))
        .collect()
}

fn headers_map(headers: &HeaderMap) -> Map {
    let mut map = Map::new();
    for name in headers.keys() {
        let joined = headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect::<Vec<_>>()
            .join(", ");
        map.insert(name.as_str().into(), Dynamic::from(joined));
    }
    map
}

fn request_map(request: &RequestContext) -> Map {
    let mut map = Map::new();
    map.insert("method".into(), Dynamic::from(request.method.to_string()));
    map.insert("url".into(), Dynamic::from(request.url.clone()));
    map.insert("path".into(), Dynamic::from(request.path.clone()));
    map.insert("query".into(), Dynamic::from(string_map(&request.query)));
    map.insert("params".into(), Dynamic::from(string_map(&request.params)));
    map.insert("headers".into(), Dynamic::from(headers_map(&request.headers)));
    map.insert("body".into(), json_to_dynamic(request.body.clone()));
    map
}

fn response_map(meta: &ResponseMeta) -> Map {
    let mut map = Map::new();
    map.insert("status".into(), Dynamic::from(i64::from(meta.status)));
    map.insert("headers".into(), Dynamic::from(headers_map(&meta.headers)));
    map.insert("body".into(), json_to_dynamic(meta.body.clone()));
    map
}

fn apply_response_changes(meta: &mut ResponseMeta, original: &Map, updated: &Map, origin: &str) {
    if let Some(status) = updated.get("status").and_then(|v| v.as_int().ok()) {
        match u16::try_from(status) {
            Ok(code) if (100..=999).contains(&code) => meta.status = code,
            _ => warn!(script = %origin, status, "Ignoring invalid response status set by script"),
        }
    }

    let before = original.get("headers").map(|h| dynamic_to_json(h.clone()));
    let after = updated.get("headers").map(|h| dynamic_to_json(h.clone()));
    if before == after {
        return;
    }
    let Some(Value::Object(headers)) = after else {
        return;
    };

    let mut rebuilt = HeaderMap::new();
    for (name, value) in headers {
        let text = match value {
            Value::String(s) => s,
            other => other.to_string(),
        };
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&text),
        ) {
            (Ok(name), Ok(value)) => {
                rebuilt.append(name, value);
            }
            _ => warn!(script = %origin, header = %name, "Ignoring invalid header set by script"),
        }
    }
    meta.headers = rebuilt;
}

pub(crate) fn json_to_dynamic(value: Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::Bool(b) => Dynamic::from(b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Dynamic::from(i)
            } else if let Some(f) = n.as_f64() {
                Dynamic::from(f)
            } else {
                Dynamic::UNIT
            }
        }
        Value::String(s) => Dynamic::from(s),
        Value::Array(arr) => {
            let vec: Vec<Dynamic> = arr.into_iter().map(json_to_dynamic).collect();
            Dynamic::from(vec)
        }
        Value::Object(obj) => {
            let mut map = Map::new();
            for (k, v) in obj {
                map.insert(k.into(), json_to_dynamic(v));
            }
            Dynamic::from(map)
        }
    }
}

pub(crate) fn dynamic_to_json(value: Dynamic) -> Value {
    if value.is_unit() {
        Value::Null
    } else if let Ok(b) = value.as_bool() {
        Value::Bool(b)
    } else if let Ok(i) = value.as_int() {
        Value::Number(i.into())
    } else if let Ok(f) = value.as_float() {
        // NaN and infinities have no JSON form; they become null, not 0.
        serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    } else if value.is_string() {
        Value::String(value.into_string().unwrap_or_default())
    } else if let Some(arr) = value.clone().try_cast::<Vec<Dynamic>>() {
        Value::Array(arr.into_iter().map(dynamic_to_json).collect())
    } else if let Some(map) = value.clone().try_cast::<Map>() {
        let mut obj = serde_json::Map::new();
        for (k, v) in map {
            obj.insert(k.to_string(), dynamic_to_json(v));
        }
        Value::Object(obj)
    } else {
        Value::String(format!("{value}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(status: u16) -> ResponseMeta {
        let mut headers = HeaderMap::new();
        headers.insert("x-upstream", HeaderValue::from_static("yes"));
        ResponseMeta {
            status,
            headers,
            body: json!({"message": "Not Found"}),
            ..Default::default()
        }
    }

    #[test]
    fn test_script_reads_live_data() {
        let leaf = ScriptLeaf::compile(r#""Original message: " + data"#, "test").unwrap();
        let out = leaf
            .evaluate(&json!("hello"), &RequestContext::default(), None)
            .unwrap();
        assert_eq!(out, json!("Original message: hello"));
    }

    #[test]
    fn test_script_reads_request() {
        let mut request = RequestContext::default();
        request.path = "/users/42".to_string();
        request.params.insert("id".to_string(), "42".to_string());
        request.body = json!({"name": "rift"});

        let leaf = ScriptLeaf::compile(
            r#"#{ id: request.params.id, path: request.path, name: request.body.name }"#,
            "test",
        )
        .unwrap();
        let out = leaf.evaluate(&Value::Null, &request, None).unwrap();
        assert_eq!(out, json!({"id": "42", "path": "/users/42", "name": "rift"}));
    }

    #[test]
    fn test_script_without_upstream_sees_unit_response() {
        let leaf = ScriptLeaf::compile(r#"type_of(response) == "()""#, "test").unwrap();
        let out = leaf
            .evaluate(&Value::Null, &RequestContext::default(), None)
            .unwrap();
        assert_eq!(out, json!(true));
    }

    #[test]
    fn test_script_rewrites_status_and_headers() {
        let leaf = ScriptLeaf::compile(
            r#"
                response.status = 200;
                response.headers.status = "200 OK";
                true
            "#,
            "test",
        )
        .unwrap();
        let mut meta = meta(404);
        let out = leaf
            .evaluate(&Value::Null, &RequestContext::default(), Some(&mut meta))
            .unwrap();

        assert_eq!(out, json!(true));
        assert_eq!(meta.status, 200);
        assert_eq!(meta.headers.get("status").unwrap(), "200 OK");
        assert_eq!(meta.headers.get("x-upstream").unwrap(), "yes");
    }

    #[test]
    fn test_script_untouched_headers_are_preserved() {
        let leaf = ScriptLeaf::compile("response.body.message", "test").unwrap();
        let mut meta = meta(404);
        meta.headers
            .append("set-cookie", HeaderValue::from_static("a=1"));
        meta.headers
            .append("set-cookie", HeaderValue::from_static("b=2"));

        let out = leaf
            .evaluate(&Value::Null, &RequestContext::default(), Some(&mut meta))
            .unwrap();
        assert_eq!(out, json!("Not Found"));
        assert_eq!(meta.status, 404);
        assert_eq!(meta.headers.get_all("set-cookie").iter().count(), 2);
    }

    #[test]
    fn test_script_compile_error() {
        let err = ScriptLeaf::compile("let = ;", "broken.rhai").err().unwrap();
        assert!(matches!(err, LoadError::Script(msg) if msg.starts_with("broken.rhai")));
    }

    #[test]
    fn test_script_runtime_error() {
        let leaf = ScriptLeaf::compile(r#"throw "nope""#, "fail.rhai").unwrap();
        let err = leaf
            .evaluate(&Value::Null, &RequestContext::default(), None)
            .unwrap_err();
        assert!(err.0.contains("fail.rhai"));
    }

    #[test]
    fn test_json_dynamic_conversion() {
        let value = json!({"a": [1, 2.5, "s", true, null], "b": {"c": -1}});
        assert_eq!(dynamic_to_json(json_to_dynamic(value.clone())), value);
    }

    #[test]
    fn test_non_finite_floats_become_null() {
        assert_eq!(dynamic_to_json(Dynamic::from(f64::NAN)), Value::Null);
        assert_eq!(dynamic_to_json(Dynamic::from(f64::INFINITY)), Value::Null);
        assert_eq!(dynamic_to_json(Dynamic::from(0.5_f64)), json!(0.5));
    }
}
