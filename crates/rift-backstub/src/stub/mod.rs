//! Stub definitions.
//!
//! A stub is a closed tree of literals, containers and computed leaves.
//! Mappings may carry the merge-control key [`MERGE_CONTROL_KEY`], which
//! decides whether inherited live values or stub literals win at that level.

mod computed;
mod loader;

pub use computed::Computed;
pub use loader::{load_stub_file, scripted_stub, stub_format_for, StubFormat, SCRIPT_KEY};

use crate::error::ComputeError;
use crate::fetch::ResponseMeta;
use crate::request::RequestContext;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Reserved key in mapping stubs. Never emitted in responses.
pub const MERGE_CONTROL_KEY: &str = "_$$";

#[derive(Clone)]
pub enum Stub {
    Null,
    /// String, number or boolean literal.
    Scalar(Value),
    Computed(Arc<dyn Computed>),
    Mapping(IndexMap<String, Stub>),
    Sequence(Vec<Stub>),
}

impl Stub {
    /// Wrap a closure as a computed leaf.
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&Value, &RequestContext, Option<&mut ResponseMeta>) -> Result<Value, ComputeError>
            + Send
            + Sync
            + 'static,
    {
        Stub::Computed(Arc::new(f))
    }

    pub fn mapping<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Stub)>,
    {
        Stub::Mapping(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn sequence<I: IntoIterator<Item = Stub>>(items: I) -> Self {
        Stub::Sequence(items.into_iter().collect())
    }

    /// Render a stub without live data. Returns `None` when the tree holds
    /// computed leaves. Merge-control keys are dropped.
    pub fn render_literal(&self) -> Option<Value> {
        match self {
            Stub::Null => Some(Value::Null),
            Stub::Scalar(value) => Some(value.clone()),
            Stub::Computed(_) => None,
            Stub::Mapping(entries) => {
                let mut out = Map::new();
                for (key, value) in entries {
                    if key == MERGE_CONTROL_KEY {
                        continue;
                    }
                    out.insert(key.clone(), value.render_literal()?);
                }
                Some(Value::Object(out))
            }
            Stub::Sequence(items) => items
                .iter()
                .map(Stub::render_literal)
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
        }
    }
}

impl From<Value> for Stub {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Stub::Null,
            Value::Object(map) => {
                Stub::Mapping(map.into_iter().map(|(k, v)| (k, Stub::from(v))).collect())
            }
            Value::Array(items) => Stub::Sequence(items.into_iter().map(Stub::from).collect()),
            scalar => Stub::Scalar(scalar),
        }
    }
}

impl fmt::Debug for Stub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stub::Null => f.write_str("Null"),
            Stub::Scalar(value) => f.debug_tuple("Scalar").field(value).finish(),
            Stub::Computed(_) => f.write_str("Computed(..)"),
            Stub::Mapping(entries) => f.debug_map().entries(entries.iter()).finish(),
            Stub::Sequence(items) => f.debug_list().entries(items.iter()).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_preserves_shape() {
        let stub = Stub::from(json!({"a": [1, null, {"b": true}], "c": "x"}));
        let Stub::Mapping(entries) = &stub else {
            panic!("expected mapping");
        };
        assert!(matches!(entries.get("a"), Some(Stub::Sequence(items)) if items.len() == 3));
        assert!(matches!(entries.get("c"), Some(Stub::Scalar(Value::String(s))) if s == "x"));
        assert!(stub.render_literal().is_some());
    }

    #[test]
    fn test_render_literal_strips_merge_control() {
        let stub = Stub::from(json!({"_$$": true, "a": 1, "nested": {"_$$": false, "b": 2}}));
        assert_eq!(
            stub.render_literal(),
            Some(json!({"a": 1, "nested": {"b": 2}}))
        );
    }

    #[test]
    fn test_render_literal_refuses_computed() {
        let stub = Stub::mapping([
            ("a", Stub::Scalar(json!(1))),
            ("b", Stub::computed(|_, _, _| Ok(json!(2)))),
        ]);
        assert_eq!(stub.render_literal(), None);
    }
}
