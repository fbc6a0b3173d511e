//! Stub/live-data merge.
//!
//! `transform` walks a stub and builds the response body. At each container
//! level the destination either starts as a copy of the live object or
//! array (when the stub declares the merge-control key) or empty. Containers and
//! computed leaves always overwrite; flat literals yield to inherited live
//! values when the merge-control value is truthy.

use crate::error::ComputeError;
use crate::fetch::ResponseMeta;
use crate::request::RequestContext;
use crate::stub::{Stub, MERGE_CONTROL_KEY};
use indexmap::IndexMap;
use serde_json::{Map, Value};

static NULL: Value = Value::Null;

/// Merge `stub` with the `live` upstream value.
pub fn transform(
    stub: &Stub,
    live: &Value,
    request: &RequestContext,
    mut meta: Option<&mut ResponseMeta>,
) -> Result<Value, ComputeError> {
    match stub {
        Stub::Null => Ok(Value::Null),
        Stub::Computed(f) => f.evaluate(live, request, meta),
        Stub::Scalar(value) => Ok(value.clone()),
        Stub::Mapping(entries) => merge_mapping(entries, live, request, &mut meta),
        Stub::Sequence(items) => {
            let mut dst = Vec::with_capacity(items.len());
            for (index, value) in items.iter().enumerate() {
                let live_at = live.get(index).unwrap_or(&NULL);
                dst.push(transform_entry(value, live_at, request, &mut meta)?);
            }
            Ok(Value::Array(dst))
        }
    }
}

/// Destination of a mapping level: a mapping, or a copy of an inherited
/// live array whose entries are appended.
enum Destination {
    Object(Map<String, Value>),
    Array(Vec<Value>),
}

impl Destination {
    fn contains(&self, key: &str) -> bool {
        match self {
            Destination::Object(map) => map.contains_key(key),
            Destination::Array(items) => key
                .parse::<usize>()
                .is_ok_and(|index| index < items.len()),
        }
    }

    fn set(&mut self, key: &str, value: Value) {
        match self {
            Destination::Object(map) => {
                map.insert(key.to_string(), value);
            }
            Destination::Array(items) => items.push(value),
        }
    }

    fn into_value(self) -> Value {
        match self {
            Destination::Object(map) => Value::Object(map),
            Destination::Array(items) => Value::Array(items),
        }
    }
}

fn merge_mapping(
    entries: &IndexMap<String, Stub>,
    live: &Value,
    request: &RequestContext,
    meta: &mut Option<&mut ResponseMeta>,
) -> Result<Value, ComputeError> {
    let control = entries.get(MERGE_CONTROL_KEY);

    // Scalar lives have nothing to inherit.
    let mut dst = match (control, live) {
        (Some(_), Value::Object(inherited)) => Destination::Object(inherited.clone()),
        (Some(_), Value::Array(inherited)) => Destination::Array(inherited.clone()),
        _ => Destination::Object(Map::new()),
    };

    let live_wins = match control {
        Some(op) => is_truthy(&evaluate_control(op, live, request, meta)?),
        None => false,
    };

    for (key, value) in entries {
        if key == MERGE_CONTROL_KEY {
            continue;
        }
        let live_at = live_value_at(live, key);

        match value {
            Stub::Mapping(_) | Stub::Sequence(_) | Stub::Computed(_) => {
                let merged = transform_entry(value, live_at, request, meta)?;
                dst.set(key, merged);
            }
            Stub::Null | Stub::Scalar(_) => {
                if !dst.contains(key) || !live_wins {
                    let literal = transform_entry(value, live_at, request, meta)?;
                    dst.set(key, literal);
                }
            }
        }
    }

    Ok(dst.into_value())
}

fn transform_entry(
    value: &Stub,
    live_at: &Value,
    request: &RequestContext,
    meta: &mut Option<&mut ResponseMeta>,
) -> Result<Value, ComputeError> {
    transform(value, live_at, request, meta.as_deref_mut())
}

/// Evaluate a merge-control value. Computed predicates see the whole live
/// value at this level.
fn evaluate_control(
    op: &Stub,
    live: &Value,
    request: &RequestContext,
    meta: &mut Option<&mut ResponseMeta>,
) -> Result<Value, ComputeError> {
    match op {
        Stub::Computed(f) => f.evaluate(live, request, meta.as_deref_mut()),
        Stub::Null => Ok(Value::Null),
        Stub::Scalar(value) => Ok(value.clone()),
        Stub::Mapping(_) | Stub::Sequence(_) => Ok(Value::Bool(true)),
    }
}

fn live_value_at<'a>(live: &'a Value, key: &str) -> &'a Value {
    match live {
        Value::Object(map) => map.get(key).unwrap_or(&NULL),
        Value::Array(items) => key
            .parse::<usize>()
            .ok()
            .and_then(|index| items.get(index))
            .unwrap_or(&NULL),
        _ => &NULL,
    }
}

/// Truthiness used for merge-control values: `null`, `false`, `0` and the
/// empty string are false.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
