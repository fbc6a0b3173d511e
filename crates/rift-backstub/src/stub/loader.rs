//! Loading stub files from disk.
//!
//! - `.json`: literal stubs
//! - `.yaml` / `.yml`: stubs whose `{ "$script": "..." }` mappings become
//!   computed leaves
//! - `.rhai`: the whole file is one computed stub

use super::Stub;
use crate::error::LoadError;
use crate::script::ScriptLeaf;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

/// Key marking a scripted leaf in YAML stubs.
pub const SCRIPT_KEY: &str = "$script";

/// How a stub is served when no live data is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubFormat {
    /// Plain data. Served pre-rendered unless merged with live data.
    Literal,
    /// May hold computed leaves. Always walked by the merge engine.
    Scripted,
}

/// Map a file extension to the format it is loaded as.
pub fn stub_format_for(extension: &str) -> Option<StubFormat> {
    match extension {
        "json" => Some(StubFormat::Literal),
        "yaml" | "yml" | "rhai" => Some(StubFormat::Scripted),
        _ => None,
    }
}

pub fn load_stub_file(path: &Path) -> Result<(Stub, StubFormat), LoadError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    let contents = std::fs::read_to_string(path)?;
    let origin = path.display().to_string();

    match extension {
        "json" => {
            let value: Value = serde_json::from_str(&contents)?;
            Ok((Stub::from(value), StubFormat::Literal))
        }
        "yaml" | "yml" => {
            let value: Value = serde_yaml::from_str(&contents)?;
            Ok((scripted_stub(value, &origin)?, StubFormat::Scripted))
        }
        "rhai" => {
            let leaf = ScriptLeaf::compile(&contents, origin)?;
            Ok((Stub::Computed(Arc::new(leaf)), StubFormat::Scripted))
        }
        other => Err(LoadError::UnsupportedExtension(other.to_string())),
    }
}

/// Convert a data tree into a stub, compiling `$script` leaves.
pub fn scripted_stub(value: Value, origin: &str) -> Result<Stub, LoadError> {
    match value {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::String(source)) = map.get(SCRIPT_KEY) {
                    let leaf = ScriptLeaf::compile(source, origin)?;
                    return Ok(Stub::Computed(Arc::new(leaf)));
                }
            }
            let entries = map
                .into_iter()
                .map(|(k, v)| scripted_stub(v, origin).map(|stub| (k, stub)))
                .collect::<Result<_, _>>()?;
            Ok(Stub::Mapping(entries))
        }
        Value::Array(items) => items
            .into_iter()
            .map(|v| scripted_stub(v, origin))
            .collect::<Result<Vec<_>, _>>()
            .map(Stub::Sequence),
        Value::Null => Ok(Stub::Null),
        scalar => Ok(Stub::Scalar(scalar)),
    }
}
