//! Stub directory mounting.
//!
//! Every stub file under a directory becomes a route. The file's parent
//! directory, relative to the mount root, is the route path and its stem
//! names the verb and optional status: `users/:id/get.404.json` answers
//! `GET /users/:id` when the upstream replies 404.

use crate::error::MountError;
use crate::fetch::Service;
use crate::registry::{StubRegistry, Verb};
use crate::status::{StatusPattern, DEFAULT_STATUS_SPEC};
use crate::stub::{load_stub_file, stub_format_for};
use regex::Regex;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

/// Status specs accepted in file names and registration calls.
pub const STATUS_SPEC_PATTERN: &str = r"^[1-5](\d|[xX]){2}$";

static STATUS_SPEC_REGEX: OnceLock<Regex> = OnceLock::new();

fn status_spec_regex() -> &'static Regex {
    STATUS_SPEC_REGEX.get_or_init(|| Regex::new(STATUS_SPEC_PATTERN).expect("valid status regex"))
}

/// Check a user-supplied status spec such as `404` or `3xx`.
pub fn validate_status_spec(spec: &str) -> Result<StatusPattern, MountError> {
    if !status_spec_regex().is_match(spec) {
        return Err(MountError::InvalidStatus(spec.to_string()));
    }
    StatusPattern::compile(spec).map_err(|_| MountError::InvalidStatus(spec.to_string()))
}

/// A stub file and the route it describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubFile {
    pub path: PathBuf,
    pub verb: Verb,
    pub status: Option<String>,
    pub route: String,
}

/// Route path for a file under `root`: the parent directories joined by `/`.
pub fn route_for(root: &Path, file: &Path) -> String {
    let parent = file.parent().unwrap_or(root);
    let relative = parent.strip_prefix(root).unwrap_or(parent);
    let segments: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(segment) => Some(segment.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    format!("/{}", segments.join("/"))
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with('.'))
            .unwrap_or(false)
}

/// List the stub files under `dir` in path order and validate their names.
pub fn discover(dir: &Path, has_service: bool) -> Result<Vec<StubFile>, MountError> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = entry.map_err(|e| MountError::Io {
            path: e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf()),
            source: e.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let supported = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .and_then(stub_format_for)
            .is_some();
        if supported {
            paths.push(entry.into_path());
        }
    }
    paths.sort();

    paths
        .into_iter()
        .map(|path| parse_stub_file(dir, path, has_service))
        .collect()
}

fn parse_stub_file(root: &Path, path: PathBuf, has_service: bool) -> Result<StubFile, MountError> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    let (verb, status) = match stem.split_once('.') {
        Some((verb, status)) => (verb, Some(status.to_string())),
        None => (stem.as_str(), None),
    };

    let verb: Verb = verb.parse()?;
    if let Some(status) = &status {
        if !has_service {
            return Err(MountError::MissingService);
        }
        validate_status_spec(status)?;
    }

    Ok(StubFile {
        route: route_for(root, &path),
        path,
        verb,
        status,
    })
}

/// Mount every stub file under `dir`. With a service each file becomes a
/// status entry on a service route, otherwise a static route.
///
/// Returns the number of files mounted.
pub fn mount(
    registry: &mut StubRegistry,
    dir: &Path,
    service: Option<&Service>,
) -> Result<usize, MountError> {
    let files = discover(dir, service.is_some())?;

    for file in &files {
        let (stub, format) = load_stub_file(&file.path).map_err(|source| MountError::Load {
            path: file.path.clone(),
            source,
        })?;

        match service {
            Some(service) => registry.register_status_dispatched(
                file.verb,
                &file.route,
                service,
                file.status.as_deref(),
                stub,
                format,
            )?,
            None => registry.register_static(file.verb, &file.route, stub, format)?,
        }

        debug!(
            file = %file.path.display(),
            verb = %file.verb,
            route = %file.route,
            status = file.status.as_deref().unwrap_or(DEFAULT_STATUS_SPEC),
            "Mounted stub"
        );
    }

    match service {
        Some(service) => info!(dir = %dir.display(), service = %service, files = files.len(), "Mounted stub directory"),
        None => info!(dir = %dir.display(), files = files.len(), "Mounted stub directory"),
    }
    Ok(files.len())
}
