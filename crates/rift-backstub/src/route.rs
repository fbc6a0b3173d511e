//! Route path patterns.
//!
//! Supports the path syntax stub directories naturally produce:
//! literal segments, `:name` parameters and `*` wildcards. Matching is
//! case-insensitive and tolerates a trailing slash. A bare `*` matches
//! every path.

use crate::error::MountError;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct RoutePattern {
    path: String,
    regex: Arc<Regex>,
    /// Capture names in group order. Wildcards are named "0", "1", ...
    params: Vec<String>,
}

impl RoutePattern {
    pub fn compile(path: &str) -> Result<Self, MountError> {
        let invalid = |reason: &str| MountError::InvalidRoute {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        if path.is_empty() {
            return Err(MountError::MissingArgument("route"));
        }
        if path != "*" && !path.starts_with('/') && !path.starts_with('*') {
            return Err(invalid("route must start with '/'"));
        }

        let mut pattern = String::from("(?i)^");
        let mut params = Vec::new();
        let mut wildcards = 0usize;
        let mut chars = path.trim_end_matches('/').chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                ':' => {
                    let mut name = String::new();
                    while let Some(&next) = chars.peek() {
                        if next.is_ascii_alphanumeric() || next == '_' {
                            name.push(next);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    if name.is_empty() {
                        return Err(invalid("parameter name missing after ':'"));
                    }
                    if params.contains(&name) {
                        return Err(invalid("duplicate parameter name"));
                    }
                    params.push(name);
                    pattern.push_str("([^/]+?)");
                }
                '*' => {
                    params.push(wildcards.to_string());
                    wildcards += 1;
                    pattern.push_str("(.*)");
                }
                other => pattern.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
            }
        }
        pattern.push_str("/?$");

        let regex = Regex::new(&pattern).map_err(|e| invalid(&e.to_string()))?;
        Ok(Self {
            path: path.to_string(),
            regex: Arc::new(regex),
            params,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Match a request path, returning the captured parameters.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let captures = self.regex.captures(path)?;
        let params = self
            .params
            .iter()
            .enumerate()
            .filter_map(|(i, name)| {
                captures.get(i + 1).map(|m| {
                    let value = urlencoding::decode(m.as_str())
                        .map(|v| v.into_owned())
                        .unwrap_or_else(|_| m.as_str().to_string());
                    (name.clone(), value)
                })
            })
            .collect();
        Some(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_route() {
        let route = RoutePattern::compile("/users/list").unwrap();
        assert!(route.matches("/users/list").is_some());
        assert!(route.matches("/users/list/").is_some());
        assert!(route.matches("/USERS/List").is_some());
        assert!(route.matches("/users").is_none());
        assert!(route.matches("/users/list/more").is_none());
    }

    #[test]
    fn test_root_route() {
        let route = RoutePattern::compile("/").unwrap();
        assert!(route.matches("/").is_some());
        assert!(route.matches("/anything").is_none());
    }

    #[test]
    fn test_named_params() {
        let route = RoutePattern::compile("/users/:id/repos/:repo_name").unwrap();
        let params = route.matches("/users/42/repos/rift%20proxy").unwrap();
        assert_eq!(params.get("id"), Some(&"42".to_string()));
        assert_eq!(params.get("repo_name"), Some(&"rift proxy".to_string()));
        assert!(route.matches("/users/42/repos").is_none());
    }

    #[test]
    fn test_wildcards() {
        let all = RoutePattern::compile("*").unwrap();
        assert!(all.matches("/").is_some());
        assert_eq!(
            all.matches("/deep/nested/path").unwrap().get("0"),
            Some(&"/deep/nested/path".to_string())
        );

        let prefixed = RoutePattern::compile("/api/*").unwrap();
        assert_eq!(
            prefixed.matches("/api/v1/users").unwrap().get("0"),
            Some(&"v1/users".to_string())
        );
        assert!(prefixed.matches("/other").is_none());
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let route = RoutePattern::compile("/files/a.b+c").unwrap();
        assert!(route.matches("/files/a.b+c").is_some());
        assert!(route.matches("/files/aXbbc").is_none());
    }

    #[test]
    fn test_invalid_routes() {
        assert!(matches!(
            RoutePattern::compile(""),
            Err(MountError::MissingArgument("route"))
        ));
        assert!(matches!(
            RoutePattern::compile("users"),
            Err(MountError::InvalidRoute { .. })
        ));
        assert!(matches!(
            RoutePattern::compile("/users/:"),
            Err(MountError::InvalidRoute { .. })
        ));
        assert!(matches!(
            RoutePattern::compile("/a/:id/b/:id"),
            Err(MountError::InvalidRoute { .. })
        ));
    }
}
