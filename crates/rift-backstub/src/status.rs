//! Status code patterns such as `200`, `3xx` or `1Xx`.
//!
//! A pattern has exactly three positions. Each position is either a fixed
//! digit or a wildcard (`x`/`X`) that matches any digit.

use crate::error::InvalidPatternError;
use std::fmt;
use std::str::FromStr;

/// Pattern used when a stub does not name a status.
pub const DEFAULT_STATUS_SPEC: &str = "xxx";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Position {
    Digit(u8),
    Any,
}

/// Compiled 3-digit status matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusPattern {
    positions: [Position; 3],
}

impl StatusPattern {
    /// Compile a status spec. Fails unless the spec is exactly three
    /// characters drawn from digits and `x`/`X`.
    pub fn compile(spec: &str) -> Result<Self, InvalidPatternError> {
        let bytes = spec.as_bytes();
        if bytes.len() != 3 {
            return Err(InvalidPatternError(spec.to_string()));
        }

        let mut positions = [Position::Any; 3];
        for (slot, byte) in positions.iter_mut().zip(bytes) {
            *slot = match byte {
                b'0'..=b'9' => Position::Digit(byte - b'0'),
                b'x' | b'X' => Position::Any,
                _ => return Err(InvalidPatternError(spec.to_string())),
            };
        }

        Ok(Self { positions })
    }

    /// The `xxx` pattern, matching any 3-digit code.
    pub const fn any() -> Self {
        Self {
            positions: [Position::Any; 3],
        }
    }

    pub fn is_catch_all(&self) -> bool {
        self.positions.iter().all(|p| *p == Position::Any)
    }

    pub fn matches(&self, status: u16) -> bool {
        if status > 999 {
            return false;
        }
        let digits = [
            (status / 100) as u8,
            ((status / 10) % 10) as u8,
            (status % 10) as u8,
        ];
        self.positions
            .iter()
            .zip(digits)
            .all(|(position, digit)| match position {
                Position::Any => true,
                Position::Digit(d) => *d == digit,
            })
    }
}

impl Default for StatusPattern {
    fn default() -> Self {
        Self::any()
    }
}

impl FromStr for StatusPattern {
    type Err = InvalidPatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::compile(s)
    }
}

impl fmt::Display for StatusPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for position in &self.positions {
            match position {
                Position::Digit(d) => write!(f, "{d}")?,
                Position::Any => f.write_str("x")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_class_matches() {
        let pattern = StatusPattern::compile("5xx").unwrap();
        assert!(pattern.matches(503));
        assert!(pattern.matches(500));
        assert!(!pattern.matches(200));
    }

    #[test]
    fn test_exact_pattern() {
        let pattern = StatusPattern::compile("200").unwrap();
        assert!(pattern.matches(200));
        assert!(!pattern.matches(201));
    }

    #[test]
    fn test_mixed_case_wildcards() {
        let pattern = StatusPattern::compile("1Xx").unwrap();
        assert!(pattern.matches(101));
        assert!(pattern.matches(199));
        assert!(!pattern.matches(201));

        let middle = StatusPattern::compile("4x4").unwrap();
        assert!(middle.matches(404));
        assert!(middle.matches(414));
        assert!(!middle.matches(405));
    }

    #[test]
    fn test_default_matches_any_three_digits() {
        let pattern = StatusPattern::default();
        assert!(pattern.is_catch_all());
        assert!(pattern.matches(100));
        assert!(pattern.matches(599));
        assert!(pattern.matches(7));
        assert!(!pattern.matches(1000));
    }

    #[test]
    fn test_zero_padding() {
        let pattern = StatusPattern::compile("00x").unwrap();
        assert!(pattern.matches(7));
        assert!(!pattern.matches(70));
    }

    #[test]
    fn test_invalid_specs_rejected() {
        for spec in ["", "20", "2000", "2y0", "abc", "５xx"] {
            assert_eq!(
                StatusPattern::compile(spec),
                Err(InvalidPatternError(spec.to_string())),
                "spec {spec:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_display_and_from_str() {
        let pattern: StatusPattern = "3XX".parse().unwrap();
        assert_eq!(pattern.to_string(), "3xx");
        assert!(!pattern.is_catch_all());
        assert_eq!(StatusPattern::any().to_string(), DEFAULT_STATUS_SPEC);
    }
}
