//! RFC 1123 name checks for object names and site ids.

use regex::Regex;
use thiserror::Error;

/// Longest DNS label (names of namespaced identities).
pub const MAX_LABEL_LEN: usize = 63;

/// Longest DNS subdomain (object names).
pub const MAX_SUBDOMAIN_LEN: usize = 253;

const LABEL_PATTERN: &str = r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$";
const SUBDOMAIN_PATTERN: &str = r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$";

#[derive(Debug, Error)]
pub enum NameError {
    #[error("{what} {value:?} is not a valid name: {reason}")]
    Invalid {
        what: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("name pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

/// Validate an RFC 1123 label (lowercase alphanumerics and '-', max 63).
pub fn validate_label(what: &'static str, value: &str) -> Result<(), NameError> {
    check(what, value, LABEL_PATTERN, MAX_LABEL_LEN)
}

/// Validate an RFC 1123 subdomain (dot-separated labels, max 253).
pub fn validate_subdomain(what: &'static str, value: &str) -> Result<(), NameError> {
    check(what, value, SUBDOMAIN_PATTERN, MAX_SUBDOMAIN_LEN)
}

fn check(what: &'static str, value: &str, pattern: &str, max_len: usize) -> Result<(), NameError> {
    if value.is_empty() {
        return Err(NameError::Invalid {
            what,
            value: value.to_string(),
            reason: "must not be empty",
        });
    }
    if value.len() > max_len {
        return Err(NameError::Invalid {
            what,
            value: value.to_string(),
            reason: "too long",
        });
    }
    let re = Regex::new(pattern)?;
    if !re.is_match(value) {
        return Err(NameError::Invalid {
            what,
            value: value.to_string(),
            reason: "must consist of lowercase alphanumerics or '-', and start and end with an alphanumeric",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_labels() {
        assert!(validate_label("name", "grp").is_ok());
        assert!(validate_label("name", "cnf-site-01").is_ok());
        assert!(validate_label("name", "a").is_ok());
    }

    #[test]
    fn rejects_malformed_labels() {
        assert!(validate_label("name", "").is_err());
        assert!(validate_label("name", "-lead").is_err());
        assert!(validate_label("name", "trail-").is_err());
        assert!(validate_label("name", "Upper").is_err());
        assert!(validate_label("name", "has.dot").is_err());
        assert!(validate_label("name", &"x".repeat(64)).is_err());
    }

    #[test]
    fn subdomains_allow_dots() {
        assert!(validate_subdomain("site", "spoke1.lab.example").is_ok());
        assert!(validate_subdomain("site", "spoke1..lab").is_err());
        assert!(validate_subdomain("site", &"a".repeat(254)).is_err());
    }
}
