//! Path prefix matching.
//!
//! # Design Decisions
//! - Plain string prefix on the request path (case-sensitive)
//! - The matched prefix is stripped before forwarding
//! - The forwarded path always starts with `/`

/// Matches and strips a request path prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.prefix)
    }

    /// The path to forward upstream, or `None` if the prefix does not match.
    pub fn strip(&self, path: &str) -> Option<String> {
        let rest = path.strip_prefix(&self.prefix)?;
        if rest.starts_with('/') {
            Some(rest.to_string())
        } else {
            Some(format!("/{}", rest))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_matcher() {
        let matcher = PathPrefixMatcher::new("/api");
        assert!(matcher.matches("/api/v1"));
        assert!(matcher.matches("/api"));
        assert!(!matcher.matches("/images"));
        assert!(!matcher.matches("/API/v1"));
    }

    #[test]
    fn test_strip() {
        let matcher = PathPrefixMatcher::new("/api");
        assert_eq!(matcher.strip("/api/x").as_deref(), Some("/x"));
        assert_eq!(matcher.strip("/api").as_deref(), Some("/"));
        assert_eq!(matcher.strip("/apix").as_deref(), Some("/x"));
        assert_eq!(matcher.strip("/other"), None);

        let trailing = PathPrefixMatcher::new("/api/");
        assert_eq!(trailing.strip("/api/users/1").as_deref(), Some("/users/1"));
    }
}
