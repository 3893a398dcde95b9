//! Relevant-exchange predicate.
//!
//! A request or response is relevant when its raw URL contains the path
//! fragment, ends with the suffix, and its method equals the configured verb.
//! The URL is tested as-is: query strings and fragments are not stripped.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeMatcher {
    path_fragment: String,
    path_suffix: String,
    method: String,
}

impl ExchangeMatcher {
    pub fn new(path_fragment: &str, path_suffix: &str, method: &str) -> Self {
        Self {
            path_fragment: path_fragment.to_string(),
            path_suffix: path_suffix.to_string(),
            method: method.trim().to_ascii_uppercase(),
        }
    }

    pub fn matches(&self, url: &str, method: &str) -> bool {
        url.contains(&self.path_fragment)
            && url.ends_with(&self.path_suffix)
            && method.eq_ignore_ascii_case(&self.method)
    }

    pub fn method(&self) -> &str {
        &self.method
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload_replace() -> ExchangeMatcher {
        ExchangeMatcher::new("/api/", "/pdf", "PUT")
    }

    #[test]
    fn matches_upload_replace_endpoint() {
        let m = upload_replace();
        assert!(m.matches("http://localhost/api/docs/123/pdf", "PUT"));
        assert!(m.matches("http://localhost/api/docs/123/pdf", "put"));
    }

    #[test]
    fn rejects_other_methods() {
        let m = upload_replace();
        assert!(!m.matches("http://localhost/api/docs/123/pdf", "GET"));
        assert!(!m.matches("http://localhost/api/docs/123/pdf", "POST"));
    }

    #[test]
    fn rejects_missing_fragment_or_suffix() {
        let m = upload_replace();
        assert!(!m.matches("http://localhost/static/docs/123/pdf", "PUT"));
        assert!(!m.matches("http://localhost/api/docs/123/pdf/preview", "PUT"));
    }

    #[test]
    fn query_string_defeats_suffix() {
        let m = upload_replace();
        assert!(!m.matches("http://localhost/api/docs/123/pdf?v=2", "PUT"));
    }

    #[test]
    fn method_is_normalised() {
        assert_eq!(ExchangeMatcher::new("/api/", "/pdf", " put ").method(), "PUT");
    }
}
