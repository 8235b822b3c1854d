// Caller resolution for commands that need an authenticated identity
use crate::application::data_service::Caller;
use axum::http::{header, HeaderMap};
use std::collections::HashMap;
use subtle::ConstantTimeEq;

/// Static bearer tokens mapped to user ids.
#[derive(Debug, Clone, Default)]
pub struct TokenTable {
    entries: Vec<(String, String)>,
}

impl TokenTable {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self {
            entries: tokens.into_iter().collect(),
        }
    }

    pub fn resolve(&self, token: &str) -> Option<Caller> {
        self.entries
            .iter()
            .find(|(known, _)| bool::from(known.as_bytes().ct_eq(token.as_bytes())))
            .map(|(_, uid)| Caller::new(uid.clone()))
    }

    /// Caller named by an `Authorization: Bearer <token>` header, if any.
    pub fn caller(&self, headers: &HeaderMap) -> Option<Caller> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))?;
        self.resolve(token.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn table() -> TokenTable {
        TokenTable::new(HashMap::from([("s3cret".to_string(), "operator-1".to_string())]))
    }

    #[test]
    fn test_resolve() {
        assert_eq!(table().resolve("s3cret"), Some(Caller::new("operator-1")));
        assert_eq!(table().resolve("s3cre"), None);
        assert_eq!(table().resolve(""), None);
    }

    #[test]
    fn test_caller_from_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(table().caller(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic s3cret"));
        assert_eq!(table().caller(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer s3cret"));
        assert_eq!(table().caller(&headers), Some(Caller::new("operator-1")));
    }
}
