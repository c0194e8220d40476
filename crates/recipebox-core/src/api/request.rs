use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde_json::Value;

/// One API call, described independently of its transport so it can be
/// issued again after a token refresh.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub method: Method,
    /// Path relative to the configured base URL, e.g. `/recipes`
    pub path: String,
    pub body: Option<Value>,
    pub headers: HeaderMap,
    retried: bool,
}

impl PendingRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            headers: HeaderMap::new(),
            retried: false,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Whether this is the copy issued after a token refresh.
    pub fn is_retry(&self) -> bool {
        self.retried
    }

    /// The copy to issue after a successful refresh. A retried request is
    /// never refreshed again.
    pub(crate) fn into_retry(self) -> Self {
        Self {
            retried: true,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header;
    use serde_json::json;

    #[test]
    fn test_new_request_is_not_retried() {
        let request = PendingRequest::new(Method::GET, "/recipes");
        assert!(!request.is_retry());
        assert!(request.body.is_none());
        assert!(request.headers.is_empty());
    }

    #[test]
    fn test_retry_copy_keeps_description() {
        let request = PendingRequest::new(Method::POST, "/shopping-list/items")
            .with_body(json!({"note": "Tomate", "amount": 1, "unit": "un"}))
            .with_header(header::ACCEPT_LANGUAGE, HeaderValue::from_static("pt-BR"));

        let retry = request.clone().into_retry();
        assert!(retry.is_retry());
        assert_eq!(retry.method, Method::POST);
        assert_eq!(retry.path, request.path);
        assert_eq!(retry.body, request.body);
        assert_eq!(retry.headers.get(header::ACCEPT_LANGUAGE).unwrap(), "pt-BR");
    }
}
