//! API client for the recipebox REST API.
//!
//! Every call goes through [`ApiClient::execute_with_recovery`]: the current
//! bearer token is attached, and a 401 gets exactly one refresh-and-retry
//! before the session is cleared.

use std::sync::Arc;

use reqwest::header::{self, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::auth::SessionStore;
use crate::config::ClientConfig;

use super::{ApiError, PendingRequest};

// ============================================================================
// Constants
// ============================================================================

/// Endpoint that trades the refresh cookie for a new bearer token
const REFRESH_PATH: &str = "/auth/refresh";

/// Token payload returned by sign-in, refresh and token exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub token: String,
    /// Lifetime as sent by the backend; not interpreted client-side
    #[serde(rename = "expiresIn", default)]
    pub expires_in: Option<Value>,
}

/// API client for the recipebox backend.
/// Clone is cheap - reqwest::Client and the session store are both shared.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    config: ClientConfig,
    session: Arc<SessionStore>,
}

impl ApiClient {
    /// Create a new API client. Cookies set by the backend are kept for the
    /// lifetime of the client and sent with every request.
    pub fn new(config: ClientConfig, session: Arc<SessionStore>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .cookie_store(true)
            .build()?;

        Ok(Self {
            client,
            config,
            session,
        })
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Issue a request once, with the current token if there is one.
    pub async fn execute_once(&self, request: &PendingRequest) -> Result<Value, ApiError> {
        let url = self.config.url(&request.path);

        let mut headers = request.headers.clone();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        if request.body.is_none() {
            headers.remove(header::CONTENT_TYPE);
        }

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(headers);

        if let Some(token) = self.session.get_token() {
            builder = builder.bearer_auth(token);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        debug!(method = %request.method, path = %request.path, retry = request.is_retry(), "Sending request");
        let response = builder.send().await?;
        debug!(method = %request.method, path = %request.path, status = response.status().as_u16(), "Received response");

        Self::read_response(response).await
    }

    /// Issue a request, recovering once from an expired token.
    ///
    /// On a 401 the token is refreshed and the request re-issued a single
    /// time. If the refresh fails or the retried request is rejected too,
    /// the session is cleared and the 401 is returned.
    pub async fn execute_with_recovery(&self, request: PendingRequest) -> Result<Value, ApiError> {
        let err = match self.execute_once(&request).await {
            Err(err) if err.is_unauthorized() && !request.is_retry() => err,
            other => return other,
        };

        debug!(path = %request.path, "Unauthorized, attempting token refresh");
        if self.refresh().await.is_none() {
            self.session.clear_session();
            return Err(err);
        }

        let retry = request.into_retry();
        let result = self.execute_once(&retry).await;
        if matches!(result, Err(ref e) if e.is_unauthorized()) {
            warn!(path = %retry.path, "Request rejected after token refresh");
            self.session.clear_session();
        }
        result
    }

    /// Trade the refresh cookie for a new token and persist it.
    ///
    /// Sent without a bearer token. Any failure is logged and reported as
    /// `None` so the caller can decide to invalidate the session.
    pub async fn refresh(&self) -> Option<String> {
        let url = self.config.url(REFRESH_PATH);

        let response = match self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Token refresh request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(status = response.status().as_u16(), "Token refresh rejected");
            return None;
        }

        let grant: TokenGrant = match response.json().await {
            Ok(grant) => grant,
            Err(e) => {
                warn!(error = %e, "Failed to parse token refresh response");
                return None;
            }
        };
        if grant.token.is_empty() {
            warn!("Token refresh response carried an empty token");
            return None;
        }

        if let Err(e) = self.session.set_token(&grant.token) {
            warn!(error = %format!("{:#}", e), "Failed to persist refreshed token");
            return None;
        }

        info!("Session token refreshed");
        Some(grant.token)
    }

    /// Map a response to its JSON body, or to an error for non-2xx statuses.
    async fn read_response(response: reqwest::Response) -> Result<Value, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &body));
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse JSON response: {}", e)))
    }

    // ===== Convenience wrappers =====

    async fn send<T: DeserializeOwned>(&self, request: PendingRequest) -> Result<T, ApiError> {
        let value = self.execute_with_recovery(request).await?;
        decode(value)
    }

    fn with_body<B: Serialize + ?Sized>(
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<PendingRequest, ApiError> {
        let body = serde_json::to_value(body).map_err(ApiError::InvalidBody)?;
        Ok(PendingRequest::new(method, path).with_body(body))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(PendingRequest::new(Method::GET, path)).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(Self::with_body(Method::POST, path, body)?).await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(Self::with_body(Method::PATCH, path, body)?).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(Self::with_body(Method::PUT, path, body)?).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(PendingRequest::new(Method::DELETE, path)).await
    }
}

/// Deserialize a response body. A 204 arrives as JSON `null`, which decodes
/// into `()`, `Option<_>` or `Value`.
pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value)
        .map_err(|e| ApiError::InvalidResponse(format!("Unexpected response shape: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_token_grant() {
        let grant: TokenGrant =
            serde_json::from_value(json!({"token": "T2", "expiresIn": 900})).unwrap();
        assert_eq!(grant.token, "T2");
        assert_eq!(grant.expires_in, Some(json!(900)));

        let grant: TokenGrant = serde_json::from_value(json!({"token": "T3"})).unwrap();
        assert!(grant.expires_in.is_none());

        assert!(serde_json::from_value::<TokenGrant>(json!({"access": "T4"})).is_err());
    }

    #[test]
    fn test_decode_empty_body() {
        assert!(decode::<()>(Value::Null).is_ok());

        let nothing: Option<Vec<String>> = decode(Value::Null).unwrap();
        assert!(nothing.is_none());
    }

    #[test]
    fn test_decode_shape_mismatch() {
        let err = decode::<Vec<String>>(json!({"data": []})).unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[test]
    fn test_body_request_shape() {
        let request = ApiClient::with_body(Method::PATCH, "/recipes/7", &json!({"title": "Bolo"})).unwrap();
        assert_eq!(request.method, Method::PATCH);
        assert_eq!(request.body, Some(json!({"title": "Bolo"})));
        assert!(!request.is_retry());
    }
}
