//! Sign-in, sign-up, sign-out and external token exchange.
//!
//! These calls use `execute_once`: a 401 here means bad credentials, not
//! an expired session, so no refresh is attempted.

use reqwest::Method;
use serde_json::json;
use tracing::{info, warn};

use super::client::{decode, TokenGrant};
use super::{ApiClient, ApiError, PendingRequest};

const SIGNIN_PATH: &str = "/auth/signin";
const SIGNUP_PATH: &str = "/auth/signup";
const SIGNOUT_PATH: &str = "/auth/signout";
const EXCHANGE_PATH: &str = "/auth/exchange/supabase";

impl ApiClient {
    /// Sign in with email and password and store the issued token.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<TokenGrant, ApiError> {
        let request = PendingRequest::new(Method::POST, SIGNIN_PATH)
            .with_body(json!({ "email": email, "password": password }));
        let grant = self.grant(&request).await?;
        info!("Signed in");
        Ok(grant)
    }

    /// Create an account, then sign in with it.
    pub async fn sign_up(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<TokenGrant, ApiError> {
        let request = PendingRequest::new(Method::POST, SIGNUP_PATH)
            .with_body(json!({ "name": name, "email": email, "password": password }));
        self.execute_once(&request).await?;
        self.sign_in(email, password).await
    }

    /// Tell the backend to end the session, then clear it locally.
    ///
    /// The local session is cleared (and subscribers notified) even when the
    /// backend call fails.
    pub async fn sign_out(&self) {
        let request = PendingRequest::new(Method::POST, SIGNOUT_PATH);
        if let Err(e) = self.execute_once(&request).await {
            warn!(error = %e, "Sign-out request failed, clearing local session anyway");
        }
        self.session().clear_session();
    }

    /// Trade a token from the external identity provider for a session token.
    pub async fn exchange_external_token(&self, external_token: &str) -> Result<TokenGrant, ApiError> {
        let request = PendingRequest::new(Method::POST, EXCHANGE_PATH)
            .with_body(json!({ "token": external_token }));
        let grant = self.grant(&request).await?;
        info!("Exchanged external token for a session");
        Ok(grant)
    }

    async fn grant(&self, request: &PendingRequest) -> Result<TokenGrant, ApiError> {
        let grant: TokenGrant = decode(self.execute_once(request).await?)?;
        if grant.token.is_empty() {
            return Err(ApiError::InvalidResponse("Empty token in response".to_string()));
        }
        self.session().set_token(&grant.token)?;
        Ok(grant)
    }
}
