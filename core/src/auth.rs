//! Request signing.
//!
//! Credentials run on every attempt, after the request has been rebuilt, so a
//! rotated token is picked up by the next retry.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::request::DefaultHttpRequest;

pub const HEADER_AUTH_TOKEN: &str = "X-Auth-Token";
const PROJECT_ID: &str = "project_id";

pub trait Credentials: Send + Sync {
    fn process_auth_request(&self, request: DefaultHttpRequest) -> Result<DefaultHttpRequest>;
}

type TokenProvider = dyn Fn() -> Result<String> + Send + Sync;

/// Token authentication through the `X-Auth-Token` header.
#[derive(Clone)]
pub struct TokenCredentials {
    provider: Arc<TokenProvider>,
    project_id: Option<String>,
}

impl TokenCredentials {
    /// A fixed token.
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        Self::from_provider(move || Ok(token.clone()))
    }

    /// A token resolved again for every request.
    pub fn from_provider<F>(provider: F) -> Self
    where
        F: Fn() -> Result<String> + Send + Sync + 'static,
    {
        Self {
            provider: Arc::new(provider),
            project_id: None,
        }
    }

    /// Fill the `project_id` path parameter when an operation leaves it unset.
    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }
}

impl fmt::Debug for TokenCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCredentials")
            .field("project_id", &self.project_id)
            .finish_non_exhaustive()
    }
}

impl Credentials for TokenCredentials {
    fn process_auth_request(&self, mut request: DefaultHttpRequest) -> Result<DefaultHttpRequest> {
        let token = (self.provider)()?;
        request.add_header_param(HEADER_AUTH_TOKEN, token);
        if let Some(project_id) = &self.project_id {
            if !request.path_params().contains_key(PROJECT_ID) {
                request.add_path_param(PROJECT_ID, project_id.as_str());
            }
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SdkError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn request() -> DefaultHttpRequest {
        DefaultHttpRequest::builder()
            .with_endpoint("https://ecs.example.com")
            .with_path("/v1/{project_id}/servers")
            .build()
            .unwrap()
    }

    #[test]
    fn token_and_project_are_filled() {
        let credentials = TokenCredentials::new("tok").with_project_id("p1");
        let signed = credentials.process_auth_request(request()).unwrap();
        assert_eq!(signed.header(HEADER_AUTH_TOKEN), Some("tok"));
        assert_eq!(signed.path(), "/v1/p1/servers");
    }

    #[test]
    fn explicit_project_is_kept() {
        let request = DefaultHttpRequest::builder()
            .with_path("/v1/{project_id}/servers")
            .add_path_param("project_id", "mine")
            .build()
            .unwrap();
        let signed = TokenCredentials::new("tok")
            .with_project_id("default")
            .process_auth_request(request)
            .unwrap();
        assert_eq!(signed.path(), "/v1/mine/servers");
    }

    #[test]
    fn provider_runs_per_request() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let credentials = TokenCredentials::from_provider(move || {
            Ok(format!("tok-{}", counter.fetch_add(1, Ordering::SeqCst)))
        });
        let first = credentials.process_auth_request(request()).unwrap();
        let second = credentials.process_auth_request(request()).unwrap();
        assert_eq!(first.header(HEADER_AUTH_TOKEN), Some("tok-0"));
        assert_eq!(second.header(HEADER_AUTH_TOKEN), Some("tok-1"));
    }

    #[test]
    fn provider_failure_propagates() {
        let credentials =
            TokenCredentials::from_provider(|| Err(SdkError::Credentials("expired".into())));
        let err = credentials.process_auth_request(request()).unwrap_err();
        assert!(matches!(err, SdkError::Credentials(_)));
    }
}
