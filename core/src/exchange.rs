//! Per-invocation telemetry.

use std::time::Duration;

use chrono::{DateTime, Utc};
use url::Url;

use crate::http::HttpResponse;
use crate::request::DefaultHttpRequest;

/// What was called and how it went, filled in during one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiReference {
    pub host: String,
    pub method: String,
    pub path: String,
    pub raw_query: String,
    pub user_agent: String,
    pub start_time: Option<DateTime<Utc>>,
    pub duration: Duration,
    pub request_id: String,
    pub status_code: u16,
    pub content_length: u64,
}

impl ApiReference {
    pub(crate) fn record_request(&mut self, request: &DefaultHttpRequest, user_agent: &str) {
        self.host = Url::parse(request.endpoint())
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_default();
        self.method = request.method().to_string();
        self.path = request.path().to_string();
        self.raw_query = request.query_string();
        self.user_agent = request
            .header(crate::http::HEADER_USER_AGENT)
            .unwrap_or(user_agent)
            .to_string();
        self.start_time = Some(Utc::now());
    }

    pub(crate) fn record_response(&mut self, response: &HttpResponse, duration: Duration) {
        self.duration = duration;
        self.status_code = response.status;
        self.request_id = response.request_id().unwrap_or_default().to_string();
        self.content_length = response.content_length().unwrap_or_default();
    }
}

/// Request-scoped exchange record; not persisted.
#[derive(Debug, Clone, Default)]
pub struct SdkExchange {
    pub api_reference: ApiReference,
}

impl SdkExchange {
    pub fn new() -> Self {
        Self::default()
    }
}
