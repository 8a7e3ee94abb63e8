//! Optional observers around each round trip.
//!
//! Observers see the request and response by shared reference. Bodies are
//! fully buffered before an observer runs, so an observer can read the whole
//! payload without consuming what the transport sends or the decoder reads.

use std::fmt;
use std::sync::Arc;

use ureq::http::Request;

use crate::exchange::ApiReference;
use crate::http::HttpResponse;

pub type RequestObserver = Arc<dyn Fn(&Request<Vec<u8>>) + Send + Sync>;
pub type ResponseObserver = Arc<dyn Fn(&HttpResponse) + Send + Sync>;
pub type MonitorObserver = Arc<dyn Fn(&ApiReference) + Send + Sync>;

#[derive(Clone, Default)]
pub struct HttpHandler {
    pub(crate) request: Option<RequestObserver>,
    pub(crate) response: Option<ResponseObserver>,
    pub(crate) monitor: Option<MonitorObserver>,
}

impl HttpHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with the outgoing request just before it is sent.
    pub fn on_request<F>(mut self, observer: F) -> Self
    where
        F: Fn(&Request<Vec<u8>>) + Send + Sync + 'static,
    {
        self.request = Some(Arc::new(observer));
        self
    }

    /// Called with every response, body buffered.
    pub fn on_response<F>(mut self, observer: F) -> Self
    where
        F: Fn(&HttpResponse) + Send + Sync + 'static,
    {
        self.response = Some(Arc::new(observer));
        self
    }

    /// Called once per round trip with timing and size metadata.
    pub fn on_monitor<F>(mut self, observer: F) -> Self
    where
        F: Fn(&ApiReference) + Send + Sync + 'static,
    {
        self.monitor = Some(Arc::new(observer));
        self
    }
}

impl fmt::Debug for HttpHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpHandler")
            .field("request", &self.request.is_some())
            .field("response", &self.response.is_some())
            .field("monitor", &self.monitor.is_some())
            .finish()
    }
}
