//! Blocking HTTP execution over a pooled ureq agent.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;
use ureq::config::Config;
use ureq::http::{Response, Uri};
use ureq::tls::TlsConfig;
use ureq::unversioned::resolver::{DefaultResolver, ResolvedSocketAddrs, Resolver};
use ureq::unversioned::transport::{DefaultConnector, NextTimeout};
use ureq::Agent;

use crate::config::HttpConfig;
use crate::error::{Result, SdkError};
use crate::exchange::SdkExchange;
use crate::handler::HttpHandler;
use crate::http::{HttpResponse, ResponseBody};
use crate::request::DefaultHttpRequest;

/// Maps the host and port a request targets to the address to connect to.
/// Returning `None` falls back to system DNS. When a proxy is configured
/// the proxy's host is the one passed in.
pub type DialFn = Arc<dyn Fn(&str, u16) -> Option<SocketAddr> + Send + Sync>;

/// Executes one request per call. Cheap to clone; clones share the
/// connection pool.
#[derive(Clone)]
pub struct DefaultHttpClient {
    agent: Agent,
    config: HttpConfig,
    handler: HttpHandler,
}

impl fmt::Debug for DefaultHttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultHttpClient")
            .field("config", &self.config)
            .field("handler", &self.handler)
            .finish_non_exhaustive()
    }
}

impl DefaultHttpClient {
    pub fn new(config: HttpConfig) -> Result<Self> {
        Self::build(config, None)
    }

    /// Like [`DefaultHttpClient::new`], but connections go wherever `dial`
    /// says instead of where DNS points.
    pub fn with_dial(config: HttpConfig, dial: DialFn) -> Result<Self> {
        Self::build(config, Some(dial))
    }

    fn build(config: HttpConfig, dial: Option<DialFn>) -> Result<Self> {
        let proxy = match &config.proxy {
            Some(proxy) => Some(ureq::Proxy::new(&proxy.uri())?),
            None => None,
        };
        let tls_config = TlsConfig::builder()
            .disable_verification(config.ignore_ssl_verification)
            .build();
        let agent_config = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(config.timeout))
            .tls_config(tls_config)
            .proxy(proxy)
            .build();
        let agent = match dial {
            Some(dial) => Agent::with_parts(
                agent_config,
                DefaultConnector::default(),
                DialResolver {
                    dial,
                    fallback: DefaultResolver::default(),
                },
            ),
            None => agent_config.new_agent(),
        };
        Ok(Self {
            agent,
            config,
            handler: HttpHandler::default(),
        })
    }

    pub fn with_handler(mut self, handler: HttpHandler) -> Self {
        self.handler = handler;
        self
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    pub fn sync_invoke_http(&self, request: &DefaultHttpRequest) -> Result<HttpResponse> {
        self.sync_invoke_http_with_exchange(request, &mut SdkExchange::new())
    }

    /// Send `request` and return the response with its body still streaming,
    /// unless a response observer required it to be buffered.
    pub fn sync_invoke_http_with_exchange(
        &self,
        request: &DefaultHttpRequest,
        exchange: &mut SdkExchange,
    ) -> Result<HttpResponse> {
        let transport_request = request.to_transport(&self.config.user_agent)?;
        if let Some(observer) = &self.handler.request {
            observer(&transport_request);
        }

        exchange
            .api_reference
            .record_request(request, &self.config.user_agent);
        debug!(method = %request.method(), url = %request.url(), "sending request");

        let started = Instant::now();
        let response = self.agent.run(transport_request).map_err(SdkError::from)?;
        let mut response = into_http_response(response);

        if let Some(observer) = &self.handler.response {
            response.buffer()?;
            observer(&response);
        }

        exchange
            .api_reference
            .record_response(&response, started.elapsed());
        debug!(
            status = response.status,
            request_id = %exchange.api_reference.request_id,
            elapsed_ms = exchange.api_reference.duration.as_millis() as u64,
            "received response"
        );
        if let Some(monitor) = &self.handler.monitor {
            monitor(&exchange.api_reference);
        }
        Ok(response)
    }
}

struct DialResolver {
    dial: DialFn,
    fallback: DefaultResolver,
}

impl fmt::Debug for DialResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialResolver").finish_non_exhaustive()
    }
}

impl Resolver for DialResolver {
    fn resolve(
        &self,
        uri: &Uri,
        config: &Config,
        timeout: NextTimeout,
    ) -> std::result::Result<ResolvedSocketAddrs, ureq::Error> {
        let host = uri.host().unwrap_or_default();
        let port = uri
            .port_u16()
            .unwrap_or(if uri.scheme_str() == Some("https") { 443 } else { 80 });
        match (self.dial)(host, port) {
            Some(addr) => {
                debug!(host, port, %addr, "dial override");
                let mut addrs = self.empty();
                addrs.push(addr);
                Ok(addrs)
            }
            None => self.fallback.resolve(uri, config, timeout),
        }
    }
}

fn into_http_response(response: Response<ureq::Body>) -> HttpResponse {
    let (parts, body) = response.into_parts();
    HttpResponse {
        status: parts.status.as_u16(),
        headers: parts.headers,
        body: ResponseBody::Streaming(Box::new(body.into_reader())),
    }
}
