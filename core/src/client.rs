//! The per-service client: request building, endpoint failover, decoding.
//!
//! # Design
//! `HcHttpClient` is a cheap-to-clone value. The transport and the endpoint
//! selector are shared between clones, while the extra headers from
//! [`HcHttpClient::pre_invoke`] live in the value itself, so two threads
//! preparing different calls never see each other's headers.
//!
//! A call is rebuilt from the typed request on every endpoint attempt, so
//! failover and retries always carry fresh credentials.

use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use tracing::warn;

use crate::auth::Credentials;
use crate::config::HttpConfig;
use crate::def::HttpRequestDef;
use crate::endpoint::EndpointSelector;
use crate::error::{Result, SdkError};
use crate::exchange::SdkExchange;
use crate::extract::{fill_request_fields, SdkRequest};
use crate::handler::HttpHandler;
use crate::request::DefaultHttpRequest;
use crate::response::{decode_response, SdkResponse};
use crate::transport::{DefaultHttpClient, DialFn};

#[derive(Clone)]
pub struct HcHttpClient {
    transport: DefaultHttpClient,
    endpoints: Arc<EndpointSelector>,
    credentials: Option<Arc<dyn Credentials>>,
    extra_headers: BTreeMap<String, String>,
}

impl fmt::Debug for HcHttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HcHttpClient")
            .field("transport", &self.transport)
            .field("endpoints", &self.endpoints)
            .field("credentials", &self.credentials.is_some())
            .field("extra_headers", &self.extra_headers)
            .finish()
    }
}

impl HcHttpClient {
    pub fn builder() -> HcHttpClientBuilder {
        HcHttpClientBuilder::default()
    }

    pub fn endpoints(&self) -> &EndpointSelector {
        &self.endpoints
    }

    pub fn transport(&self) -> &DefaultHttpClient {
        &self.transport
    }

    /// A copy of this client that adds `headers` to every request it sends.
    pub fn pre_invoke<I, K, V>(&self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut client = self.clone();
        client
            .extra_headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        client
    }

    /// Build the wire request for `request` against `endpoint`, signed when
    /// credentials are configured.
    pub fn build_request<R>(
        &self,
        endpoint: &str,
        request: &R,
        def: &HttpRequestDef,
    ) -> Result<DefaultHttpRequest>
    where
        R: SdkRequest + ?Sized,
    {
        let mut builder = DefaultHttpRequest::builder()
            .with_endpoint(endpoint)
            .with_path(def.path())
            .with_method(def.method());
        if !def.content_type().is_empty() {
            builder = builder.with_content_type(def.content_type());
        }
        // Per-call headers override the definition's content type.
        for (name, value) in &self.extra_headers {
            builder = builder.add_header_param(name.as_str(), value.as_str());
        }
        let built = fill_request_fields(builder, request, def)?.build()?;
        match &self.credentials {
            Some(credentials) => credentials.process_auth_request(built),
            None => Ok(built),
        }
    }

    pub fn sync_invoke<R, T>(&self, request: &R, def: &HttpRequestDef) -> Result<T>
    where
        R: SdkRequest + ?Sized,
        T: SdkResponse,
    {
        self.sync_invoke_with_exchange(request, def, &mut SdkExchange::new())
    }

    /// Execute one logical call. A DNS failure moves every clone of this
    /// client to the next endpoint and the call is repeated there; any other
    /// error is returned as is.
    pub fn sync_invoke_with_exchange<R, T>(
        &self,
        request: &R,
        def: &HttpRequestDef,
        exchange: &mut SdkExchange,
    ) -> Result<T>
    where
        R: SdkRequest + ?Sized,
        T: SdkResponse,
    {
        loop {
            let index = self.endpoints.current();
            let endpoint = self.endpoints.get(index)?;
            let http_request = self.build_request(endpoint, request, def)?;
            match self
                .transport
                .sync_invoke_http_with_exchange(&http_request, exchange)
            {
                Ok(response) => return decode_response(response, def),
                Err(e) if e.is_host_not_found() && self.endpoints.advance_from(index) => {
                    warn!(endpoint, error = %e, "endpoint unresolvable, failing over");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[derive(Default)]
pub struct HcHttpClientBuilder {
    endpoints: Option<Arc<EndpointSelector>>,
    config: HttpConfig,
    handler: HttpHandler,
    credentials: Option<Arc<dyn Credentials>>,
    dial: Option<DialFn>,
}

impl HcHttpClientBuilder {
    /// Candidate endpoints, primary first.
    pub fn with_endpoints<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endpoints = Some(Arc::new(EndpointSelector::new(endpoints)));
        self
    }

    /// Share failover state with other clients.
    pub fn with_endpoint_selector(mut self, selector: Arc<EndpointSelector>) -> Self {
        self.endpoints = Some(selector);
        self
    }

    pub fn with_config(mut self, config: HttpConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_handler(mut self, handler: HttpHandler) -> Self {
        self.handler = handler;
        self
    }

    pub fn with_credentials<C: Credentials + 'static>(mut self, credentials: C) -> Self {
        self.credentials = Some(Arc::new(credentials));
        self
    }

    /// Override where connections go, e.g. to pin an endpoint's host to a
    /// fixed address. See [`DialFn`].
    pub fn with_dial<F>(mut self, dial: F) -> Self
    where
        F: Fn(&str, u16) -> Option<SocketAddr> + Send + Sync + 'static,
    {
        self.dial = Some(Arc::new(dial));
        self
    }

    pub fn build(self) -> Result<HcHttpClient> {
        let endpoints = self
            .endpoints
            .filter(|selector| !selector.endpoints().is_empty())
            .ok_or_else(|| SdkError::InvalidEndpoint {
                endpoint: String::new(),
                reason: "at least one endpoint is required".to_string(),
            })?;
        let transport = match self.dial {
            Some(dial) => DefaultHttpClient::with_dial(self.config, dial)?,
            None => DefaultHttpClient::new(self.config)?,
        }
        .with_handler(self.handler);
        Ok(HcHttpClient {
            transport,
            endpoints,
            credentials: self.credentials,
            extra_headers: BTreeMap::new(),
        })
    }
}
