//! Request-scoped HTTP request and its builder.
//!
//! # Design
//! A [`DefaultHttpRequest`] exists for exactly one attempt. The client builds
//! a fresh one from the caller's value every time it sends, so headers or
//! tokens that changed between retries are picked up. Parameters stay
//! structured (query values are raw JSON) until [`DefaultHttpRequest::url`]
//! and [`DefaultHttpRequest::to_transport`] serialize them.

use std::collections::BTreeMap;

use serde_json::Value;
use ureq::http::Request;
use url::Url;

use crate::content::ContentType;
use crate::error::{Result, SdkError};
use crate::http::{HttpMethod, HEADER_CONTENT_TYPE, HEADER_USER_AGENT};
use crate::multipart::{encode_form, FormData, FormPart, MultipartWriter};

/// Body of a request before encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestBody {
    /// Wire name of the body field; the XML root element.
    pub name: String,
    pub value: Value,
}

/// One attempt's worth of request state.
#[derive(Debug, Clone)]
pub struct DefaultHttpRequest {
    endpoint: String,
    path: String,
    method: HttpMethod,
    query_params: BTreeMap<String, Value>,
    path_params: BTreeMap<String, String>,
    header_params: BTreeMap<String, String>,
    form_params: FormData,
    body: Option<RequestBody>,
}

impl DefaultHttpRequest {
    pub fn builder() -> HttpRequestBuilder {
        HttpRequestBuilder::default()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Path with every known placeholder substituted.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn query_params(&self) -> &BTreeMap<String, Value> {
        &self.query_params
    }

    pub fn path_params(&self) -> &BTreeMap<String, String> {
        &self.path_params
    }

    pub fn header_params(&self) -> &BTreeMap<String, String> {
        &self.header_params
    }

    pub fn form_params(&self) -> &FormData {
        &self.form_params
    }

    pub fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    /// Header value, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.header_params
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Set a header, replacing any existing one that differs only in case.
    pub fn add_header_param(&mut self, name: impl Into<String>, value: impl Into<String>) {
        insert_header(&mut self.header_params, name.into(), value.into());
    }

    /// Fill a path parameter after the request was built, e.g. from
    /// credentials. Only placeholders still present in the path change.
    pub fn add_path_param(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        self.path = self
            .path
            .replace(&format!("{{{name}}}"), &encode_path_segment(&value));
        self.path_params.insert(name, value);
    }

    /// Canonical query string without the leading `?`.
    pub fn query_string(&self) -> String {
        encode_query(&self.query_params)
    }

    /// Full request URL: endpoint, resolved path and canonical query.
    pub fn url(&self) -> String {
        let mut url = format!("{}{}", self.endpoint, self.path);
        let query = self.query_string();
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }
        url
    }

    /// Serialize into a transport request with a fully buffered body.
    pub fn to_transport(&self, user_agent: &str) -> Result<Request<Vec<u8>>> {
        let mut headers = self.header_params.clone();
        let body = if !self.form_params.is_empty() {
            let mut writer = MultipartWriter::new();
            encode_form(&self.form_params, &mut writer);
            remove_header(&mut headers, HEADER_CONTENT_TYPE);
            headers.insert(HEADER_CONTENT_TYPE.to_string(), writer.content_type());
            writer.finish()
        } else if let Some(body) = &self.body {
            let content_type = self
                .header(HEADER_CONTENT_TYPE)
                .map(ContentType::from_header)
                .unwrap_or_default();
            if self.header(HEADER_CONTENT_TYPE).is_none() {
                headers.insert(HEADER_CONTENT_TYPE.to_string(), content_type.mime().to_string());
            }
            match &body.value {
                Value::String(text) => text.clone().into_bytes(),
                value => content_type.encode(value, &body.name)?,
            }
        } else {
            Vec::new()
        };

        if !headers.keys().any(|key| key.eq_ignore_ascii_case(HEADER_USER_AGENT)) {
            headers.insert(HEADER_USER_AGENT.to_string(), user_agent.to_string());
        }

        let mut builder = Request::builder().method(self.method).uri(self.url());
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder
            .body(body)
            .map_err(|e| SdkError::InvalidRequest(e.to_string()))
    }
}

/// Accumulates one request's parameters.
#[derive(Debug, Clone)]
pub struct HttpRequestBuilder {
    request: DefaultHttpRequest,
    cname: Option<String>,
}

impl Default for HttpRequestBuilder {
    fn default() -> Self {
        Self {
            request: DefaultHttpRequest {
                endpoint: String::new(),
                path: String::new(),
                method: HttpMethod::Get,
                query_params: BTreeMap::new(),
                path_params: BTreeMap::new(),
                header_params: BTreeMap::new(),
                form_params: FormData::new(),
                body: None,
            },
            cname: None,
        }
    }
}

impl HttpRequestBuilder {
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.request.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.request.path = path.into();
        self
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.request.method = method;
        self
    }

    /// Sets the `Content-Type` header; ignored when empty.
    pub fn with_content_type(self, content_type: &str) -> Self {
        if content_type.is_empty() {
            return self;
        }
        self.add_header_param(HEADER_CONTENT_TYPE, content_type)
    }

    /// Later writes win over earlier ones, regardless of name case.
    pub fn add_header_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        insert_header(&mut self.request.header_params, name.into(), value.into());
        self
    }

    pub fn add_path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.path_params.insert(name.into(), value.into());
        self
    }

    pub fn add_query_param(mut self, name: impl Into<String>, value: Value) -> Self {
        self.request.query_params.insert(name.into(), value);
        self
    }

    pub fn add_form_param(mut self, name: impl Into<String>, part: FormPart) -> Self {
        self.request.form_params.insert(name.into(), part);
        self
    }

    pub fn with_body(mut self, name: impl Into<String>, value: Value) -> Self {
        self.request.body = Some(RequestBody {
            name: name.into(),
            value,
        });
        self
    }

    /// Route the request to `{scheme}://{cname}.{host}` at build time.
    pub fn with_cname(mut self, cname: impl Into<String>) -> Self {
        self.cname = Some(cname.into());
        self
    }

    pub fn build(mut self) -> Result<DefaultHttpRequest> {
        if let Some(cname) = self.cname.take() {
            self.request.endpoint = virtual_host_endpoint(&self.request.endpoint, &cname)?;
        }
        let mut path = std::mem::take(&mut self.request.path);
        for (name, value) in &self.request.path_params {
            path = path.replace(&format!("{{{name}}}"), &encode_path_segment(value));
        }
        self.request.path = path;
        Ok(self.request)
    }
}

fn virtual_host_endpoint(endpoint: &str, cname: &str) -> Result<String> {
    let invalid = |reason: &str| SdkError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: reason.to_string(),
    };
    let url = Url::parse(endpoint).map_err(|e| invalid(&e.to_string()))?;
    let host = url.host_str().ok_or_else(|| invalid("endpoint has no host"))?;
    let mut rewritten = format!("{}://{}.{}", url.scheme(), cname, host);
    if let Some(port) = url.port() {
        rewritten.push_str(&format!(":{port}"));
    }
    Ok(rewritten)
}

fn remove_header(headers: &mut BTreeMap<String, String>, name: &str) {
    headers.retain(|key, _| !key.eq_ignore_ascii_case(name));
}

fn insert_header(headers: &mut BTreeMap<String, String>, name: String, value: String) {
    remove_header(headers, &name);
    headers.insert(name, value);
}

/// Path parameter values are single segments: `/`, spaces and every other
/// reserved character are escaped.
fn encode_path_segment(value: &str) -> String {
    encode_component(value)
}

/// Serialize query parameters canonically.
///
/// Keys are sorted; arrays repeat their key; objects expand to `key[sub]`;
/// objects inside arrays are JSON-encoded; nulls are dropped. Empty values
/// render as a bare key and spaces as `%20`.
pub fn encode_query(params: &BTreeMap<String, Value>) -> String {
    let mut pairs = Vec::new();
    for (key, value) in params {
        canonical_pairs(key, value, &mut pairs);
    }
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    let mut encoded = Vec::with_capacity(pairs.len());
    for (key, value) in &pairs {
        let key = encode_component(key);
        if value.is_empty() {
            encoded.push(key);
        } else {
            encoded.push(format!("{key}={}", encode_component(value)));
        }
    }
    encoded.join("&")
}

fn canonical_pairs(key: &str, value: &Value, pairs: &mut Vec<(String, String)>) {
    match value {
        Value::Null => {}
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::Null => {}
                    Value::Object(_) | Value::Array(_) => {
                        pairs.push((key.to_string(), item.to_string()));
                    }
                    scalar => pairs.push((key.to_string(), scalar_string(scalar))),
                }
            }
        }
        Value::Object(entries) => {
            for (sub_key, sub_value) in entries {
                canonical_pairs(&format!("{key}[{sub_key}]"), sub_value, pairs);
            }
        }
        scalar => pairs.push((key.to_string(), scalar_string(scalar))),
    }
}

fn encode_component(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// String form of a field value: strings without quotes, everything else as
/// JSON text.
pub fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
