//! HTTP method and response types shared by the transport and the decoder.
//!
//! # Design
//! A response body is either still streaming from the connection or already
//! buffered in memory. The transport only buffers when something needs to
//! look at the body twice (a response observer, the error normalizer, the
//! decoder); passthrough operations receive the stream untouched.

use std::fmt;
use std::io::{Cursor, Read};

use ureq::http::{HeaderMap, Method};

pub const HEADER_REQUEST_ID: &str = "X-Request-Id";
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_CONTENT_LENGTH: &str = "Content-Length";
pub const HEADER_USER_AGENT: &str = "User-Agent";

/// HTTP method for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
            HttpMethod::Head => Method::HEAD,
        }
    }
}

/// A readable, unconsumed response body.
pub type ResponseStream = Box<dyn Read + Send + 'static>;

/// Response body, either still on the wire or fully read.
pub enum ResponseBody {
    Buffered(Vec<u8>),
    Streaming(ResponseStream),
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Buffered(bytes) => write!(f, "Buffered({} bytes)", bytes.len()),
            ResponseBody::Streaming(_) => f.write_str("Streaming"),
        }
    }
}

/// An HTTP response as received by the transport.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

impl HttpResponse {
    pub fn new(status: u16, headers: HeaderMap, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body: ResponseBody::Buffered(body),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Value of a header as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn request_id(&self) -> Option<&str> {
        self.header(HEADER_REQUEST_ID)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(HEADER_CONTENT_TYPE)
    }

    pub fn content_length(&self) -> Option<u64> {
        self.header(HEADER_CONTENT_LENGTH)
            .and_then(|value| value.trim().parse().ok())
    }

    /// Read the whole body into memory, keeping it available for later reads.
    pub fn buffer(&mut self) -> std::io::Result<&[u8]> {
        if let ResponseBody::Streaming(stream) = &mut self.body {
            let mut bytes = Vec::new();
            stream.read_to_end(&mut bytes)?;
            self.body = ResponseBody::Buffered(bytes);
        }
        Ok(self.buffered_body().unwrap_or_default())
    }

    /// The buffered body, or `None` while it is still streaming.
    pub fn buffered_body(&self) -> Option<&[u8]> {
        match &self.body {
            ResponseBody::Buffered(bytes) => Some(bytes),
            ResponseBody::Streaming(_) => None,
        }
    }

    /// Consume the response and return the body as a stream.
    pub fn into_stream(self) -> ResponseStream {
        match self.body {
            ResponseBody::Buffered(bytes) => Box::new(Cursor::new(bytes)),
            ResponseBody::Streaming(stream) => stream,
        }
    }
}
