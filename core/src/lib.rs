//! Blocking request/response core for cloud control-plane APIs.
//!
//! # Overview
//! Every API operation is described once by an [`HttpRequestDef`]: method,
//! path template, content type and where each field of the typed request and
//! response lives on the wire. [`HcHttpClient`] turns a typed request into an
//! HTTP call against an ordered list of endpoints, executes it through
//! [`DefaultHttpClient`], and decodes the response into a typed value or a
//! normalized [`ServiceResponseError`]. [`BaseInvoker`] adds per-call headers
//! and retries with a pluggable [`BackoffStrategy`].
//!
//! # Design
//! - Typed requests are plain `Serialize` structs; fields are located by
//!   their serialized name. Typed responses are `Deserialize` structs.
//! - The only shared mutable state is the endpoint cursor, an atomic that
//!   only moves forward after DNS failures.
//! - Observers in [`HttpHandler`] see buffered copies of bodies, never the
//!   stream the decoder reads.
//! - All I/O is blocking; timeouts come from [`HttpConfig`].

pub mod auth;
pub mod client;
pub mod config;
pub mod content;
pub mod def;
pub mod endpoint;
pub mod error;
pub mod exchange;
pub mod extract;
pub mod handler;
pub mod http;
pub mod invoker;
pub mod multipart;
pub mod request;
pub mod response;
pub mod retry;
pub mod sdkerr;
pub mod transport;

pub use auth::{Credentials, TokenCredentials};
pub use client::{HcHttpClient, HcHttpClientBuilder};
pub use config::{HttpConfig, Proxy};
pub use content::ContentType;
pub use def::{FieldDef, FieldKind, HttpRequestDef, LocationType};
pub use endpoint::EndpointSelector;
pub use error::{Result, SdkError};
pub use exchange::{ApiReference, SdkExchange};
pub use extract::SdkRequest;
pub use handler::HttpHandler;
pub use http::{HttpMethod, HttpResponse, ResponseStream};
pub use invoker::BaseInvoker;
pub use multipart::{FilePart, FormData, FormPart};
pub use request::{DefaultHttpRequest, HttpRequestBuilder};
pub use response::SdkResponse;
pub use retry::{BackoffStrategy, Strategy};
pub use sdkerr::ServiceResponseError;
pub use transport::{DefaultHttpClient, DialFn};
