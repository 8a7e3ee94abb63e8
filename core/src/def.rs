//! Declarative operation descriptors.
//!
//! # Design
//! An [`HttpRequestDef`] is the schema of one API operation: method, path
//! template, content type, and where each request and response field lives on
//! the wire. It is built once (typically in a `static` or `LazyLock`) and
//! shared by every call of that operation; nothing mutates it afterwards.

use crate::http::HttpMethod;

/// Where a field travels on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocationType {
    Header,
    Path,
    Query,
    Body,
    Form,
    Cname,
}

impl LocationType {
    /// Bit of this location, for callers that track location sets.
    pub const fn bits(self) -> u8 {
        match self {
            LocationType::Header => 1,
            LocationType::Path => 1 << 1,
            LocationType::Query => 1 << 2,
            LocationType::Body => 1 << 3,
            LocationType::Form => 1 << 4,
            LocationType::Cname => 1 << 5,
        }
    }

    pub const fn is_in(self, mask: u8) -> bool {
        mask & self.bits() != 0
    }
}

/// Wire kind of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FieldKind {
    #[default]
    String,
    Integer,
    Float,
    Boolean,
    /// Structured value; JSON-encoded when it has to become a string.
    Object,
    /// Request body expanded into multipart form parts.
    Multipart,
    /// Response body handed over as an unread stream.
    Stream,
}

/// Mapping of one struct field to its wire location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    location: LocationType,
    name: String,
    wire_name: String,
    kind: FieldKind,
    mandatory: bool,
}

impl FieldDef {
    /// A field whose serialized name is also its wire name.
    pub fn new(location: LocationType, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            location,
            wire_name: name.clone(),
            name,
            kind: FieldKind::default(),
            mandatory: false,
        }
    }

    pub fn with_wire_name(mut self, wire_name: impl Into<String>) -> Self {
        self.wire_name = wire_name.into();
        self
    }

    pub fn with_kind(mut self, kind: FieldKind) -> Self {
        self.kind = kind;
        self
    }

    /// Fail request construction when this field is unset.
    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn location(&self) -> LocationType {
        self.location
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn wire_name(&self) -> &str {
        &self.wire_name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }
}

/// Descriptor of one API operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequestDef {
    method: HttpMethod,
    path: String,
    content_type: String,
    request_fields: Vec<FieldDef>,
    response_fields: Vec<FieldDef>,
}

impl HttpRequestDef {
    pub fn builder() -> HttpRequestDefBuilder {
        HttpRequestDefBuilder::default()
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn request_fields(&self) -> &[FieldDef] {
        &self.request_fields
    }

    pub fn response_fields(&self) -> &[FieldDef] {
        &self.response_fields
    }

    /// The response field carrying the body, if the operation declares one.
    pub fn response_body_field(&self) -> Option<&FieldDef> {
        self.response_fields
            .iter()
            .find(|field| field.location == LocationType::Body)
    }
}

#[derive(Debug, Clone)]
pub struct HttpRequestDefBuilder {
    method: HttpMethod,
    path: String,
    content_type: String,
    request_fields: Vec<FieldDef>,
    response_fields: Vec<FieldDef>,
}

impl Default for HttpRequestDefBuilder {
    fn default() -> Self {
        Self {
            method: HttpMethod::Get,
            path: String::new(),
            content_type: String::new(),
            request_fields: Vec::new(),
            response_fields: Vec::new(),
        }
    }
}

impl HttpRequestDefBuilder {
    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Path template; `{name}` tokens are filled from `Path` fields.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_request_field(mut self, field: FieldDef) -> Self {
        self.request_fields.push(field);
        self
    }

    pub fn with_response_field(mut self, field: FieldDef) -> Self {
        self.response_fields.push(field);
        self
    }

    pub fn build(self) -> HttpRequestDef {
        HttpRequestDef {
            method: self.method,
            path: self.path,
            content_type: self.content_type,
            request_fields: self.request_fields,
            response_fields: self.response_fields,
        }
    }
}
