//! Decoding responses into typed values.
//!
//! Header fields are converted according to their [`FieldKind`] and placed
//! under their field name next to the decoded body, and the combined JSON
//! object is deserialized into the response type. XML bodies without a
//! `Body` field decode straight into the response type, which then receives
//! the header fields through [`SdkResponse::set_header_field`].

use serde_json::{Map, Value};

use crate::content::ContentType;
use crate::def::{FieldKind, HttpRequestDef, LocationType};
use crate::error::{Result, SdkError};
use crate::http::{HttpResponse, ResponseStream};
use crate::sdkerr::ServiceResponseError;

/// A response type an operation decodes into.
pub trait SdkResponse: serde::de::DeserializeOwned {
    /// Receives the HTTP status after every successful decode.
    fn set_status_code(&mut self, _status: u16) {}

    /// Receives the unread body for a `Stream` body field.
    fn attach_stream(&mut self, _field: &str, _body: ResponseStream) {}

    /// Receives each declared header field of a whole-body XML response,
    /// already converted to its field kind.
    fn set_header_field(&mut self, _name: &str, _value: Value) {}
}

impl SdkResponse for Value {
    fn set_header_field(&mut self, name: &str, value: Value) {
        if let Value::Object(map) = self {
            map.insert(name.to_string(), value);
        }
    }
}

/// Turn a response into `T`, or into the normalized service error.
pub fn decode_response<T: SdkResponse>(mut response: HttpResponse, def: &HttpRequestDef) -> Result<T> {
    if !response.is_success() {
        response.buffer()?;
        return Err(ServiceResponseError::from_response(&response).into());
    }

    let status = response.status;
    let request_id = response.request_id().unwrap_or_default().to_string();
    let decode_failure = |message: String| -> SdkError {
        ServiceResponseError::decode_failure(status, &request_id, message).into()
    };

    let mut fields = Map::new();
    for field in def
        .response_fields()
        .iter()
        .filter(|field| field.location() == LocationType::Header)
    {
        if let Some(raw) = response.header(field.wire_name()) {
            let value = header_value(raw, field.kind()).map_err(&decode_failure)?;
            fields.insert(field.name().to_string(), value);
        }
    }

    let body_field = def.response_body_field();
    let mut decoded: T = match body_field {
        Some(field) if field.kind() == FieldKind::Stream => {
            let mut decoded: T = from_fields(fields).map_err(&decode_failure)?;
            decoded.attach_stream(field.name(), response.into_stream());
            decoded
        }
        Some(field) => {
            let negotiated = response
                .content_type()
                .map(ContentType::from_header)
                .filter(|content_type| *content_type == ContentType::Bson)
                .unwrap_or(ContentType::Json);
            let body = response.buffer()?;
            if !body.is_empty() {
                let value: Value = negotiated.decode(body).map_err(&decode_failure)?;
                fields.insert(field.name().to_string(), value);
            }
            from_fields(fields).map_err(&decode_failure)?
        }
        None => {
            let content_type = response
                .content_type()
                .map(ContentType::from_header)
                .unwrap_or_default();
            let body = response.buffer()?;
            if body.is_empty() {
                from_fields(fields).map_err(&decode_failure)?
            } else if content_type == ContentType::Xml {
                let mut decoded: T = content_type.decode(body).map_err(&decode_failure)?;
                for (name, value) in fields {
                    decoded.set_header_field(&name, value);
                }
                decoded
            } else {
                let value: Value = content_type.decode(body).map_err(&decode_failure)?;
                merge_body(fields, value).map_err(&decode_failure)?
            }
        }
    };
    decoded.set_status_code(status);
    Ok(decoded)
}

fn from_fields<T: SdkResponse>(fields: Map<String, Value>) -> std::result::Result<T, String> {
    serde_json::from_value(Value::Object(fields)).map_err(|e| e.to_string())
}

/// Lay a whole-response body over the header fields. Non-object bodies
/// (e.g. a bare list) decode on their own.
fn merge_body<T: SdkResponse>(
    mut fields: Map<String, Value>,
    body: Value,
) -> std::result::Result<T, String> {
    match body {
        Value::Object(body) => {
            fields.extend(body);
            from_fields(fields)
        }
        other => serde_json::from_value(other).map_err(|e| e.to_string()),
    }
}

/// Convert a header string to the JSON value its field kind expects.
fn header_value(raw: &str, kind: FieldKind) -> std::result::Result<Value, String> {
    let raw = raw.trim();
    let invalid = |expected: &str| format!("header value `{raw}` is not a valid {expected}");
    match kind {
        FieldKind::Integer => raw
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| invalid("integer")),
        FieldKind::Float => raw
            .parse::<f64>()
            .map(Value::from)
            .map_err(|_| invalid("float")),
        FieldKind::Boolean => {
            if raw.eq_ignore_ascii_case("true") {
                Ok(Value::Bool(true))
            } else if raw.eq_ignore_ascii_case("false") {
                Ok(Value::Bool(false))
            } else {
                Err(invalid("boolean"))
            }
        }
        FieldKind::Object => {
            Ok(serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())))
        }
        FieldKind::String | FieldKind::Multipart | FieldKind::Stream => {
            Ok(Value::String(raw.to_string()))
        }
    }
}
