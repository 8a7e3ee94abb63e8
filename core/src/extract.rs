//! Mapping a typed request value onto its operation descriptor.
//!
//! # Design
//! A request type is any `Serialize` struct. It is serialized once per
//! attempt into a JSON object, and each [`FieldDef`] of the operation picks
//! its value out by name. Serde already flattens enum-like wrapper types to
//! their scalar form and lets `Option` fields vanish, which is all the
//! descriptor needs. Upload parts that are not plain data (file contents)
//! come from the [`SdkRequest`] hooks instead.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::def::{FieldDef, FieldKind, HttpRequestDef, LocationType};
use crate::error::{Result, SdkError};
use crate::multipart::{FormData, FormPart};
use crate::request::{scalar_string, HttpRequestBuilder};

/// A request value that can be sent through an [`HttpRequestDef`].
pub trait SdkRequest: Serialize {
    /// Part for a `Form` field that does not serialize, such as a file.
    fn form_part(&self, _field: &str) -> Option<FormPart> {
        None
    }

    /// Parts for a `Multipart` body field. Without this hook the body's
    /// serialized fields become plain value parts.
    fn multipart_body(&self, _field: &str) -> Option<FormData> {
        None
    }
}

impl SdkRequest for Value {}

/// Route every declared request field of `request` into `builder`.
pub fn fill_request_fields<R>(
    mut builder: HttpRequestBuilder,
    request: &R,
    def: &HttpRequestDef,
) -> Result<HttpRequestBuilder>
where
    R: SdkRequest + ?Sized,
{
    let fields = serialized_fields(request)?;
    for field in def.request_fields() {
        builder = fill_field(builder, request, field, fields.get(field.name()))?;
    }
    Ok(builder)
}

fn serialized_fields<R: SdkRequest + ?Sized>(request: &R) -> Result<Map<String, Value>> {
    match serde_json::to_value(request) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(other) => Err(SdkError::InvalidRequest(format!(
            "request must serialize to an object, got `{other}`"
        ))),
        Err(e) => Err(SdkError::InvalidRequest(e.to_string())),
    }
}

fn fill_field<R: SdkRequest + ?Sized>(
    builder: HttpRequestBuilder,
    request: &R,
    field: &FieldDef,
    value: Option<&Value>,
) -> Result<HttpRequestBuilder> {
    match field.location() {
        LocationType::Form => {
            if let Some(part) = request.form_part(field.name()) {
                return Ok(builder.add_form_param(field.wire_name(), part));
            }
        }
        LocationType::Body if field.kind() == FieldKind::Multipart => {
            if let Some(form) = request.multipart_body(field.name()) {
                return Ok(form
                    .into_iter()
                    .fold(builder, |builder, (name, part)| builder.add_form_param(name, part)));
            }
        }
        _ => {}
    }

    let Some(value) = value.filter(|value| !value.is_null()) else {
        if field.is_mandatory() {
            return Err(SdkError::RequiredFieldMissing(field.name().to_string()));
        }
        return Ok(builder);
    };

    let builder = match field.location() {
        LocationType::Header => builder.add_header_param(field.wire_name(), scalar_string(value)),
        LocationType::Path => builder.add_path_param(field.wire_name(), scalar_string(value)),
        LocationType::Query => builder.add_query_param(field.wire_name(), value.clone()),
        LocationType::Body if field.kind() == FieldKind::Multipart => {
            let Value::Object(parts) = value else {
                return Err(SdkError::InvalidRequest(format!(
                    "multipart body `{}` must serialize to an object",
                    field.name()
                )));
            };
            parts
                .iter()
                .filter(|(_, part)| !part.is_null())
                .fold(builder, |builder, (name, part)| {
                    builder.add_form_param(name.as_str(), FormPart::Value(scalar_string(part)))
                })
        }
        LocationType::Body => builder.with_body(field.wire_name(), value.clone()),
        LocationType::Form => {
            builder.add_form_param(field.wire_name(), FormPart::Value(scalar_string(value)))
        }
        LocationType::Cname => builder.with_cname(scalar_string(value)),
    };
    Ok(builder)
}
