//! Normalization of vendor error bodies.
//!
//! Services answer failures with several incompatible JSON envelopes:
//! `{"error_code": .., "error_msg": ..}`, `{"code": .., "message": ..}`, and
//! either of those nested under another key such as `{"error": {..}}`. All of
//! them are folded into one [`ServiceResponseError`].

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::http::HttpResponse;

/// Key pairs recognised as (code, message), in priority order.
const ERROR_SHAPES: &[(&str, &str)] = &[("error_code", "error_msg"), ("code", "message")];

const ENCODED_AUTHORIZATION_MESSAGE: &str = "encoded_authorization_message";
const REQUEST_ID: &str = "request_id";

/// A failed service response in normalized form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServiceResponseError {
    pub status_code: u16,
    pub request_id: String,
    pub error_code: String,
    pub error_message: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub encoded_authorization_message: String,
}

impl ServiceResponseError {
    /// Normalize a non-2xx response. The body must already be buffered; it is
    /// only borrowed, so the caller can still inspect it afterwards.
    pub fn from_response(response: &HttpResponse) -> Self {
        let body = response.buffered_body().unwrap_or_default();
        Self::from_parts(response.status, response.request_id().unwrap_or_default(), body)
    }

    /// Normalize a status code, request id and raw body.
    pub fn from_parts(status_code: u16, request_id: &str, body: &[u8]) -> Self {
        let mut err = ServiceResponseError {
            status_code,
            request_id: request_id.to_string(),
            ..Default::default()
        };

        let object = match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(object)) => object,
            _ => {
                err.error_message = String::from_utf8_lossy(body).into_owned();
                return err;
            }
        };

        match find_error_pair(&object) {
            Some((code, message)) => {
                err.error_code = code;
                err.error_message = message;
            }
            None => err.error_message = String::from_utf8_lossy(body).into_owned(),
        }
        if let Some(value) = object.get(ENCODED_AUTHORIZATION_MESSAGE) {
            err.encoded_authorization_message = scalar_text(value);
        }
        if err.request_id.is_empty() {
            if let Some(value) = object.get(REQUEST_ID) {
                err.request_id = scalar_text(value);
            }
        }
        err
    }

    /// A decode failure on an otherwise received response.
    pub(crate) fn decode_failure(status_code: u16, request_id: &str, message: String) -> Self {
        ServiceResponseError {
            status_code,
            request_id: request_id.to_string(),
            error_message: message,
            ..Default::default()
        }
    }
}

impl fmt::Display for ServiceResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(text) => f.write_str(&text),
            Err(_) => write!(
                f,
                "status_code: {}, request_id: {}, error_code: {}, error_message: {}",
                self.status_code, self.request_id, self.error_code, self.error_message
            ),
        }
    }
}

impl std::error::Error for ServiceResponseError {}

/// Search an error envelope for the first recognised (code, message) pair.
///
/// Every shape is tried at the current level before descending; nested
/// objects are visited in key order, depth-first.
fn find_error_pair(object: &Map<String, Value>) -> Option<(String, String)> {
    for (code_key, message_key) in ERROR_SHAPES {
        if let (Some(code), Some(message)) = (object.get(*code_key), object.get(*message_key)) {
            return Some((scalar_text(code), scalar_text(message)));
        }
    }
    object.values().find_map(|value| match value {
        Value::Object(inner) => find_error_pair(inner),
        _ => None,
    })
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
