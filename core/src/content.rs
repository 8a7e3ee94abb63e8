//! Body codecs keyed by content type.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::SdkError;

pub const APPLICATION_JSON: &str = "application/json";
pub const APPLICATION_XML: &str = "application/xml";
pub const APPLICATION_BSON: &str = "application/bson";

/// The closed set of body encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentType {
    #[default]
    Json,
    Xml,
    Bson,
}

impl ContentType {
    /// Pick a codec from a `Content-Type` header value. Anything that is not
    /// XML or BSON is treated as JSON.
    pub fn from_header(value: &str) -> Self {
        let value = value.to_ascii_lowercase();
        if value.contains("xml") {
            ContentType::Xml
        } else if value.contains("bson") {
            ContentType::Bson
        } else {
            ContentType::Json
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            ContentType::Json => APPLICATION_JSON,
            ContentType::Xml => APPLICATION_XML,
            ContentType::Bson => APPLICATION_BSON,
        }
    }

    /// Encode a body value. `root` names the XML root element.
    pub fn encode(self, value: &Value, root: &str) -> Result<Vec<u8>, SdkError> {
        match self {
            ContentType::Json => {
                serde_json::to_vec(value).map_err(|e| SdkError::Encode(e.to_string()))
            }
            ContentType::Xml => quick_xml::se::to_string_with_root(root, value)
                .map(String::into_bytes)
                .map_err(|e| SdkError::Encode(e.to_string())),
            ContentType::Bson => bson::to_vec(value).map_err(|e| SdkError::Encode(e.to_string())),
        }
    }

    /// Decode a body into `T`. Errors are returned as text so the caller can
    /// wrap them with the response's status and request id.
    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> Result<T, String> {
        match self {
            ContentType::Json => serde_json::from_slice(bytes).map_err(|e| e.to_string()),
            ContentType::Xml => quick_xml::de::from_reader(bytes).map_err(|e| e.to_string()),
            ContentType::Bson => bson::from_slice(bytes).map_err(|e| e.to_string()),
        }
    }
}
