//! multipart/form-data encoding for upload operations.
//!
//! # Design
//! A [`FormData`] is an ordered map of named [`FormPart`]s. Encoding writes
//! every value part first, in map order, then every file part, so the wire
//! layout is deterministic for a given form.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use rand::Rng;

const DEFAULT_FILE_CONTENT_TYPE: &str = "application/octet-stream";
const CRLF: &[u8] = b"\r\n";

pub type FormData = BTreeMap<String, FormPart>;

/// One part of a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormPart {
    File(FilePart),
    Value(String),
}

impl FormPart {
    pub fn value(value: impl Into<String>) -> Self {
        FormPart::Value(value.into())
    }

    pub fn is_file(&self) -> bool {
        matches!(self, FormPart::File(_))
    }

    /// Append this part to `writer` under the form field `name`.
    pub fn write(&self, writer: &mut MultipartWriter, name: &str) {
        match self {
            FormPart::File(file) => file.write(writer, name),
            FormPart::Value(value) => {
                writer.begin_part(&[(
                    "Content-Disposition",
                    format!("form-data; name=\"{}\"", escape_quotes(name)),
                )]);
                writer.write_content(value.as_bytes());
            }
        }
    }
}

impl From<FilePart> for FormPart {
    fn from(file: FilePart) -> Self {
        FormPart::File(file)
    }
}

/// A file upload part.
#[derive(Clone, PartialEq, Eq)]
pub struct FilePart {
    file_name: String,
    content_type: String,
    headers: Vec<(String, String)>,
    content: Vec<u8>,
}

impl FilePart {
    pub fn new(file_name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: DEFAULT_FILE_CONTENT_TYPE.to_string(),
            headers: Vec::new(),
            content: content.into(),
        }
    }

    /// Read a file from disk, naming the part after the file.
    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(file_name, content))
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Extra MIME header for this part.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    fn write(&self, writer: &mut MultipartWriter, name: &str) {
        let mut headers = vec![
            (
                "Content-Disposition",
                format!(
                    "form-data; name=\"{}\"; filename=\"{}\"",
                    escape_quotes(name),
                    escape_quotes(&self.file_name)
                ),
            ),
            ("Content-Type", self.content_type.clone()),
        ];
        for (header, value) in &self.headers {
            headers.push((header.as_str(), value.clone()));
        }
        writer.begin_part(&headers);
        writer.write_content(&self.content);
    }
}

impl fmt::Debug for FilePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilePart")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("headers", &self.headers)
            .field("content_len", &self.content.len())
            .finish()
    }
}

/// Accumulates an encoded multipart body.
pub struct MultipartWriter {
    boundary: String,
    buffer: Vec<u8>,
    parts: usize,
}

impl Default for MultipartWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartWriter {
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();
        let boundary: String = (0..30).map(|_| format!("{:02x}", rng.gen::<u8>())).collect();
        Self::with_boundary(boundary)
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            buffer: Vec::new(),
            parts: 0,
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the request `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    fn begin_part<V: AsRef<str>>(&mut self, headers: &[(&str, V)]) {
        if self.parts > 0 {
            self.buffer.extend_from_slice(CRLF);
        }
        self.parts += 1;
        self.buffer.extend_from_slice(b"--");
        self.buffer.extend_from_slice(self.boundary.as_bytes());
        self.buffer.extend_from_slice(CRLF);
        for (name, value) in headers {
            self.buffer.extend_from_slice(name.as_bytes());
            self.buffer.extend_from_slice(b": ");
            self.buffer.extend_from_slice(value.as_ref().as_bytes());
            self.buffer.extend_from_slice(CRLF);
        }
        self.buffer.extend_from_slice(CRLF);
    }

    fn write_content(&mut self, content: &[u8]) {
        self.buffer.extend_from_slice(content);
    }

    /// Close the form and return the encoded body.
    pub fn finish(mut self) -> Vec<u8> {
        if self.parts > 0 {
            self.buffer.extend_from_slice(CRLF);
        }
        self.buffer.extend_from_slice(b"--");
        self.buffer.extend_from_slice(self.boundary.as_bytes());
        self.buffer.extend_from_slice(b"--");
        self.buffer.extend_from_slice(CRLF);
        self.buffer
    }
}

/// Encode a form: value parts first, then file parts.
pub fn encode_form(form: &FormData, writer: &mut MultipartWriter) {
    let (files, values): (Vec<_>, Vec<_>) = form.iter().partition(|(_, part)| part.is_file());
    for (name, part) in values.into_iter().chain(files) {
        part.write(writer, name);
    }
}

fn escape_quotes(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn encode(form: &FormData) -> String {
        let mut writer = MultipartWriter::with_boundary("XyZ");
        encode_form(form, &mut writer);
        String::from_utf8(writer.finish()).unwrap()
    }

    #[test]
    fn value_parts_precede_file_parts() {
        let mut form = FormData::new();
        form.insert("a_file".into(), FilePart::new("data.bin", b"\x00\x01".to_vec()).into());
        form.insert("z_name".into(), FormPart::value("cluster-a"));

        let body = encode(&form);
        let value_at = body.find("name=\"z_name\"").unwrap();
        let file_at = body.find("name=\"a_file\"").unwrap();
        assert!(value_at < file_at);
        assert_eq!(body.matches("--XyZ\r\n").count(), 2);
        assert!(body.ends_with("\r\n--XyZ--\r\n"));
    }

    #[test]
    fn file_part_carries_mime_headers() {
        let mut form = FormData::new();
        form.insert(
            "file".into(),
            FilePart::new("cert.pem", "PEM")
                .with_content_type("application/x-pem-file")
                .with_header("Content-Language", "en")
                .into(),
        );
        let body = encode(&form);
        assert!(body.contains(
            "Content-Disposition: form-data; name=\"file\"; filename=\"cert.pem\"\r\n"
        ));
        assert!(body.contains("Content-Type: application/x-pem-file\r\n"));
        assert!(body.contains("Content-Language: en\r\n\r\nPEM\r\n--XyZ--"));
    }

    #[test]
    fn empty_form_is_only_the_closing_boundary() {
        assert_eq!(encode(&FormData::new()), "--XyZ--\r\n");
    }

    #[test]
    fn random_boundary_in_content_type() {
        let writer = MultipartWriter::new();
        assert_eq!(writer.boundary().len(), 60);
        assert_eq!(
            writer.content_type(),
            format!("multipart/form-data; boundary={}", writer.boundary())
        );
    }

    #[test]
    fn file_part_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello").unwrap();
        let part = FilePart::from_path(file.path()).unwrap();
        assert_eq!(part.content(), b"hello");
        assert_eq!(part.content_type(), "application/octet-stream");
        assert!(!part.file_name().is_empty());
    }
}
