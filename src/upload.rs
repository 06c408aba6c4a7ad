//! Uploaded files from `multipart/form-data` bodies.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde_json::{Value, json};

/// One file part of a multipart body.
///
/// Browsers submit an empty part (no filename, no bytes) for a file input the
/// user left blank. [`is_empty`](UploadedFile::is_empty) detects that case.
#[derive(Clone, Debug, PartialEq)]
pub struct UploadedFile {
    filename: String,
    content_type: Option<String>,
    data: Bytes,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, content_type: Option<String>, data: impl Into<Bytes>) -> Self {
        Self { filename: filename.into(), content_type, data: data.into() }
    }

    pub fn filename(&self) -> &str { &self.filename }
    pub fn content_type(&self) -> Option<&str> { self.content_type.as_deref() }
    pub fn data(&self) -> &Bytes { &self.data }
    pub fn size(&self) -> usize { self.data.len() }

    /// Extension of the client-supplied filename, without the dot.
    pub fn extension(&self) -> Option<&str> {
        self.filename.rsplit_once('.').map(|(_, ext)| ext).filter(|ext| !ext.is_empty())
    }

    /// `true` for the placeholder part of an unused file input.
    pub fn is_empty(&self) -> bool {
        self.filename.is_empty() && self.data.is_empty()
    }

    /// The description validators see in place of the file's bytes.
    pub fn describe(&self) -> Value {
        json!({
            "filename": self.filename,
            "content_type": self.content_type,
            "size": self.size(),
        })
    }
}

/// Field name → uploaded file.
pub type Files = BTreeMap<String, UploadedFile>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_file_input_is_empty() {
        assert!(UploadedFile::new("", None, Bytes::new()).is_empty());
        assert!(!UploadedFile::new("a.png", None, Bytes::new()).is_empty());
    }

    #[test]
    fn extension_and_description() {
        let file = UploadedFile::new("avatar.PNG", Some("image/png".into()), vec![1u8, 2, 3]);
        assert_eq!(file.extension(), Some("PNG"));
        assert_eq!(file.describe()["size"], json!(3));
        assert_eq!(UploadedFile::new("README", None, Bytes::new()).extension(), None);
    }
}
