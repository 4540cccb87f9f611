//! Submitted document and extraction options

use serde::{Deserialize, Serialize};

/// An already-decoded uploaded document
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub filename: String,
    pub data: Vec<u8>,
}

impl UploadedDocument {
    pub fn new(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            data,
        }
    }

    /// MIME type guessed from the file extension
    pub fn content_type(&self) -> String {
        mime_guess::from_path(&self.filename)
            .first_or_octet_stream()
            .to_string()
    }
}

/// Options forwarded to the structured extraction sub-job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionOptions {
    /// JSON schema overriding the extraction agent's schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_schema: Option<serde_json::Value>,
    /// Upstream extraction mode (e.g. `FAST`, `ACCURATE`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_mode: Option<String>,
}

impl ExtractionOptions {
    pub fn is_empty(&self) -> bool {
        self.data_schema.is_none() && self.extraction_mode.is_none()
    }

    /// JSON form persisted on the job record, `None` when no option is set
    pub fn to_record_value(&self) -> Option<serde_json::Value> {
        if self.is_empty() {
            None
        } else {
            serde_json::to_value(self).ok()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_from_extension() {
        let doc = UploadedDocument::new("report.pdf", vec![1, 2, 3]);
        assert_eq!(doc.content_type(), "application/pdf");

        let doc = UploadedDocument::new("blob", vec![1]);
        assert_eq!(doc.content_type(), "application/octet-stream");
    }

    #[test]
    fn test_empty_options_are_not_persisted() {
        assert_eq!(ExtractionOptions::default().to_record_value(), None);

        let options = ExtractionOptions {
            extraction_mode: Some("FAST".to_string()),
            ..Default::default()
        };
        assert_eq!(
            options.to_record_value(),
            Some(serde_json::json!({"extraction_mode": "FAST"}))
        );
    }
}
