use serde::{Deserialize, Serialize};

/// One entry of a multipart form, in submission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FormEntry {
    Text {
        name: String,
        value: String,
    },
    #[serde(rename_all = "camelCase")]
    File {
        name: String,
        file_name: String,
        mime_type: String,
        /// Epoch milliseconds.
        last_modified: i64,
        blob: Vec<u8>,
    },
}

impl FormEntry {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        FormEntry::Text {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn file(
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        last_modified: i64,
        blob: Vec<u8>,
    ) -> Self {
        FormEntry::File {
            name: name.into(),
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            last_modified,
            blob,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FormEntry::Text { name, .. } | FormEntry::File { name, .. } => name,
        }
    }
}

/// Durable, replayable form of a request body.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SerializedBody {
    #[default]
    None,
    Json {
        value: serde_json::Value,
    },
    FormData {
        entries: Vec<FormEntry>,
    },
}

impl SerializedBody {
    pub fn kind(&self) -> &'static str {
        match self {
            SerializedBody::None => "none",
            SerializedBody::Json { .. } => "json",
            SerializedBody::FormData { .. } => "formData",
        }
    }

    pub fn is_form_data(&self) -> bool {
        matches!(self, SerializedBody::FormData { .. })
    }
}
