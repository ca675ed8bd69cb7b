use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ClipError {
    #[error("stored clip is not a data URI")]
    NotDataUri,
    #[error("stored clip is not base64 encoded")]
    NotBase64,
    #[error("stored clip payload is invalid: {0}")]
    Payload(String),
}

/// A complete recorded clip: every fragment of one session, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Clip {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl Clip {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Concatenates fragments in the order given.
    pub fn from_fragments(mime_type: impl Into<String>, fragments: &[Vec<u8>]) -> Self {
        Self::new(mime_type, fragments.concat())
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Self-describing text form: `data:<mime>;base64,<payload>`.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, BASE64.encode(&self.bytes))
    }

    pub fn from_data_uri(uri: &str) -> Result<Self, ClipError> {
        let rest = uri.strip_prefix("data:").ok_or(ClipError::NotDataUri)?;
        let (header, payload) = rest.split_once(',').ok_or(ClipError::NotDataUri)?;
        let mime_type = header.strip_suffix(";base64").ok_or(ClipError::NotBase64)?;
        let bytes = BASE64
            .decode(payload)
            .map_err(|e| ClipError::Payload(e.to_string()))?;
        Ok(Self::new(mime_type, bytes))
    }

    /// File extension conventionally used for this clip's container.
    pub fn extension(&self) -> &'static str {
        match self.mime_type.split(';').next().unwrap_or_default() {
            "video/mp4" => "mp4",
            "video/webm" => "webm",
            "video/x-matroska" => "mkv",
            "video/quicktime" => "mov",
            _ => "bin",
        }
    }
}
