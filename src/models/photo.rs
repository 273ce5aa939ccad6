use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{AppError, AppResult};

/// A captioned photo or diagram. The caption is the slot identity used when
/// merging edits; the image travels as base64 so records stay plain JSON.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Photo {
    #[serde(default, alias = "name", deserialize_with = "super::lenient::string")]
    pub caption: String,
    #[serde(default, alias = "data", deserialize_with = "super::lenient::string")]
    pub image_base64: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
}

impl Photo {
    pub fn new(caption: impl Into<String>, image_base64: impl Into<String>) -> Self {
        Self {
            caption: caption.into(),
            image_base64: image_base64.into(),
            mime: None,
        }
    }

    pub fn from_bytes(caption: impl Into<String>, mime: Option<String>, data: &[u8]) -> Self {
        Self {
            caption: caption.into(),
            image_base64: BASE64.encode(data),
            mime,
        }
    }

    pub fn image_bytes(&self) -> AppResult<Vec<u8>> {
        BASE64.decode(self.image_base64.trim()).map_err(|e| {
            AppError::Parse(format!("photo '{}' is not valid base64: {}", self.caption, e))
        })
    }

    /// Hex SHA-256 of the decoded image, with its size in bytes
    pub fn digest(&self) -> AppResult<(String, usize)> {
        let bytes = self.image_bytes()?;
        let hash = Sha256::digest(&bytes);
        let hex = hash.iter().map(|b| format!("{:02x}", b)).collect::<String>();
        Ok((hex, bytes.len()))
    }

    pub fn has_image(&self) -> bool {
        !self.image_base64.trim().is_empty()
    }
}

/// Guess an image mime type from a file extension
pub fn mime_from_extension(ext: &str) -> Option<String> {
    let mime = match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        _ => return None,
    };
    Some(mime.to_string())
}
