use crate::error::{ParleyError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageFormat;
use std::path::Path;

/// Largest image accepted for upload (5 MiB)
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

const ACCEPTED_FORMATS: &[ImageFormat] = &[
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Gif,
    ImageFormat::WebP,
];

/// An image attached to a user turn
///
/// The format is detected from the bytes, not the file name.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAttachment {
    /// File name sent with the upload
    pub file_name: String,
    /// MIME type of the detected format
    pub mime_type: String,
    /// Raw image bytes
    pub bytes: Vec<u8>,
}

impl ImageAttachment {
    /// Validate raw bytes and wrap them as an attachment
    ///
    /// # Errors
    ///
    /// Returns `ParleyError::Validation` when the data is empty, larger than
    /// [`MAX_IMAGE_BYTES`], or not a JPEG, PNG, GIF, or WebP image.
    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(ParleyError::Validation("Image is required".to_string()).into());
        }

        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(ParleyError::Validation(format!(
                "Image too large: {} bytes (limit {} bytes)",
                bytes.len(),
                MAX_IMAGE_BYTES
            ))
            .into());
        }

        let format = image::guess_format(&bytes)
            .ok()
            .filter(|f| ACCEPTED_FORMATS.contains(f))
            .ok_or_else(|| {
                ParleyError::Validation(
                    "Invalid image type: expected JPEG, PNG, GIF, or WebP".to_string(),
                )
            })?;

        Ok(Self {
            file_name: file_name.into(),
            mime_type: format.to_mime_type().to_string(),
            bytes,
        })
    }

    /// Read and validate an image file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "image".to_string());
        Self::from_bytes(file_name, bytes)
    }

    /// Inline `data:` URL form of the image
    ///
    /// # Examples
    ///
    /// ```
    /// use parley::assistant::ImageAttachment;
    ///
    /// let png = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR".to_vec();
    /// let image = ImageAttachment::from_bytes("dot.png", png).unwrap();
    /// assert!(image.data_url().starts_with("data:image/png;base64,"));
    /// ```
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64())
    }

    /// Base64 encoding of the raw bytes
    pub fn base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}
