//! Storable encoding of photo content.
//!
//! A photo handed to the capture path is raw bytes plus a mime type. The queue
//! stores it as a self-contained `data:<mime>;base64,<data>` URL so the record
//! can be replayed after a restart without any external file.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("photo payload is not a data URL")]
    NotDataUrl,
    #[error("photo payload has no mime type")]
    MissingMime,
    #[error("photo payload is not base64 encoded")]
    NotBase64,
    #[error("photo payload could not be decoded: {0}")]
    Decode(#[from] base64::DecodeError),
}

/// A decoded photo ready for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPhoto {
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Encode photo bytes as a base64 data URL.
pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Decode a base64 data URL back into its mime type and bytes.
pub fn decode_data_url(data_url: &str) -> Result<DecodedPhoto, PayloadError> {
    let rest = data_url.strip_prefix("data:").ok_or(PayloadError::NotDataUrl)?;
    let (header, data) = rest.split_once(',').ok_or(PayloadError::NotDataUrl)?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or(PayloadError::NotBase64)?;
    if mime.is_empty() {
        return Err(PayloadError::MissingMime);
    }

    Ok(DecodedPhoto {
        mime: mime.to_string(),
        bytes: STANDARD.decode(data.trim())?,
    })
}

/// Guess an image mime type from a file extension.
pub fn mime_for_extension(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_produces_data_url() {
        let url = encode_data_url("image/png", &[0x89, 0x50, 0x4E, 0x47]);
        assert_eq!(url, "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn test_decode_restores_bytes_and_mime() {
        let photo = decode_data_url("data:image/jpeg;base64,/9j/4A==").unwrap();
        assert_eq!(photo.mime, "image/jpeg");
        assert_eq!(photo.bytes, vec![0xFF, 0xD8, 0xFF, 0xE0]);
    }

    #[test]
    fn test_decode_rejects_malformed_urls() {
        assert!(matches!(
            decode_data_url("image/jpeg;base64,AAAA"),
            Err(PayloadError::NotDataUrl)
        ));
        assert!(matches!(
            decode_data_url("data:image/jpeg;base64"),
            Err(PayloadError::NotDataUrl)
        ));
        assert!(matches!(
            decode_data_url("data:image/jpeg,AAAA"),
            Err(PayloadError::NotBase64)
        ));
        assert!(matches!(
            decode_data_url("data:;base64,AAAA"),
            Err(PayloadError::MissingMime)
        ));
        assert!(matches!(
            decode_data_url("data:image/jpeg;base64,@@@"),
            Err(PayloadError::Decode(_))
        ));
    }

    #[test]
    fn test_mime_for_extension() {
        assert_eq!(mime_for_extension("JPG"), "image/jpeg");
        assert_eq!(mime_for_extension("png"), "image/png");
        assert_eq!(mime_for_extension("tiff"), "application/octet-stream");
    }
}
