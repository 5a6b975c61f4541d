use base64::{engine::general_purpose, Engine as _};
use image::ImageFormat;

use crate::error::DiagnosisError;

const FALLBACK_MIME: &str = "application/octet-stream";

/// The image currently staged for analysis.
#[derive(Debug, Clone)]
pub struct StagedImage {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    encoded: String,
}

impl StagedImage {
    pub fn encoded_payload(&self) -> &str {
        &self.encoded
    }

    pub fn preview_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.encoded)
    }
}

/// Stages an uploaded file. No format or size validation happens here: the
/// MIME type is forwarded as-is and only sniffed when the upload lacks one.
pub fn select_file(
    file_name: Option<&str>,
    content_type: Option<&str>,
    bytes: Vec<u8>,
) -> Result<StagedImage, DiagnosisError> {
    if bytes.is_empty() {
        return Err(DiagnosisError::Encoding("the file is empty".to_string()));
    }

    let mime_type = match content_type.map(str::trim) {
        Some(ct) if !ct.is_empty() && ct != FALLBACK_MIME => ct.to_string(),
        _ => sniff_mime(&bytes).to_string(),
    };

    let encoded = general_purpose::STANDARD.encode(&bytes);

    Ok(StagedImage {
        file_name: file_name.unwrap_or("upload").to_string(),
        mime_type,
        bytes,
        encoded,
    })
}

fn sniff_mime(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Png) => "image/png",
        Ok(ImageFormat::Jpeg) => "image/jpeg",
        Ok(ImageFormat::Gif) => "image/gif",
        Ok(ImageFormat::WebP) => "image/webp",
        Ok(ImageFormat::Bmp) => "image/bmp",
        Ok(ImageFormat::Tiff) => "image/tiff",
        _ => FALLBACK_MIME,
    }
}
