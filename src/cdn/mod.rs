//! CDN upload collaborator and image-resolution rules.
//!
//! Images are pushed to Cloudinary's upload endpoint and referenced by the
//! returned `secure_url`; nothing is stored on local disk.

use bytes::Bytes;
use thiserror::Error;

/// Maximum accepted upload size.
pub const MAX_IMAGE_SIZE: usize = 5 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("CDN is not configured (set CLOUDINARY_CLOUD_NAME and CLOUDINARY_UPLOAD_PRESET)")]
    NotConfigured,
    #[error("File too large. Maximum size is 5MB.")]
    TooLarge,
    #[error("Empty file")]
    Empty,
    #[error("File content does not match an allowed image type")]
    UnsupportedType,
    #[error("An image is required")]
    MissingImage,
    #[error("CDN request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("CDN response did not contain a secure_url")]
    MalformedResponse,
}

impl UploadError {
    /// Client-caused errors map to 400; everything else is a server-side 500.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            UploadError::TooLarge
                | UploadError::Empty
                | UploadError::UnsupportedType
                | UploadError::MissingImage
        )
    }
}

#[derive(Debug, Clone)]
pub struct CdnConfig {
    pub cloud_name: String,
    pub upload_preset: String,
}

impl CdnConfig {
    pub fn from_env() -> Option<Self> {
        fn get_env(key: &str) -> Option<String> {
            std::env::var(key).ok().filter(|s| !s.is_empty())
        }
        Some(Self {
            cloud_name: get_env("CLOUDINARY_CLOUD_NAME")?,
            upload_preset: get_env("CLOUDINARY_UPLOAD_PRESET")?,
        })
    }
}

fn image_mime_from_magic_bytes(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() < 4 {
        return None;
    }
    match bytes {
        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        // PNG: 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        // GIF: 47 49 46 38
        [0x47, 0x49, 0x46, 0x38, ..] => Some("image/gif"),
        // WebP: 52 49 46 46 ... 57 45 42 50
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some("image/webp"),
        _ => None,
    }
}

/// Reject oversized, empty, or non-image payloads before they reach the CDN.
pub fn validate_image(bytes: &[u8]) -> Result<&'static str, UploadError> {
    if bytes.is_empty() {
        return Err(UploadError::Empty);
    }
    if bytes.len() > MAX_IMAGE_SIZE {
        return Err(UploadError::TooLarge);
    }
    image_mime_from_magic_bytes(bytes).ok_or(UploadError::UnsupportedType)
}

/// Upload a validated image buffer, returning its public URL. `path_hint`
/// becomes the CDN folder (e.g. "blog", "portfolio").
pub async fn upload_image(bytes: &[u8], path_hint: &str) -> Result<String, UploadError> {
    let mime = validate_image(bytes)?;
    let config = CdnConfig::from_env().ok_or(UploadError::NotConfigured)?;

    let url = format!(
        "https://api.cloudinary.com/v1_1/{}/image/upload",
        config.cloud_name
    );

    let part = reqwest::multipart::Part::bytes(bytes.to_vec())
        .file_name("upload")
        .mime_str(mime)?;
    let form = reqwest::multipart::Form::new()
        .text("upload_preset", config.upload_preset)
        .text("folder", path_hint.to_string())
        .part("file", part);

    let response = reqwest::Client::new()
        .post(&url)
        .multipart(form)
        .send()
        .await?
        .error_for_status()?;

    let body: serde_json::Value = response.json().await?;
    let secure_url = body
        .get("secure_url")
        .and_then(|v| v.as_str())
        .ok_or(UploadError::MalformedResponse)?;

    tracing::info!(folder = path_hint, url = secure_url, "image uploaded to CDN");
    Ok(secure_url.to_string())
}

/// Resolve the image URL to persist: a freshly uploaded file wins, then the
/// explicitly passed existing URL. With neither, `required` decides between
/// an error (create) and `None` (update keeps the stored value).
pub async fn resolve_image(
    new_file: Option<Bytes>,
    existing_url: Option<String>,
    path_hint: &str,
    required: bool,
) -> Result<Option<String>, UploadError> {
    if let Some(bytes) = new_file {
        return Ok(Some(upload_image(&bytes, path_hint).await?));
    }
    if let Some(url) = existing_url.filter(|u| !u.trim().is_empty()) {
        return Ok(Some(url));
    }
    if required {
        Err(UploadError::MissingImage)
    } else {
        Ok(None)
    }
}

/// Reconcile a gallery: the existing URLs the client chose to keep, in order,
/// followed by the URLs of newly uploaded files. The client is the source of
/// truth for what to keep; there is no diff against the stored state.
pub async fn resolve_gallery(
    existing: Vec<String>,
    new_files: Vec<Bytes>,
    path_hint: &str,
) -> Result<Vec<String>, UploadError> {
    let mut urls = existing;
    for bytes in new_files {
        urls.push(upload_image(&bytes, path_hint).await?);
    }
    Ok(urls)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_magic_byte_detection() {
        assert_eq!(validate_image(PNG_HEADER).unwrap(), "image/png");
        assert_eq!(
            validate_image(&[0xFF, 0xD8, 0xFF, 0xE0]).unwrap(),
            "image/jpeg"
        );
        assert!(matches!(
            validate_image(b"not an image"),
            Err(UploadError::UnsupportedType)
        ));
        assert!(matches!(validate_image(&[]), Err(UploadError::Empty)));
    }

    #[test]
    fn test_oversized_image_rejected() {
        let mut big = vec![0u8; MAX_IMAGE_SIZE + 1];
        big[..4].copy_from_slice(&PNG_HEADER[..4]);
        assert!(matches!(
            validate_image(&big),
            Err(UploadError::TooLarge)
        ));
    }

    #[tokio::test]
    async fn test_resolve_image_prefers_existing_url_without_file() {
        let url = resolve_image(None, Some("https://cdn.example.com/a.jpg".into()), "blog", true)
            .await
            .unwrap();
        assert_eq!(url.as_deref(), Some("https://cdn.example.com/a.jpg"));
    }

    #[tokio::test]
    async fn test_resolve_image_blank_existing_url_is_ignored() {
        let result = resolve_image(None, Some("   ".into()), "blog", true).await;
        assert!(matches!(result, Err(UploadError::MissingImage)));
    }

    #[tokio::test]
    async fn test_resolve_image_optional_on_update() {
        let url = resolve_image(None, None, "blog", false).await.unwrap();
        assert!(url.is_none());
    }

    #[tokio::test]
    async fn test_resolve_gallery_keeps_existing_order() {
        let gallery = resolve_gallery(
            vec!["https://cdn/1.jpg".into(), "https://cdn/2.jpg".into()],
            vec![],
            "portfolio",
        )
        .await
        .unwrap();
        assert_eq!(gallery, vec!["https://cdn/1.jpg", "https://cdn/2.jpg"]);
    }
}
