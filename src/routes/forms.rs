//! Multipart form collection for the content admin endpoints.
//!
//! Admin create/update requests arrive either as JSON or as multipart
//! form-data when files are involved. This collector flattens a multipart
//! body into text fields, an optional primary image file, gallery files, and
//! the existing URLs the client chose to keep.

use axum::extract::Multipart;
use axum::http::{header::CONTENT_TYPE, HeaderMap};
use bytes::Bytes;
use std::collections::HashMap;

/// True when the request body is multipart form-data.
pub fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("multipart/form-data"))
        .unwrap_or(false)
}

#[derive(Debug, Default)]
pub struct CollectedForm {
    pub text: HashMap<String, String>,
    pub image: Option<Bytes>,
    pub gallery_files: Vec<Bytes>,
    pub existing_image: Option<String>,
    pub existing_gallery: Vec<String>,
}

impl CollectedForm {
    /// Drain a multipart stream. `image_field` names the primary file field
    /// ("image" for blog/portfolio, "avatar" for testimonials).
    pub async fn collect(mut multipart: Multipart, image_field: &str) -> Result<Self, String> {
        let mut form = CollectedForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| format!("Invalid multipart data: {}", e))?
        {
            let name = field.name().unwrap_or_default().to_string();

            if name == image_field {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| format!("Failed to read file data: {}", e))?;
                if !bytes.is_empty() {
                    form.image = Some(bytes);
                }
            } else if name == "gallery" {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| format!("Failed to read file data: {}", e))?;
                if !bytes.is_empty() {
                    form.gallery_files.push(bytes);
                }
            } else if name == "existingGallery" {
                let value = field
                    .text()
                    .await
                    .map_err(|e| format!("Invalid form field: {}", e))?;
                if !value.is_empty() {
                    form.existing_gallery.push(value);
                }
            } else if name == "existingImage" {
                let value = field
                    .text()
                    .await
                    .map_err(|e| format!("Invalid form field: {}", e))?;
                if !value.is_empty() {
                    form.existing_image = Some(value);
                }
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| format!("Invalid form field: {}", e))?;
                form.text.insert(name, value);
            }
        }

        Ok(form)
    }

    /// Non-empty text value for a field.
    pub fn get(&self, key: &str) -> Option<String> {
        self.text
            .get(key)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    pub fn get_i32(&self, key: &str) -> Option<i32> {
        self.get(key).and_then(|v| v.parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_getters() {
        let mut form = CollectedForm::default();
        form.text.insert("published".into(), "true".into());
        form.text.insert("displayOrder".into(), " 7 ".into());
        form.text.insert("title".into(), "   ".into());

        assert_eq!(form.get_bool("published"), Some(true));
        assert_eq!(form.get_i32("displayOrder"), Some(7));
        assert_eq!(form.get("title"), None);
        assert_eq!(form.get("missing"), None);
    }
}
