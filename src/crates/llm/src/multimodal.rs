//! Image attachments and the text-only fallback for non-vision models.

use crate::client::ChatClient;
use crate::error::{LlmError, Result};
use crate::message::{ChatRequest, ImageUrl};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::Path;
use tracing::warn;

/// MIME type derived from the file extension, defaulting to PNG.
pub fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}

/// Read one image and encode it as a `data:` URL with high detail.
pub async fn encode_image(path: &Path) -> Result<ImageUrl> {
    let bytes = tokio::fs::read(path).await?;
    Ok(ImageUrl {
        url: format!("data:{};base64,{}", mime_type_for(path), STANDARD.encode(bytes)),
        detail: Some("high".to_string()),
    })
}

/// Encode every readable image. Files that cannot be read are skipped.
pub async fn encode_images<P: AsRef<Path>>(paths: &[P]) -> Vec<ImageUrl> {
    let mut images = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();
        match encode_image(path).await {
            Ok(image) => images.push(image),
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable image"),
        }
    }
    images
}

/// Whether the upstream rejected the call because the model has no vision support.
pub fn is_vision_unsupported(err: &LlmError) -> bool {
    let text = err.to_string().to_lowercase();
    text.contains("not a vlm") || text.contains("vision language model")
}

/// Send `request`; if it carries images and the model cannot see them, resend it as text only.
pub async fn chat_with_fallback(client: &dyn ChatClient, request: ChatRequest) -> Result<String> {
    if !request.has_images() {
        return client.chat(request).await;
    }

    let text_only = request.to_text_only();
    match client.chat(request).await {
        Err(e) if is_vision_unsupported(&e) => {
            warn!(
                model = client.model(),
                error = %e,
                "Model rejected images, retrying as text only"
            );
            client.chat(text_only).await
        }
        other => other,
    }
}
