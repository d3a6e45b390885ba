//! Decoded image storage keyed by URL.
//!
//! Shapes only carry a URL. Data URLs are decoded on demand; other URLs
//! must be fed in by the host with [`ImageCache::insert_bytes`].

use crate::renderer::{RenderResult, RendererError};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::collections::HashMap;
use std::sync::Arc;

/// Straight RGBA8 pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

#[derive(Debug, Clone)]
enum Entry {
    Ready(Arc<DecodedImage>),
    Failed,
}

#[derive(Debug, Default)]
pub struct ImageCache {
    entries: HashMap<String, Entry>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, url: &str) -> Option<Arc<DecodedImage>> {
        match self.entries.get(url) {
            Some(Entry::Ready(image)) => Some(image.clone()),
            _ => None,
        }
    }

    pub fn has_failed(&self, url: &str) -> bool {
        matches!(self.entries.get(url), Some(Entry::Failed))
    }

    /// Whether a decode was attempted for `url`.
    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decode encoded image bytes (PNG, JPEG, WebP) for `url`.
    ///
    /// Failures are remembered so the image is not retried every frame.
    pub fn insert_bytes(&mut self, url: &str, bytes: &[u8]) -> RenderResult<()> {
        match decode_bytes(bytes) {
            Ok(image) => {
                self.insert(url, image);
                Ok(())
            }
            Err(e) => {
                log::warn!("Failed to decode image {}: {}", short(url), e);
                self.entries.insert(url.to_string(), Entry::Failed);
                Err(e)
            }
        }
    }

    /// Store already-decoded pixels.
    pub fn insert(&mut self, url: &str, image: DecodedImage) {
        self.entries
            .insert(url.to_string(), Entry::Ready(Arc::new(image)));
    }

    /// Decode every `data:` URL not yet attempted. Returns how many became
    /// ready.
    pub fn decode_pending(&mut self, urls: &[String]) -> usize {
        let mut ready = 0;
        for url in urls {
            if self.contains(url) || !url.starts_with("data:") {
                continue;
            }
            match decode_data_url(url) {
                Ok(bytes) => {
                    if self.insert_bytes(url, &bytes).is_ok() {
                        ready += 1;
                    }
                }
                Err(e) => {
                    log::warn!("Failed to load image {}: {}", short(url), e);
                    self.entries.insert(url.clone(), Entry::Failed);
                }
            }
        }
        ready
    }
}

/// Payload bytes of a base64 `data:` URL.
pub fn decode_data_url(url: &str) -> RenderResult<Vec<u8>> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| RendererError::Decode("not a data URL".to_string()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| RendererError::Decode("data URL has no payload".to_string()))?;
    if !meta.ends_with(";base64") {
        return Err(RendererError::Decode(
            "only base64 data URLs are supported".to_string(),
        ));
    }
    STANDARD
        .decode(payload.trim())
        .map_err(|e| RendererError::Decode(e.to_string()))
}

fn decode_bytes(bytes: &[u8]) -> RenderResult<DecodedImage> {
    let image = image::load_from_memory(bytes).map_err(|e| RendererError::Decode(e.to_string()))?;
    let rgba = image.to_rgba8();
    Ok(DecodedImage {
        width: rgba.width(),
        height: rgba.height(),
        rgba: rgba.into_raw(),
    })
}

/// URL prefix for log lines; data URLs can be megabytes long.
fn short(url: &str) -> &str {
    match url.char_indices().nth(48) {
        Some((i, _)) => &url[..i],
        None => url,
    }
}
