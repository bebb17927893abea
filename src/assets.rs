use std::path::Path;

use base64::Engine;

use crate::error::LedgerLeafError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Font,
    Image,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Font => "font",
            AssetKind::Image => "image",
        }
    }

    pub fn from_str(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "font" => Some(AssetKind::Font),
            "image" => Some(AssetKind::Image),
            _ => None,
        }
    }
}

/// Bytes fetched ahead of a capture. `name` is the URL (or font family)
/// the drawing commands refer to.
#[derive(Debug, Clone)]
pub struct Asset {
    pub name: String,
    pub kind: AssetKind,
    pub data: Vec<u8>,
}

impl Asset {
    pub fn new(name: impl Into<String>, kind: AssetKind, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            kind,
            data,
        }
    }

    pub fn bytes_len(&self) -> usize {
        self.data.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AssetBundle {
    pub assets: Vec<Asset>,
}

impl AssetBundle {
    /// Adds an asset, replacing any earlier one with the same name and kind.
    pub fn add(&mut self, asset: Asset) {
        self.assets
            .retain(|existing| !(existing.kind == asset.kind && existing.name == asset.name));
        self.assets.push(asset);
    }

    pub fn image(&self, url: &str) -> Option<&[u8]> {
        self.assets
            .iter()
            .find(|asset| asset.kind == AssetKind::Image && asset.name == url)
            .map(|asset| asset.data.as_slice())
    }

    pub fn font_assets(&self) -> impl Iterator<Item = &Asset> {
        self.assets
            .iter()
            .filter(|asset| asset.kind == AssetKind::Font)
    }

    pub fn total_bytes(&self) -> usize {
        self.assets.iter().map(Asset::bytes_len).sum()
    }
}

pub fn is_remote_url(source: &str) -> bool {
    let lower = source.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

pub(crate) fn parse_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let header_and_payload = uri.strip_prefix("data:")?;
    let (header, payload) = header_and_payload.split_once(',')?;
    let mime = header
        .split(';')
        .next()
        .filter(|v| !v.is_empty())
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = if header.contains(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .ok()?
    } else {
        payload.as_bytes().to_vec()
    };
    Some((mime, data))
}

pub fn to_data_url(mime: &str, data: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime,
        base64::engine::general_purpose::STANDARD.encode(data)
    )
}

fn image_mime(data: &[u8]) -> Option<&'static str> {
    match image::guess_format(data).ok()? {
        image::ImageFormat::Png => Some("image/png"),
        image::ImageFormat::Jpeg => Some("image/jpeg"),
        image::ImageFormat::Gif => Some("image/gif"),
        image::ImageFormat::WebP => Some("image/webp"),
        image::ImageFormat::Bmp => Some("image/bmp"),
        _ => None,
    }
}

/// Reads an image file into a `data:` URL suitable for `logoUrl` or
/// `signatureUrl`.
pub async fn read_image_data_url(path: impl AsRef<Path>) -> Result<String, LedgerLeafError> {
    let path = path.as_ref();
    let data = tokio::fs::read(path)
        .await
        .map_err(|e| LedgerLeafError::Read(format!("{}: {e}", path.display())))?;
    if data.is_empty() {
        return Err(LedgerLeafError::Read(format!(
            "{}: file is empty",
            path.display()
        )));
    }
    let mime = image_mime(&data).ok_or_else(|| {
        LedgerLeafError::Read(format!("{}: not a recognized image", path.display()))
    })?;
    tracing::debug!(path = %path.display(), bytes = data.len(), mime, "image read");
    Ok(to_data_url(mime, &data))
}
