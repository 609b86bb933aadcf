use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

pub const DEFAULT_IMAGE_MIME: &str = "image/gif";

const DATA_IMAGE_PREFIX: &str = "data:image/";

/// A formed `data:image/<subtype>;base64,<payload>` string split into parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri<'a> {
    pub mime: &'a str,
    pub payload: &'a str,
}

impl<'a> DataUri<'a> {
    pub fn parse(raw: &'a str) -> Option<Self> {
        let rest = raw.strip_prefix("data:")?;
        let (mime, payload) = rest.split_once(";base64,")?;
        let subtype = mime.strip_prefix("image/")?;
        if subtype.is_empty() || !subtype.chars().all(is_subtype_char) {
            return None;
        }
        Some(Self { mime, payload })
    }

    pub fn decode_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64.decode(self.payload.trim().as_bytes())
    }

    pub fn extension(&self) -> &'static str {
        extension_for_content_type(Some(self.mime))
    }
}

fn is_subtype_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '+' | '-')
}

pub fn is_image_data_uri(raw: &str) -> bool {
    DataUri::parse(raw).is_some()
}

/// Wraps a base64 payload as an image data URI. Payloads that already carry a
/// `data:image/` prefix are returned untouched.
pub fn to_data_uri(payload: &str, content_type_hint: Option<&str>) -> String {
    if payload.starts_with(DATA_IMAGE_PREFIX) {
        return payload.to_string();
    }
    format!("data:{};base64,{}", image_mime_or_default(content_type_hint), payload)
}

pub fn bytes_to_data_uri(bytes: &[u8], content_type_hint: Option<&str>) -> String {
    to_data_uri(&BASE64.encode(bytes), content_type_hint)
}

/// Lower-cased MIME without parameters when it names an image, else GIF.
pub fn image_mime_or_default(content_type: Option<&str>) -> String {
    let normalized = content_type.map(essence).unwrap_or_default();
    if normalized.starts_with("image/") && normalized.len() > "image/".len() {
        normalized
    } else {
        DEFAULT_IMAGE_MIME.to_string()
    }
}

/// `"Image/PNG; charset=binary"` -> `"image/png"`.
pub fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub fn extension_for_content_type(content_type: Option<&str>) -> &'static str {
    let Some(content_type) = content_type else {
        return "png";
    };
    match essence(content_type).as_str() {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "png",
    }
}

/// Upload MIME type for a local image: extension first, then magic bytes.
pub fn content_type_for_path(path: &Path, head: &[u8]) -> Option<&'static str> {
    image::ImageFormat::from_path(path)
        .or_else(|_| image::guess_format(head))
        .ok()
        .map(|format| format.to_mime_type())
}
