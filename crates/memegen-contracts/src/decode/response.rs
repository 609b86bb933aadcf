use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::Value;

use super::data_uri::{essence, is_image_data_uri, to_data_uri, DEFAULT_IMAGE_MIME};

const PAYLOAD_KEYS: [&str; 3] = ["data", "image", "base64"];

/// A generation response body as the transport received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    Bytes(Vec<u8>),
    Text(String),
}

impl ResponseBody {
    pub fn is_empty(&self) -> bool {
        match self {
            ResponseBody::Bytes(bytes) => bytes.is_empty(),
            ResponseBody::Text(text) => text.is_empty(),
        }
    }

    fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Text(text) => Some(text.as_str()),
            ResponseBody::Bytes(bytes) => std::str::from_utf8(bytes).ok(),
        }
    }

    fn into_bytes(self) -> Vec<u8> {
        match self {
            ResponseBody::Bytes(bytes) => bytes,
            ResponseBody::Text(text) => text.into_bytes(),
        }
    }

    fn into_text(self) -> String {
        match self {
            ResponseBody::Text(text) => text,
            ResponseBody::Bytes(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        }
    }
}

/// Normalizes a generation response into `data:image/<subtype>;base64,...`.
///
/// Never fails: bodies that cannot be interpreted degrade to being treated as
/// a base64 payload or as raw bytes.
pub fn decode_response(content_type: Option<&str>, body: ResponseBody) -> String {
    if let Some(text) = body.as_text() {
        if is_image_data_uri(text) {
            return text.to_string();
        }
    }

    let content_type = content_type
        .map(str::trim)
        .filter(|value| !value.is_empty());
    let lowered = content_type.map(essence).unwrap_or_default();

    if lowered.starts_with("image/") {
        return wrap_bytes(&body.into_bytes(), content_type);
    }
    if lowered.contains("application/json") || lowered.contains("text/plain") {
        return decode_text_payload(&body.into_text(), content_type);
    }
    wrap_bytes(
        &body.into_bytes(),
        Some(content_type.unwrap_or(DEFAULT_IMAGE_MIME)),
    )
}

/// JSON/text branch: a base64 field, then `dataUri`, then the raw text.
pub fn decode_text_payload(text: &str, content_type: Option<&str>) -> String {
    let Ok(parsed) = serde_json::from_str::<Value>(text) else {
        return to_data_uri(text, content_type);
    };
    let payload = PAYLOAD_KEYS.iter().find_map(|key| {
        parsed
            .get(*key)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    });
    if let Some(payload) = payload {
        let mime = parsed
            .get("content_type")
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
            .or(content_type);
        return to_data_uri(payload, mime);
    }
    if let Some(data_uri) = parsed
        .get("dataUri")
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
    {
        return data_uri.to_string();
    }
    to_data_uri(text, content_type)
}

fn wrap_bytes(bytes: &[u8], content_type: Option<&str>) -> String {
    to_data_uri(&BASE64.encode(bytes), content_type)
}

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;
    use serde_json::json;

    use super::{decode_response, ResponseBody};
    use crate::decode::is_image_data_uri;

    const GIF_BYTES: &[u8] = b"GIF89a\x01\x00\x01\x00\x80\x00\x00\xff\xff\xff;";

    fn text(value: &str) -> ResponseBody {
        ResponseBody::Text(value.to_string())
    }

    #[test]
    fn formed_data_uri_passes_through() {
        let formed = "data:image/webp;base64,UklGRg==";
        assert_eq!(decode_response(Some("text/plain"), text(formed)), formed);
        assert_eq!(
            decode_response(None, ResponseBody::Bytes(formed.as_bytes().to_vec())),
            formed
        );
    }

    #[test]
    fn decoding_is_idempotent() {
        let first = decode_response(Some("image/png"), ResponseBody::Bytes(GIF_BYTES.to_vec()));
        let second = decode_response(Some("application/octet-stream"), text(&first));
        assert_eq!(first, second);
    }

    #[test]
    fn image_content_type_wraps_raw_bytes() {
        let decoded = decode_response(Some("image/gif"), ResponseBody::Bytes(GIF_BYTES.to_vec()));
        assert_eq!(
            decoded,
            format!("data:image/gif;base64,{}", BASE64.encode(GIF_BYTES))
        );
    }

    #[test]
    fn json_payload_prefers_data_then_image_then_base64() {
        let body = json!({"image": "SU1H", "base64": "QjY0"}).to_string();
        assert_eq!(
            decode_response(Some("application/json"), text(&body)),
            "data:image/gif;base64,SU1H"
        );
        let body = json!({"data": "REFUQQ==", "image": "SU1H"}).to_string();
        assert_eq!(
            decode_response(Some("application/json"), text(&body)),
            "data:image/gif;base64,REFUQQ=="
        );
    }

    #[test]
    fn json_content_type_field_overrides_header() {
        let body = json!({"base64": "iVBORw0KGgo=", "content_type": "image/png"}).to_string();
        assert_eq!(
            decode_response(Some("application/json; charset=utf-8"), text(&body)),
            "data:image/png;base64,iVBORw0KGgo="
        );
    }

    #[test]
    fn json_data_uri_field_is_used_verbatim() {
        let body = json!({"dataUri": "data:image/jpeg;base64,/9j/"}).to_string();
        assert_eq!(
            decode_response(Some("application/json"), text(&body)),
            "data:image/jpeg;base64,/9j/"
        );
    }

    #[test]
    fn json_without_known_fields_wraps_raw_text() {
        let body = json!({"status": "ok"}).to_string();
        assert_eq!(
            decode_response(Some("application/json"), text(&body)),
            format!("data:image/gif;base64,{body}")
        );
    }

    #[test]
    fn unparseable_text_is_treated_as_base64() {
        assert_eq!(
            decode_response(Some("text/plain"), text("R0lGODlhAQABAA==")),
            "data:image/gif;base64,R0lGODlhAQABAA=="
        );
    }

    #[test]
    fn unknown_content_type_defaults_to_gif_mime() {
        let decoded = decode_response(None, ResponseBody::Bytes(vec![0xff, 0xd8, 0xff]));
        assert_eq!(decoded, "data:image/gif;base64,/9j/");
        let decoded = decode_response(
            Some("application/octet-stream"),
            ResponseBody::Bytes(vec![0xff, 0xd8, 0xff]),
        );
        assert_eq!(decoded, "data:image/gif;base64,/9j/");
    }

    #[test]
    fn every_branch_yields_a_well_formed_image_uri() {
        let cases = vec![
            (Some("image/png"), ResponseBody::Bytes(GIF_BYTES.to_vec())),
            (Some("application/json"), text(r#"{"data": "AAAA"}"#)),
            (Some("application/json"), text("{not json")),
            (Some("text/plain"), text("AAAA")),
            (None, ResponseBody::Bytes(GIF_BYTES.to_vec())),
            (Some("application/octet-stream"), ResponseBody::Bytes(Vec::new())),
        ];
        for (content_type, body) in cases {
            let decoded = decode_response(content_type, body);
            assert!(is_image_data_uri(&decoded), "malformed: {decoded}");
        }
    }
}
