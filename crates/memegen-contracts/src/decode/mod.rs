mod data_uri;
mod response;

pub use data_uri::{
    bytes_to_data_uri, content_type_for_path, essence, extension_for_content_type,
    image_mime_or_default, is_image_data_uri, to_data_uri, DataUri, DEFAULT_IMAGE_MIME,
};
pub use response::{decode_response, decode_text_payload, ResponseBody};
