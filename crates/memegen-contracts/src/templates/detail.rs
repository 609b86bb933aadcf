use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::range::CountRange;

pub type TemplateKey = String;

/// Body of `GET /memes/{key}/info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateInfo {
    pub key: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub params_type: Option<TemplateParams>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateParams {
    #[serde(default)]
    pub min_images: u32,
    #[serde(default)]
    pub max_images: u32,
    #[serde(default)]
    pub min_texts: u32,
    #[serde(default)]
    pub max_texts: u32,
    #[serde(default)]
    pub default_texts: Vec<String>,
    #[serde(default)]
    pub args_type: Option<Value>,
}

/// Per-template record shown by the catalog. Seeded as a placeholder and
/// filled in as metadata and preview fetches land.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateDetail {
    pub key: TemplateKey,
    pub name: String,
    pub keywords: Vec<String>,
    pub tags: Vec<String>,
    pub image_range: CountRange,
    pub text_range: CountRange,
    pub default_texts: Vec<String>,
    pub args_schema: Option<Value>,
    pub args_examples: Vec<Value>,
    pub preview_image: Option<String>,
    pub preview_loading: bool,
}

impl TemplateDetail {
    pub fn placeholder(key: &str) -> Self {
        Self {
            key: key.to_string(),
            name: key.to_string(),
            keywords: Vec::new(),
            tags: Vec::new(),
            image_range: CountRange::UNSET,
            text_range: CountRange::UNSET,
            default_texts: Vec::new(),
            args_schema: None,
            args_examples: Vec::new(),
            preview_image: None,
            preview_loading: true,
        }
    }

    /// Metadata counts as fetched once either range is non-default.
    pub fn has_metadata(&self) -> bool {
        !self.image_range.is_unset() || !self.text_range.is_unset()
    }

    /// Merges fetched metadata in place, keeping any preview already attached.
    pub fn apply_info(&mut self, info: &TemplateInfo) {
        let params = info.params_type.clone().unwrap_or_default();
        self.key = info.key.clone();
        self.name = info.key.clone();
        self.keywords = info.keywords.clone();
        self.tags = info.tags.clone();
        self.image_range = CountRange::new(params.min_images, params.max_images);
        self.text_range = CountRange::new(params.min_texts, params.max_texts);
        self.default_texts = params.default_texts;
        self.args_examples = params
            .args_type
            .as_ref()
            .and_then(|args| args.get("args_examples"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        self.args_schema = params.args_type;
        self.preview_loading = self.preview_image.is_none();
    }

    pub fn attach_preview(&mut self, data_uri: &str) {
        self.preview_image = Some(data_uri.to_string());
        self.preview_loading = false;
    }
}
