use std::path::PathBuf;

use crate::templates::{CountRange, TemplateDetail};

pub const TEXT_MAX_LENGTH: usize = 100;

/// User selections for one template, checked against its declared ranges.
#[derive(Debug, Clone, Default)]
pub struct InputBinder {
    detail: Option<TemplateDetail>,
    images: Vec<PathBuf>,
    texts: Vec<String>,
}

impl InputBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects `detail` and resets the inputs: no images, one text slot per
    /// allowed text, pre-filled with the template's defaults.
    pub fn initialize(&mut self, detail: Option<TemplateDetail>) {
        self.detail = detail;
        self.images.clear();
        let slots = self.text_slot_count();
        let defaults = self
            .detail
            .as_ref()
            .map(|detail| detail.default_texts.as_slice())
            .unwrap_or_default();
        self.texts = (0..slots)
            .map(|idx| defaults.get(idx).cloned().unwrap_or_default())
            .collect();
    }

    pub fn reset(&mut self) {
        self.detail = None;
        self.images.clear();
        self.texts.clear();
    }

    pub fn detail(&self) -> Option<&TemplateDetail> {
        self.detail.as_ref()
    }

    pub fn images(&self) -> &[PathBuf] {
        &self.images
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    fn image_range(&self) -> CountRange {
        self.detail
            .as_ref()
            .map(|detail| detail.image_range)
            .unwrap_or_default()
    }

    pub fn text_input_range(&self) -> CountRange {
        self.detail
            .as_ref()
            .map(|detail| detail.text_range)
            .unwrap_or_default()
    }

    /// Minimum number of images the template needs.
    pub fn image_input_count(&self) -> usize {
        self.image_range().min as usize
    }

    pub fn remaining_image_capacity(&self) -> usize {
        (self.image_range().max as usize).saturating_sub(self.images.len())
    }

    pub fn image_upload_prompt(&self) -> String {
        if self.detail.is_none() {
            return "Please upload images".to_string();
        }
        let CountRange { min, max } = self.image_range();
        if max == 0 {
            return "This template needs no images".to_string();
        }
        let current = self.images.len();
        let (min, max) = (min as usize, max as usize);
        if current >= max {
            return format!("Uploaded {current} images (max {max})");
        }
        if min > 0 && current < min {
            return format!(
                "Need {} more images (min {min}, max {max})",
                min - current
            );
        }
        format!("Uploaded {current} images (max {max})")
    }

    pub fn text_slot_count(&self) -> usize {
        self.text_input_range().max as usize
    }

    pub fn text_placeholder(&self, index: usize) -> String {
        self.detail
            .as_ref()
            .and_then(|detail| detail.default_texts.get(index))
            .filter(|value| !value.is_empty())
            .cloned()
            .unwrap_or_else(|| format!("Enter text {}", index + 1))
    }

    pub fn text_max_length(&self) -> usize {
        TEXT_MAX_LENGTH
    }

    /// Appends picked images up to the template's maximum. Returns how many
    /// were kept.
    pub fn add_images(&mut self, paths: impl IntoIterator<Item = PathBuf>) -> usize {
        let remaining = self.remaining_image_capacity();
        let before = self.images.len();
        self.images.extend(paths.into_iter().take(remaining));
        self.images.len() - before
    }

    pub fn remove_image(&mut self, index: usize) -> Option<PathBuf> {
        if index < self.images.len() {
            return Some(self.images.remove(index));
        }
        None
    }

    pub fn set_text(&mut self, index: usize, value: &str) -> bool {
        let Some(slot) = self.texts.get_mut(index) else {
            return false;
        };
        *slot = value.chars().take(TEXT_MAX_LENGTH).collect();
        true
    }

    /// Non-blank texts in slot order, trimmed, as they are submitted.
    pub fn filled_texts(&self) -> Vec<String> {
        self.texts
            .iter()
            .map(|text| text.trim())
            .filter(|text| !text.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// A `0-0` range places no constraint on its input.
    pub fn is_valid(&self) -> bool {
        if self.detail.is_none() {
            return false;
        }
        let images = self.image_range();
        if images.max > 0 && !images.contains(self.images.len()) {
            return false;
        }
        let texts = self.text_input_range();
        if texts.max > 0 && !texts.contains(self.filled_texts().len()) {
            return false;
        }
        true
    }
}
