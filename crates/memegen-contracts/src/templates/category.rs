use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::detail::TemplateKey;

pub const DEFAULT_PAGE_SIZE: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    All,
    TextOnly,
    ImageOnly,
    Mixed,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::All,
        Category::TextOnly,
        Category::ImageOnly,
        Category::Mixed,
    ];

    pub fn wire_name(&self) -> &'static str {
        match self {
            Category::All => "all",
            Category::TextOnly => "text_only",
            Category::ImageOnly => "image_only",
            Category::Mixed => "mixed",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::All => "All",
            Category::TextOnly => "Text only",
            Category::ImageOnly => "Image only",
            Category::Mixed => "Text + image",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Category::All),
            "text" | "text_only" => Ok(Category::TextOnly),
            "image" | "image_only" => Ok(Category::ImageOnly),
            "mixed" => Ok(Category::Mixed),
            other => Err(format!("unknown category '{other}'")),
        }
    }
}

/// Body of `GET /memes/categories`. Missing lists decode as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryLists {
    #[serde(default)]
    pub all: Vec<TemplateKey>,
    #[serde(default)]
    pub text_only: Vec<TemplateKey>,
    #[serde(default)]
    pub image_only: Vec<TemplateKey>,
    #[serde(default)]
    pub mixed: Vec<TemplateKey>,
}

/// Ordered template keys per category. Replaced wholesale on refresh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryIndex {
    keys: IndexMap<Category, Vec<TemplateKey>>,
}

impl CategoryIndex {
    pub fn from_lists(lists: CategoryLists) -> Self {
        let mut keys = IndexMap::new();
        keys.insert(Category::All, lists.all);
        keys.insert(Category::TextOnly, lists.text_only);
        keys.insert(Category::ImageOnly, lists.image_only);
        keys.insert(Category::Mixed, lists.mixed);
        Self { keys }
    }

    pub fn keys(&self, category: Category) -> &[TemplateKey] {
        self.keys
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn count(&self, category: Category) -> usize {
        self.keys(category).len()
    }

    pub fn counts(&self) -> IndexMap<Category, usize> {
        Category::ALL
            .iter()
            .map(|category| (*category, self.count(*category)))
            .collect()
    }

    /// Keys on 1-based `page`. Out-of-range pages are empty.
    pub fn page_keys(&self, category: Category, page: usize, page_size: usize) -> &[TemplateKey] {
        let keys = self.keys(category);
        if page == 0 || page_size == 0 {
            return &[];
        }
        let start = (page - 1).saturating_mul(page_size);
        if start >= keys.len() {
            return &[];
        }
        let end = start.saturating_add(page_size).min(keys.len());
        &keys[start..end]
    }

    /// Always at least one page, so an empty category still renders.
    pub fn total_pages(&self, category: Category, page_size: usize) -> usize {
        if page_size == 0 {
            return 1;
        }
        self.count(category).div_ceil(page_size).max(1)
    }
}
