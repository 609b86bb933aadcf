use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use memegen_contracts::decode::bytes_to_data_uri;
use memegen_contracts::status::Notifier;
use memegen_contracts::templates::{
    Category, CategoryIndex, CategoryLists, TemplateDetail, TemplateInfo, TemplateKey,
};
use tracing::{debug, error};

use crate::error::Result;

/// Previews are always labelled GIF, whatever the server actually sent.
const PREVIEW_MIME: &str = "image/gif";

/// Read side of the template API.
pub trait CatalogSource: Send + Sync {
    fn categories(&self) -> Result<CategoryLists>;
    fn template_info(&self, key: &str) -> Result<TemplateInfo>;
    fn template_preview(&self, key: &str) -> Result<Vec<u8>>;
}

/// Detail records stored once and addressed by index; records are only ever
/// added or updated in place.
#[derive(Debug, Default)]
struct DetailArena {
    records: Vec<TemplateDetail>,
    index: HashMap<TemplateKey, usize>,
}

impl DetailArena {
    fn get(&self, key: &str) -> Option<&TemplateDetail> {
        self.index.get(key).map(|idx| &self.records[*idx])
    }

    fn get_mut(&mut self, key: &str) -> Option<&mut TemplateDetail> {
        let idx = *self.index.get(key)?;
        self.records.get_mut(idx)
    }

    fn get_or_insert(&mut self, key: &str) -> &mut TemplateDetail {
        let idx = match self.index.get(key) {
            Some(idx) => *idx,
            None => {
                self.records.push(TemplateDetail::placeholder(key));
                let idx = self.records.len() - 1;
                self.index.insert(key.to_string(), idx);
                idx
            }
        };
        &mut self.records[idx]
    }
}

#[derive(Debug)]
struct CatalogState {
    index: CategoryIndex,
    details: DetailArena,
    loaded_pages: HashMap<Category, BTreeSet<usize>>,
    previews: HashMap<TemplateKey, String>,
    previews_in_flight: HashSet<TemplateKey>,
    selected: Category,
    current_page: usize,
    loads_in_progress: usize,
}

impl Default for CatalogState {
    fn default() -> Self {
        Self {
            index: CategoryIndex::default(),
            details: DetailArena::default(),
            loaded_pages: HashMap::new(),
            previews: HashMap::new(),
            previews_in_flight: HashSet::new(),
            selected: Category::All,
            current_page: 1,
            loads_in_progress: 0,
        }
    }
}

fn lock_state(state: &Mutex<CatalogState>) -> MutexGuard<'_, CatalogState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears a key's in-flight preview marker however the fetch ends.
struct PreviewInFlight<'a> {
    state: &'a Mutex<CatalogState>,
    key: &'a str,
}

impl Drop for PreviewInFlight<'_> {
    fn drop(&mut self) {
        lock_state(self.state).previews_in_flight.remove(self.key);
    }
}

/// Category index plus lazily fetched, per-page cached template details and
/// preview images.
///
/// The state lock is never held across a network call, so metadata and
/// preview fetches for a page run concurrently and land in any order.
pub struct TemplateCatalog<S: CatalogSource> {
    source: S,
    notifier: Arc<dyn Notifier>,
    page_size: usize,
    state: Mutex<CatalogState>,
}

impl<S: CatalogSource> TemplateCatalog<S> {
    pub fn new(source: S, notifier: Arc<dyn Notifier>, page_size: usize) -> Self {
        Self {
            source,
            notifier,
            page_size: page_size.max(1),
            state: Mutex::new(CatalogState::default()),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    fn state(&self) -> MutexGuard<'_, CatalogState> {
        lock_state(&self.state)
    }

    /// Replaces the category index. Failures are reported on the status
    /// channel and leave the previous index in place.
    pub fn load_categories(&self) -> bool {
        self.state().loads_in_progress += 1;
        let outcome = self.source.categories();
        let mut state = self.state();
        state.loads_in_progress -= 1;
        match outcome {
            Ok(lists) => {
                state.index = CategoryIndex::from_lists(lists);
                debug!("loaded {} templates", state.index.count(Category::All));
                true
            }
            Err(err) => {
                drop(state);
                error!("failed loading categories: {err}");
                self.notifier
                    .notify(&format!("Failed to load categories: {err}"));
                false
            }
        }
    }

    /// Fetches metadata and previews for every key on `page` and records the
    /// page once all of them have settled, successfully or not.
    pub fn ensure_page_loaded(&self, category: Category, page: usize) {
        let page_keys = {
            let mut state = self.state();
            if state.index.count(category) == 0 {
                return;
            }
            let already_loaded = state
                .loaded_pages
                .get(&category)
                .map(|pages| pages.contains(&page))
                .unwrap_or(false);
            if already_loaded {
                return;
            }
            let page_keys = state
                .index
                .page_keys(category, page, self.page_size)
                .to_vec();
            if page_keys.is_empty() {
                return;
            }
            for key in &page_keys {
                state.details.get_or_insert(key);
            }
            state.loads_in_progress += 1;
            page_keys
        };

        thread::scope(|scope| {
            let metadata: Vec<_> = page_keys
                .iter()
                .map(|key| scope.spawn(move || self.fetch_template_metadata(key)))
                .collect();
            let previews: Vec<_> = page_keys
                .iter()
                .map(|key| scope.spawn(move || self.fetch_template_preview(key)))
                .collect();
            for handle in metadata {
                if handle.join().is_err() {
                    error!("template metadata fetch panicked");
                }
            }
            for handle in previews {
                if handle.join().is_err() {
                    error!("template preview fetch panicked");
                }
            }
        });

        let mut state = self.state();
        state.loaded_pages.entry(category).or_default().insert(page);
        state.loads_in_progress -= 1;
        debug!("page {page} of {category} loaded ({} templates)", page_keys.len());
    }

    /// Metadata for `key`, fetched unless the cached record already carries
    /// non-default ranges. A genuine `0-0/0-0` template is refetched every
    /// call since it looks unfetched.
    pub fn fetch_template_metadata(&self, key: &str) -> Option<TemplateDetail> {
        if let Some(existing) = self.state().details.get(key) {
            if existing.has_metadata() {
                return Some(existing.clone());
            }
        }
        match self.source.template_info(key) {
            Ok(info) => {
                let mut state = self.state();
                let detail = state.details.get_or_insert(key);
                detail.apply_info(&info);
                Some(detail.clone())
            }
            Err(err) => {
                error!("failed fetching info for template {key}: {err}");
                None
            }
        }
    }

    /// Cached preview for `key`, or a fresh fetch. Returns `None` without
    /// fetching while another fetch for the same key is in flight.
    pub fn fetch_template_preview(&self, key: &str) -> Option<String> {
        {
            let mut state = self.state();
            if let Some(cached) = state.previews.get(key).cloned() {
                if let Some(detail) = state.details.get_mut(key) {
                    detail.attach_preview(&cached);
                }
                return Some(cached);
            }
            if !state.previews_in_flight.insert(key.to_string()) {
                return None;
            }
        }
        let _in_flight = PreviewInFlight {
            state: &self.state,
            key,
        };

        match self.source.template_preview(key) {
            Ok(bytes) => {
                let fetched = bytes_to_data_uri(&bytes, Some(PREVIEW_MIME));
                let mut state = self.state();
                let cached = state
                    .previews
                    .entry(key.to_string())
                    .or_insert(fetched)
                    .clone();
                if let Some(detail) = state.details.get_mut(key) {
                    detail.attach_preview(&cached);
                }
                Some(cached)
            }
            Err(err) => {
                error!("failed fetching preview for template {key}: {err}");
                None
            }
        }
    }

    /// Switches category, rewinds to page 1 and loads it unless cached.
    pub fn select_category(&self, category: Category) {
        self.select_category_at(category, 1);
    }

    /// Switches category and jumps straight to `page`, clamped to the
    /// category's pages. Only the landing page is loaded.
    pub fn select_category_at(&self, category: Category, page: usize) -> usize {
        let page = {
            let mut state = self.state();
            let total = state.index.total_pages(category, self.page_size);
            state.selected = category;
            state.current_page = page.clamp(1, total);
            state.current_page
        };
        self.notifier
            .notify(&format!("Switched to {} category", category.label()));
        self.ensure_page_loaded(category, page);
        page
    }

    pub fn load_current_page(&self) {
        let (category, page) = {
            let state = self.state();
            (state.selected, state.current_page)
        };
        self.ensure_page_loaded(category, page);
    }

    pub fn prev_page(&self) -> usize {
        let mut state = self.state();
        if state.current_page > 1 {
            state.current_page -= 1;
        }
        state.current_page
    }

    pub fn next_page(&self) -> usize {
        let mut state = self.state();
        let total = state.index.total_pages(state.selected, self.page_size);
        if state.current_page < total {
            state.current_page += 1;
        }
        state.current_page
    }

    pub fn go_to_page(&self, page: usize) -> usize {
        let mut state = self.state();
        let total = state.index.total_pages(state.selected, self.page_size);
        state.current_page = page.clamp(1, total);
        state.current_page
    }

    pub fn selected_category(&self) -> Category {
        self.state().selected
    }

    pub fn current_page(&self) -> usize {
        self.state().current_page
    }

    pub fn total_pages(&self) -> usize {
        let state = self.state();
        state.index.total_pages(state.selected, self.page_size)
    }

    pub fn category_counts(&self) -> Vec<(Category, usize)> {
        self.state().index.counts().into_iter().collect()
    }

    pub fn category_keys(&self, category: Category) -> Vec<TemplateKey> {
        self.state().index.keys(category).to_vec()
    }

    /// Snapshot of the current page, with placeholders for keys that have no
    /// record yet.
    pub fn current_page_templates(&self) -> Vec<TemplateDetail> {
        let state = self.state();
        state
            .index
            .page_keys(state.selected, state.current_page, self.page_size)
            .iter()
            .map(|key| {
                state
                    .details
                    .get(key)
                    .cloned()
                    .unwrap_or_else(|| TemplateDetail::placeholder(key))
            })
            .collect()
    }

    pub fn detail(&self, key: &str) -> Option<TemplateDetail> {
        self.state().details.get(key).cloned()
    }

    pub fn is_page_loaded(&self, category: Category, page: usize) -> bool {
        self.state()
            .loaded_pages
            .get(&category)
            .map(|pages| pages.contains(&page))
            .unwrap_or(false)
    }

    pub fn is_loading(&self) -> bool {
        self.state().loads_in_progress > 0
    }
}
