mod category;
mod detail;
mod range;

pub use category::{Category, CategoryIndex, CategoryLists, DEFAULT_PAGE_SIZE};
pub use detail::{TemplateDetail, TemplateInfo, TemplateKey, TemplateParams};
pub use range::{parse_range, CountRange};
