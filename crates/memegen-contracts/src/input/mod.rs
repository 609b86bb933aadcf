mod binder;

pub use binder::{InputBinder, TEXT_MAX_LENGTH};
