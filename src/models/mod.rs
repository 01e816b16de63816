//! Data models for shelfcrawl.

mod category;
mod item;

pub use category::{canonicalize, last_path_segment, CategoryNode, SourcePanel};
pub(crate) use item::ITEM_URL_COLUMN;
pub use item::{normalize_label, ItemRecord, CATEGORY_LEVELS, COLUMNS, NOT_FOUND, OTHER_CATEGORY};
