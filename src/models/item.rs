//! Item record model.

use serde::{Deserialize, Serialize};

/// Placeholder stored for every attribute that could not be extracted.
pub const NOT_FOUND: &str = "not found";

/// Category value used when an item surfaced in a parent's catch-all panel
/// sits deeper than its breadcrumb reaches.
pub const OTHER_CATEGORY: &str = "Other";

/// Number of category-path levels carried by a record.
pub const CATEGORY_LEVELS: usize = 4;

/// Store header, in the fixed column order every writer uses.
pub const COLUMNS: [&str; 19] = [
    "category",
    "subcategory_1",
    "subcategory_2",
    "subcategory_3",
    "item_url",
    "image_url",
    "author",
    "title",
    "price",
    "format",
    "description",
    "publisher",
    "publish_date",
    "isbn",
    "page_count",
    "language",
    "length",
    "width",
    "weight",
];

/// Index of the item URL within [`COLUMNS`].
pub(crate) const ITEM_URL_COLUMN: usize = 4;

/// One extracted item detail page.
///
/// Every attribute is always present; missing data holds [`NOT_FOUND`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub category: String,
    pub subcategory_1: String,
    pub subcategory_2: String,
    pub subcategory_3: String,
    pub item_url: String,
    pub image_url: String,
    pub author: String,
    pub title: String,
    pub price: String,
    pub format: String,
    pub description: String,
    pub publisher: String,
    pub publish_date: String,
    pub isbn: String,
    pub page_count: String,
    pub language: String,
    pub length: String,
    pub width: String,
    pub weight: String,
}

impl ItemRecord {
    /// A record for `item_url` with every other attribute set to [`NOT_FOUND`].
    pub fn not_found(item_url: impl Into<String>) -> Self {
        let nf = || NOT_FOUND.to_string();
        Self {
            category: nf(),
            subcategory_1: nf(),
            subcategory_2: nf(),
            subcategory_3: nf(),
            item_url: item_url.into(),
            image_url: nf(),
            author: nf(),
            title: nf(),
            price: nf(),
            format: nf(),
            description: nf(),
            publisher: nf(),
            publish_date: nf(),
            isbn: nf(),
            page_count: nf(),
            language: nf(),
            length: nf(),
            width: nf(),
            weight: nf(),
        }
    }

    /// Values in [`COLUMNS`] order.
    pub fn to_row(&self) -> [&str; 19] {
        [
            self.category.as_str(),
            self.subcategory_1.as_str(),
            self.subcategory_2.as_str(),
            self.subcategory_3.as_str(),
            self.item_url.as_str(),
            self.image_url.as_str(),
            self.author.as_str(),
            self.title.as_str(),
            self.price.as_str(),
            self.format.as_str(),
            self.description.as_str(),
            self.publisher.as_str(),
            self.publish_date.as_str(),
            self.isbn.as_str(),
            self.page_count.as_str(),
            self.language.as_str(),
            self.length.as_str(),
            self.width.as_str(),
            self.weight.as_str(),
        ]
    }

    /// Mutable access to category level `level` (0 = main category).
    pub fn category_level_mut(&mut self, level: usize) -> Option<&mut String> {
        match level {
            0 => Some(&mut self.category),
            1 => Some(&mut self.subcategory_1),
            2 => Some(&mut self.subcategory_2),
            3 => Some(&mut self.subcategory_3),
            _ => None,
        }
    }

    pub fn category_path(&self) -> [&str; CATEGORY_LEVELS] {
        [
            self.category.as_str(),
            self.subcategory_1.as_str(),
            self.subcategory_2.as_str(),
            self.subcategory_3.as_str(),
        ]
    }

    /// Map breadcrumb names onto the category levels, in order.
    ///
    /// Extra names beyond [`CATEGORY_LEVELS`] are ignored.
    pub fn set_category_path<S: AsRef<str>>(&mut self, names: &[S]) {
        for (level, name) in names.iter().take(CATEGORY_LEVELS).enumerate() {
            if let Some(slot) = self.category_level_mut(level) {
                *slot = name.as_ref().to_string();
            }
        }
    }

    /// Fill the first unset category level with [`OTHER_CATEGORY`].
    ///
    /// Returns false when every level is already set.
    pub fn backfill_other_category(&mut self) -> bool {
        for level in 0..CATEGORY_LEVELS {
            if let Some(slot) = self.category_level_mut(level) {
                if *slot == NOT_FOUND {
                    *slot = OTHER_CATEGORY.to_string();
                    return true;
                }
            }
        }
        false
    }

    /// Store `value` under the specification label `label`.
    ///
    /// Labels are compared after [`normalize_label`]. Unknown labels are
    /// ignored and reported with `false`.
    pub fn set_spec_field(&mut self, label: &str, value: &str) -> bool {
        let slot = match normalize_label(label).as_str() {
            "publisher" | "penerbit" => &mut self.publisher,
            "publish date" | "publication date" | "tanggal terbit" => &mut self.publish_date,
            "isbn" => &mut self.isbn,
            "page count" | "pages" | "halaman" | "jumlah halaman" => &mut self.page_count,
            "language" | "bahasa" => &mut self.language,
            "length" | "panjang" => &mut self.length,
            "width" | "lebar" => &mut self.width,
            "weight" | "berat" => &mut self.weight,
            _ => return false,
        };
        *slot = value.to_string();
        true
    }

    /// Count of attributes still holding the sentinel.
    pub fn missing_fields(&self) -> usize {
        self.to_row().iter().filter(|v| **v == NOT_FOUND).count()
    }
}

/// Lowercase with whitespace runs collapsed.
pub fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_fills_every_column() {
        let record = ItemRecord::not_found("https://shop.example/products/x");
        let row = record.to_row();
        assert_eq!(row.len(), COLUMNS.len());
        assert_eq!(row[ITEM_URL_COLUMN], "https://shop.example/products/x");
        assert_eq!(record.missing_fields(), COLUMNS.len() - 1);
    }

    #[test]
    fn spec_labels_match_after_normalisation() {
        let mut record = ItemRecord::not_found("u");
        assert!(record.set_spec_field("  Page   Count ", "320"));
        assert!(record.set_spec_field("Penerbit", "Gramedia"));
        assert!(record.set_spec_field("ISBN", "9786020000000"));
        assert!(!record.set_spec_field("Warehouse", "Jakarta"));
        assert_eq!(record.page_count, "320");
        assert_eq!(record.publisher, "Gramedia");
        assert_eq!(record.isbn, "9786020000000");
        assert_eq!(record.language, NOT_FOUND);
    }

    #[test]
    fn backfill_targets_first_unset_level() {
        let mut record = ItemRecord::not_found("u");
        record.set_category_path(&["Buku", "Komputer"]);
        assert!(record.backfill_other_category());
        assert_eq!(
            record.category_path(),
            ["Buku", "Komputer", OTHER_CATEGORY, NOT_FOUND]
        );

        record.set_category_path(&["Buku", "Komputer", "Jaringan", "Cisco", "Extra"]);
        assert!(!record.backfill_other_category());
        assert_eq!(record.subcategory_3, "Cisco");
    }
}
