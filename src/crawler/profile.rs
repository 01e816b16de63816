//! Storefront selector profile.
//!
//! Every site-specific CSS selector lives here so the crawl algorithm stays
//! independent of any one storefront's markup. Defaults follow the
//! `data-testid` conventions of the storefront shelfcrawl was first built for.

use regex::Regex;
use scraper::Selector;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("invalid selector for `{field}`: {selector} ({reason})")]
    Selector {
        field: &'static str,
        selector: String,
        reason: String,
    },

    #[error("invalid item_link_pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Selectors and patterns describing one storefront.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteProfile {
    // Category pages
    /// Element whose presence means a category page has rendered.
    pub category_ready: String,
    /// Links in the horizontal quick-filter strip.
    pub quick_filter_links: String,
    /// Control revealing more quick-filter links.
    pub quick_filter_more: String,
    /// "See all" link of each listing section.
    pub see_all_links: String,
    /// The "more items from this category" panel.
    pub parent_panel: String,
    /// Item links inside the parent panel.
    pub parent_panel_items: String,
    /// Element at the end of the parent panel that triggers lazy loading.
    pub parent_panel_anchor: String,
    /// Item links in a leaf listing grid.
    pub leaf_items: String,
    /// Load-more button under a leaf listing grid.
    pub load_more: String,
    /// In-stock-only filter toggle.
    pub stock_toggle: String,

    // Item pages
    /// Element whose presence means an item page has rendered.
    pub item_ready: String,
    pub title: String,
    pub author: String,
    pub price: String,
    pub description: String,
    /// The active format chip's label.
    pub format: String,
    pub spec_label: String,
    pub spec_value: String,
    /// Structured-data blocks holding the breadcrumb list.
    pub structured_data: String,
    pub image_meta: String,

    /// Regex a URL path must match to count as an item detail page.
    pub item_link_pattern: String,
    /// Breadcrumb root entry to discard (compared case-insensitively).
    pub home_label: String,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            category_ready: "div[data-testid='categoryPageContainer']".to_string(),
            quick_filter_links: "div[data-testid='categoryQuickFilter'] a[href]".to_string(),
            quick_filter_more: "button[data-testid='categoryQuickFilterShowMore']".to_string(),
            see_all_links: concat!(
                "section[data-testid='categoryProductSection'] ",
                "a[data-testid='categoryProductSectionSeeAll']"
            )
            .to_string(),
            parent_panel: "div[data-testid='categoryParentProducts']".to_string(),
            parent_panel_items: "div[data-testid='categoryParentProducts'] a[href*='/products/']"
                .to_string(),
            parent_panel_anchor: "div[data-testid='categoryParentProductsEnd']".to_string(),
            leaf_items: "div[data-testid='productList'] a[href*='/products/']".to_string(),
            load_more: "button[data-testid='productListLoadMore']".to_string(),
            stock_toggle: "button[data-testid='filterAvailableStockToggle']".to_string(),

            item_ready: "div[data-testid='productDetailSpecificationContainer']".to_string(),
            title: "[data-testid='productDetailTitle']".to_string(),
            author: "[data-testid='productDetailAuthor']".to_string(),
            price: "[data-testid='productDetailFinalPrice']".to_string(),
            description: "[data-testid='productDetailDescriptionContainer']".to_string(),
            format: "[data-testid='productDetailVariantChips'] button.border-neutral-700 span"
                .to_string(),
            spec_label: "div[data-testid='productDetailSpecificationItemLabel']".to_string(),
            spec_value: "div[data-testid='productDetailSpecificationItemValue']".to_string(),
            structured_data: "script[type='application/ld+json']".to_string(),
            image_meta: "meta[property='og:image']".to_string(),

            item_link_pattern: "/products/[^/]+$".to_string(),
            home_label: "home".to_string(),
        }
    }
}

/// A [`SiteProfile`] with selectors parsed once up front.
#[derive(Debug, Clone)]
pub struct CompiledProfile {
    pub raw: SiteProfile,
    pub quick_filter_links: Selector,
    pub see_all_links: Selector,
    pub parent_panel: Selector,
    pub parent_panel_items: Selector,
    pub leaf_items: Selector,
    pub title: Selector,
    pub author: Selector,
    pub price: Selector,
    pub description: Selector,
    pub format: Selector,
    pub spec_label: Selector,
    pub spec_value: Selector,
    pub structured_data: Selector,
    pub image_meta: Selector,
    pub item_link: Regex,
}

fn parse(field: &'static str, selector: &str) -> Result<Selector, ProfileError> {
    Selector::parse(selector).map_err(|e| ProfileError::Selector {
        field,
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

impl SiteProfile {
    /// Parse every selector, failing on the first invalid one.
    pub fn compile(&self) -> Result<CompiledProfile, ProfileError> {
        // Selectors only handed to the browser still get validated here
        for (field, sel) in [
            ("category_ready", &self.category_ready),
            ("quick_filter_more", &self.quick_filter_more),
            ("parent_panel_anchor", &self.parent_panel_anchor),
            ("load_more", &self.load_more),
            ("stock_toggle", &self.stock_toggle),
            ("item_ready", &self.item_ready),
        ] {
            parse(field, sel)?;
        }

        Ok(CompiledProfile {
            raw: self.clone(),
            quick_filter_links: parse("quick_filter_links", &self.quick_filter_links)?,
            see_all_links: parse("see_all_links", &self.see_all_links)?,
            parent_panel: parse("parent_panel", &self.parent_panel)?,
            parent_panel_items: parse("parent_panel_items", &self.parent_panel_items)?,
            leaf_items: parse("leaf_items", &self.leaf_items)?,
            title: parse("title", &self.title)?,
            author: parse("author", &self.author)?,
            price: parse("price", &self.price)?,
            description: parse("description", &self.description)?,
            format: parse("format", &self.format)?,
            spec_label: parse("spec_label", &self.spec_label)?,
            spec_value: parse("spec_value", &self.spec_value)?,
            structured_data: parse("structured_data", &self.structured_data)?,
            image_meta: parse("image_meta", &self.image_meta)?,
            item_link: Regex::new(&self.item_link_pattern)?,
        })
    }
}

impl CompiledProfile {
    /// Whether `url` (absolute) looks like an item detail page.
    pub fn is_item_url(&self, url: &str) -> bool {
        let path = url::Url::parse(url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| url.to_string());
        self.item_link.is_match(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_profile_compiles() {
        let profile = SiteProfile::default().compile().unwrap();
        assert!(profile.is_item_url("https://shop.example/products/harry-potter"));
        assert!(!profile.is_item_url("https://shop.example/categories/buku"));
        assert!(!profile.is_item_url("https://shop.example/products/"));
    }

    #[test]
    fn invalid_selector_names_the_field() {
        let profile = SiteProfile {
            load_more: "button[".to_string(),
            ..Default::default()
        };
        let err = profile.compile().unwrap_err();
        assert!(err.to_string().contains("load_more"), "{}", err);
    }
}
