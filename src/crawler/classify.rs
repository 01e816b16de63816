//! Category page classification and link harvesting.

use std::collections::HashSet;

use scraper::{Html, Selector};

use super::driver::RenderedDocument;
use super::profile::CompiledProfile;
use crate::models::canonicalize;

/// Shape of a category page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Canonical child category URLs, in page order.
    pub child_categories: Vec<String>,
    /// Whether a "more items from this category" panel is present.
    pub parent_items_panel: bool,
}

impl Classification {
    /// A leaf has neither children nor a parent-items panel.
    pub fn is_leaf(&self) -> bool {
        self.child_categories.is_empty() && !self.parent_items_panel
    }
}

/// Classify a rendered category page.
///
/// Child categories are the union of quick-filter links and per-section
/// "see all" links, deduplicated, with self-links and item links removed.
pub fn classify(doc: &RenderedDocument, profile: &CompiledProfile) -> Classification {
    let html = doc.parse();
    let self_url = canonicalize(&doc.url, &doc.url);

    let mut seen = HashSet::new();
    let mut child_categories = Vec::new();
    let candidates = links(&html, &profile.quick_filter_links, &doc.url)
        .into_iter()
        .chain(links(&html, &profile.see_all_links, &doc.url));

    for url in candidates {
        if Some(&url) == self_url.as_ref() || profile.is_item_url(&url) {
            continue;
        }
        if seen.insert(url.clone()) {
            child_categories.push(url);
        }
    }

    Classification {
        child_categories,
        parent_items_panel: html.select(&profile.parent_panel).next().is_some(),
    }
}

/// Canonical item URLs in the parent panel, deduplicated in page order.
pub fn parent_panel_links(doc: &RenderedDocument, profile: &CompiledProfile) -> Vec<String> {
    item_links(doc, &profile.parent_panel_items, profile)
}

/// Canonical item URLs in a leaf grid, deduplicated in page order.
pub fn leaf_links(doc: &RenderedDocument, profile: &CompiledProfile) -> Vec<String> {
    item_links(doc, &profile.leaf_items, profile)
}

fn item_links(
    doc: &RenderedDocument,
    selector: &Selector,
    profile: &CompiledProfile,
) -> Vec<String> {
    let html = doc.parse();
    let mut seen = HashSet::new();
    links(&html, selector, &doc.url)
        .into_iter()
        .filter(|url| profile.is_item_url(url))
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// Canonicalised `href`s of every element matching `selector`.
fn links(html: &Html, selector: &Selector, base: &str) -> Vec<String> {
    html.select(selector)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| canonicalize(base, href))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::profile::SiteProfile;

    fn profile() -> CompiledProfile {
        SiteProfile::default().compile().unwrap()
    }

    const BASE: &str = "https://shop.example/categories/buku";

    #[test]
    fn unions_quick_filters_and_see_all_links() {
        let html = r#"
<div data-testid="categoryPageContainer">
  <div data-testid="categoryQuickFilter">
    <a href="/categories/buku/fiksi">Fiksi</a>
    <a href="/categories/buku/komik?sort=new">Komik</a>
    <a href="/categories/buku">Semua</a>
    <a href="/products/promo-book">Promo</a>
  </div>
  <section data-testid="categoryProductSection">
    <a data-testid="categoryProductSectionSeeAll" href="/categories/buku/komik">Lihat semua</a>
    <a data-testid="categoryProductSectionSeeAll"
       href="https://shop.example/categories/buku/anak/">Lihat semua</a>
  </section>
</div>"#;
        let doc = RenderedDocument::new(BASE, html);
        let class = classify(&doc, &profile());

        assert_eq!(
            class.child_categories,
            vec![
                "https://shop.example/categories/buku/fiksi",
                "https://shop.example/categories/buku/komik",
                "https://shop.example/categories/buku/anak",
            ]
        );
        assert!(!class.parent_items_panel);
        assert!(!class.is_leaf());
    }

    #[test]
    fn parent_panel_and_children_coexist() {
        let html = r#"
<div data-testid="categoryQuickFilter"><a href="/categories/buku/fiksi">Fiksi</a></div>
<div data-testid="categoryParentProducts">
  <a href="/products/a">A</a>
  <a href="/products/b?from=panel">B</a>
  <a href="/products/a#reviews">A again</a>
</div>"#;
        let doc = RenderedDocument::new(BASE, html);
        let profile = profile();
        let class = classify(&doc, &profile);

        assert!(class.parent_items_panel);
        assert_eq!(class.child_categories.len(), 1);
        assert_eq!(
            parent_panel_links(&doc, &profile),
            vec![
                "https://shop.example/products/a",
                "https://shop.example/products/b",
            ]
        );
    }

    #[test]
    fn bare_listing_is_leaf() {
        let html = r#"
<div data-testid="productList">
  <a href="/products/x">X</a>
  <a href="/categories/elsewhere">not an item</a>
</div>"#;
        let doc = RenderedDocument::new(BASE, html);
        let profile = profile();
        let class = classify(&doc, &profile);

        assert!(class.is_leaf());
        assert_eq!(leaf_links(&doc, &profile), vec!["https://shop.example/products/x"]);
    }

    #[test]
    fn empty_page_is_leaf_with_no_items() {
        let doc = RenderedDocument::new(BASE, "<html><body></body></html>");
        let profile = profile();
        assert!(classify(&doc, &profile).is_leaf());
        assert!(leaf_links(&doc, &profile).is_empty());
    }
}
