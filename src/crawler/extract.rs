//! Item detail page extraction.

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use super::driver::PageDriver;
use super::profile::CompiledProfile;
use crate::models::{ItemRecord, NOT_FOUND};

/// Fetch `url` and extract its record.
///
/// Never fails: a page that cannot be fetched yields a record holding only
/// the URL, with every other attribute set to the sentinel.
pub async fn extract<D: PageDriver + ?Sized>(
    driver: &mut D,
    url: &str,
    profile: &CompiledProfile,
    from_parent_panel: bool,
) -> ItemRecord {
    match driver.open(url, &profile.raw.item_ready).await {
        Ok(doc) => parse_item_page(&doc.html, url, profile, from_parent_panel),
        Err(e) => {
            warn!("Failed to extract {}: {}", url, e);
            ItemRecord::not_found(url)
        }
    }
}

/// Extract a record from rendered item page HTML.
///
/// With `from_parent_panel`, the first category level the breadcrumb left
/// unset is filled with the "Other" marker.
pub fn parse_item_page(
    html: &str,
    url: &str,
    profile: &CompiledProfile,
    from_parent_panel: bool,
) -> ItemRecord {
    let doc = Html::parse_document(html);
    let mut record = ItemRecord::not_found(url);

    if let Some(v) = first_text(&doc, &profile.title) {
        record.title = v;
    }
    if let Some(v) = first_text(&doc, &profile.author) {
        record.author = v;
    }
    if let Some(v) = first_text(&doc, &profile.price) {
        record.price = v;
    }
    if let Some(v) = first_text(&doc, &profile.format) {
        record.format = v;
    }
    if let Some(v) = doc.select(&profile.description).next().map(block_text) {
        if !v.is_empty() {
            record.description = v;
        }
    }

    if let Some(image) = doc
        .select(&profile.image_meta)
        .find_map(|el| el.value().attr("content"))
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        record.image_url = image.to_string();
    }

    let names = breadcrumb_names(&doc, &profile.structured_data, &profile.raw.home_label);
    record.set_category_path(&names);

    for (label, value) in spec_pairs(&doc, profile) {
        if !record.set_spec_field(&label, &value) {
            debug!("Ignoring specification '{}' on {}", label, url);
        }
    }

    if from_parent_panel {
        record.backfill_other_category();
    }

    record
}

/// Trimmed text of the first match, if non-empty.
fn first_text(doc: &Html, selector: &Selector) -> Option<String> {
    doc.select(selector)
        .next()
        .map(inline_text)
        .filter(|s| !s.is_empty())
}

/// Element text with whitespace runs collapsed to single spaces.
fn inline_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Element text with one line per non-blank text node.
fn block_text(el: ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Category names from the first JSON-LD `BreadcrumbList`.
///
/// The `home_label` root entry and the trailing entry (the item itself) are
/// dropped.
fn breadcrumb_names(doc: &Html, selector: &Selector, home_label: &str) -> Vec<String> {
    for script in doc.select(selector) {
        let raw: String = script.text().collect();
        let value: serde_json::Value = match serde_json::from_str(raw.trim()) {
            Ok(v) => v,
            Err(e) => {
                debug!("Skipping unparsable structured data: {}", e);
                continue;
            }
        };

        if let Some(list) = find_breadcrumb(&value) {
            let mut names: Vec<String> = list
                .get("itemListElement")
                .and_then(|v| v.as_array())
                .map(|items| {
                    let mut items: Vec<&serde_json::Value> = items.iter().collect();
                    items.sort_by_key(|i| i.get("position").and_then(|p| p.as_u64()).unwrap_or(0));
                    items
                        .into_iter()
                        .filter_map(|i| {
                            i.get("name")
                                .or_else(|| i.get("item").and_then(|it| it.get("name")))
                                .and_then(|n| n.as_str())
                        })
                        .map(str::trim)
                        .filter(|n| !n.is_empty() && !n.eq_ignore_ascii_case(home_label))
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            names.pop();
            return names;
        }
    }
    Vec::new()
}

/// Locate a `BreadcrumbList` object at the top level, in an array, or in `@graph`.
fn find_breadcrumb(value: &serde_json::Value) -> Option<&serde_json::Value> {
    match value {
        serde_json::Value::Array(items) => items.iter().find_map(find_breadcrumb),
        serde_json::Value::Object(map) => {
            if map.get("@type").and_then(|t| t.as_str()) == Some("BreadcrumbList") {
                return Some(value);
            }
            map.get("@graph").and_then(find_breadcrumb)
        }
        _ => None,
    }
}

/// Specification label/value pairs.
///
/// Each label pairs with the next sibling matching the value selector; pages
/// without that structure fall back to pairing labels and values by order.
fn spec_pairs(doc: &Html, profile: &CompiledProfile) -> Vec<(String, String)> {
    let labels: Vec<ElementRef<'_>> = doc.select(&profile.spec_label).collect();
    let mut pairs = Vec::with_capacity(labels.len());
    let mut unpaired = false;

    for label in &labels {
        let value = label
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|sib| profile.spec_value.matches(sib));
        match value {
            Some(value) => pairs.push((inline_text(*label), inline_text(value))),
            None => unpaired = true,
        }
    }

    if unpaired {
        let values: Vec<ElementRef<'_>> = doc.select(&profile.spec_value).collect();
        if values.len() == labels.len() {
            pairs = labels
                .iter()
                .zip(values.iter())
                .map(|(l, v)| (inline_text(*l), inline_text(*v)))
                .collect();
        }
    }

    pairs.retain(|(label, value)| !label.is_empty() && !value.is_empty() && value != NOT_FOUND);
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::driver::{Expansion, FetchError, RenderedDocument};
    use crate::crawler::profile::SiteProfile;
    use crate::models::OTHER_CATEGORY;
    use async_trait::async_trait;

    fn profile() -> CompiledProfile {
        SiteProfile::default().compile().unwrap()
    }

    const URL: &str = "https://shop.example/products/harry-potter";

    const PAGE: &str = r#"<html><head>
<meta property="og:image" content="https://cdn.example/hp.jpg">
<script type="application/ld+json">{"@type": "Product", "name": "Harry Potter"}</script>
<script type="application/ld+json">
{"@context": "https://schema.org", "@type": "BreadcrumbList", "itemListElement": [
  {"@type": "ListItem", "position": 1, "name": "Home"},
  {"@type": "ListItem", "position": 2, "name": "Buku"},
  {"@type": "ListItem", "position": 3, "name": "Fiksi"},
  {"@type": "ListItem", "position": 4, "name": "Harry Potter"}
]}
</script>
</head><body>
<h1 data-testid="productDetailTitle">  Harry Potter and the
   Philosopher's Stone </h1>
<a data-testid="productDetailAuthor">J.K. Rowling</a>
<span data-testid="productDetailFinalPrice">Rp 250.000</span>
<div data-testid="productDetailVariantChips">
  <button class="border-neutral-200"><span>Soft Cover</span></button>
  <button class="border-neutral-700"><span>Hard Cover</span></button>
</div>
<div data-testid="productDetailDescriptionContainer"
  ><p>First paragraph.</p><p>Second paragraph.</p></div>
<div data-testid="productDetailSpecificationContainer">
  <div><div data-testid="productDetailSpecificationItemLabel">Penerbit</div>
       <div data-testid="productDetailSpecificationItemValue">Gramedia</div></div>
  <div><div data-testid="productDetailSpecificationItemLabel">ISBN</div>
       <div data-testid="productDetailSpecificationItemValue">9786020000000</div></div>
  <div><div data-testid="productDetailSpecificationItemLabel">Halaman</div>
       <div data-testid="productDetailSpecificationItemValue">368</div></div>
  <div><div data-testid="productDetailSpecificationItemLabel">Warehouse</div>
       <div data-testid="productDetailSpecificationItemValue">Jakarta</div></div>
</div>
</body></html>"#;

    #[test]
    fn extracts_all_present_fields() {
        let record = parse_item_page(PAGE, URL, &profile(), false);

        assert_eq!(record.item_url, URL);
        assert_eq!(record.title, "Harry Potter and the Philosopher's Stone");
        assert_eq!(record.author, "J.K. Rowling");
        assert_eq!(record.price, "Rp 250.000");
        assert_eq!(record.format, "Hard Cover");
        assert_eq!(record.description, "First paragraph.\nSecond paragraph.");
        assert_eq!(record.image_url, "https://cdn.example/hp.jpg");
        assert_eq!(record.publisher, "Gramedia");
        assert_eq!(record.isbn, "9786020000000");
        assert_eq!(record.page_count, "368");
        assert_eq!(record.category_path(), ["Buku", "Fiksi", NOT_FOUND, NOT_FOUND]);
    }

    #[test]
    fn missing_fields_hold_the_sentinel() {
        let record = parse_item_page(PAGE, URL, &profile(), false);
        for value in [
            &record.language,
            &record.publish_date,
            &record.length,
            &record.width,
            &record.weight,
        ] {
            assert_eq!(value, NOT_FOUND);
        }

        let empty = parse_item_page("<html></html>", URL, &profile(), false);
        assert_eq!(empty, ItemRecord::not_found(URL));
    }

    #[test]
    fn parent_panel_items_get_other_below_breadcrumb() {
        let record = parse_item_page(PAGE, URL, &profile(), true);
        assert_eq!(
            record.category_path(),
            ["Buku", "Fiksi", OTHER_CATEGORY, NOT_FOUND]
        );
    }

    #[test]
    fn breadcrumb_inside_graph_is_found() {
        let html = r#"<script type="application/ld+json">
{"@graph": [{"@type": "WebPage"}, {"@type": "BreadcrumbList", "itemListElement": [
  {"position": 3, "item": {"name": "Komik"}},
  {"position": 1, "name": "home"},
  {"position": 2, "name": "Buku"},
  {"position": 4, "name": "One Piece 100"}
]}]}</script>"#;
        let record = parse_item_page(html, URL, &profile(), false);
        assert_eq!(record.category, "Buku");
        assert_eq!(record.subcategory_1, "Komik");
        assert_eq!(record.subcategory_2, NOT_FOUND);
    }

    struct Unreachable;

    #[async_trait]
    impl PageDriver for Unreachable {
        async fn open(
            &mut self,
            url: &str,
            selector: &str,
        ) -> Result<RenderedDocument, FetchError> {
            Err(FetchError::NotReady {
                url: url.to_string(),
                selector: selector.to_string(),
                waited: std::time::Duration::from_secs(15),
            })
        }
        async fn expand(&mut self, _: &Expansion) -> Result<bool, FetchError> {
            Ok(false)
        }
        async fn count(&mut self, _: &str) -> Result<usize, FetchError> {
            Ok(0)
        }
        async fn snapshot(&mut self) -> Result<RenderedDocument, FetchError> {
            Err(FetchError::NoPage)
        }
        async fn switch_off(&mut self, _: &str) -> Result<bool, FetchError> {
            Ok(false)
        }
        async fn close(&mut self) {}
    }

    #[tokio::test]
    async fn fetch_failure_yields_sentinel_record() {
        let record = extract(&mut Unreachable, URL, &profile(), true).await;
        assert_eq!(record, ItemRecord::not_found(URL));
    }
}
