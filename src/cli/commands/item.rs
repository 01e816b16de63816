//! Single item extraction command.

use crate::config::Settings;
use crate::crawler::extract;
use crate::models::canonicalize;
use crate::scrapers::BrowserFetcher;

/// Extract one item page and print the record as JSON.
pub async fn cmd_item(
    settings: &Settings,
    url: &str,
    from_parent_panel: bool,
) -> anyhow::Result<()> {
    let profile = settings.site.compile()?;
    let url =
        canonicalize(url, url).ok_or_else(|| anyhow::anyhow!("Not an http(s) URL: {}", url))?;

    let mut fetcher = BrowserFetcher::new(settings.browser.clone());
    if let Err(e) = fetcher.ensure_browser().await {
        fetcher.close().await;
        return Err(e.context("Could not start the browser session"));
    }

    let record = extract(&mut fetcher, &url, &profile, from_parent_panel).await;
    fetcher.close().await;

    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
