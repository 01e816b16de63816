//! Crawl command.

use console::style;
use tracing::{info, warn};

use crate::config::Settings;
use crate::crawler::{BatchWriter, CancelFlag, CrawlSummary, Crawler, DedupLedger};
use crate::repository::{CsvStore, StoreMode};
use crate::scrapers::BrowserFetcher;

/// Crawl the category tree under `seed`.
pub async fn cmd_crawl(settings: &Settings, seed: &str) -> anyhow::Result<()> {
    settings.ensure_directories()?;
    let profile = settings.site.compile()?;

    let store_path = settings.store_path();
    let store = CsvStore::open(&store_path)?;
    match store.mode() {
        StoreMode::Created => println!(
            "{} Starting new store at {}",
            style("→").cyan(),
            store_path.display()
        ),
        StoreMode::Resumed { rows } => println!(
            "{} Resuming {} ({} rows)",
            style("→").cyan(),
            store_path.display(),
            rows
        ),
        StoreMode::Repaired {
            rows,
            dropped_bytes,
        } => println!(
            "{} Resuming {} ({} rows; cut {} bytes of an unfinished row)",
            style("→").cyan(),
            store_path.display(),
            rows,
            dropped_bytes
        ),
        StoreMode::Recreated { moved_to } => println!(
            "{} Store was unreadable; moved to {} and started fresh",
            style("!").yellow(),
            moved_to.display()
        ),
    }

    let ledger = DedupLedger::seed(&store);
    let writer = BatchWriter::new(
        store,
        settings.backup_dir(),
        &store_path,
        settings.crawl.flush_every,
        settings.crawl.max_items,
    );

    let mut fetcher = BrowserFetcher::new(settings.browser.clone());
    if let Err(e) = fetcher.ensure_browser().await {
        fetcher.close().await;
        return Err(e.context("Could not start the browser session"));
    }

    let cancel = CancelFlag::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received; finishing the current item");
                cancel.cancel();
            }
        })
    };

    info!("Crawling from {}", seed);
    let mut crawler = Crawler::new(profile, settings.crawl.clone(), ledger, writer, cancel);
    let summary = crawler.walk(&mut fetcher, seed).await;

    fetcher.close().await;
    interrupt.abort();

    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &CrawlSummary) {
    let headline = if summary.interrupted {
        style("Crawl interrupted").yellow().bold()
    } else if summary.limit_reached {
        style("Crawl stopped at item limit").yellow().bold()
    } else {
        style("Crawl complete").green().bold()
    };
    println!("\n{}", headline);
    println!("{}", "-".repeat(40));
    println!("{:<20} {}", "Categories:", summary.nodes_visited);
    if summary.nodes_failed > 0 {
        println!(
            "{:<20} {}",
            "Abandoned:",
            style(summary.nodes_failed).red()
        );
    }
    if summary.node_retries > 0 {
        println!("{:<20} {}", "Retried loads:", summary.node_retries);
    }
    println!("{:<20} {}", "New items:", style(summary.items_added).green());
    println!("{:<20} {}", "Already stored:", summary.items_skipped);
    if summary.records_backed_up > 0 {
        println!(
            "{:<20} {}",
            "Sent to backup:",
            style(summary.records_backed_up).yellow()
        );
    }
    if summary.records_lost > 0 {
        println!("{:<20} {}", "Lost:", style(summary.records_lost).red());
    }
}
