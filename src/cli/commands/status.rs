//! Store status command.

use console::style;

use crate::config::Settings;
use crate::repository::CsvStore;

/// Show row, uniqueness and completeness counts for the store.
pub fn cmd_status(settings: &Settings) -> anyhow::Result<()> {
    let path = settings.store_path();
    if !path.exists() {
        println!(
            "{} No store at {} (a crawl will create it)",
            style("!").yellow(),
            path.display()
        );
        return Ok(());
    }

    let store = CsvStore::inspect(&path)?;
    let stats = store.stats()?;

    println!("\n{}", style(format!("Store: {}", path.display())).bold());
    println!("{}", "-".repeat(40));
    println!("{:<20} {}", "Rows:", stats.rows);
    println!("{:<20} {}", "Unique URLs:", stats.unique_urls);
    println!("{:<20} {}", "Without title:", stats.rows_without_title);

    if stats.duplicate_urls.is_empty() {
        println!("{:<20} {}", "Duplicates:", style("none").green());
    } else {
        println!(
            "{:<20} {}",
            "Duplicates:",
            style(stats.duplicate_urls.len()).red()
        );
        for url in &stats.duplicate_urls {
            println!("  {} {}", style("✗").red(), url);
        }
    }
    Ok(())
}
