//! Depth-first category graph walk.

use std::collections::VecDeque;

use tracing::{debug, info, warn};

use super::classify::{classify, leaf_links, parent_panel_links};
use super::driver::{Expansion, FetchError, PageDriver, RenderedDocument};
use super::ledger::{DedupLedger, VisitedSet};
use super::pagination::exhaust;
use super::persist::{BatchOutcome, BatchWriter};
use super::profile::CompiledProfile;
use super::{CancelFlag, CrawlOptions};
use crate::models::{canonicalize, CategoryNode, SourcePanel};
use crate::repository::ItemSink;

/// Totals for one crawl run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub nodes_visited: usize,
    /// Categories abandoned after every fetch attempt failed.
    pub nodes_failed: usize,
    /// Failed fetches that were queued for another attempt.
    pub node_retries: usize,
    pub items_added: usize,
    pub items_skipped: usize,
    pub records_backed_up: usize,
    pub records_lost: usize,
    pub interrupted: bool,
    pub limit_reached: bool,
}

impl CrawlSummary {
    fn absorb(&mut self, batch: &BatchOutcome) {
        self.items_added += batch.added;
        self.items_skipped += batch.skipped;
        self.records_backed_up += batch.backed_up;
        self.records_lost += batch.lost;
        self.interrupted |= batch.interrupted;
        self.limit_reached |= batch.limit_reached;
    }

    fn should_stop(&self) -> bool {
        self.interrupted || self.limit_reached
    }
}

/// One crawl run: the visited set, the ledger and the writer it feeds.
pub struct Crawler<S> {
    profile: CompiledProfile,
    options: CrawlOptions,
    visited: VisitedSet,
    ledger: DedupLedger,
    writer: BatchWriter<S>,
    cancel: CancelFlag,
}

impl<S: ItemSink> Crawler<S> {
    pub fn new(
        profile: CompiledProfile,
        options: CrawlOptions,
        ledger: DedupLedger,
        writer: BatchWriter<S>,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            profile,
            options,
            visited: VisitedSet::new(),
            ledger,
            writer,
            cancel,
        }
    }

    pub fn ledger(&self) -> &DedupLedger {
        &self.ledger
    }

    pub fn visited(&self) -> &VisitedSet {
        &self.visited
    }

    pub fn writer(&self) -> &BatchWriter<S> {
        &self.writer
    }

    /// Walk the category graph reachable from `seed`.
    ///
    /// Each category is fetched and expanded at most once per run, except
    /// that a node whose fetch failed is retried later, up to
    /// `max_node_attempts` in total.
    pub async fn walk<D: PageDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        seed: &str,
    ) -> CrawlSummary {
        let mut summary = CrawlSummary::default();
        let seed = canonicalize(seed, seed).unwrap_or_else(|| seed.to_string());

        // Front is the top of the stack; retries go to the back.
        let mut worklist: VecDeque<String> = VecDeque::from([seed]);

        while let Some(url) = worklist.pop_front() {
            if self.cancel.is_cancelled() {
                summary.interrupted = true;
                break;
            }
            if self.writer.limit_reached() {
                summary.limit_reached = true;
                break;
            }
            if !self.visited.mark(&url) {
                debug!("Already visited {}", url);
                continue;
            }

            let node = CategoryNode::new(url.as_str());
            match self.visit(driver, &node, &mut summary).await {
                Ok(children) => {
                    summary.nodes_visited += 1;
                    for child in children.into_iter().rev() {
                        if !self.visited.contains(&child) {
                            worklist.push_front(child);
                        }
                    }
                }
                Err(e) => {
                    let attempts = self.visited.attempts(&url);
                    if attempts < self.options.max_node_attempts {
                        warn!(
                            "Failed to load category {} (attempt {}): {}; will retry",
                            url, attempts, e
                        );
                        summary.node_retries += 1;
                        self.visited.forget(&url);
                        worklist.push_back(url);
                    } else {
                        warn!(
                            "Giving up on category {} after {} attempts: {}",
                            url, attempts, e
                        );
                        summary.nodes_failed += 1;
                    }
                }
            }

            if summary.should_stop() {
                break;
            }
        }

        if self.cancel.is_cancelled() {
            summary.interrupted = true;
        }
        summary
    }

    /// Process one node and return its child categories in page order.
    ///
    /// Only the initial fetch fails the node. Expansion errors fall back to
    /// the last good snapshot.
    async fn visit<D: PageDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        node: &CategoryNode,
        summary: &mut CrawlSummary,
    ) -> Result<Vec<String>, FetchError> {
        info!("Visiting category {}", node);
        let opened = driver.open(node.url(), &self.profile.raw.category_ready).await?;

        let expanded = self
            .expand_or_keep(
                driver,
                Expansion::click(self.profile.raw.quick_filter_more.clone()),
                &self.profile.raw.quick_filter_links,
                opened,
            )
            .await;
        let doc = with_url(expanded, node);

        let class = classify(&doc, &self.profile);
        debug!(
            "{}: {} children, parent panel: {}",
            node,
            class.child_categories.len(),
            class.parent_items_panel
        );

        if class.parent_items_panel {
            let panel = self
                .expand_or_keep(
                    driver,
                    Expansion::scroll_to(self.profile.raw.parent_panel_anchor.clone()),
                    &self.profile.raw.parent_panel_items,
                    doc.clone(),
                )
                .await;
            let links = parent_panel_links(&with_url(panel, node), &self.profile);
            info!("{}: {} items in parent panel", node, links.len());
            self.persist(driver, &links, node, SourcePanel::Parent, summary)
                .await;
        }

        if class.is_leaf() && !summary.should_stop() {
            match driver.switch_off(&self.profile.raw.stock_toggle).await {
                Ok(true) => {
                    debug!("{}: stock filter switched off", node);
                    if !self.options.settle().is_zero() {
                        tokio::time::sleep(self.options.settle()).await;
                    }
                }
                Ok(false) => {}
                Err(e) => warn!("{}: could not switch off stock filter: {}", node, e),
            }

            // Switching the filter can re-render the grid, so re-snapshot first
            let base = match driver.snapshot().await {
                Ok(d) => with_url(d, node),
                Err(_) => doc,
            };
            let listing = self
                .expand_or_keep(
                    driver,
                    Expansion::click(self.profile.raw.load_more.clone()),
                    &self.profile.raw.leaf_items,
                    base,
                )
                .await;
            let links = leaf_links(&with_url(listing, node), &self.profile);
            if links.is_empty() {
                info!("{}: no items or subcategories found", node);
            } else {
                info!("{}: {} items in listing", node, links.len());
            }
            self.persist(driver, &links, node, SourcePanel::Leaf, summary)
                .await;
        }

        Ok(class.child_categories)
    }

    /// Exhaust `action`, falling back to `fallback` if the page stops
    /// responding part-way.
    async fn expand_or_keep<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        action: Expansion,
        count_selector: &str,
        fallback: RenderedDocument,
    ) -> RenderedDocument {
        match exhaust(
            driver,
            &action,
            count_selector,
            self.options.settle(),
            self.options.max_expansions,
        )
        .await
        {
            Ok(done) => {
                debug!(
                    "'{}': {} expansions, stopped: {:?}",
                    action.target(),
                    done.expansions,
                    done.stop
                );
                done.document
            }
            Err(e) => {
                warn!(
                    "Expansion '{}' failed: {}; using last snapshot",
                    action.target(),
                    e
                );
                fallback
            }
        }
    }

    async fn persist<D: PageDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        links: &[String],
        node: &CategoryNode,
        panel: SourcePanel,
        summary: &mut CrawlSummary,
    ) {
        let outcome = self
            .writer
            .persist_batch(
                driver,
                &self.profile,
                &mut self.ledger,
                links,
                node,
                panel,
                &self.cancel,
            )
            .await;
        summary.absorb(&outcome);
    }
}

/// Snapshots report the live URL, which may carry tracking parameters; link
/// resolution and self-link checks use the node's canonical URL instead.
fn with_url(mut doc: RenderedDocument, node: &CategoryNode) -> RenderedDocument {
    doc.url = node.url().to_string();
    doc
}
