//! Exhaustive expansion of lazily-loaded listings.

use std::time::Duration;

use tracing::{debug, warn};

use super::driver::{Expansion, FetchError, PageDriver, RenderedDocument};

/// Outcome of one exhaustion run.
#[derive(Debug, Clone)]
pub struct Exhausted {
    /// Snapshot taken after the last expansion.
    pub document: RenderedDocument,
    /// Expansion actions that were actually performed.
    pub expansions: usize,
    /// Last measured item count, if any expansion ran.
    pub last_count: Option<usize>,
    pub stop: StopReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The control or anchor was absent or no longer actionable.
    ControlGone,
    /// Two consecutive non-zero measurements were equal.
    Stable,
    /// The action cap was reached.
    Capped,
}

/// Repeatedly expand the current page until it stops growing.
///
/// After each performed `action` the driver waits `settle` and counts
/// `count_selector`. The loop ends when the action reports nothing to act on,
/// when two consecutive counts are equal and non-zero, or after
/// `max_expansions` actions.
pub async fn exhaust<D: PageDriver + ?Sized>(
    driver: &mut D,
    action: &Expansion,
    count_selector: &str,
    settle: Duration,
    max_expansions: usize,
) -> Result<Exhausted, FetchError> {
    let mut previous: Option<usize> = None;
    let mut expansions = 0;
    let mut stop = StopReason::Capped;

    while expansions < max_expansions {
        if !driver.expand(action).await? {
            stop = StopReason::ControlGone;
            break;
        }
        expansions += 1;

        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
        }

        let count = driver.count(count_selector).await?;
        debug!(
            "Expansion {} on '{}': {} items",
            expansions,
            action.target(),
            count
        );

        if previous == Some(count) && count > 0 {
            stop = StopReason::Stable;
            break;
        }
        previous = Some(count);
    }

    if stop == StopReason::Capped {
        warn!(
            "Stopped expanding '{}' after {} actions (cap reached)",
            action.target(),
            expansions
        );
    }

    Ok(Exhausted {
        document: driver.snapshot().await?,
        expansions,
        last_count: previous,
        stop,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Yields one scripted count per expansion; the control disappears once
    /// the script is used up.
    struct Scripted {
        counts: Vec<usize>,
        performed: usize,
    }

    impl Scripted {
        fn new(counts: &[usize]) -> Self {
            Self {
                counts: counts.to_vec(),
                performed: 0,
            }
        }
    }

    #[async_trait]
    impl PageDriver for Scripted {
        async fn open(&mut self, url: &str, _: &str) -> Result<RenderedDocument, FetchError> {
            Ok(RenderedDocument::new(url, ""))
        }

        async fn expand(&mut self, _: &Expansion) -> Result<bool, FetchError> {
            if self.performed < self.counts.len() {
                self.performed += 1;
                Ok(true)
            } else {
                Ok(false)
            }
        }

        async fn count(&mut self, _: &str) -> Result<usize, FetchError> {
            Ok(self.counts[self.performed - 1])
        }

        async fn snapshot(&mut self) -> Result<RenderedDocument, FetchError> {
            let count = self.performed.checked_sub(1).map(|i| self.counts[i]);
            Ok(RenderedDocument::new("mem://page", format!("{:?}", count)))
        }

        async fn switch_off(&mut self, _: &str) -> Result<bool, FetchError> {
            Ok(false)
        }

        async fn close(&mut self) {}
    }

    async fn run(counts: &[usize], cap: usize) -> (Exhausted, usize) {
        let mut driver = Scripted::new(counts);
        let result = exhaust(
            &mut driver,
            &Expansion::click("button.more"),
            "a.item",
            Duration::ZERO,
            cap,
        )
        .await
        .unwrap();
        (result, driver.performed)
    }

    #[tokio::test]
    async fn stops_on_stable_count() {
        let (result, performed) = run(&[3, 3], 50).await;
        assert_eq!(performed, 2);
        assert_eq!(result.stop, StopReason::Stable);
        assert_eq!(result.last_count, Some(3));
        assert_eq!(result.document.html, "Some(3)");
    }

    #[tokio::test]
    async fn keeps_going_while_count_grows() {
        let (result, performed) = run(&[5, 8, 8], 50).await;
        assert_eq!(performed, 3);
        assert_eq!(result.expansions, 3);
        assert_eq!(result.stop, StopReason::Stable);
        assert_eq!(result.document.html, "Some(8)");
    }

    #[tokio::test]
    async fn zero_counts_never_count_as_stable() {
        let (result, performed) = run(&[0], 50).await;
        assert_eq!(performed, 1);
        assert_eq!(result.stop, StopReason::ControlGone);
        assert_eq!(result.document.html, "Some(0)");

        let (result, _) = run(&[0, 0, 0, 4], 50).await;
        assert_eq!(result.expansions, 4);
        assert_eq!(result.last_count, Some(4));
    }

    #[tokio::test]
    async fn absent_control_means_no_expansion() {
        let (result, performed) = run(&[], 50).await;
        assert_eq!(performed, 0);
        assert_eq!(result.stop, StopReason::ControlGone);
        assert_eq!(result.last_count, None);
        assert_eq!(result.document.html, "None");
    }

    #[tokio::test]
    async fn cap_bounds_a_control_that_never_settles() {
        let counts: Vec<usize> = (1..=100).collect();
        let (result, performed) = run(&counts, 10).await;
        assert_eq!(performed, 10);
        assert_eq!(result.stop, StopReason::Capped);
        assert_eq!(result.last_count, Some(10));
    }
}
