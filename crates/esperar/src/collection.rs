//! Reading ordered collections whose elements may be replaced mid-read.
//!
//! The count is taken from one query. Each index is then read through a
//! fresh query, so a handle from an earlier index (or an earlier render) is
//! never reused. A stale or vanished element gets exactly one re-read of the
//! same index; a second failure skips it.

use tracing::debug;

use crate::convergence::Signal;
use crate::driver::UiDriver;
use crate::locator::Locator;
use crate::product::Product;
use crate::result::EsperarResult;

/// Tolerant readers over one driver
#[derive(Debug)]
pub struct Collections<'a, D: UiDriver + ?Sized> {
    driver: &'a D,
}

impl<'a, D: UiDriver + ?Sized> Collections<'a, D> {
    /// Create over a driver
    #[must_use]
    pub const fn new(driver: &'a D) -> Self {
        Self { driver }
    }

    /// Trimmed texts of the visible matches, in document order
    pub async fn read_visible_texts(&self, locator: &Locator) -> Vec<String> {
        let count = match self.driver.find_all(locator).await {
            Ok(found) => found.len(),
            Err(e) => {
                debug!(locator = %locator, error = %e, "collection count failed");
                return Vec::new();
            }
        };

        let mut texts = Vec::with_capacity(count);
        for index in 0..count {
            if let Some(text) = self.read_index(locator, index).await {
                texts.push(text);
            }
        }
        debug!(locator = %locator, count, read = texts.len(), "collection read");
        texts
    }

    /// Two collections read independently and zipped to the shorter length
    pub async fn read_pairs(&self, first: &Locator, second: &Locator) -> Vec<(String, String)> {
        let left = self.read_visible_texts(first).await;
        let right = self.read_visible_texts(second).await;
        if left.len() != right.len() {
            debug!(
                first = %first,
                second = %second,
                left = left.len(),
                right = right.len(),
                "pair lengths differ, truncating"
            );
        }
        left.into_iter().zip(right).collect()
    }

    /// Product listing from parallel name and price collections
    pub async fn read_products(&self, names: &Locator, prices: &Locator) -> Vec<Product> {
        self.read_pairs(names, prices)
            .await
            .iter()
            .map(|(name, price)| Product::new(name, price))
            .collect()
    }

    /// Text of the first visible match, or the empty signal
    ///
    /// Any read failure is returned as-is so the caller can treat an
    /// invalidated element as evidence that the view changed.
    pub async fn first_visible(&self, locator: &Locator) -> EsperarResult<Signal> {
        let count = self.driver.find_all(locator).await?.len();
        for index in 0..count {
            if let Some(text) = self.attempt(locator, index).await? {
                return Ok(Signal::new(text));
            }
        }
        Ok(Signal::empty())
    }

    /// Like [`Self::first_visible`], but never fails
    ///
    /// Invalidated indices are passed over; any other failure gives the
    /// empty signal.
    pub async fn baseline(&self, locator: &Locator) -> Signal {
        let count = match self.driver.find_all(locator).await {
            Ok(found) => found.len(),
            Err(e) => {
                debug!(locator = %locator, error = %e, "baseline count failed");
                return Signal::empty();
            }
        };

        for index in 0..count {
            match self.attempt(locator, index).await {
                Ok(Some(text)) => return Signal::new(text),
                Ok(None) => {}
                Err(e) if e.is_invalidation() => {
                    debug!(locator = %locator, index, "baseline index invalidated");
                }
                Err(e) => {
                    debug!(locator = %locator, error = %e, "baseline read failed");
                    return Signal::empty();
                }
            }
        }
        Signal::empty()
    }

    /// One index with a single re-read on invalidation; `None` means skip
    async fn read_index(&self, locator: &Locator, index: usize) -> Option<String> {
        match self.attempt(locator, index).await {
            Ok(text) => text,
            Err(e) if e.is_invalidation() => match self.attempt(locator, index).await {
                Ok(text) => text,
                Err(e) => {
                    debug!(locator = %locator, index, error = %e, "index skipped after retry");
                    None
                }
            },
            Err(e) => {
                debug!(locator = %locator, index, error = %e, "index skipped");
                None
            }
        }
    }

    /// Fresh query, then read the element at `index` if it is visible
    async fn attempt(&self, locator: &Locator, index: usize) -> EsperarResult<Option<String>> {
        let found = self.driver.find_all(locator).await?;
        let Some(element) = found.get(index) else {
            return Ok(None);
        };
        if !self.driver.is_displayed(element).await? {
            return Ok(None);
        }
        let text = self.driver.text(element).await?;
        Ok(Some(text.trim().to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::driver::{MockDriver, MockElement};
    use proptest::prelude::*;

    fn names() -> Locator {
        Locator::css("#tbodyid .card-title a").named("product names")
    }

    fn prices() -> Locator {
        Locator::css("#tbodyid h5").named("product prices")
    }

    fn listing() -> Vec<MockElement> {
        vec![
            MockElement::new("n1", " Samsung galaxy s6 "),
            MockElement::new("n2", "Nokia lumia 1520"),
            MockElement::new("n3", "Nexus 6"),
        ]
    }

    mod read_tests {
        use super::*;

        #[tokio::test]
        async fn test_reads_in_order_with_fresh_queries() {
            let driver = MockDriver::new().with_elements(&names(), listing());
            let reader = Collections::new(&driver);

            let texts = reader.read_visible_texts(&names()).await;
            assert_eq!(texts, vec!["Samsung galaxy s6", "Nokia lumia 1520", "Nexus 6"]);
            // one count query plus one per index
            assert_eq!(driver.query_count(&names()), 4);
        }

        #[tokio::test]
        async fn test_stale_once_is_reread() {
            let driver = MockDriver::new()
                .with_elements(&names(), listing())
                .with_stale_reads("n2", 1);
            let reader = Collections::new(&driver);

            let texts = reader.read_visible_texts(&names()).await;
            assert_eq!(texts, vec!["Samsung galaxy s6", "Nokia lumia 1520", "Nexus 6"]);
            assert_eq!(driver.query_count(&names()), 5);
        }

        #[tokio::test]
        async fn test_permanently_stale_is_skipped() {
            let driver = MockDriver::new()
                .with_elements(&names(), listing())
                .with_permanently_stale("n2");
            let reader = Collections::new(&driver);

            let texts = reader.read_visible_texts(&names()).await;
            assert_eq!(texts, vec!["Samsung galaxy s6", "Nexus 6"]);
        }

        #[tokio::test]
        async fn test_hidden_items_skipped() {
            let driver = MockDriver::new().with_elements(
                &names(),
                vec![
                    MockElement::new("n1", "Samsung galaxy s6").hidden(),
                    MockElement::new("n2", "Nokia lumia 1520"),
                ],
            );
            let reader = Collections::new(&driver);
            assert_eq!(reader.read_visible_texts(&names()).await, vec!["Nokia lumia 1520"]);
        }

        #[tokio::test]
        async fn test_empty_collection() {
            let driver = MockDriver::new();
            let reader = Collections::new(&driver);
            assert!(reader.read_visible_texts(&names()).await.is_empty());
        }

        #[tokio::test]
        async fn test_pairs_truncate_to_shorter() {
            let driver = MockDriver::new()
                .with_elements(&names(), listing())
                .with_elements(
                    &prices(),
                    vec![MockElement::new("c1", "$360"), MockElement::new("c2", "$820")],
                );
            let reader = Collections::new(&driver);

            let pairs = reader.read_pairs(&names(), &prices()).await;
            assert_eq!(pairs.len(), 2);
            assert_eq!(pairs[1], ("Nokia lumia 1520".to_string(), "$820".to_string()));

            let products = reader.read_products(&names(), &prices()).await;
            assert_eq!(products[0], Product::new("Samsung galaxy s6", "$360"));
        }
    }

    mod signal_tests {
        use super::*;

        #[tokio::test]
        async fn test_first_visible_skips_hidden() {
            let driver = MockDriver::new().with_elements(
                &names(),
                vec![
                    MockElement::new("n1", "Samsung galaxy s6").hidden(),
                    MockElement::new("n2", " Nokia lumia 1520 "),
                ],
            );
            let reader = Collections::new(&driver);
            let signal = reader.first_visible(&names()).await.unwrap();
            assert_eq!(signal.as_str(), "Nokia lumia 1520");
        }

        #[tokio::test]
        async fn test_first_visible_surfaces_invalidation() {
            let driver = MockDriver::new()
                .with_elements(&names(), listing())
                .with_stale_reads("n1", 1);
            let reader = Collections::new(&driver);
            assert!(reader.first_visible(&names()).await.unwrap_err().is_invalidation());
        }

        #[tokio::test]
        async fn test_baseline_passes_over_invalidated_index() {
            let driver = MockDriver::new()
                .with_elements(&names(), listing())
                .with_permanently_stale("n1");
            let reader = Collections::new(&driver);
            assert_eq!(reader.baseline(&names()).await.as_str(), "Nokia lumia 1520");
        }

        #[tokio::test]
        async fn test_baseline_empty_on_dialog() {
            let driver = MockDriver::new()
                .with_elements(&names(), listing())
                .with_alert_at(std::time::Duration::ZERO, "Product added");
            let reader = Collections::new(&driver);
            assert!(reader.baseline(&names()).await.is_empty());
        }
    }

    mod property_tests {
        use super::*;

        proptest! {
            #[test]
            fn prop_pairs_length_is_min(a in 0usize..6, b in 0usize..6) {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                    .unwrap();
                let pairs = runtime.block_on(async {
                    let driver = MockDriver::new()
                        .with_elements(
                            &names(),
                            (0..a).map(|i| MockElement::new(format!("n{i}"), format!("name {i}"))).collect(),
                        )
                        .with_elements(
                            &prices(),
                            (0..b).map(|i| MockElement::new(format!("p{i}"), format!("${i}"))).collect(),
                        );
                    Collections::new(&driver).read_pairs(&names(), &prices()).await
                });
                prop_assert_eq!(pairs.len(), a.min(b));
                for (i, (name, price)) in pairs.iter().enumerate() {
                    prop_assert_eq!(name, &format!("name {i}"));
                    prop_assert_eq!(price, &format!("${i}"));
                }
            }
        }
    }
}
