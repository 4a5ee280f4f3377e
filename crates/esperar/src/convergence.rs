//! Convergence polling: deciding that an asynchronous view change happened.
//!
//! A [`Signal`] is sampled before the commanding action (the baseline) and
//! then repeatedly afterwards. The view is considered refreshed when:
//!
//! 1. the baseline was empty and a sample is not (first population),
//! 2. a sample differs from the baseline, or
//! 3. sampling fails because the element went stale or vanished mid-read.
//!
//! Any other sampling failure is not evidence of a change; polling continues
//! until the deadline.
//!
//! The heuristic only looks at one value. A view that changes twice and
//! ends on the same first item looks unchanged.

use async_trait::async_trait;
use std::fmt;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::collection::Collections;
use crate::driver::UiDriver;
use crate::locator::Locator;
use crate::result::{EsperarError, EsperarResult};
use crate::wait::{Deadline, WaitOptions, Waiter};

/// Trimmed text sampled from the view; empty means unknown or absent
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Signal(String);

impl Signal {
    /// Create from raw text, trimming it
    #[must_use]
    pub fn new(text: impl AsRef<str>) -> Self {
        Self(text.as_ref().trim().to_string())
    }

    /// The unknown/absent signal
    #[must_use]
    pub const fn empty() -> Self {
        Self(String::new())
    }

    /// True for the unknown/absent signal
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Signal text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'", self.0)
    }
}

/// Something that can be sampled for a [`Signal`]
#[async_trait]
pub trait SignalSource: Send + Sync {
    /// Take one sample
    async fn sample(&self) -> EsperarResult<Signal>;

    /// Description for logs and timeout errors
    fn describe(&self) -> String;
}

/// Text of the first visible match of a collection
#[derive(Debug)]
pub struct FirstVisibleText<'a, D: UiDriver + ?Sized> {
    driver: &'a D,
    locator: Locator,
}

impl<'a, D: UiDriver + ?Sized> FirstVisibleText<'a, D> {
    /// Sample `locator` through `driver`
    #[must_use]
    pub const fn new(driver: &'a D, locator: Locator) -> Self {
        Self { driver, locator }
    }
}

#[async_trait]
impl<D: UiDriver + ?Sized> SignalSource for FirstVisibleText<'_, D> {
    async fn sample(&self) -> EsperarResult<Signal> {
        Collections::new(self.driver).first_visible(&self.locator).await
    }

    fn describe(&self) -> String {
        format!("first visible text of {}", self.locator)
    }
}

/// Attribute of the first match once it is visible (e.g. an active slide's `src`)
///
/// The visibility wait inside a sample is cut short by the poller's deadline.
#[derive(Debug)]
pub struct AttributeSignal<'a, D: UiDriver + ?Sized> {
    driver: &'a D,
    locator: Locator,
    attribute: String,
    options: WaitOptions,
}

impl<'a, D: UiDriver + ?Sized> AttributeSignal<'a, D> {
    /// Sample `attribute` of `locator`, waiting for visibility with `options`
    #[must_use]
    pub fn new(
        driver: &'a D,
        locator: Locator,
        attribute: impl Into<String>,
        options: WaitOptions,
    ) -> Self {
        Self {
            driver,
            locator,
            attribute: attribute.into(),
            options,
        }
    }
}

#[async_trait]
impl<D: UiDriver + ?Sized> SignalSource for AttributeSignal<'_, D> {
    async fn sample(&self) -> EsperarResult<Signal> {
        let element = Waiter::new(self.driver, self.options)
            .wait_visible(&self.locator)
            .await?;
        let value = self.driver.attribute(&element, &self.attribute).await?;
        Ok(Signal::new(value.unwrap_or_default()))
    }

    fn describe(&self) -> String {
        format!("attribute '{}' of {}", self.attribute, self.locator)
    }
}

/// How a change was detected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Convergence {
    /// Baseline was empty and the view now shows something
    Populated {
        /// First non-empty sample
        to: Signal,
    },
    /// Sample differs from the baseline
    Changed {
        /// Baseline
        from: Signal,
        /// Sample that differed
        to: Signal,
    },
    /// The sampled element was replaced while being read
    Invalidated,
}

/// Polls a [`SignalSource`] until it diverges from a baseline
#[derive(Debug, Clone, Copy)]
pub struct Poller {
    options: WaitOptions,
}

impl Poller {
    /// Create with explicit options
    #[must_use]
    pub const fn new(options: WaitOptions) -> Self {
        Self { options }
    }

    /// Override the timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.options = self.options.with_timeout(timeout_ms);
        self
    }

    /// Replace all options
    #[must_use]
    pub const fn with_options(mut self, options: WaitOptions) -> Self {
        self.options = options;
        self
    }

    /// Sample immediately, then once per poll interval, until the view changes
    pub async fn await_change(
        &self,
        baseline: &Signal,
        source: &dyn SignalSource,
    ) -> EsperarResult<Convergence> {
        self.options.validate()?;
        let started = Instant::now();
        let deadline = Deadline::after(self.options.timeout());
        let mut ticks: u32 = 0;

        loop {
            ticks += 1;
            // A sample may wait internally; it never runs past the deadline.
            let outcome = match tokio::time::timeout(deadline.remaining(), source.sample()).await {
                Ok(Ok(sample)) if baseline.is_empty() && !sample.is_empty() => {
                    Some(Convergence::Populated { to: sample })
                }
                Ok(Ok(sample)) if sample != *baseline => Some(Convergence::Changed {
                    from: baseline.clone(),
                    to: sample,
                }),
                Ok(Ok(_)) => None,
                Ok(Err(e)) if e.is_invalidation() => Some(Convergence::Invalidated),
                Ok(Err(e)) => {
                    debug!(source = %source.describe(), error = %e, "sample failed, still polling");
                    None
                }
                Err(_) => {
                    debug!(source = %source.describe(), ticks, "sample cut off at deadline");
                    None
                }
            };

            if let Some(convergence) = outcome {
                info!(
                    source = %source.describe(),
                    baseline = %baseline,
                    ticks,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    outcome = ?convergence,
                    "view converged"
                );
                return Ok(convergence);
            }

            if deadline.is_expired() {
                debug!(source = %source.describe(), ticks, "convergence timed out");
                return Err(EsperarError::Timeout {
                    condition: "signal change".to_string(),
                    target: source.describe(),
                    ms: self.options.timeout_ms,
                });
            }

            tokio::time::sleep(deadline.next_sleep(self.options.poll_interval())).await;
        }
    }
}
