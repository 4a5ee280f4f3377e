//! Bounded waits against a live UI.
//!
//! Every wait computes one [`Deadline`] at entry and polls until its
//! condition holds or the deadline passes. Targets are re-resolved on every
//! tick; a locator is re-queried and only the first match in document order
//! is evaluated.
//!
//! Stale and vanished elements are expected while a view re-renders, so
//! those two failures are absorbed during polling. Anything else the driver
//! reports ends the wait immediately.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::driver::{ElementRef, UiDriver};
use crate::locator::{Locator, Target};
use crate::result::{EsperarError, EsperarResult};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default timeout for wait operations (15 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 15_000;

/// Default polling interval (200ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 200;

// =============================================================================
// CONDITION
// =============================================================================

/// What must hold for a wait to succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    /// The element exists
    Present,
    /// The element exists and is displayed
    Visible,
    /// The element is displayed and enabled
    Clickable,
}

impl Condition {
    /// Name used in logs and timeout errors
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Visible => "visible",
            Self::Clickable => "clickable",
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// WAIT OPTIONS
// =============================================================================

/// Options for wait operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitOptions {
    /// Create new wait options with defaults
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get poll interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Poll interval must be non-zero and no longer than the timeout
    pub fn validate(&self) -> EsperarResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(EsperarError::invalid_config("poll interval must be > 0"));
        }
        if self.poll_interval_ms > self.timeout_ms {
            return Err(EsperarError::invalid_config(format!(
                "poll interval {}ms exceeds timeout {}ms",
                self.poll_interval_ms, self.timeout_ms
            )));
        }
        Ok(())
    }
}

// =============================================================================
// DEADLINE
// =============================================================================

/// Absolute point in time after which a wait has failed
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Deadline `timeout` from now
    #[must_use]
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
        }
    }

    /// Time left, saturating at zero
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// True once no budget remains
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Sleep before the next tick: the poll interval, cut short by the deadline
    #[must_use]
    pub fn next_sleep(&self, poll_interval: Duration) -> Duration {
        poll_interval.min(self.remaining())
    }
}

// =============================================================================
// WAITER
// =============================================================================

/// Polls a driver until a condition holds
#[derive(Debug)]
pub struct Waiter<'a, D: UiDriver + ?Sized> {
    driver: &'a D,
    options: WaitOptions,
}

impl<'a, D: UiDriver + ?Sized> Waiter<'a, D> {
    /// Create a waiter over a driver
    #[must_use]
    pub const fn new(driver: &'a D, options: WaitOptions) -> Self {
        Self { driver, options }
    }

    /// Override the timeout for this waiter
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

    /// Current options
    #[must_use]
    pub const fn options(&self) -> WaitOptions {
        self.options
    }

    /// Wait until `condition` holds for `target` and return the element it held for
    pub async fn wait_for(
        &self,
        condition: Condition,
        target: impl Into<Target>,
    ) -> EsperarResult<ElementRef> {
        let target = target.into();
        let description = target.describe();
        let target = &target;
        self.poll(condition.as_str(), &description, move || {
            self.check(condition, target)
        })
        .await
    }

    /// Wait until visible
    pub async fn wait_visible(&self, target: impl Into<Target>) -> EsperarResult<ElementRef> {
        self.wait_for(Condition::Visible, target).await
    }

    /// Wait until visible and enabled
    pub async fn wait_clickable(&self, target: impl Into<Target>) -> EsperarResult<ElementRef> {
        self.wait_for(Condition::Clickable, target).await
    }

    /// Wait until present
    pub async fn wait_present(&self, target: impl Into<Target>) -> EsperarResult<ElementRef> {
        self.wait_for(Condition::Present, target).await
    }

    /// Presence wait reported as a boolean
    pub async fn element_exists(&self, locator: &Locator) -> bool {
        self.wait_present(locator).await.is_ok()
    }

    /// Visibility wait reported as a boolean
    pub async fn is_displayed(&self, target: impl Into<Target>) -> bool {
        match self.wait_visible(target).await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "is_displayed: not visible");
                false
            }
        }
    }

    /// Wait for an arbitrary predicate over the driver
    pub async fn wait_until<F, Fut>(&self, description: &str, mut predicate: F) -> EsperarResult<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = EsperarResult<bool>>,
    {
        self.poll("satisfied", description, move || {
            let check = predicate();
            async move { check.await.map(|holds| holds.then_some(())) }
        })
        .await
    }

    /// Evaluate `condition` once
    async fn check(&self, condition: Condition, target: &Target) -> EsperarResult<Option<ElementRef>> {
        let element = match target {
            Target::Locator(locator) => match self.driver.find_all(locator).await?.into_iter().next() {
                Some(element) => element,
                None => return Ok(None),
            },
            Target::Element(element) => element.clone(),
        };

        let holds = match condition {
            // A resolved handle is present as long as the driver still answers for it.
            Condition::Present => match target {
                Target::Locator(_) => true,
                Target::Element(_) => {
                    let _ = self.driver.is_displayed(&element).await?;
                    true
                }
            },
            Condition::Visible => self.driver.is_displayed(&element).await?,
            Condition::Clickable => {
                self.driver.is_displayed(&element).await? && self.driver.is_enabled(&element).await?
            }
        };

        Ok(holds.then_some(element))
    }

    /// Shared polling loop
    async fn poll<T, F, Fut>(&self, condition: &str, target: &str, mut attempt: F) -> EsperarResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = EsperarResult<Option<T>>>,
    {
        self.options.validate()?;
        let started = Instant::now();
        let deadline = Deadline::after(self.options.timeout());
        let mut ticks: u32 = 0;

        loop {
            ticks += 1;
            match attempt().await {
                Ok(Some(value)) => {
                    debug!(
                        target_desc = %target,
                        condition,
                        ticks,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "wait satisfied"
                    );
                    return Ok(value);
                }
                Ok(None) => {}
                Err(e) if e.is_invalidation() => {
                    debug!(target_desc = %target, error = %e, "transient failure while waiting");
                }
                Err(e) => return Err(e),
            }

            if deadline.is_expired() {
                debug!(
                    target_desc = %target,
                    condition,
                    ticks,
                    timeout_ms = self.options.timeout_ms,
                    "wait timed out"
                );
                return Err(EsperarError::Timeout {
                    condition: condition.to_string(),
                    target: target.to_string(),
                    ms: self.options.timeout_ms,
                });
            }

            tokio::time::sleep(deadline.next_sleep(self.options.poll_interval())).await;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::driver::{MockDriver, MockElement};

    fn login_button() -> Locator {
        Locator::id("login2").named("login button")
    }

    // =========================================================================
    // Condition / options
    // =========================================================================

    mod condition_tests {
        use super::*;

        #[test]
        fn test_condition_display() {
            assert_eq!(Condition::Present.to_string(), "present");
            assert_eq!(Condition::Visible.to_string(), "visible");
            assert_eq!(Condition::Clickable.to_string(), "clickable");
        }
    }

    mod wait_options_tests {
        use super::*;

        #[test]
        fn test_wait_options_default() {
            let opts = WaitOptions::default();
            assert_eq!(opts.timeout(), Duration::from_secs(15));
            assert_eq!(opts.poll_interval(), Duration::from_millis(200));
            assert!(opts.validate().is_ok());
        }

        #[test]
        fn test_wait_options_chained() {
            let opts = WaitOptions::new().with_timeout(8_000).with_poll_interval(100);
            assert_eq!(opts.timeout_ms, 8_000);
            assert_eq!(opts.poll_interval_ms, 100);
        }

        #[test]
        fn test_poll_longer_than_timeout_invalid() {
            let opts = WaitOptions::new().with_timeout(100);
            assert!(matches!(
                opts.validate(),
                Err(EsperarError::InvalidConfig { .. })
            ));
        }

        #[test]
        fn test_zero_poll_invalid() {
            assert!(WaitOptions::new().with_poll_interval(0).validate().is_err());
        }
    }

    mod deadline_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_remaining_saturates() {
            let deadline = Deadline::after(Duration::from_millis(300));
            assert_eq!(deadline.next_sleep(Duration::from_millis(200)), Duration::from_millis(200));

            tokio::time::sleep(Duration::from_millis(200)).await;
            assert_eq!(deadline.next_sleep(Duration::from_millis(200)), Duration::from_millis(100));

            tokio::time::sleep(Duration::from_millis(500)).await;
            assert!(deadline.is_expired());
            assert_eq!(deadline.remaining(), Duration::ZERO);
        }
    }

    // =========================================================================
    // Waiter
    // =========================================================================

    mod waiter_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_visible_after_delay() {
            let driver = MockDriver::new()
                .with_elements(&login_button(), vec![MockElement::new("b", "Log in").hidden()])
                .with_elements_at(
                    &login_button(),
                    Duration::from_millis(500),
                    vec![MockElement::new("b", "Log in")],
                );
            let waiter = Waiter::new(&driver, WaitOptions::new());

            let start = Instant::now();
            let el = waiter.wait_visible(&login_button()).await.unwrap();
            assert_eq!(el.id(), "b");
            // ticks at 0, 200, 400, 600
            assert_eq!(start.elapsed(), Duration::from_millis(600));
        }

        #[tokio::test(start_paused = true)]
        async fn test_timeout_not_before_deadline() {
            let driver = MockDriver::new();
            let waiter = Waiter::new(&driver, WaitOptions::new().with_timeout(1_000));

            let start = Instant::now();
            let err = waiter.wait_visible(&login_button()).await.unwrap_err();
            assert!(start.elapsed() >= Duration::from_millis(1_000));
            assert_eq!(
                err.to_string(),
                "Timed out after 1000ms waiting for login button (id=login2) to be visible"
            );
        }

        #[tokio::test(start_paused = true)]
        async fn test_last_sleep_is_cut_to_deadline() {
            let driver = MockDriver::new();
            let waiter = Waiter::new(
                &driver,
                WaitOptions::new().with_timeout(500).with_poll_interval(200),
            );

            let start = Instant::now();
            assert!(waiter.wait_present(&login_button()).await.is_err());
            assert_eq!(start.elapsed(), Duration::from_millis(500));
            // 0, 200, 400, 500
            assert_eq!(driver.query_count(&login_button()), 4);
        }

        #[tokio::test(start_paused = true)]
        async fn test_clickable_requires_enabled() {
            let driver = MockDriver::new()
                .with_elements(&login_button(), vec![MockElement::new("b", "Log in").disabled()])
                .with_elements_at(
                    &login_button(),
                    Duration::from_millis(300),
                    vec![MockElement::new("b", "Log in")],
                );
            let waiter = Waiter::new(&driver, WaitOptions::new());

            let start = Instant::now();
            assert!(waiter.wait_clickable(&login_button()).await.is_ok());
            assert_eq!(start.elapsed(), Duration::from_millis(400));
        }

        #[tokio::test(start_paused = true)]
        async fn test_stale_reads_are_absorbed() {
            let driver = MockDriver::new()
                .with_elements(&login_button(), vec![MockElement::new("b", "Log in")])
                .with_stale_reads("b", 2);
            let waiter = Waiter::new(&driver, WaitOptions::new());

            let start = Instant::now();
            assert!(waiter.wait_visible(&login_button()).await.is_ok());
            assert_eq!(start.elapsed(), Duration::from_millis(400));
        }

        #[tokio::test(start_paused = true)]
        async fn test_unexpected_dialog_propagates() {
            let driver = MockDriver::new()
                .with_elements(&login_button(), vec![MockElement::new("b", "Log in")])
                .with_alert_at(Duration::ZERO, "Sign up successful.");
            let waiter = Waiter::new(&driver, WaitOptions::new());

            let err = waiter.wait_visible(&login_button()).await.unwrap_err();
            assert!(matches!(err, EsperarError::UnexpectedDialog { .. }));
        }

        #[tokio::test(start_paused = true)]
        async fn test_element_target_goes_stale() {
            let driver = MockDriver::new()
                .with_elements(&login_button(), vec![MockElement::new("b", "Log in")])
                .with_elements_at(&login_button(), Duration::from_millis(100), vec![]);
            let waiter = Waiter::new(&driver, WaitOptions::new().with_timeout(1_000));

            let el = ElementRef::new("b");
            assert!(waiter.wait_present(&el).await.is_ok());

            tokio::time::sleep(Duration::from_millis(100)).await;
            let err = waiter.wait_present(&el).await.unwrap_err();
            assert!(err.is_timeout());
            assert!(err.to_string().contains("element b"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_boolean_forms() {
            let driver = MockDriver::new()
                .with_elements(&login_button(), vec![MockElement::new("b", "Log in").hidden()]);
            let waiter = Waiter::new(&driver, WaitOptions::new().with_timeout(400));

            assert!(waiter.element_exists(&login_button()).await);
            assert!(!waiter.is_displayed(&login_button()).await);
            assert!(!waiter.element_exists(&Locator::id("nava")).await);
        }

        #[tokio::test(start_paused = true)]
        async fn test_invalid_options_fail_fast() {
            let driver = MockDriver::new();
            let waiter = Waiter::new(&driver, WaitOptions::new().with_timeout(50));
            let err = waiter.wait_present(&login_button()).await.unwrap_err();
            assert!(matches!(err, EsperarError::InvalidConfig { .. }));
            assert_eq!(driver.query_count(&login_button()), 0);
        }

        #[tokio::test(start_paused = true)]
        async fn test_wait_until_url() {
            let driver = MockDriver::new();
            driver.navigate("https://www.demoblaze.com/").await.unwrap();
            let waiter = Waiter::new(&driver, WaitOptions::new().with_timeout(600));
            let d = &driver;

            let result = waiter
                .wait_until("url contains cart", move || async move {
                    Ok::<_, EsperarError>(d.current_url().await?.contains("cart"))
                })
                .await;
            assert!(result.unwrap_err().is_timeout());

            driver.navigate("https://www.demoblaze.com/cart.html").await.unwrap();
            assert!(waiter
                .wait_until("url contains cart", move || async move {
                    Ok::<_, EsperarError>(d.current_url().await?.contains("cart"))
                })
                .await
                .is_ok());
        }
    }
}
