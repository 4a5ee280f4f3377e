//! Session: one driver, one configuration, and the components built on them.
//!
//! A session owns its driver outright. Components borrow it for the length
//! of a call, so two sessions never share state and a session can move to
//! whichever task runs the scenario.

use tracing::{debug, info};

use crate::action::Actions;
use crate::collection::Collections;
use crate::config::EsperarConfig;
use crate::convergence::{Convergence, FirstVisibleText, Poller};
use crate::dialog::Dialogs;
use crate::driver::{scripts, UiDriver};
use crate::locator::{Locator, Target};
use crate::modal::Modals;
use crate::result::{EsperarError, EsperarResult};
use crate::wait::{WaitOptions, Waiter};

/// Execution context for one UI under test
#[derive(Debug)]
pub struct Session<D: UiDriver> {
    driver: D,
    config: EsperarConfig,
}

impl<D: UiDriver> Session<D> {
    /// Create a session after validating `config`
    pub fn new(driver: D, config: EsperarConfig) -> EsperarResult<Self> {
        config.validate()?;
        Ok(Self { driver, config })
    }

    /// Session with default timeouts
    #[must_use]
    pub fn with_defaults(driver: D) -> Self {
        Self {
            driver,
            config: EsperarConfig::default(),
        }
    }

    /// Underlying driver
    #[must_use]
    pub const fn driver(&self) -> &D {
        &self.driver
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &EsperarConfig {
        &self.config
    }

    /// Give the driver back
    #[must_use]
    pub fn into_driver(self) -> D {
        self.driver
    }

    fn wait_options(&self) -> WaitOptions {
        self.config.wait_options()
    }

    /// Waiter with the default timeout
    #[must_use]
    pub fn waiter(&self) -> Waiter<'_, D> {
        Waiter::new(&self.driver, self.wait_options())
    }

    /// Actions with the default timeout
    #[must_use]
    pub fn actions(&self) -> Actions<'_, D> {
        Actions::new(&self.driver, self.wait_options())
    }

    /// Collection readers
    #[must_use]
    pub fn collections(&self) -> Collections<'_, D> {
        Collections::new(&self.driver)
    }

    /// Poller with the convergence timeout
    #[must_use]
    pub fn poller(&self) -> Poller {
        Poller::new(self.config.convergence_options())
    }

    /// Modal dismissal with the configured appear/close timeouts
    #[must_use]
    pub fn modals(&self) -> Modals<'_, D> {
        Modals::new(
            &self.driver,
            self.config.options_with_timeout(self.config.modal_appear_timeout_ms),
            self.config.options_with_timeout(self.config.modal_close_timeout_ms),
            self.config.modal_settle(),
        )
    }

    /// Dialog helpers with the alert timeout
    #[must_use]
    pub fn dialogs(&self) -> Dialogs<'_, D> {
        Dialogs::new(&self.driver, self.config.alert_options())
    }

    /// Navigate, then wait for the page to load if it does so in time
    pub async fn open_url(&self, url: &str) -> EsperarResult<()> {
        self.driver.navigate(url).await?;
        info!(url, "navigated");
        if let Err(e) = self.wait_for_page_load().await {
            debug!(url, error = %e, "page load wait skipped");
        }
        Ok(())
    }

    /// Current URL
    pub async fn current_url(&self) -> EsperarResult<String> {
        self.driver.current_url().await
    }

    /// Wait until the URL contains `fragment`
    pub async fn wait_for_url_contains(&self, fragment: &str) -> EsperarResult<()> {
        let driver = &self.driver;
        self.waiter()
            .wait_until(&format!("url containing '{fragment}'"), move || async move {
                Ok::<_, EsperarError>(driver.current_url().await?.contains(fragment))
            })
            .await
    }

    /// Wait until `document.readyState` is "complete"
    pub async fn wait_for_page_load(&self) -> EsperarResult<()> {
        let driver = &self.driver;
        self.waiter()
            .wait_until("document ready", move || async move {
                let state = driver.execute_script(scripts::READY_STATE, &[]).await?;
                Ok::<_, EsperarError>(state.as_str() == Some("complete"))
            })
            .await
    }

    /// Click something that re-renders a collection and wait for the new render
    ///
    /// The baseline is the first visible text of `signal` before the click.
    pub async fn click_and_await_change(
        &self,
        click_target: impl Into<Target>,
        signal: &Locator,
    ) -> EsperarResult<Convergence> {
        let baseline = self.collections().baseline(signal).await;
        debug!(signal = %signal, baseline = %baseline, "baseline captured");

        self.actions().click(click_target).await?;

        if let Err(e) = self.wait_for_page_load().await {
            debug!(error = %e, "page load wait skipped");
        }

        let source = FirstVisibleText::new(&self.driver, signal.clone());
        self.poller().await_change(&baseline, &source).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::convergence::Signal;
    use crate::driver::{MockDriver, MockEffect, MockElement};
    use std::time::Duration;
    use tokio::time::Instant;

    fn names() -> Locator {
        Locator::css("#tbodyid .card-title a")
    }

    mod construction_tests {
        use super::*;

        #[test]
        fn test_session_is_send() {
            fn assert_send<T: Send>() {}
            assert_send::<Session<MockDriver>>();
        }

        #[tokio::test]
        async fn test_invalid_config_rejected() {
            let result = Session::new(MockDriver::new(), EsperarConfig::new().with_poll_interval(0));
            assert!(matches!(result, Err(EsperarError::InvalidConfig { .. })));
        }

        #[tokio::test]
        async fn test_components_use_config() {
            let session = Session::new(
                MockDriver::new(),
                EsperarConfig::new().with_timeout(3_000).with_poll_interval(100),
            )
            .unwrap();
            assert_eq!(session.waiter().options().timeout_ms, 3_000);
            assert_eq!(session.waiter().options().poll_interval_ms, 100);
            assert_eq!(session.config().convergence_timeout_ms, 8_000);
        }
    }

    mod navigation_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_open_url_waits_for_ready_state() {
            let driver = MockDriver::new().with_ready_at(Duration::from_millis(500));
            let session = Session::with_defaults(driver);

            let start = Instant::now();
            session.open_url("https://www.demoblaze.com/").await.unwrap();
            assert_eq!(start.elapsed(), Duration::from_millis(600));
            assert_eq!(session.current_url().await.unwrap(), "https://www.demoblaze.com/");
        }

        #[tokio::test(start_paused = true)]
        async fn test_open_url_tolerates_slow_load() {
            let driver = MockDriver::new().with_ready_at(Duration::from_secs(60));
            let session = Session::new(driver, EsperarConfig::new().with_timeout(1_000)).unwrap();
            assert!(session.open_url("https://www.demoblaze.com/").await.is_ok());
            assert!(session.wait_for_page_load().await.unwrap_err().is_timeout());
        }

        #[tokio::test(start_paused = true)]
        async fn test_wait_for_url_contains() {
            let cart = Locator::id("cartur");
            let driver = MockDriver::new()
                .with_elements(&cart, vec![MockElement::new("cart", "Cart")])
                .on_click(
                    "cart",
                    Duration::ZERO,
                    MockEffect::Navigate("https://www.demoblaze.com/cart.html".into()),
                );
            let session = Session::with_defaults(driver);

            session.actions().click(&cart).await.unwrap();
            session.wait_for_url_contains("cart.html").await.unwrap();
            let err = session
                .waiter()
                .with_timeout(400)
                .wait_until("never", || async { Ok::<_, EsperarError>(false) })
                .await
                .unwrap_err();
            assert!(err.to_string().contains("never"));
        }
    }

    mod click_and_await_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_next_page_converges() {
            let next = Locator::id("next2");
            let driver = MockDriver::new()
                .with_elements(&next, vec![MockElement::new("next", "Next")])
                .with_elements(&names(), vec![MockElement::new("n1", "Samsung galaxy s6")])
                .on_click(
                    "next",
                    Duration::from_millis(300),
                    MockEffect::Replace {
                        locator: names(),
                        elements: vec![MockElement::new("n10", "Apple monitor 24")],
                    },
                );
            let session = Session::with_defaults(driver);

            let result = session.click_and_await_change(&next, &names()).await.unwrap();
            assert_eq!(
                result,
                Convergence::Changed {
                    from: Signal::new("Samsung galaxy s6"),
                    to: Signal::new("Apple monitor 24"),
                }
            );
        }

        #[tokio::test(start_paused = true)]
        async fn test_unchanged_view_times_out() {
            let next = Locator::id("next2");
            let driver = MockDriver::new()
                .with_elements(&next, vec![MockElement::new("next", "Next")])
                .with_elements(&names(), vec![MockElement::new("n1", "Samsung galaxy s6")]);
            let session = Session::new(driver, EsperarConfig::new().with_convergence_timeout(2_000)).unwrap();

            let start = Instant::now();
            let err = session.click_and_await_change(&next, &names()).await.unwrap_err();
            assert!(err.is_timeout());
            assert_eq!(start.elapsed(), Duration::from_millis(2_000));
        }

        #[tokio::test(start_paused = true)]
        async fn test_missing_click_target_fails_before_polling() {
            let driver = MockDriver::new()
                .with_elements(&names(), vec![MockElement::new("n1", "Samsung galaxy s6")]);
            let session = Session::new(driver, EsperarConfig::new().with_timeout(1_000)).unwrap();

            let err = session
                .click_and_await_change(&Locator::id("next2"), &names())
                .await
                .unwrap_err();
            assert!(err.to_string().contains("clickable"));
        }
    }
}
