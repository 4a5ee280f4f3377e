//! Alert dialog handling.
//!
//! Alerts block every element operation while open, so a read that trips
//! over one accepts it and reports "no text" instead of failing.

use tracing::{debug, info};

use crate::driver::UiDriver;
use crate::locator::Target;
use crate::result::{EsperarError, EsperarResult};
use crate::wait::{WaitOptions, Waiter};

/// Alert helpers over one driver
#[derive(Debug)]
pub struct Dialogs<'a, D: UiDriver + ?Sized> {
    driver: &'a D,
    options: WaitOptions,
}

impl<'a, D: UiDriver + ?Sized> Dialogs<'a, D> {
    /// Create over a driver
    #[must_use]
    pub const fn new(driver: &'a D, options: WaitOptions) -> Self {
        Self { driver, options }
    }

    /// Override the wait timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.options = self.options.with_timeout(timeout_ms);
        self
    }

    /// Replace all wait options
    #[must_use]
    pub const fn with_options(mut self, options: WaitOptions) -> Self {
        self.options = options;
        self
    }

    /// Wait for an alert, read it and accept it
    ///
    /// `None` when no alert opened in time or it could not be handled.
    pub async fn read_and_accept(&self) -> Option<String> {
        match self.try_read_and_accept().await {
            Ok(text) => {
                info!(text = %text, "alert accepted");
                Some(text)
            }
            Err(e) => {
                debug!(error = %e, "no alert handled");
                None
            }
        }
    }

    async fn try_read_and_accept(&self) -> EsperarResult<String> {
        let driver = self.driver;
        Waiter::new(driver, self.options)
            .wait_until("alert open", move || async move {
                Ok::<_, EsperarError>(driver.alert_text().await?.is_some())
            })
            .await?;
        let text = driver
            .alert_text()
            .await?
            .ok_or_else(|| EsperarError::driver("alert closed before it was read"))?;
        driver.accept_alert().await?;
        Ok(text)
    }

    /// Accept an open alert; true if one was accepted
    pub async fn accept_if_present(&self) -> bool {
        match self.driver.alert_text().await {
            Ok(Some(text)) => match self.driver.accept_alert().await {
                Ok(()) => {
                    info!(text = %text, "alert accepted");
                    true
                }
                Err(e) => {
                    debug!(error = %e, "alert accept failed");
                    false
                }
            },
            Ok(None) => false,
            Err(e) => {
                debug!(error = %e, "alert check failed");
                false
            }
        }
    }

    /// Trimmed text of a visible element, or `None`
    ///
    /// An alert that gets in the way is accepted and the read yields `None`.
    pub async fn text_if_visible(&self, target: impl Into<Target>) -> Option<String> {
        let target = target.into();
        let read = async {
            let element = Waiter::new(self.driver, self.options)
                .wait_visible(target.clone())
                .await?;
            self.driver.text(&element).await
        };

        match read.await {
            Ok(text) => {
                let text = text.trim();
                (!text.is_empty()).then(|| text.to_string())
            }
            Err(EsperarError::UnexpectedDialog { text }) => {
                info!(target_desc = %target, dialog = %text, "unexpected alert accepted");
                if let Err(e) = self.driver.accept_alert().await {
                    debug!(error = %e, "alert accept failed");
                }
                None
            }
            Err(e) => {
                debug!(target_desc = %target, error = %e, "text_if_visible: no text");
                None
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::driver::{MockDriver, MockElement};
    use crate::locator::Locator;
    use std::time::Duration;
    use tokio::time::Instant;

    fn welcome() -> Locator {
        Locator::id("nameofuser").named("welcome text")
    }

    fn dialogs(driver: &MockDriver) -> Dialogs<'_, MockDriver> {
        Dialogs::new(driver, WaitOptions::new().with_timeout(5_000))
    }

    mod read_and_accept_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_alert_appears_later() {
            let driver = MockDriver::new().with_alert_at(Duration::from_millis(700), "Sign up successful.");

            let start = Instant::now();
            let text = dialogs(&driver).read_and_accept().await;
            assert_eq!(text.as_deref(), Some("Sign up successful."));
            assert_eq!(start.elapsed(), Duration::from_millis(800));
            assert!(driver.alert_text().await.unwrap().is_none());
        }

        #[tokio::test(start_paused = true)]
        async fn test_no_alert_is_none() {
            let driver = MockDriver::new();
            let start = Instant::now();
            assert_eq!(dialogs(&driver).with_timeout(1_000).read_and_accept().await, None);
            assert_eq!(start.elapsed(), Duration::from_millis(1_000));
        }

        #[tokio::test(start_paused = true)]
        async fn test_accept_if_present() {
            let driver = MockDriver::new().with_alert_at(Duration::ZERO, "Product added.");
            assert!(dialogs(&driver).accept_if_present().await);
            assert!(!dialogs(&driver).accept_if_present().await);
        }
    }

    mod text_if_visible_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_visible_text() {
            let driver = MockDriver::new()
                .with_elements(&welcome(), vec![MockElement::new("w", " Welcome pavanol ")]);
            assert_eq!(
                dialogs(&driver).text_if_visible(&welcome()).await.as_deref(),
                Some("Welcome pavanol")
            );
        }

        #[tokio::test(start_paused = true)]
        async fn test_blank_text_is_none() {
            let driver = MockDriver::new().with_elements(&welcome(), vec![MockElement::new("w", "  ")]);
            assert_eq!(dialogs(&driver).text_if_visible(&welcome()).await, None);
        }

        #[tokio::test(start_paused = true)]
        async fn test_unexpected_alert_is_accepted() {
            let driver = MockDriver::new()
                .with_elements(&welcome(), vec![MockElement::new("w", "Welcome pavanol")])
                .with_alert_at(Duration::ZERO, "Wrong password.");

            assert_eq!(dialogs(&driver).text_if_visible(&welcome()).await, None);
            assert!(driver.was_called("accept_alert"));
            // the page is usable again afterwards
            assert_eq!(
                dialogs(&driver).text_if_visible(&welcome()).await.as_deref(),
                Some("Welcome pavanol")
            );
        }

        #[tokio::test(start_paused = true)]
        async fn test_absent_is_none() {
            let driver = MockDriver::new();
            assert_eq!(dialogs(&driver).with_timeout(400).text_if_visible(&welcome()).await, None);
        }
    }
}
