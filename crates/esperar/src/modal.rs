//! Dismissing transient modal overlays.
//!
//! The overlay may never show up; that is a normal outcome, not an error.
//! When it does, the primary close target is tried first and the secondary
//! one second. Nothing here returns an error.

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::action::Actions;
use crate::driver::UiDriver;
use crate::locator::Locator;
use crate::wait::{WaitOptions, Waiter};

/// Where a modal lives and how to close it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModalLocators {
    /// Visible overlay
    pub overlay: Locator,
    /// Preferred close target
    pub primary_close: Locator,
    /// Fallback close target
    pub secondary_close: Locator,
}

impl ModalLocators {
    /// Custom locators
    #[must_use]
    pub const fn new(overlay: Locator, primary_close: Locator, secondary_close: Locator) -> Self {
        Self {
            overlay,
            primary_close,
            secondary_close,
        }
    }

    /// Bootstrap-style modal: footer "Close" button, then the header "x"
    #[must_use]
    pub fn bootstrap() -> Self {
        Self::new(
            Locator::css("div.modal.fade.show").named("open modal"),
            Locator::xpath(
                "//div[contains(@class,'modal') and contains(@class,'show')]\
                 //button[normalize-space()='Close' or @data-dismiss='modal']",
            )
            .named("modal footer close"),
            Locator::xpath(
                "//div[contains(@class,'modal') and contains(@class,'show')]\
                 //button[contains(@class,'close') or @aria-label='Close']",
            )
            .named("modal header close"),
        )
    }
}

/// Which close target worked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DismissedVia {
    /// Primary close target
    Primary,
    /// Secondary close target
    Secondary,
}

/// Result of [`Modals::dismiss_if_present`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalOutcome {
    /// No overlay appeared in time
    NotPresent,
    /// Closed
    Dismissed(DismissedVia),
    /// Overlay showed but neither target could be clicked
    Undismissable,
}

/// Modal dismissal over one driver
#[derive(Debug)]
pub struct Modals<'a, D: UiDriver + ?Sized> {
    driver: &'a D,
    appear: WaitOptions,
    close: WaitOptions,
    settle: Duration,
}

impl<'a, D: UiDriver + ?Sized> Modals<'a, D> {
    /// Create with appear/close wait options and the post-dismissal settle delay
    #[must_use]
    pub const fn new(driver: &'a D, appear: WaitOptions, close: WaitOptions, settle: Duration) -> Self {
        Self {
            driver,
            appear,
            close,
            settle,
        }
    }

    /// Override how long to wait for the overlay
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.appear = self.appear.with_timeout(timeout_ms);
        self
    }

    /// Replace the overlay wait options
    #[must_use]
    pub const fn with_options(mut self, options: WaitOptions) -> Self {
        self.appear = options;
        self
    }

    /// Override how long each close target may take to become clickable
    #[must_use]
    pub const fn with_close_timeout(mut self, timeout_ms: u64) -> Self {
        self.close = self.close.with_timeout(timeout_ms);
        self
    }

    /// Override the settle delay
    #[must_use]
    pub const fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Close the modal if one shows up
    pub async fn dismiss_if_present(&self, locators: &ModalLocators) -> ModalOutcome {
        let overlay = match Waiter::new(self.driver, self.appear)
            .wait_visible(&locators.overlay)
            .await
        {
            Ok(overlay) => overlay,
            Err(e) => {
                debug!(overlay = %locators.overlay, error = %e, "no modal to dismiss");
                return ModalOutcome::NotPresent;
            }
        };

        let actions = Actions::new(self.driver, self.close);
        actions.scroll_into_view(&overlay).await;

        let via = match actions.click(&locators.primary_close).await {
            Ok(()) => DismissedVia::Primary,
            Err(primary) => {
                debug!(target_desc = %locators.primary_close, error = %primary, "primary close failed");
                match actions.click(&locators.secondary_close).await {
                    Ok(()) => DismissedVia::Secondary,
                    Err(secondary) => {
                        warn!(
                            overlay = %locators.overlay,
                            primary = %primary,
                            secondary = %secondary,
                            "modal could not be dismissed"
                        );
                        return ModalOutcome::Undismissable;
                    }
                }
            }
        };

        tokio::time::sleep(self.settle).await;
        info!(overlay = %locators.overlay, ?via, "modal dismissed");
        ModalOutcome::Dismissed(via)
    }
}
