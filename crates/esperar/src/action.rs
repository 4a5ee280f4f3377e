//! Actions: wait, then act, with a fallback for intercepted clicks.
//!
//! Strict forms return the failure. The `safe_*` forms log it and report
//! whether the action happened.
//!
//! An element replaced between the wait and the act is waited for once more
//! on whatever is left of the action's timeout. If it is replaced again the
//! action fails as a timeout, never as a stale element.

use tracing::{debug, info, warn};

use crate::driver::{scripts, ElementRef, UiDriver};
use crate::locator::Target;
use crate::result::{EsperarError, EsperarResult};
use crate::wait::{Condition, Deadline, WaitOptions, Waiter};

/// Interaction primitives over one driver
#[derive(Debug)]
pub struct Actions<'a, D: UiDriver + ?Sized> {
    driver: &'a D,
    options: WaitOptions,
}

impl<'a, D: UiDriver + ?Sized> Actions<'a, D> {
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

    fn waiter(&self) -> Waiter<'a, D> {
        Waiter::new(self.driver, self.options)
    }

    /// Wait until clickable and click
    ///
    /// An intercepted click is retried once through the script channel,
    /// without waiting again.
    pub async fn click(&self, target: impl Into<Target>) -> EsperarResult<()> {
        let target = target.into();
        let deadline = Deadline::after(self.options.timeout());
        let element = self.waiter().wait_clickable(target.clone()).await?;

        match self.click_once(&target, &element).await {
            Err(e) if e.is_invalidation() => {
                debug!(target_desc = %target, error = %e, "replaced before click, waiting again");
                let element = self
                    .wait_again(Condition::Clickable, &target, &deadline)
                    .await?;
                self.click_once(&target, &element)
                    .await
                    .map_err(|e| self.expire_invalidation(e, Condition::Clickable, &target))
            }
            result => result,
        }
    }

    async fn click_once(&self, target: &Target, element: &ElementRef) -> EsperarResult<()> {
        match self.driver.click(element).await {
            Ok(()) => {
                debug!(target_desc = %target, "clicked");
                Ok(())
            }
            Err(EsperarError::ClickIntercepted { .. }) => {
                info!(target_desc = %target, "click intercepted, retrying via script");
                self.script_click(element)
                    .await
                    .map_err(|e| EsperarError::InterceptedAction {
                        target: target.describe(),
                        message: e.to_string(),
                    })
            }
            Err(e) => Err(e),
        }
    }

    /// Click through the script channel, bypassing hit-testing
    pub async fn script_click(&self, element: &ElementRef) -> EsperarResult<()> {
        let _ = self
            .driver
            .execute_script(scripts::CLICK, std::slice::from_ref(element))
            .await?;
        Ok(())
    }

    /// Wait until visible, clear, then type; `None` types nothing
    pub async fn type_text(&self, target: impl Into<Target>, text: Option<&str>) -> EsperarResult<()> {
        let target = target.into();
        let text = text.unwrap_or_default();
        let deadline = Deadline::after(self.options.timeout());
        let element = self.waiter().wait_visible(target.clone()).await?;

        match self.fill(&element, text).await {
            Err(e) if e.is_invalidation() => {
                debug!(target_desc = %target, error = %e, "replaced before typing, waiting again");
                let element = self.wait_again(Condition::Visible, &target, &deadline).await?;
                self.fill(&element, text)
                    .await
                    .map_err(|e| self.expire_invalidation(e, Condition::Visible, &target))
            }
            result => result,
        }
    }

    async fn fill(&self, element: &ElementRef, text: &str) -> EsperarResult<()> {
        self.driver.clear(element).await?;
        self.driver.send_keys(element, text).await
    }

    /// Second wait, bounded by what the first one left over
    async fn wait_again(
        &self,
        condition: Condition,
        target: &Target,
        deadline: &Deadline,
    ) -> EsperarResult<ElementRef> {
        let remaining_ms = deadline.remaining().as_millis() as u64;
        if remaining_ms == 0 {
            return Err(self.timeout(condition, target));
        }
        let options = self
            .options
            .with_timeout(remaining_ms)
            .with_poll_interval(self.options.poll_interval_ms.min(remaining_ms));
        Waiter::new(self.driver, options)
            .wait_for(condition, target.clone())
            .await
            .map_err(|e| if e.is_timeout() { self.timeout(condition, target) } else { e })
    }

    fn timeout(&self, condition: Condition, target: &Target) -> EsperarError {
        EsperarError::Timeout {
            condition: condition.to_string(),
            target: target.describe(),
            ms: self.options.timeout_ms,
        }
    }

    fn expire_invalidation(&self, e: EsperarError, condition: Condition, target: &Target) -> EsperarError {
        if e.is_invalidation() {
            self.timeout(condition, target)
        } else {
            e
        }
    }

    /// Best-effort scroll; never fails
    pub async fn scroll_into_view(&self, target: impl Into<Target>) {
        let target = target.into();
        let element = match &target {
            Target::Element(element) => Some(element.clone()),
            Target::Locator(locator) => match self.driver.find_all(locator).await {
                Ok(found) => found.into_iter().next(),
                Err(e) => {
                    debug!(target_desc = %target, error = %e, "scroll lookup failed");
                    None
                }
            },
        };

        let Some(element) = element else {
            debug!(target_desc = %target, "nothing to scroll to");
            return;
        };

        if let Err(e) = self
            .driver
            .execute_script(scripts::SCROLL_INTO_VIEW, std::slice::from_ref(&element))
            .await
        {
            debug!(target_desc = %target, error = %e, "scroll failed");
        }
    }

    /// [`Self::click`] that logs failures instead of returning them
    pub async fn safe_click(&self, target: impl Into<Target>) -> bool {
        let target = target.into();
        match self.click(target.clone()).await {
            Ok(()) => true,
            Err(e) => {
                warn!(target_desc = %target, error = %e, "safe_click failed");
                false
            }
        }
    }

    /// [`Self::type_text`] that logs failures instead of returning them
    pub async fn safe_type(&self, target: impl Into<Target>, text: Option<&str>) -> bool {
        let target = target.into();
        match self.type_text(target.clone(), text).await {
            Ok(()) => true,
            Err(e) => {
                warn!(target_desc = %target, error = %e, "safe_type failed");
                false
            }
        }
    }

    /// Trimmed text once visible, or "" on any failure
    pub async fn text_or_empty(&self, target: impl Into<Target>) -> String {
        let target = target.into();
        match self.visible_text(target.clone()).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                debug!(target_desc = %target, error = %e, "text_or_empty: no text");
                String::new()
            }
        }
    }

    async fn visible_text(&self, target: Target) -> EsperarResult<String> {
        let element = self.waiter().wait_visible(target).await?;
        self.driver.text(&element).await
    }
}
