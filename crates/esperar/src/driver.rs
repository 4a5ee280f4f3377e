//! UiDriver - Abstract UI Automation Trait
//!
//! Everything above this module talks to the UI through [`UiDriver`]. The
//! trait is deliberately thin: query by locator, per-element reads and
//! actions, a script channel, navigation and alerts. Session lifecycle
//! (launching and closing a browser) is left to the implementation.
//!
//! # Implementations
//!
//! - `ChromiumDriver` - CDP via chromiumoxide (feature `browser`)
//! - [`MockDriver`] - scriptable in-memory UI for unit and integration tests

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use crate::locator::Locator;
use crate::result::{EsperarError, EsperarResult};

/// Scripts sent through [`UiDriver::execute_script`]
pub mod scripts {
    /// Click that bypasses hit-testing
    pub const CLICK: &str = "arguments[0].click();";
    /// Scroll the element to the top of the viewport
    pub const SCROLL_INTO_VIEW: &str = "arguments[0].scrollIntoView(true);";
    /// Document readiness
    pub const READY_STATE: &str = "return document.readyState";
}

/// Opaque handle to one resolved element
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementRef(String);

impl ElementRef {
    /// Wrap a driver-issued id
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Driver-issued id
    #[must_use]
    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Abstract driver trait for UI automation
///
/// Element operations on a handle whose element was replaced must fail with
/// [`EsperarError::StaleElement`]. While an alert is open, element operations
/// fail with [`EsperarError::UnexpectedDialog`].
#[async_trait]
pub trait UiDriver: Send + Sync {
    /// All elements matching the locator, in document order
    async fn find_all(&self, locator: &Locator) -> EsperarResult<Vec<ElementRef>>;

    /// Whether the element is rendered and visible
    async fn is_displayed(&self, element: &ElementRef) -> EsperarResult<bool>;

    /// Whether the element accepts interaction
    async fn is_enabled(&self, element: &ElementRef) -> EsperarResult<bool>;

    /// Rendered text of the element
    async fn text(&self, element: &ElementRef) -> EsperarResult<String>;

    /// Attribute value, if set
    async fn attribute(&self, element: &ElementRef, name: &str) -> EsperarResult<Option<String>>;

    /// Native click, subject to hit-testing
    async fn click(&self, element: &ElementRef) -> EsperarResult<()>;

    /// Clear an editable element
    async fn clear(&self, element: &ElementRef) -> EsperarResult<()>;

    /// Type text into an editable element
    async fn send_keys(&self, element: &ElementRef, text: &str) -> EsperarResult<()>;

    /// Run a script; `arguments[i]` refers to `args[i]`
    async fn execute_script(
        &self,
        script: &str,
        args: &[ElementRef],
    ) -> EsperarResult<serde_json::Value>;

    /// Load a URL
    async fn navigate(&self, url: &str) -> EsperarResult<()>;

    /// Current URL
    async fn current_url(&self) -> EsperarResult<String>;

    /// Text of the open alert, if any
    async fn alert_text(&self) -> EsperarResult<Option<String>>;

    /// Accept the open alert
    async fn accept_alert(&self) -> EsperarResult<()>;
}

// ============================================================================
// MockDriver
// ============================================================================

/// Element in a [`MockDriver`] snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockElement {
    /// Handle id; stays the same across snapshots for the "same" element
    pub id: String,
    /// Rendered text
    pub text: String,
    /// Visible flag
    pub visible: bool,
    /// Enabled flag
    pub enabled: bool,
    /// Attributes
    pub attributes: HashMap<String, String>,
}

impl MockElement {
    /// Visible, enabled element
    #[must_use]
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            visible: true,
            enabled: true,
            attributes: HashMap::new(),
        }
    }

    /// Mark as not visible
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Mark as disabled
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Set an attribute
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.attributes.insert(name.into(), value.into());
        self
    }
}

/// Side effect applied when a mock element is clicked
#[derive(Debug, Clone)]
pub enum MockEffect {
    /// Replace the snapshot for a locator
    Replace {
        /// Locator whose snapshot changes
        locator: Locator,
        /// New snapshot
        elements: Vec<MockElement>,
    },
    /// Open an alert
    Alert(String),
    /// Change the current URL
    Navigate(String),
}

#[derive(Debug, Clone)]
struct ScheduledAlert {
    at: Duration,
    text: String,
    accepted: bool,
}

#[derive(Debug, Default)]
struct MockState {
    timelines: HashMap<String, Vec<(Duration, Vec<MockElement>)>>,
    stale_reads: HashMap<String, u32>,
    stale_actions: HashMap<String, u32>,
    intercepted_clicks: HashMap<String, u32>,
    failing_script_clicks: HashSet<String>,
    click_effects: HashMap<String, Vec<(Duration, MockEffect)>>,
    alerts: Vec<ScheduledAlert>,
    values: HashMap<String, String>,
    query_counts: HashMap<String, usize>,
    current_url: String,
    ready_at: Duration,
    call_history: Vec<String>,
}

/// Scriptable driver for tests
///
/// Collections are described as timelines: each locator maps to snapshots
/// that take effect at an offset from the driver's creation. Offsets are
/// measured on tokio's clock, so tests running with a paused clock see
/// deterministic transitions.
#[derive(Debug)]
pub struct MockDriver {
    start: Instant,
    state: Mutex<MockState>,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    /// Create an empty mock UI
    #[must_use]
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            state: Mutex::new(MockState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn elapsed(&self) -> Duration {
        Instant::now().saturating_duration_since(self.start)
    }

    /// Snapshot visible from time zero
    #[must_use]
    pub fn with_elements(self, locator: &Locator, elements: Vec<MockElement>) -> Self {
        self.with_elements_at(locator, Duration::ZERO, elements)
    }

    /// Snapshot that replaces earlier ones at `at`
    #[must_use]
    pub fn with_elements_at(
        self,
        locator: &Locator,
        at: Duration,
        elements: Vec<MockElement>,
    ) -> Self {
        self.schedule(&locator.key(), at, elements);
        self
    }

    /// Fail the next `count` operations on the element as stale
    #[must_use]
    pub fn with_stale_reads(self, element_id: &str, count: u32) -> Self {
        let _ = self.state().stale_reads.insert(element_id.to_string(), count);
        self
    }

    /// Every operation on the element fails as stale
    #[must_use]
    pub fn with_permanently_stale(self, element_id: &str) -> Self {
        self.with_stale_reads(element_id, u32::MAX)
    }

    /// Fail the next `count` clicks, clears and key sends on the element as
    /// stale, while reads keep succeeding
    #[must_use]
    pub fn with_stale_actions(self, element_id: &str, count: u32) -> Self {
        let _ = self
            .state()
            .stale_actions
            .insert(element_id.to_string(), count);
        self
    }

    /// Reject the next `count` native clicks as intercepted
    #[must_use]
    pub fn with_intercepted_clicks(self, element_id: &str, count: u32) -> Self {
        let _ = self
            .state()
            .intercepted_clicks
            .insert(element_id.to_string(), count);
        self
    }

    /// Make the script click fail for the element
    #[must_use]
    pub fn with_failing_script_click(self, element_id: &str) -> Self {
        let _ = self
            .state()
            .failing_script_clicks
            .insert(element_id.to_string());
        self
    }

    /// Apply `effect` `delay` after the element is clicked
    #[must_use]
    pub fn on_click(self, element_id: &str, delay: Duration, effect: MockEffect) -> Self {
        self.state()
            .click_effects
            .entry(element_id.to_string())
            .or_default()
            .push((delay, effect));
        self
    }

    /// Alert that opens at `at`
    #[must_use]
    pub fn with_alert_at(self, at: Duration, text: impl Into<String>) -> Self {
        self.state().alerts.push(ScheduledAlert {
            at,
            text: text.into(),
            accepted: false,
        });
        self
    }

    /// `document.readyState` reports "loading" until `at`
    #[must_use]
    pub fn with_ready_at(self, at: Duration) -> Self {
        self.state().ready_at = at;
        self
    }

    /// Number of `find_all` calls issued for the locator
    #[must_use]
    pub fn query_count(&self, locator: &Locator) -> usize {
        self.state()
            .query_counts
            .get(&locator.key())
            .copied()
            .unwrap_or(0)
    }

    /// Value typed into the element
    #[must_use]
    pub fn value_of(&self, element_id: &str) -> Option<String> {
        self.state().values.get(element_id).cloned()
    }

    /// Get call history
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.state().call_history.clone()
    }

    /// Number of history entries equal to `call`
    #[must_use]
    pub fn count_calls(&self, call: &str) -> usize {
        self.state()
            .call_history
            .iter()
            .filter(|c| c.as_str() == call)
            .count()
    }

    /// Check if method was called
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.state()
            .call_history
            .iter()
            .any(|c| c.starts_with(method))
    }

    fn schedule(&self, key: &str, at: Duration, elements: Vec<MockElement>) {
        let mut state = self.state();
        let timeline = state.timelines.entry(key.to_string()).or_default();
        timeline.push((at, elements));
        timeline.sort_by_key(|(at, _)| *at);
    }

    fn current_snapshot(state: &MockState, key: &str, now: Duration) -> Vec<MockElement> {
        state
            .timelines
            .get(key)
            .and_then(|timeline| timeline.iter().rev().find(|(at, _)| *at <= now))
            .map(|(_, elements)| elements.clone())
            .unwrap_or_default()
    }

    fn open_alert(state: &MockState, now: Duration) -> Option<String> {
        state
            .alerts
            .iter()
            .find(|a| !a.accepted && a.at <= now)
            .map(|a| a.text.clone())
    }

    fn ensure_no_alert(state: &MockState, now: Duration) -> EsperarResult<()> {
        match Self::open_alert(state, now) {
            Some(text) => Err(EsperarError::UnexpectedDialog { text }),
            None => Ok(()),
        }
    }

    /// Resolve a handle against the live snapshots, applying stale injection
    fn live_element(&self, element: &ElementRef) -> EsperarResult<MockElement> {
        let now = self.elapsed();
        let mut state = self.state();
        Self::ensure_no_alert(&state, now)?;

        if let Some(remaining) = state.stale_reads.get_mut(element.id()) {
            if *remaining > 0 {
                if *remaining != u32::MAX {
                    *remaining -= 1;
                }
                return Err(EsperarError::stale(element.id()));
            }
        }

        let keys: Vec<String> = state.timelines.keys().cloned().collect();
        keys.iter()
            .flat_map(|key| Self::current_snapshot(&state, key, now))
            .find(|e| e.id == element.id())
            .ok_or_else(|| EsperarError::stale(element.id()))
    }

    /// Resolve a handle for an action, consuming one injected stale action
    fn actionable_element(&self, element: &ElementRef) -> EsperarResult<MockElement> {
        let found = self.live_element(element)?;
        let mut state = self.state();
        if let Some(remaining) = state.stale_actions.get_mut(element.id()) {
            if *remaining > 0 {
                if *remaining != u32::MAX {
                    *remaining -= 1;
                }
                state.call_history.push(format!("stale_action:{element}"));
                return Err(EsperarError::stale(element.id()));
            }
        }
        Ok(found)
    }

    fn apply_click_effects(&self, element_id: &str) {
        let now = self.elapsed();
        let effects = self
            .state()
            .click_effects
            .get(element_id)
            .cloned()
            .unwrap_or_default();

        for (delay, effect) in effects {
            match effect {
                MockEffect::Replace { locator, elements } => {
                    self.schedule(&locator.key(), now + delay, elements);
                }
                MockEffect::Alert(text) => self.state().alerts.push(ScheduledAlert {
                    at: now + delay,
                    text,
                    accepted: false,
                }),
                MockEffect::Navigate(url) => self.state().current_url = url,
            }
        }
    }

    fn record(&self, call: String) {
        self.state().call_history.push(call);
    }
}

#[async_trait]
impl UiDriver for MockDriver {
    async fn find_all(&self, locator: &Locator) -> EsperarResult<Vec<ElementRef>> {
        let now = self.elapsed();
        let key = locator.key();
        let mut state = self.state();
        Self::ensure_no_alert(&state, now)?;
        *state.query_counts.entry(key.clone()).or_insert(0) += 1;
        Ok(Self::current_snapshot(&state, &key, now)
            .into_iter()
            .map(|e| ElementRef::new(e.id))
            .collect())
    }

    async fn is_displayed(&self, element: &ElementRef) -> EsperarResult<bool> {
        Ok(self.live_element(element)?.visible)
    }

    async fn is_enabled(&self, element: &ElementRef) -> EsperarResult<bool> {
        Ok(self.live_element(element)?.enabled)
    }

    async fn text(&self, element: &ElementRef) -> EsperarResult<String> {
        Ok(self.live_element(element)?.text)
    }

    async fn attribute(&self, element: &ElementRef, name: &str) -> EsperarResult<Option<String>> {
        Ok(self.live_element(element)?.attributes.get(name).cloned())
    }

    async fn click(&self, element: &ElementRef) -> EsperarResult<()> {
        let _ = self.actionable_element(element)?;
        {
            let mut state = self.state();
            if let Some(remaining) = state.intercepted_clicks.get_mut(element.id()) {
                if *remaining > 0 {
                    *remaining -= 1;
                    state.call_history.push(format!("intercepted:{element}"));
                    return Err(EsperarError::ClickIntercepted {
                        element: element.id().to_string(),
                    });
                }
            }
        }
        self.record(format!("click:{element}"));
        self.apply_click_effects(element.id());
        Ok(())
    }

    async fn clear(&self, element: &ElementRef) -> EsperarResult<()> {
        let _ = self.actionable_element(element)?;
        let _ = self.state().values.insert(element.id().to_string(), String::new());
        self.record(format!("clear:{element}"));
        Ok(())
    }

    async fn send_keys(&self, element: &ElementRef, text: &str) -> EsperarResult<()> {
        let _ = self.actionable_element(element)?;
        self.state()
            .values
            .entry(element.id().to_string())
            .or_default()
            .push_str(text);
        self.record(format!("send_keys:{element}"));
        Ok(())
    }

    async fn execute_script(
        &self,
        script: &str,
        args: &[ElementRef],
    ) -> EsperarResult<serde_json::Value> {
        Self::ensure_no_alert(&self.state(), self.elapsed())?;
        match script {
            scripts::CLICK => {
                let element = args
                    .first()
                    .ok_or_else(|| EsperarError::driver("script click needs an element"))?;
                let _ = self.live_element(element)?;
                if self.state().failing_script_clicks.contains(element.id()) {
                    self.record(format!("script_click_failed:{element}"));
                    return Err(EsperarError::driver("javascript error: click failed"));
                }
                self.record(format!("script_click:{element}"));
                self.apply_click_effects(element.id());
                Ok(serde_json::Value::Null)
            }
            scripts::SCROLL_INTO_VIEW => {
                let element = args
                    .first()
                    .ok_or_else(|| EsperarError::driver("scroll needs an element"))?;
                let _ = self.live_element(element)?;
                self.record(format!("scroll:{element}"));
                Ok(serde_json::Value::Null)
            }
            scripts::READY_STATE => {
                let now = self.elapsed();
                let ready = now >= self.state().ready_at;
                Ok(serde_json::Value::from(if ready { "complete" } else { "loading" }))
            }
            other => {
                self.record(format!("script:{other}"));
                Ok(serde_json::Value::Null)
            }
        }
    }

    async fn navigate(&self, url: &str) -> EsperarResult<()> {
        let mut state = self.state();
        state.current_url = url.to_string();
        state.call_history.push(format!("navigate:{url}"));
        Ok(())
    }

    async fn current_url(&self) -> EsperarResult<String> {
        Ok(self.state().current_url.clone())
    }

    async fn alert_text(&self) -> EsperarResult<Option<String>> {
        let now = self.elapsed();
        Ok(Self::open_alert(&self.state(), now))
    }

    async fn accept_alert(&self) -> EsperarResult<()> {
        let now = self.elapsed();
        let mut state = self.state();
        let alert = state
            .alerts
            .iter_mut()
            .find(|a| !a.accepted && a.at <= now)
            .ok_or_else(|| EsperarError::driver("no such alert"))?;
        alert.accepted = true;
        state.call_history.push("accept_alert".to_string());
        Ok(())
    }
}
