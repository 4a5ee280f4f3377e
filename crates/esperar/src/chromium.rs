//! `UiDriver` over the Chrome DevTools Protocol (chromiumoxide).
//!
//! Elements are addressed by a `data-esperar-id` attribute stamped onto each
//! match when it is first returned from a query. A handle whose node has been
//! removed from the document reports [`EsperarError::StaleElement`].
//!
//! `window.alert` is replaced by a shim that queues messages instead of
//! blocking the page; the queue backs `alert_text` and `accept_alert`, and
//! element operations refuse to run while it is non-empty.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::Page as CdpPage;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use crate::driver::{ElementRef, UiDriver};
use crate::locator::Locator;
use crate::result::{EsperarError, EsperarResult};

const ID_ATTRIBUTE: &str = "data-esperar-id";

const ALERT_SHIM: &str = "(() => { \
    if (window.__esperarAlerts) { return; } \
    window.__esperarAlerts = []; \
    window.alert = (msg) => { window.__esperarAlerts.push(String(msg)); }; \
})()";

/// Browser launch settings
#[derive(Debug, Clone)]
pub struct ChromiumConfig {
    /// Run without a window
    pub headless: bool,
    /// Chrome sandbox (disable in containers)
    pub sandbox: bool,
    /// Path to the chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Window width
    pub viewport_width: u32,
    /// Window height
    pub viewport_height: u32,
}

impl Default for ChromiumConfig {
    fn default() -> Self {
        Self {
            headless: true,
            sandbox: true,
            chromium_path: None,
            viewport_width: 1280,
            viewport_height: 800,
        }
    }
}

impl ChromiumConfig {
    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Set window dimensions
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }
}

#[derive(Debug, Deserialize)]
struct Reply<T> {
    #[serde(default)]
    stale: Option<String>,
    #[serde(default)]
    dialog: Option<String>,
    #[serde(default)]
    intercepted: bool,
    value: Option<T>,
}

impl<T> Reply<T> {
    const fn empty() -> Self {
        Self {
            stale: None,
            dialog: None,
            intercepted: false,
            value: None,
        }
    }
}

fn cdp_error(e: impl std::fmt::Display) -> EsperarError {
    EsperarError::driver(e.to_string())
}

fn element_selector(id: &str) -> String {
    format!("[{ID_ATTRIBUTE}={}]", serde_json::Value::from(id))
}

fn pending_dialog_check() -> &'static str {
    "const __alerts = window.__esperarAlerts || []; \
     if (__alerts.length) { return { dialog: __alerts[0] }; }"
}

/// Expression stamping ids onto every match and returning them
fn find_all_script(locator: &Locator) -> String {
    format!(
        "(() => {{ {dialog} \
         return {{ value: {query}.map(el => {{ \
           if (!el.hasAttribute('{ID_ATTRIBUTE}')) {{ \
             window.__esperarSeq = (window.__esperarSeq || 0) + 1; \
             el.setAttribute('{ID_ATTRIBUTE}', 'esp-' + window.__esperarSeq); \
           }} \
           return el.getAttribute('{ID_ATTRIBUTE}'); \
         }}) }}; }})()",
        dialog = pending_dialog_check(),
        query = locator.selector().to_query_all(),
    )
}

/// Expression evaluating `body` with `el` bound to the element
fn element_script(element: &ElementRef, body: &str) -> String {
    format!(
        "(() => {{ {dialog} \
         const el = document.querySelector({selector:?}); \
         if (!el || !el.isConnected) {{ return {{ stale: {id:?} }}; }} \
         {body} }})()",
        dialog = pending_dialog_check(),
        selector = element_selector(element.id()),
        id = element.id(),
    )
}

/// Expression running `script` with `arguments` bound to `args`
fn call_script(script: &str, args: &[ElementRef]) -> String {
    let selectors: Vec<String> = args.iter().map(|a| element_selector(a.id())).collect();
    format!(
        "(() => {{ {dialog} \
         const sels = {sels}; \
         const els = sels.map(s => document.querySelector(s)); \
         const missing = els.findIndex(el => !el || !el.isConnected); \
         if (missing >= 0) {{ return {{ stale: sels[missing] }}; }} \
         const value = (function() {{ {script} }}).apply(null, els); \
         return {{ value: value === undefined ? null : value }}; }})()",
        dialog = pending_dialog_check(),
        sels = serde_json::Value::from(selectors),
    )
}

/// Chromium-backed driver
#[derive(Debug)]
pub struct ChromiumDriver {
    browser: CdpBrowser,
    page: CdpPage,
    handle: tokio::task::JoinHandle<()>,
}

impl ChromiumDriver {
    /// Launch chromium and open a blank page
    pub async fn launch(config: ChromiumConfig) -> EsperarResult<Self> {
        let mut builder = CdpConfig::builder().window_size(config.viewport_width, config.viewport_height);
        if !config.headless {
            builder = builder.with_head();
        }
        if !config.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(ref path) = config.chromium_path {
            builder = builder.chrome_executable(path);
        }
        let cdp_config = builder.build().map_err(EsperarError::driver)?;

        let (browser, mut handler) = CdpBrowser::launch(cdp_config).await.map_err(cdp_error)?;
        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser.new_page("about:blank").await.map_err(cdp_error)?;
        page.evaluate_on_new_document(AddScriptToEvaluateOnNewDocumentParams::new(ALERT_SHIM))
            .await
            .map_err(cdp_error)?;
        info!(headless = config.headless, "chromium launched");

        let driver = Self {
            browser,
            page,
            handle,
        };
        // The blank page predates the new-document hook.
        if let Err(e) = driver.eval::<serde_json::Value>(ALERT_SHIM.to_string()).await {
            debug!(error = %e, "alert shim not installed on blank page");
        }
        Ok(driver)
    }

    /// Close the browser
    pub async fn close(mut self) -> EsperarResult<()> {
        self.browser.close().await.map_err(cdp_error)?;
        self.handle.abort();
        Ok(())
    }

    async fn eval<T: DeserializeOwned>(&self, expression: String) -> EsperarResult<Reply<T>> {
        let result = self
            .page
            .evaluate_expression(EvaluateParams::new(expression))
            .await
            .map_err(cdp_error)?;
        match result.value() {
            Some(value) => serde_json::from_value(value.clone()).map_err(EsperarError::from),
            None => Ok(Reply::empty()),
        }
    }

    async fn on_element<T: DeserializeOwned + Default>(
        &self,
        element: &ElementRef,
        body: &str,
    ) -> EsperarResult<T> {
        let reply: Reply<T> = self.eval(element_script(element, body)).await?;
        if let Some(text) = reply.dialog {
            return Err(EsperarError::UnexpectedDialog { text });
        }
        if reply.stale.is_some() {
            return Err(EsperarError::stale(element.id()));
        }
        if reply.intercepted {
            return Err(EsperarError::ClickIntercepted {
                element: element.id().to_string(),
            });
        }
        Ok(reply.value.unwrap_or_default())
    }
}

#[async_trait]
impl UiDriver for ChromiumDriver {
    async fn find_all(&self, locator: &Locator) -> EsperarResult<Vec<ElementRef>> {
        let reply: Reply<Vec<String>> = self.eval(find_all_script(locator)).await?;
        if let Some(text) = reply.dialog {
            return Err(EsperarError::UnexpectedDialog { text });
        }
        Ok(reply
            .value
            .unwrap_or_default()
            .into_iter()
            .map(ElementRef::new)
            .collect())
    }

    async fn is_displayed(&self, element: &ElementRef) -> EsperarResult<bool> {
        self.on_element(
            element,
            "const style = getComputedStyle(el); \
             return { value: style.visibility !== 'hidden' && style.display !== 'none' \
               && !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length) };",
        )
        .await
    }

    async fn is_enabled(&self, element: &ElementRef) -> EsperarResult<bool> {
        self.on_element(element, "return { value: !el.disabled };").await
    }

    async fn text(&self, element: &ElementRef) -> EsperarResult<String> {
        self.on_element(element, "return { value: el.innerText || el.textContent || '' };")
            .await
    }

    async fn attribute(&self, element: &ElementRef, name: &str) -> EsperarResult<Option<String>> {
        let body = format!(
            "return {{ value: el.getAttribute({}) }};",
            serde_json::Value::from(name)
        );
        self.on_element(element, &body).await
    }

    async fn click(&self, element: &ElementRef) -> EsperarResult<()> {
        // Hit-test the centre point so an overlay is reported as an interception.
        self.on_element::<bool>(
            element,
            "el.scrollIntoView({ block: 'center' }); \
             const r = el.getBoundingClientRect(); \
             const top = document.elementFromPoint(r.left + r.width / 2, r.top + r.height / 2); \
             if (top && top !== el && !el.contains(top)) { return { intercepted: true }; } \
             return { value: true };",
        )
        .await?;

        let node = self
            .page
            .find_element(element_selector(element.id()))
            .await
            .map_err(|_| EsperarError::stale(element.id()))?;
        node.click().await.map_err(cdp_error)?;
        debug!(element = %element, "native click");
        Ok(())
    }

    async fn clear(&self, element: &ElementRef) -> EsperarResult<()> {
        self.on_element::<bool>(
            element,
            "el.value = ''; el.dispatchEvent(new Event('input', { bubbles: true })); \
             return { value: true };",
        )
        .await?;
        Ok(())
    }

    async fn send_keys(&self, element: &ElementRef, text: &str) -> EsperarResult<()> {
        let node = self
            .page
            .find_element(element_selector(element.id()))
            .await
            .map_err(|_| EsperarError::stale(element.id()))?;
        node.focus().await.map_err(cdp_error)?;
        node.type_str(text).await.map_err(cdp_error)?;
        Ok(())
    }

    async fn execute_script(
        &self,
        script: &str,
        args: &[ElementRef],
    ) -> EsperarResult<serde_json::Value> {
        let reply: Reply<serde_json::Value> = self.eval(call_script(script, args)).await?;
        if let Some(text) = reply.dialog {
            return Err(EsperarError::UnexpectedDialog { text });
        }
        if let Some(selector) = reply.stale {
            return Err(EsperarError::stale(selector));
        }
        Ok(reply.value.unwrap_or(serde_json::Value::Null))
    }

    async fn navigate(&self, url: &str) -> EsperarResult<()> {
        self.page.goto(url).await.map_err(cdp_error)?;
        Ok(())
    }

    async fn current_url(&self) -> EsperarResult<String> {
        Ok(self.page.url().await.map_err(cdp_error)?.unwrap_or_default())
    }

    async fn alert_text(&self) -> EsperarResult<Option<String>> {
        let reply: Reply<Option<String>> = self
            .eval("({ value: (window.__esperarAlerts || [])[0] ?? null })".to_string())
            .await?;
        Ok(reply.value.flatten())
    }

    async fn accept_alert(&self) -> EsperarResult<()> {
        let reply: Reply<bool> = self
            .eval(
                "(() => { const q = window.__esperarAlerts || []; \
                 return { value: q.shift() !== undefined }; })()"
                    .to_string(),
            )
            .await?;
        if reply.value.unwrap_or(false) {
            Ok(())
        } else {
            Err(EsperarError::driver("no such alert"))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_element_selector_quotes_id() {
        assert_eq!(element_selector("esp-4"), "[data-esperar-id=\"esp-4\"]");
    }

    #[test]
    fn test_find_all_script_embeds_query() {
        let script = find_all_script(&Locator::css(".hrefch"));
        assert!(script.contains("document.querySelectorAll(\".hrefch\")"));
        assert!(script.contains(ID_ATTRIBUTE));
        assert!(script.contains("__esperarAlerts"));
    }

    #[test]
    fn test_call_script_binds_arguments() {
        let script = call_script(crate::driver::scripts::CLICK, &[ElementRef::new("esp-1")]);
        assert!(script.contains("arguments[0].click();"));
        assert!(script.contains(".apply(null, els)"));
    }

    #[test]
    fn test_call_script_checks_pending_dialog_first() {
        let script = call_script(crate::driver::scripts::SCROLL_INTO_VIEW, &[ElementRef::new("esp-1")]);
        let dialog = script.find("__esperarAlerts").unwrap();
        let apply = script.find(".apply(null, els)").unwrap();
        assert!(dialog < apply);
    }

    #[test]
    fn test_reply_dialog_parsing() {
        let reply: Reply<serde_json::Value> =
            serde_json::from_str(r#"{"dialog": "Wrong password."}"#).unwrap();
        assert_eq!(reply.dialog.as_deref(), Some("Wrong password."));
        assert!(reply.stale.is_none());
    }

    #[test]
    fn test_reply_parsing() {
        let reply: Reply<bool> = serde_json::from_str(r#"{"stale": "esp-2"}"#).unwrap();
        assert_eq!(reply.stale.as_deref(), Some("esp-2"));
        assert!(reply.value.is_none());
        assert!(!reply.intercepted);
    }
}
