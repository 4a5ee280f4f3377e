//! Esperar: bounded waits and convergence polling for live UIs
//!
//! Esperar (Spanish: "to wait") drives a UI whose element tree keeps changing
//! underneath the test: content swapped in by AJAX, overlays that come and
//! go, lists re-rendered after a click. It does so without fixed sleeps.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Session                             │
//! │  ┌──────────┐  ┌──────────┐  ┌─────────────┐  ┌──────────┐   │
//! │  │ Waiter   │◄─│ Actions  │  │ Collections │  │ Modals   │   │
//! │  └────┬─────┘  └────┬─────┘  └──────┬──────┘  └────┬─────┘   │
//! │       │             │        ┌──────┴──────┐       │         │
//! │       │             │        │   Poller    │       │         │
//! │       │             │        └──────┬──────┘       │         │
//! │       ▼             ▼               ▼              ▼         │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │        UiDriver (MockDriver | ChromiumDriver)          │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use esperar::{Locator, MockDriver, Session};
//!
//! # async fn run() -> esperar::EsperarResult<()> {
//! let session = Session::with_defaults(MockDriver::new());
//! session.open_url("https://www.demoblaze.com/").await?;
//!
//! let names = Locator::css("#tbodyid .card-title a");
//! session
//!     .click_and_await_change(&Locator::link_text("Laptops"), &names)
//!     .await?;
//! let listing = session
//!     .collections()
//!     .read_products(&names, &Locator::css("#tbodyid h5"))
//!     .await;
//! # let _ = listing;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

mod action;
mod collection;
mod config;
mod convergence;
mod dialog;
mod driver;
mod locator;
mod modal;
mod page_object;
mod result;
mod session;
mod wait;

/// CDP-backed driver (requires the `browser` feature)
#[cfg(feature = "browser")]
#[allow(clippy::missing_errors_doc, clippy::doc_markdown)]
pub mod chromium;

/// Tracing subscriber installation
pub mod logging;

/// Product listing value object and verification
pub mod product;

pub use action::Actions;
pub use collection::Collections;
pub use config::{
    EsperarConfig, DEFAULT_ALERT_TIMEOUT_MS, DEFAULT_CONVERGENCE_TIMEOUT_MS,
    DEFAULT_MODAL_APPEAR_TIMEOUT_MS, DEFAULT_MODAL_CLOSE_TIMEOUT_MS, DEFAULT_MODAL_SETTLE_MS,
};
pub use convergence::{AttributeSignal, Convergence, FirstVisibleText, Poller, Signal, SignalSource};
pub use dialog::Dialogs;
pub use driver::{scripts, ElementRef, MockDriver, MockEffect, MockElement, UiDriver};
pub use locator::{Locator, Selector, Target};
pub use modal::{DismissedVia, ModalLocators, ModalOutcome, Modals};
pub use page_object::{LocatorTable, LocatorTableBuilder};
pub use product::{verify_products, verify_products_present, Product, ProductMismatch};
pub use result::{EsperarError, EsperarResult};
pub use session::Session;
pub use wait::{
    Condition, Deadline, WaitOptions, Waiter, DEFAULT_POLL_INTERVAL_MS, DEFAULT_WAIT_TIMEOUT_MS,
};

#[cfg(feature = "browser")]
pub use chromium::{ChromiumConfig, ChromiumDriver};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::{
        Condition, Convergence, EsperarConfig, EsperarError, EsperarResult, Locator, MockDriver,
        MockElement, ModalLocators, ModalOutcome, Product, Session, Signal, Target, UiDriver,
        WaitOptions,
    };
}
