//! Veratui - terminal browser for Veracode scan results
//!
//! Browse applications, sandboxes, findings and static data paths from the
//! Veracode REST API. The [`session`] module holds all browsing state and is
//! driven by the event loop in [`app`]; API calls run in the background through
//! [`fetch`].
pub mod app;
pub mod cli;
pub mod credentials;
pub mod error;
pub mod fetch;
pub mod input;
pub mod session;
pub mod terminal;
pub mod theme;
pub mod view;

// Re-export commonly used types
pub use error::{Result, TuiError};
pub use session::Session;
