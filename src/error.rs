//! Error kinds for the event registry.
//!
//! All failures are immediate and synchronous — no retry, no partial
//! recovery. Handler failures are never swallowed by the library: the
//! current-event context is restored and the error propagates to whoever
//! called `trigger`.

use thiserror::Error;

/// Every way a registry operation can fail.
#[derive(Debug, Error)]
pub enum EventsError {
    /// The store-creation call (or `attach`) ran while a store was
    /// already attached. Detach or clear first.
    #[error("store is already created")]
    StoreAlreadyCreated,

    /// A dispatch or state read needed a store and none is attached.
    #[error("no store attached")]
    NoStoreAttached,

    /// `trigger` was called with an event name nothing registered.
    #[error("no handler '{event}' registered on namespace '{namespace}'")]
    NoSuchHandler {
        /// Dotted path of the namespace that was triggered.
        namespace: String,
        /// The unregistered event name.
        event: String,
    },

    /// A namespace path or segment failed validation.
    #[error("invalid namespace path: {0}")]
    InvalidPath(String),

    /// An application handler reported a failure.
    #[error("handler '{event}' failed: {message}")]
    Handler {
        /// Event name the handler was registered under.
        event: String,
        /// Application-supplied description.
        message: String,
    },
}

impl EventsError {
    /// Convenience constructor for application handlers.
    pub fn handler(event: &str, message: impl Into<String>) -> Self {
        EventsError::Handler {
            event: event.to_string(),
            message: message.into(),
        }
    }
}
