//! Crate-level error aggregation
//!
//! Individual components (`ContactStore`, `ClientStore`, `AckTracker`, ...) expose their
//! own narrow error enums in `room::traits`. `RoomError` exists only so the binary
//! entry points can propagate a single error type through `anyhow::Result`.

use thiserror::Error;

use crate::room::traits::{ClientStoreError, ContactStoreError, CryptoError, LoginError};

/// Top-level error type for binary entry points.
#[derive(Debug, Error)]
pub enum RoomError {
    /// A contact-store operation failed.
    #[error("contact store: {0}")]
    ContactStore(#[from] ContactStoreError),

    /// A client-store operation failed.
    #[error("client store: {0}")]
    ClientStore(#[from] ClientStoreError),

    /// A cryptographic operation failed.
    #[error("crypto: {0}")]
    Crypto(#[from] CryptoError),

    /// Login processing failed.
    #[error("login: {0}")]
    Login(#[from] LoginError),

    /// Configuration was invalid.
    #[error("configuration error: {message}")]
    Configuration {
        /// Human-readable description of the invalid configuration.
        message: String,
    },

    /// An I/O error occurred (config load, log init, ...).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
