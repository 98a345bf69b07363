//! Error types for the resolution pipeline.
//!
//! Only two conditions are fatal for a request: an enum-table fetch that
//! fails with no previously cached mapping to fall back on, and a rejected
//! configuration. Every other upstream failure degrades the response (see
//! [`crate::model::ResolutionWarning`]) instead of surfacing here.

use crate::port::TransportError;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified fatal error type for the ownership resolver.
#[derive(Clone, thiserror::Error, Debug)]
pub enum Error {
    /// The color enum table could not be fetched and no cached mapping
    /// exists, not even an expired one.
    #[error("enum table unavailable with no cached fallback: {source}")]
    EnumUnavailable {
        #[source]
        source: TransportError,
    },

    /// The resolver configuration was rejected.
    #[error("invalid resolver configuration: {reason}")]
    InvalidConfig { reason: String },

    /// The request deadline elapsed before any usable data was obtained.
    #[error("request deadline exceeded")]
    DeadlineExceeded,

    /// A transport failure on a path where no degraded fallback applies.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
