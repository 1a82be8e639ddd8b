//! # Draw Ledger Core
//!
//! Runtime-free logic for Draw Ledger: draw models, source payload
//! normalization, gap detection, win evaluation, the retry policy value
//! object, and the store/source abstractions.
//!
//! This crate contains no tokio, sqlx, HTTP client, or filesystem
//! dependencies. Sleeping, networking, and persistence belong to the
//! application crate, which plugs concrete implementations into the
//! [`store::RecordStore`] and [`source::DrawSource`] traits.

pub mod error;
pub mod gap;
pub mod models;
pub mod retry;
pub mod round;
pub mod source;
pub mod store;
pub mod win;

pub use error::LedgerError;
