//! # Draw Ledger
//!
//! A local, gap-free ledger of weekly lottery draws.
//!
//! Clients ask for a range of rounds; the ledger answers from its SQLite
//! store, fetches whatever is missing from the upstream provider one round
//! at a time, persists it, and reports any rounds it still could not
//! supply. Bulk loads fill large ranges in paced batches in the background.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌────────────┐   ┌──────────┐
//! │ CLI/HTTP │──▶│ RangeService │──▶│ Backfiller │──▶│ Fetcher  │──▶ provider
//! └──────────┘   └──────┬───────┘   └─────┬──────┘   └──────────┘
//!                       │                 │
//!                       ▼                 ▼
//!                  ┌─────────────────────────┐
//!                  │  SQLite (draws table)   │
//!                  └─────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ledger init                          # create database
//! ledger load --start 1 --end 500      # bulk backfill
//! ledger query --latest 10             # most recent ten draws
//! ledger check 1168 8,12,19,23,31,40   # evaluate a ticket
//! ledger serve                         # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`sqlite_store`] | SQLite record store |
//! | [`source_http`] | Provider HTTP client |
//! | [`fetcher`] | Retrying fetch |
//! | [`latest`] | Latest-round resolution |
//! | [`backfill`] | Sequential backfill orchestration |
//! | [`service`] | Range query facade |
//! | [`server`] | HTTP server |
//! | [`commands`] | CLI commands |

pub mod backfill;
pub mod commands;
pub mod config;
pub mod db;
pub mod fetcher;
pub mod latest;
pub mod migrate;
pub mod server;
pub mod service;
pub mod source_http;
pub mod sqlite_store;

#[cfg(test)]
pub(crate) mod testing;
