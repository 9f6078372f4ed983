//! # wb-catalog
//!
//! Ingests Wildberries product search results into a local SQLite catalog
//! and serves them back through a filterable HTTP API.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌────────────┐   ┌────────────┐   ┌──────────┐
//! │   Fetch    │──▶│ Normalize  │──▶│ Reconcile  │──▶│  SQLite  │
//! │ (WB search)│   │ (kopecks)  │   │ (bulk I/O) │   │ products │
//! └────────────┘   └────────────┘   └────────────┘   └────┬─────┘
//!                                                         │
//!                      ┌──────────────────────────────────┤
//!                      ▼                                  ▼
//!                 ┌──────────┐                      ┌──────────┐
//!                 │   CLI    │                      │   HTTP   │
//!                 │  (wbc)   │                      │  (axum)  │
//!                 └──────────┘                      └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! wbc init                          # create database
//! wbc ingest "ноутбуки"             # fetch and store one query
//! wbc products --ordering -rating   # browse the catalog
//! wbc serve                         # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`fetch`] | Paginated remote search |
//! | [`normalize`] | Remote record → catalog units |
//! | [`reconcile`] | Bulk insert/update against the store |
//! | [`report`] | Ingestion summaries |
//! | [`ingest`] | Pipeline orchestration |
//! | [`tasks`] | Background ingestion runner |
//! | [`listing`] | Filters, ordering, pagination |
//! | [`store`] | Storage trait, SQLite and in-memory backends |
//! | [`server`] | HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod fetch;
pub mod ingest;
pub mod listing;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod reconcile;
pub mod report;
pub mod server;
pub mod store;
pub mod tasks;

#[cfg(test)]
mod test_support;
