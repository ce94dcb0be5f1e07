//! Elvora Core - shared types and client-side state machinery.
//!
//! This crate is used by every Elvora component:
//! - `storefront` - cart, catalog and order submission
//! - `admin` - back-office session gate, mirrors and management actions
//! - `cli` - command-line client wired to the hosted backend
//!
//! # Architecture
//!
//! The hosted backend (tables, realtime push, blob storage, auth) is only
//! reached through the traits in [`backend`]. Nothing in this crate opens a
//! socket; [`backend::memory::MemoryBackend`] provides an in-process
//! implementation for tests and offline runs.
//!
//! # Modules
//!
//! - [`types`] - identifiers, money, statuses, categories, email
//! - [`models`] - products, cart lines and orders as stored remotely
//! - [`backend`] - the backend contract and its in-process implementation
//! - [`sync`] - realtime reconciliation of in-memory collections

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod models;
pub mod sync;
pub mod types;

pub use models::*;
pub use types::*;
