//! Shopfront Core - Shared types library.
//!
//! This crate provides the domain types used across all Shopfront components:
//! - `client` - REST client, session state and cart synchronizer
//! - `cli` - Command-line storefront front end
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients. This keeps
//! it lightweight and lets presentation layers depend on it without pulling
//! in the network stack.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, money, emails, and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
