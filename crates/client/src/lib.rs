//! Shopfront client library.
//!
//! Talks to the Shopfront REST backend and keeps the client-side view of a
//! shopper consistent with it:
//!
//! - [`api`] - typed REST client with a cached catalog
//! - [`session`] - who is signed in, persisted between runs
//! - [`cart`] - optimistic cart synchronizer tied to the session lifecycle

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod config;
pub mod session;
pub mod types;

pub use api::{ApiClient, ApiError};
pub use cart::{CartBackend, CartError, CartLine, CartPhase, CartSynchronizer, CartView};
pub use config::{ApiConfig, ClientConfig, ConfigError};
pub use session::{
    AuthError, Authenticator, Credentials, FileSessionStore, Session, SessionEvent, SessionState,
};
