//! Core types and the game engine for the manga guesser.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! storage backend plugs in through [`store::GameStore`]; the HTTP layer
//! plugs in credential carriers through [`identity::CredentialExtractor`].

pub mod catalog;
pub mod engine;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod policy;
pub mod round;
pub mod session;
pub mod store;
pub mod sweeper;

#[cfg(test)]
mod stub;

pub use engine::Engine;
pub use error::{Error, Result};
pub use identity::Identity;
pub use policy::Policy;
