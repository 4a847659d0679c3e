//! rcfg TUF
//!
//! Chained-signature verification of one metadata repository: root
//! rotation, timestamp / snapshot / targets freshness and consistency,
//! threshold signatures, and verified target downloads.

pub mod client;
pub mod error;
pub mod signing;
pub mod verify;

pub use client::TufClient;
pub use error::TufError;
