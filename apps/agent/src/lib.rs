//! HTTP surface of the host-local secrets agent
//!
//! Routes under `/v1` delegate every lookup to a [`secrets::SecretLookup`],
//! normally the [`secrets::ManagerRegistry`].

pub mod app;
pub mod config;
pub mod constants;
pub mod error;
pub mod methods;
pub mod shutdown;
pub mod state;
