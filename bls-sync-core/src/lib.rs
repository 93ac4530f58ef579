#![doc = "bls-sync-core: core logic library for bls-sync."]

//! This crate mirrors an HTTP directory listing into an object-store prefix.
//! It owns every step of a run and depends on no concrete object store:
//! the CLI crate plugs in S3 through [`contract::ObjectStore`].
//!
//! # Pipeline
//! [`listing`] → [`inventory`] → [`plan`] → [`execute`] (via [`fetch`]),
//! sequenced by [`synchronise`].

pub mod config;
pub mod contract;
pub mod error;
pub mod execute;
pub mod fetch;
pub mod inventory;
pub mod listing;
#[cfg(any(test, feature = "test-export-mocks"))]
pub mod memory;
pub mod plan;
pub mod synchronise;
