//! HTTP service around `pathway_core`.
//!
//! Fandom corpora are uploaded once and cached in memory; selections are then
//! validated against the cached graph and rules.

pub mod config;
pub mod corpus;
pub mod error;
pub mod handlers;
pub mod predicates;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
