//! usm-api: HTTP quote API for the USM engine
//!
//! Serves market state and conversion previews from an in-memory market.

pub mod dto;
pub mod routes;
pub mod server;
pub mod state;

pub use server::*;
pub use state::{unix_now, AppState};
