//! Client for the code-redeemer HTTP API.

pub mod client;

pub use client::{RedeemClient, RedeemOutcome, RedeemRequest};
