//! Simulated heart-rate and GSR sensors feeding an image analysis workflow.
//!
//! [`state::Session`] owns all mutable state; [`routes::router`] exposes it
//! over HTTP.

pub mod analysis;
pub mod capture;
pub mod config;
pub mod reading;
pub mod routes;
pub mod sensors;
pub mod state;
pub mod workflow;
