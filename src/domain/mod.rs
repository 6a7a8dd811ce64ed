//! Core domain types and logic.

pub mod observation;
pub mod correlation;
pub mod graph;
pub mod network;
pub mod config;
pub mod error;
