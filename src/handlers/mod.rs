//! HTTP handlers

pub mod health;
pub mod predict;
pub mod transactions;
pub mod stats;
pub mod export;
