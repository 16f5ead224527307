//! Command handlers

pub mod config;
pub mod device;
pub mod edit;
pub mod listing;
pub mod status;
pub mod sync;
