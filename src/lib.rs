//! Virtual Staging Job Pipeline
//!
//! This library drives AI image transformations for the digital-twin product:
//! it submits a staging job to the external processing service, polls it to a
//! terminal state, and persists each generated variant to R2 storage with a
//! time-limited access URL.

pub mod app_state;
pub mod config;
pub mod models;
pub mod services;
