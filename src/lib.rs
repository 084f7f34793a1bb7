//! Creator Archiver - supervised batch fetching of creator content feeds.

pub mod compat;
pub mod config;
pub mod display;
pub mod fetch;
pub mod orchestrator;
pub mod pipeline;
