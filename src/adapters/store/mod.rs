//! File-backed State Store

pub mod json;

pub use json::JsonStateStore;
