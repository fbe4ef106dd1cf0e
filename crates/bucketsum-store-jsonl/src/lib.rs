//! JSONL datastore for bucketsum
//!
//! This crate implements the datastore traits over plain JSONL record files,
//! either a single file or a directory tree of `*.jsonl` files.

pub mod data_loader;

pub use data_loader::{JsonlSession, JsonlStore};
