//! Shared foundational types used across the Kura artifact cache.
//!
//! This crate provides the source identity type consulted for freshness checks
//! and the content hash used to build integrity tags for compiled artifacts.

#![warn(missing_docs)]

pub mod hash;
pub mod source;

pub use hash::ContentHash;
pub use source::{from_unix_seconds, unix_seconds, SourceDescriptor};
