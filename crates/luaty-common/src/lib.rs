//! Common types and utilities for the luaty Lua type engine.
//!
//! This crate provides foundational types used across all luaty crates:
//! - String interning (`Atom`, `Interner`)
//! - Syntax node handles (`NodeId`)
//! - Problem severities and message templates
//! - Engine limits and thresholds

// String interning for identifier deduplication
pub mod interner;
pub use interner::{Atom, Interner};

// Syntax node handles handed out by the host's parser
pub mod node;
pub use node::NodeId;

// Problem severity and message templates
pub mod diagnostics;
pub use diagnostics::ProblemSeverity;

// Centralized limits and thresholds
pub mod limits;
