//! core
//!
//! Core domain types, branches, and configuration for Trellis.
//!
//! # Modules
//!
//! - [`types`] - Strong types: BranchName, Name, Hash
//! - [`branch`] - Branch snapshots and their merge
//! - [`config`] - Configuration schema and loading
//! - [`paths`] - Centralized path routing for codebase storage
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing
//! - Branch operations are pure; nothing here performs I/O except config
//!   loading

pub mod branch;
pub mod config;
pub mod paths;
pub mod types;
