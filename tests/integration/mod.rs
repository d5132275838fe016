//! Integration tests for snapline
//!
//! These tests drive the agent end to end against mock and HTTP collaborators.

#[path = "../common/mod.rs"]
pub mod common;

pub mod capture_flow;
pub mod sync_loop;
