//! Breakpoint policies and the local cache that mirrors them.

pub mod cache;
pub mod model;

pub use cache::BreakpointCache;
pub use model::{
    location_key, primary_key, BreakpointConfig, BreakpointVerdict, CapturePointIdentity,
};
