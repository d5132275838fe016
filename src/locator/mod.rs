//! Caller location
//!
//! Finds the application frame that invoked [`crate::Agent::capture`].
//! Frames are resolved innermost-first; the locator skips a fixed number of
//! engine frames, then any further frames inside the engine's module
//! boundary, and reports the first frame that has a file and line.

pub mod frames;
pub mod resolver;

use std::sync::Arc;

pub use frames::{normalize_symbol, parse_backtrace, short_function_name, CallStack, StackFrame};
pub use resolver::{BacktraceResolver, FixedFrameResolver, FrameResolver};

use crate::snapshot::SourceLocation;

/// Engine frames between the resolver and the application call site:
/// `FrameResolver::resolve`, `CallerLocator::locate`, `Agent::capture`.
///
/// Adding a wrapper between `Agent::capture` and the resolver changes this
/// number; `skip_depth_is_pinned` fails until it is updated.
pub const FRAME_SKIP_DEPTH: usize = 3;

/// Function name reported when a frame carries no symbol
pub const ANONYMOUS_FUNCTION: &str = "anonymous";

/// Symbol prefixes treated as belonging to the engine
pub const ENGINE_MODULE_PREFIXES: &[&str] = &["snapline::", "<snapline::"];

/// A located call site together with the full textual stack
#[derive(Debug, Clone)]
pub struct LocatedCall {
    pub location: SourceLocation,
    pub stack_text: String,
}

pub struct CallerLocator {
    resolver: Arc<dyn FrameResolver>,
    skip_depth: usize,
    engine_prefixes: Vec<String>,
}

impl CallerLocator {
    /// Locator over `resolver` with the engine's fixed skip depth
    pub fn new(resolver: Arc<dyn FrameResolver>) -> Self {
        Self::with_skip_depth(resolver, FRAME_SKIP_DEPTH)
    }

    pub fn with_skip_depth(resolver: Arc<dyn FrameResolver>, skip_depth: usize) -> Self {
        Self {
            resolver,
            skip_depth,
            engine_prefixes: ENGINE_MODULE_PREFIXES
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }

    /// Add a module prefix (e.g. a host's wrapper crate) to skip over
    pub fn with_engine_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.engine_prefixes.push(prefix.into());
        self
    }

    pub fn skip_depth(&self) -> usize {
        self.skip_depth
    }

    /// Resolve the current stack and find the application call site.
    ///
    /// Returns `None` when the stack is empty, too shallow, or has no
    /// usable frame outside the engine.
    #[inline(never)]
    pub fn locate(&self) -> Option<LocatedCall> {
        let stack = self.resolver.resolve();
        let location = self.select(&stack.frames)?;
        Some(LocatedCall {
            location,
            stack_text: stack.text,
        })
    }

    /// Pick the application frame from an innermost-first frame list
    pub fn select(&self, frames: &[StackFrame]) -> Option<SourceLocation> {
        frames
            .iter()
            .skip(self.skip_depth)
            .skip_while(|frame| self.is_engine_frame(frame))
            .find_map(|frame| {
                let file_path = frame.file.clone()?;
                let line_number = frame.line?;
                let function_name = frame
                    .function
                    .as_deref()
                    .map(|f| short_function_name(f).to_string())
                    .filter(|f| !f.is_empty())
                    .unwrap_or_else(|| ANONYMOUS_FUNCTION.to_string());
                Some(SourceLocation {
                    file_path,
                    line_number,
                    function_name,
                })
            })
    }

    fn is_engine_frame(&self, frame: &StackFrame) -> bool {
        frame.function.as_deref().is_some_and(|function| {
            self.engine_prefixes
                .iter()
                .any(|prefix| function.starts_with(prefix.as_str()))
        })
    }
}

impl Default for CallerLocator {
    fn default() -> Self {
        Self::new(Arc::new(BacktraceResolver))
    }
}

impl std::fmt::Debug for CallerLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallerLocator")
            .field("skip_depth", &self.skip_depth)
            .field("engine_prefixes", &self.engine_prefixes)
            .finish()
    }
}
