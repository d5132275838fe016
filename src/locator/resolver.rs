use std::backtrace::Backtrace;

use super::frames::{parse_backtrace, CallStack, StackFrame};

/// Source of the current call stack.
///
/// `resolve` must return frames innermost-first, starting with the
/// resolver's own frame (see [`super::FRAME_SKIP_DEPTH`]).
pub trait FrameResolver: Send + Sync {
    fn resolve(&self) -> CallStack;
}

/// Resolves frames from `std::backtrace`.
///
/// Symbolizes every frame on each call, and loads debug info on the first;
/// see the cost note on [`crate::Agent::capture`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BacktraceResolver;

impl FrameResolver for BacktraceResolver {
    #[inline(never)]
    fn resolve(&self) -> CallStack {
        let text = Backtrace::force_capture().to_string();
        let frames = strip_capture_machinery(parse_backtrace(&text));
        CallStack { frames, text }
    }
}

/// Drop the standard library's capture frames so the first frame is `resolve`
fn strip_capture_machinery(frames: Vec<StackFrame>) -> Vec<StackFrame> {
    let is_capture = |frame: &StackFrame| {
        frame.function.as_deref().is_some_and(|f| {
            f.contains("Backtrace::force_capture")
                || f.contains("Backtrace::create")
                || f.starts_with("std::backtrace_rs::")
                || f.starts_with("std::backtrace::")
        })
    };

    match frames.iter().rposition(is_capture) {
        Some(last) => frames.into_iter().skip(last + 1).collect(),
        None => frames,
    }
}

/// Returns a fixed stack.
///
/// For hosts that know their call sites up front, and for tests. Frames are
/// returned as given, so pair it with a locator skip depth of zero unless the
/// frames include engine entries.
#[derive(Debug, Clone, Default)]
pub struct FixedFrameResolver {
    frames: Vec<StackFrame>,
}

impl FixedFrameResolver {
    pub fn new(frames: Vec<StackFrame>) -> Self {
        Self { frames }
    }

    /// A single application frame
    pub fn single(file: &str, line: u32, function: &str) -> Self {
        Self::new(vec![StackFrame::new(Some(function), file, line)])
    }

    /// A stack with no frames at all
    pub fn empty() -> Self {
        Self::default()
    }
}

impl FrameResolver for FixedFrameResolver {
    fn resolve(&self) -> CallStack {
        let text = self
            .frames
            .iter()
            .enumerate()
            .map(|(i, frame)| {
                format!(
                    "{i:4}: {}\n             at {}:{}",
                    frame.function.as_deref().unwrap_or("<unknown>"),
                    frame.file.as_deref().unwrap_or("<unknown>"),
                    frame.line.unwrap_or(0)
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        CallStack {
            frames: self.frames.clone(),
            text,
        }
    }
}
