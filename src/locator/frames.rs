//! Stack frame model and parsing of the standard library's backtrace text.

/// One frame of a resolved call stack
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StackFrame {
    /// Fully qualified symbol with hash and closure suffixes removed
    pub function: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl StackFrame {
    pub fn new(function: Option<&str>, file: &str, line: u32) -> Self {
        Self {
            function: function.map(str::to_string),
            file: Some(file.to_string()),
            line: Some(line),
        }
    }
}

/// Frames innermost-first, plus the text they were parsed from
#[derive(Debug, Clone, Default)]
pub struct CallStack {
    pub frames: Vec<StackFrame>,
    pub text: String,
}

/// Parse `std::backtrace::Backtrace` display output.
///
/// The format is a numbered symbol line followed by zero or more
/// indented `at file:line:col` lines:
///
/// ```text
///    4: orders::checkout
///              at ./src/orders.rs:42:9
///    5: <unknown>
/// ```
pub fn parse_backtrace(text: &str) -> Vec<StackFrame> {
    let mut frames: Vec<StackFrame> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim_start();

        if let Some(location) = trimmed.strip_prefix("at ") {
            if let Some(frame) = frames.last_mut() {
                // Inlined frames can list several locations; the first is the call site.
                if frame.file.is_none() {
                    let (file, line) = parse_location(location);
                    frame.file = file;
                    frame.line = line;
                }
            }
            continue;
        }

        if let Some((index, symbol)) = trimmed.split_once(": ") {
            if !index.is_empty() && index.chars().all(|c| c.is_ascii_digit()) {
                frames.push(StackFrame {
                    function: normalize_symbol(symbol),
                    file: None,
                    line: None,
                });
            }
        }
    }

    frames
}

/// Split `path:line[:col]` from the right so drive letters survive
fn parse_location(location: &str) -> (Option<String>, Option<u32>) {
    let location = location.trim();
    let mut parts = location.rsplitn(3, ':');
    let last = parts.next();
    let middle = parts.next();
    let rest = parts.next();

    match (last, middle, rest) {
        (Some(col), Some(line), Some(path)) if col.parse::<u32>().is_ok() => {
            match line.parse::<u32>() {
                Ok(line) => (Some(path.to_string()), Some(line)),
                Err(_) => (Some(format!("{path}:{line}")), col.parse().ok()),
            }
        }
        (Some(line), Some(path), rest) => {
            let path = match rest {
                Some(prefix) => format!("{prefix}:{path}"),
                None => path.to_string(),
            };
            match line.parse::<u32>() {
                Ok(line) => (Some(path), Some(line)),
                Err(_) => (Some(location.to_string()), None),
            }
        }
        _ => (Some(location.to_string()), None),
    }
}

/// Strip the `::h<hash>` and `{{closure}}` suffixes from a demangled symbol
pub fn normalize_symbol(symbol: &str) -> Option<String> {
    let mut symbol = symbol.trim();
    if symbol.is_empty() || symbol == "<unknown>" {
        return None;
    }

    if let Some((head, hash)) = symbol.rsplit_once("::h") {
        if hash.len() == 16 && hash.chars().all(|c| c.is_ascii_hexdigit()) {
            symbol = head;
        }
    }

    loop {
        let stripped = symbol
            .strip_suffix("::{{closure}}")
            .or_else(|| strip_closure_v0(symbol));
        match stripped {
            Some(rest) => symbol = rest,
            None => break,
        }
    }

    if symbol.is_empty() {
        None
    } else {
        Some(symbol.to_string())
    }
}

/// `::{closure#0}` as emitted by the v0 mangling scheme
fn strip_closure_v0(symbol: &str) -> Option<&str> {
    let (head, tail) = symbol.rsplit_once("::{closure#")?;
    let digits = tail.strip_suffix('}')?;
    digits.chars().all(|c| c.is_ascii_digit()).then_some(head)
}

/// Last path segment of a symbol, used as the reported function name
pub fn short_function_name(symbol: &str) -> &str {
    let symbol = symbol.trim_end_matches('>');
    let name = symbol.rsplit("::").next().unwrap_or(symbol);
    name.split('<').next().unwrap_or(name)
}
