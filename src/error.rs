//! Error type for the library, and the user-facing diagnostics sink.
//!
//! The two are deliberately distinct: [`Error`] is for failures that
//! prevent the API from returning a value at all (bad UTF-8, I/O errors
//! surfaced through the reader, an internal invariant violated). Ordinary
//! compiler errors and warnings against the input program go through
//! [`Diagnostics`] instead and do not unwind the call stack — a C source
//! full of syntax errors is not a Rust-level failure until the caller asks
//! whether the error count is non-zero.

use std::fmt;

/// The library's result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// An error returned by the library's public API.
#[derive(Debug)]
pub struct Error {
    inner: ErrorInner,
}

#[derive(Debug)]
enum ErrorInner {
    Io(std::io::Error),
    Compile { errors: u32, warnings: u32 },
}

/// A coarse classification of [`Error`], for callers that want to branch
/// on the failure without matching on [`Error`]'s private representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Failed to read the input.
    Io(std::io::ErrorKind),
    /// Compilation completed but recorded one or more errors.
    Compile,
}

impl Error {
    pub(crate) fn io(error: std::io::Error) -> Self {
        Error {
            inner: ErrorInner::Io(error),
        }
    }

    pub(crate) fn compile(errors: u32, warnings: u32) -> Self {
        Error {
            inner: ErrorInner::Compile { errors, warnings },
        }
    }

    /// Returns a coarse classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match &self.inner {
            ErrorInner::Io(e) => ErrorKind::Io(e.kind()),
            ErrorInner::Compile { .. } => ErrorKind::Compile,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            ErrorInner::Io(e) => write!(f, "{}", e),
            ErrorInner::Compile { errors, warnings } => write!(
                f,
                "compilation failed: {} error{}, {} warning{}",
                errors,
                if *errors == 1 { "" } else { "s" },
                warnings,
                if *warnings == 1 { "" } else { "s" }
            ),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.inner {
            ErrorInner::Io(e) => Some(e),
            ErrorInner::Compile { .. } => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::io(e)
    }
}

/// A single recorded compiler message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Active input file name, if any was set when the message was raised.
    pub file: Option<String>,
    /// 1-based source line, if a file was active.
    pub line: u32,
    /// The rendered message text (no prefix, no trailing newline).
    pub message: String,
    /// Whether this diagnostic is an error (`false` means warning).
    pub is_error: bool,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_error { "error" } else { "warning" };
        match &self.file {
            Some(file) => write!(f, "{}:{}: {}: {}", file, self.line, kind, self.message),
            None => write!(f, "nanocc: {}: {}", kind, self.message),
        }
    }
}

/// Collects compiler errors and warnings as they're raised, matching the
/// original `tcc_error`/`tcc_warning` contract: raising a message never
/// stops compilation, it only increments a counter and records the text.
/// Callers decide whether to abort based on [`Diagnostics::error_count`].
#[derive(Debug, Default)]
pub struct Diagnostics {
    messages: Vec<Diagnostic>,
    error_count: u32,
    warning_count: u32,
    current_file: Option<String>,
    current_line: u32,
}

impl Diagnostics {
    /// Creates an empty sink with no active file.
    pub fn new() -> Self {
        Diagnostics::default()
    }

    /// Sets the file/line reported on subsequent messages, mirroring the
    /// lexer's currently open `BufferedFile`.
    pub fn set_location(&mut self, file: &str, line: u32) {
        self.current_file = Some(file.to_string());
        self.current_line = line;
    }

    /// Updates just the line number, leaving the active file unchanged.
    pub fn set_line(&mut self, line: u32) {
        self.current_line = line;
    }

    /// Records an error at the current location and prints it to stderr.
    pub fn error(&mut self, message: impl Into<String>) {
        self.push(message.into(), true);
    }

    /// Records a warning at the current location and prints it to stderr.
    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(message.into(), false);
    }

    fn push(&mut self, message: String, is_error: bool) {
        let diag = Diagnostic {
            file: self.current_file.clone(),
            line: self.current_line,
            message,
            is_error,
        };
        eprintln!("{}", diag);
        if is_error {
            self.error_count += 1;
            log::debug!("recorded error: {}", diag.message);
        } else {
            self.warning_count += 1;
            log::debug!("recorded warning: {}", diag.message);
        }
        self.messages.push(diag);
    }

    /// Number of errors recorded so far.
    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    /// Number of warnings recorded so far.
    pub fn warning_count(&self) -> u32 {
        self.warning_count
    }

    /// All messages recorded so far, in emission order.
    pub fn messages(&self) -> &[Diagnostic] {
        &self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_file_uses_bare_prefix() {
        let mut d = Diagnostics::new();
        d.error("bad token");
        assert_eq!(d.messages()[0].to_string(), "nanocc: error: bad token");
    }

    #[test]
    fn file_and_line_prefix() {
        let mut d = Diagnostics::new();
        d.set_location("foo.c", 12);
        d.warning("unused variable");
        assert_eq!(
            d.messages()[0].to_string(),
            "foo.c:12: warning: unused variable"
        );
    }

    #[test]
    fn counts_independently() {
        let mut d = Diagnostics::new();
        d.error("e1");
        d.warning("w1");
        d.error("e2");
        assert_eq!(d.error_count(), 2);
        assert_eq!(d.warning_count(), 1);
    }
}
