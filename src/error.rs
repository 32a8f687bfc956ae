//! Error types with source location and origin tracking.
//!
//! Every error produced by this crate carries a [`Span`] into whichever
//! buffer was being scanned, a [`SourceOrigin`] tag identifying which kind of
//! input that buffer was, and a stable negative error code matching the
//! historical CLP numbering so host programs can match on `Error::code()`
//! without depending on the `Display` text.
//!
//! ```
//! use clp::error::{Error, SourceOrigin};
//! use clp::span::Span;
//!
//! let err = Error::syn("unexpected token", Span::new(4, 7), SourceOrigin::CommandLine);
//! assert_eq!(err.code(), -2);
//! assert!(err.to_string().contains("unexpected token"));
//! ```

use crate::span::Span;
use std::fmt;

/// Tags the kind of input buffer an error (or a default value) originated
/// from. These are the literal strings the original library renders into
/// diagnostics, kept unchanged so operators grepping old logs still find
/// the text they expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceOrigin {
    CommandLine,
    PropertyList,
    DefaultValue,
    EnvironmentVariable,
    PropertyFile,
    CommandFile,
    ParameterFile,
    StringFile,
}

impl SourceOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceOrigin::CommandLine => ":command line:",
            SourceOrigin::PropertyList => ":property list:",
            SourceOrigin::DefaultValue => ":default value:",
            SourceOrigin::EnvironmentVariable => ":environment variable:",
            SourceOrigin::PropertyFile => ":property file:",
            SourceOrigin::CommandFile => ":command file:",
            SourceOrigin::ParameterFile => ":parameter file:",
            SourceOrigin::StringFile => ":string file:",
        }
    }
}

impl fmt::Display for SourceOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The error kinds from the stable CLP taxonomy, in declaration (and code)
/// order. `Ok` is never constructed as an `Error` value; it exists only so
/// [`ErrorKind::code`] can be total over the full historical enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lex,
    Syn,
    Sem,
    Typ,
    Tab,
    Siz,
    Par,
    Mem,
    Int,
    Sys,
    Aut,
}

impl ErrorKind {
    /// The stable negative error number for this kind.
    pub fn code(self) -> i32 {
        match self {
            ErrorKind::Lex => -1,
            ErrorKind::Syn => -2,
            ErrorKind::Sem => -3,
            ErrorKind::Typ => -4,
            ErrorKind::Tab => -5,
            ErrorKind::Siz => -6,
            ErrorKind::Par => -7,
            ErrorKind::Mem => -8,
            ErrorKind::Int => -9,
            ErrorKind::Sys => -10,
            ErrorKind::Aut => -11,
        }
    }

    fn label(self) -> &'static str {
        match self {
            ErrorKind::Lex => "lexical error",
            ErrorKind::Syn => "syntax error",
            ErrorKind::Sem => "semantic error",
            ErrorKind::Typ => "type error",
            ErrorKind::Tab => "table error",
            ErrorKind::Siz => "size error",
            ErrorKind::Par => "parameter error",
            ErrorKind::Mem => "memory error",
            ErrorKind::Int => "internal error",
            ErrorKind::Sys => "system error",
            ErrorKind::Aut => "authorization error",
        }
    }
}

/// An error annotated with its kind, source location, and origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Span,
    pub source: SourceOrigin,
    pub row: usize,
    pub col: usize,
}

impl Error {
    pub fn new(
        kind: ErrorKind,
        message: impl Into<String>,
        span: Span,
        source: SourceOrigin,
        row: usize,
        col: usize,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            span,
            source,
            row,
            col,
        }
    }

    /// Convenience constructor used in contexts where row/col tracking
    /// hasn't been computed yet (filled in by the handle before latching).
    pub fn at(kind: ErrorKind, message: impl Into<String>, span: Span, source: SourceOrigin) -> Self {
        Self::new(kind, message, span, source, 0, 0)
    }

    pub fn lex(message: impl Into<String>, span: Span, source: SourceOrigin) -> Self {
        Self::at(ErrorKind::Lex, message, span, source)
    }
    pub fn syn(message: impl Into<String>, span: Span, source: SourceOrigin) -> Self {
        Self::at(ErrorKind::Syn, message, span, source)
    }
    pub fn sem(message: impl Into<String>, span: Span, source: SourceOrigin) -> Self {
        Self::at(ErrorKind::Sem, message, span, source)
    }
    pub fn typ(message: impl Into<String>, span: Span, source: SourceOrigin) -> Self {
        Self::at(ErrorKind::Typ, message, span, source)
    }
    pub fn tab(message: impl Into<String>, span: Span, source: SourceOrigin) -> Self {
        Self::at(ErrorKind::Tab, message, span, source)
    }
    pub fn siz(message: impl Into<String>, span: Span, source: SourceOrigin) -> Self {
        Self::at(ErrorKind::Siz, message, span, source)
    }
    pub fn par(message: impl Into<String>, span: Span, source: SourceOrigin) -> Self {
        Self::at(ErrorKind::Par, message, span, source)
    }
    pub fn mem(message: impl Into<String>, span: Span, source: SourceOrigin) -> Self {
        Self::at(ErrorKind::Mem, message, span, source)
    }
    pub fn int(message: impl Into<String>, span: Span, source: SourceOrigin) -> Self {
        Self::at(ErrorKind::Int, message, span, source)
    }
    pub fn sys(message: impl Into<String>, span: Span, source: SourceOrigin) -> Self {
        Self::at(ErrorKind::Sys, message, span, source)
    }
    pub fn aut(message: impl Into<String>, span: Span, source: SourceOrigin) -> Self {
        Self::at(ErrorKind::Aut, message, span, source)
    }

    /// The stable negative error number, matching the historical
    /// `CLPERR_xxx` numbering.
    pub fn code(&self) -> i32 {
        self.kind.code()
    }

    /// Renders the `^`-underline view of the offending span against the
    /// original source text, followed by the list of arguments bound before
    /// the failure. Kept separate from the structured fields above: callers
    /// that only want `code()`/`message` never pay for this formatting.
    pub fn render(&self, source_text: &str, parsed_list: &[String]) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "{}: {} ({}{})\n",
            self.kind.label(),
            self.message,
            self.source,
            if self.row > 0 {
                format!(" row {} col {}", self.row, self.col)
            } else {
                String::new()
            }
        ));
        let start = self.span.start.min(source_text.len());
        let end = self.span.end.min(source_text.len()).max(start);
        out.push_str(source_text);
        out.push('\n');
        out.push_str(&" ".repeat(start));
        out.push_str(&"^".repeat((end - start).max(1)));
        if !parsed_list.is_empty() {
            out.push_str("\nparsed list:\n");
            for entry in parsed_list {
                out.push_str("  ");
                out.push_str(entry);
                out.push('\n');
            }
        }
        out
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {}..{} ({}): {}",
            self.kind.label(),
            self.span.start,
            self.span.end,
            self.source,
            self.message
        )
    }
}

impl std::error::Error for Error {}

/// Alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_matches_stable_numbering() {
        assert_eq!(ErrorKind::Lex.code(), -1);
        assert_eq!(ErrorKind::Syn.code(), -2);
        assert_eq!(ErrorKind::Sem.code(), -3);
        assert_eq!(ErrorKind::Typ.code(), -4);
        assert_eq!(ErrorKind::Tab.code(), -5);
        assert_eq!(ErrorKind::Siz.code(), -6);
        assert_eq!(ErrorKind::Par.code(), -7);
        assert_eq!(ErrorKind::Mem.code(), -8);
        assert_eq!(ErrorKind::Int.code(), -9);
        assert_eq!(ErrorKind::Sys.code(), -10);
        assert_eq!(ErrorKind::Aut.code(), -11);
    }

    #[test]
    fn display_includes_message_and_span() {
        let err = Error::syn("bad token", Span::new(5, 10), SourceOrigin::CommandLine);
        let s = err.to_string();
        assert!(s.contains("bad token"));
        assert!(s.contains("5..10"));
    }

    #[test]
    fn render_underlines_the_span() {
        let err = Error::syn("bad token", Span::new(4, 7), SourceOrigin::CommandLine);
        let rendered = err.render("NUM08=42", &[]);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[1], "NUM08=42");
        assert_eq!(lines[2], "    ^^^");
    }

    #[test]
    fn render_includes_parsed_list() {
        let err = Error::sem("bad", Span::new(0, 1), SourceOrigin::CommandLine);
        let rendered = err.render("X", &["NUM08=42".to_string()]);
        assert!(rendered.contains("parsed list"));
        assert!(rendered.contains("NUM08=42"));
    }

    #[test]
    fn source_origin_strings_are_stable() {
        assert_eq!(SourceOrigin::CommandLine.as_str(), ":command line:");
        assert_eq!(SourceOrigin::PropertyList.as_str(), ":property list:");
        assert_eq!(SourceOrigin::DefaultValue.as_str(), ":default value:");
        assert_eq!(
            SourceOrigin::EnvironmentVariable.as_str(),
            ":environment variable:"
        );
        assert_eq!(SourceOrigin::PropertyFile.as_str(), ":property file:");
        assert_eq!(SourceOrigin::CommandFile.as_str(), ":command file:");
        assert_eq!(SourceOrigin::ParameterFile.as_str(), ":parameter file:");
        assert_eq!(SourceOrigin::StringFile.as_str(), ":string file:");
    }
}
