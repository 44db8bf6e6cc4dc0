//! Source positions and spans.
//!
//! Line and column are counted in bytes, not code points (§6.1): the lexer
//! never decodes UTF-8 beyond what it needs to validate identifier and
//! string content, so positions stay byte-accurate even inside multi-byte
//! sequences.

use crate::symbol::Symbol;

/// A position in a single source file: 1-based line, 1-based column, and
/// the byte length of the span it anchors (0 for a point position).
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Position {
  pub line: u32,
  pub column: u32,
  pub length: u32,
}

impl Position {
  #[must_use] pub fn new(line: u32, column: u32, length: u32) -> Self {
    Self { line, column, length }
  }

  /// The number of carets to draw under this position: the span's length,
  /// or 1 for a zero-length (point) position.
  #[must_use] pub fn caret_width(self) -> u32 { self.length.max(1) }
}

/// A position together with the file it belongs to. The filename is an
/// interned [`Symbol`] so that two spans in the same file compare equal in
/// their file component without a string comparison.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FileSpan {
  pub file: Symbol,
  pub pos: Position,
}

impl FileSpan {
  #[must_use] pub fn new(file: Symbol, pos: Position) -> Self { Self { file, pos } }
}

/// Wraps a value together with the span it was parsed from. Used throughout
/// the IR generator (e.g. errors reference the `Spanned` node that caused
/// them) and by the module's global table.
#[derive(Clone, Copy, Debug)]
pub struct Spanned<T> {
  pub span: FileSpan,
  pub k: T,
}

impl<T> Spanned<T> {
  #[must_use] pub fn new(span: FileSpan, k: T) -> Self { Self { span, k } }
}
