//! Tokens produced by the lexer (C2).

use crate::operators::OperatorDescriptor;
use crate::span::Position;

/// A literal's value, already decoded by the lexer. Integers wider than 64
/// bits are kept as little-endian 64-bit limbs (§4.2) rather than forcing a
/// fixed-width representation on the lexer.
#[derive(Clone, Debug, PartialEq)]
pub enum LiteralValue {
  /// `1..=16` little-endian 64-bit limbs, backing the `i8..=i1024` /
  /// `u8..=u1024` family. A plain `i32` literal is one limb.
  Int(Vec<u64>),
  Float(f64),
  Bool(bool),
  /// Index into the module's deduplicated string table (not resolved here;
  /// the lexer only records which raw bytes were decoded).
  Str(Vec<u8>),
  /// `b"..."` raw byte-string literal.
  Bytes(Vec<u8>),
  /// `'x'` character literal, decoded to its single byte value (escapes
  /// share the string lexer's table, §4.2).
  Char(u8),
}

/// The kind of a token: one entry per literal family, one per identifier
/// class, one per registered operator symbol (by stable name so the parser
/// doesn't need to re-match on text), structural punctuation, and the two
/// sentinel kinds.
#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
  IntLiteral(LiteralValue),
  FloatLiteral(LiteralValue),
  BoolLiteral(bool),
  StringLiteral(LiteralValue),
  BytesLiteral(LiteralValue),
  CharLiteral(LiteralValue),
  Identifier,
  Keyword(Keyword),
  /// An operator symbol matched against the registry. Carries the resolved
  /// descriptor (after the lexer's position heuristic) and whether more
  /// than one descriptor shared this symbol text.
  Operator { descriptor: &'static OperatorDescriptor, ambiguous: bool },
  LParen,
  RParen,
  LBrace,
  RBrace,
  LBracket,
  RBracket,
  Semicolon,
  Comma,
  Colon,
  Eof,
  /// A lexical error: the byte slice could not be tokenized. The lexer
  /// still returns a token (rather than aborting) so it can keep scanning
  /// and report every error in one pass.
  Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Keyword {
  Let,
  Return,
  Halt,
  If,
  Else,
  Loop,
  While,
  Count,
  Range,
  Break,
  Continue,
  Fn,
  Module,
  Import,
  In,
}

impl Keyword {
  #[must_use] pub fn from_str(s: &str) -> Option<Self> {
    Some(match s {
      "let" => Self::Let,
      "return" => Self::Return,
      "halt" => Self::Halt,
      "if" => Self::If,
      "else" => Self::Else,
      "loop" => Self::Loop,
      "while" => Self::While,
      "count" => Self::Count,
      "range" => Self::Range,
      "break" => Self::Break,
      "continue" => Self::Continue,
      "fn" => Self::Fn,
      "module" => Self::Module,
      "import" => Self::Import,
      "in" => Self::In,
      _ => return None,
    })
  }
}

/// A single lexed token: its kind, the exact source bytes it covers, and
/// its position. `text` borrows from the source buffer the lexer was given.
#[derive(Clone, Debug)]
pub struct Token<'src> {
  pub kind: TokenKind,
  pub text: &'src [u8],
  pub pos: Position,
}

impl<'src> Token<'src> {
  #[must_use] pub fn new(kind: TokenKind, text: &'src [u8], pos: Position) -> Self {
    Self { kind, text, pos }
  }

  #[must_use] pub fn is_eof(&self) -> bool { matches!(self.kind, TokenKind::Eof) }

  /// Whether this token is "value-like": the lexer's position heuristic
  /// treats an operator as infix/postfix when it immediately follows a
  /// value-like token, and as prefix otherwise (§4.1).
  #[must_use] pub fn is_value_like(&self) -> bool {
    matches!(
      self.kind,
      TokenKind::IntLiteral(_)
        | TokenKind::FloatLiteral(_)
        | TokenKind::BoolLiteral(_)
        | TokenKind::StringLiteral(_)
        | TokenKind::BytesLiteral(_)
        | TokenKind::CharLiteral(_)
        | TokenKind::Identifier
        | TokenKind::RParen
        | TokenKind::RBracket
        | TokenKind::RBrace
    )
  }
}
