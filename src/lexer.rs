//! The lexer (C2): turns a source buffer into a stream of [`Token`]s.
//!
//! A `Translator`-style single-pass state machine: one
//! struct holds the cursor and emits one token per call, rather than
//! building a `Vec<Token>` up front. Unknown byte sequences never abort the
//! scan — they become `TokenKind::Error` tokens with a diagnostic attached,
//! so a single pass can report every lexical error in a file instead of
//! just the first.

use num::BigUint;

use crate::diagnostics::{DiagnosticHandler, Details};
use crate::operators::OperatorRegistry;
use crate::span::Position;
use crate::symbol::Interner;
use crate::token::{Keyword, LiteralValue, Token, TokenKind};

pub struct Lexer<'src, 'dx> {
  src: &'src [u8],
  pos: usize,
  line: u32,
  column: u32,
  /// Whether the most recently emitted significant token was value-like;
  /// drives the prefix/infix heuristic for symbols the registry overloads
  /// by position (§4.1).
  last_was_value: bool,
  interner: &'dx mut Interner,
  diagnostics: &'dx mut DiagnosticHandler,
  filename: crate::symbol::Symbol,
}

impl<'src, 'dx> Lexer<'src, 'dx> {
  #[must_use] pub fn new(
    src: &'src [u8],
    filename: crate::symbol::Symbol,
    interner: &'dx mut Interner,
    diagnostics: &'dx mut DiagnosticHandler,
  ) -> Self {
    Self { src, pos: 0, line: 1, column: 1, last_was_value: false, interner, diagnostics, filename }
  }

  fn peek(&self) -> Option<u8> { self.src.get(self.pos).copied() }
  fn peek_at(&self, off: usize) -> Option<u8> { self.src.get(self.pos + off).copied() }

  fn bump(&mut self) -> Option<u8> {
    let b = self.peek()?;
    self.pos += 1;
    if b == b'\n' { self.line += 1; self.column = 1 } else { self.column += 1 }
    Some(b)
  }

  fn skip_trivia(&mut self) {
    loop {
      match self.peek() {
        Some(b' ' | b'\t' | b'\r' | b'\n') => { self.bump(); }
        Some(b'/') if self.peek_at(1) == Some(b'/') => {
          while !matches!(self.peek(), None | Some(b'\n')) { self.bump(); }
        }
        Some(b'/') if self.peek_at(1) == Some(b'*') => {
          self.bump(); self.bump();
          while !(self.peek().is_none() || (self.peek() == Some(b'*') && self.peek_at(1) == Some(b'/'))) {
            self.bump();
          }
          self.bump(); self.bump();
        }
        _ => break,
      }
    }
  }

  fn pos_of(&self, start_line: u32, start_col: u32, len: u32) -> Position {
    Position::new(start_line, start_col, len)
  }

  /// Produce the next token. Always terminates the stream with `Eof`;
  /// calling `next_token` again after `Eof` keeps returning `Eof`.
  pub fn next_token(&mut self) -> Token<'src> {
    self.skip_trivia();
    let start = self.pos;
    let (line, column) = (self.line, self.column);

    let Some(b) = self.peek() else {
      return Token::new(TokenKind::Eof, &self.src[start..start], self.pos_of(line, column, 0));
    };

    let tok = if b.is_ascii_digit() {
      self.lex_number(line, column)
    } else if b == b'"' {
      self.lex_string(line, column)
    } else if b == b'b' && self.peek_at(1) == Some(b'"') {
      self.bump();
      self.lex_bytes(line, column)
    } else if b == b'\'' {
      self.lex_char(line, column)
    } else if is_ident_start(b) {
      self.lex_identifier(line, column)
    } else if b == b':' && self.peek_at(1) != Some(b'=') {
      self.bump();
      Token::new(TokenKind::Colon, &self.src[start..self.pos], self.pos_of(line, column, 1))
    } else if let Some(structural) = structural_kind(b) {
      self.bump();
      Token::new(structural, &self.src[start..self.pos], self.pos_of(line, column, 1))
    } else {
      self.lex_operator(line, column)
    };

    self.last_was_value = tok.is_value_like();
    tok
  }

  fn lex_identifier(&mut self, line: u32, column: u32) -> Token<'src> {
    let start = self.pos;
    while self.peek().is_some_and(is_ident_continue) { self.bump(); }
    let text = &self.src[start..self.pos];
    // Identifiers are ASCII per §6.1; this is infallible for well-formed input.
    let s = std::str::from_utf8(text).unwrap_or("");
    let kind = match s {
      "true" => TokenKind::BoolLiteral(true),
      "false" => TokenKind::BoolLiteral(false),
      _ => match Keyword::from_str(s) {
        Some(kw) => TokenKind::Keyword(kw),
        None => {
          self.interner.intern(s);
          TokenKind::Identifier
        }
      },
    };
    Token::new(kind, text, self.pos_of(line, column, (self.pos - start) as u32))
  }

  fn lex_number(&mut self, line: u32, column: u32) -> Token<'src> {
    let start = self.pos;
    while self.peek().is_some_and(|c| c.is_ascii_digit() || c == b'_') { self.bump(); }
    let mut is_float = false;
    if self.peek() == Some(b'.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
      is_float = true;
      self.bump();
      while self.peek().is_some_and(|c| c.is_ascii_digit() || c == b'_') { self.bump(); }
    }
    if matches!(self.peek(), Some(b'e' | b'E')) {
      let save = self.pos;
      self.bump();
      if matches!(self.peek(), Some(b'+' | b'-')) { self.bump(); }
      if self.peek().is_some_and(|c| c.is_ascii_digit()) {
        is_float = true;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) { self.bump(); }
      } else {
        self.pos = save;
      }
    }
    let text = &self.src[start..self.pos];
    let digits: String = text.iter().filter(|&&b| b != b'_').map(|&b| b as char).collect();
    let kind = if is_float {
      match digits.parse::<f64>() {
        Ok(v) => TokenKind::FloatLiteral(LiteralValue::Float(v)),
        Err(_) => {
          self.report_syntax_error(line, column, text.len() as u32, "malformed float literal");
          TokenKind::Error
        }
      }
    } else {
      match digits.parse::<BigUint>() {
        Ok(v) => TokenKind::IntLiteral(LiteralValue::Int(biguint_to_limbs(&v))),
        Err(_) => {
          self.report_syntax_error(line, column, text.len() as u32, "malformed integer literal");
          TokenKind::Error
        }
      }
    };
    Token::new(kind, text, self.pos_of(line, column, (self.pos - start) as u32))
  }

  fn lex_string(&mut self, line: u32, column: u32) -> Token<'src> {
    let start = self.pos;
    self.bump(); // opening quote
    let mut bytes = Vec::new();
    loop {
      match self.peek() {
        None | Some(b'\n') => {
          self.report_syntax_error(line, column, (self.pos - start) as u32, "unterminated string literal");
          return Token::new(TokenKind::Error, &self.src[start..self.pos], self.pos_of(line, column, (self.pos - start) as u32));
        }
        Some(b'"') => { self.bump(); break }
        Some(b'\\') => { self.bump(); bytes.push(self.lex_escape(line, column)); }
        Some(c) => { self.bump(); bytes.push(c); }
      }
    }
    let text = &self.src[start..self.pos];
    Token::new(TokenKind::StringLiteral(LiteralValue::Str(bytes)), text, self.pos_of(line, column, (self.pos - start) as u32))
  }

  fn lex_bytes(&mut self, line: u32, column: u32) -> Token<'src> {
    let start = self.pos - 1; // include leading 'b'
    self.bump(); // opening quote
    let mut bytes = Vec::new();
    loop {
      match self.peek() {
        None | Some(b'\n') => {
          self.report_syntax_error(line, column, (self.pos - start) as u32, "unterminated byte-string literal");
          return Token::new(TokenKind::Error, &self.src[start..self.pos], self.pos_of(line, column, (self.pos - start) as u32));
        }
        Some(b'"') => { self.bump(); break }
        Some(b'\\') => { self.bump(); bytes.push(self.lex_escape(line, column)); }
        Some(c) => { self.bump(); bytes.push(c); }
      }
    }
    let text = &self.src[start..self.pos];
    Token::new(TokenKind::BytesLiteral(LiteralValue::Bytes(bytes)), text, self.pos_of(line, column, (self.pos - start) as u32))
  }

  fn lex_char(&mut self, line: u32, column: u32) -> Token<'src> {
    let start = self.pos;
    self.bump(); // opening quote
    let value = match self.peek() {
      Some(b'\\') => { self.bump(); self.lex_escape(line, column) }
      Some(c) => { self.bump(); c }
      None => {
        self.report_syntax_error(line, column, (self.pos - start) as u32, "unterminated character literal");
        return Token::new(TokenKind::Error, &self.src[start..self.pos], self.pos_of(line, column, (self.pos - start) as u32));
      }
    };
    if self.peek() != Some(b'\'') {
      self.report_syntax_error(line, column, (self.pos - start) as u32, "unterminated character literal");
      return Token::new(TokenKind::Error, &self.src[start..self.pos], self.pos_of(line, column, (self.pos - start) as u32));
    }
    self.bump(); // closing quote
    let text = &self.src[start..self.pos];
    Token::new(TokenKind::CharLiteral(LiteralValue::Char(value)), text, self.pos_of(line, column, (self.pos - start) as u32))
  }

  /// `\n \t \r \\ \' \" \0` decode to their usual control bytes (§4.2); any
  /// other escaped byte (`\z`, say) is preserved literally rather than
  /// reported as an error — only the backslash is consumed.
  fn lex_escape(&mut self, line: u32, column: u32) -> u8 {
    match self.bump() {
      Some(b'n') => b'\n',
      Some(b't') => b'\t',
      Some(b'r') => b'\r',
      Some(b'0') => 0,
      Some(b'\\') => b'\\',
      Some(b'\'') => b'\'',
      Some(b'"') => b'"',
      Some(other) => other,
      None => {
        self.report_syntax_error(line, column, 1, "unterminated escape sequence");
        b'\\'
      }
    }
  }

  fn lex_operator(&mut self, line: u32, column: u32) -> Token<'src> {
    let start = self.pos;
    match OperatorRegistry::longest_match(&self.src[start..]) {
      Some((candidates, len)) => {
        for _ in 0..len { self.bump(); }
        let descriptor = if candidates.len() == 1 {
          candidates[0]
        } else if self.last_was_value {
          candidates.iter().copied().find(|d| d.position != crate::operators::Position::Prefix).unwrap_or(candidates[0])
        } else {
          candidates.iter().copied().find(|d| d.position == crate::operators::Position::Prefix).unwrap_or(candidates[0])
        };
        let text = &self.src[start..self.pos];
        Token::new(
          TokenKind::Operator { descriptor, ambiguous: candidates.len() > 1 },
          text,
          self.pos_of(line, column, len as u32),
        )
      }
      None => {
        self.bump();
        let text = &self.src[start..self.pos];
        let unknown = String::from_utf8_lossy(text).into_owned();
        self.diagnostics.report_unknown_operator(self.filename, self.pos_of(line, column, 1), &unknown);
        Token::new(TokenKind::Error, text, self.pos_of(line, column, 1))
      }
    }
  }

  fn report_syntax_error(&mut self, line: u32, column: u32, len: u32, message: &str) {
    self.diagnostics.report(
      self.filename,
      self.pos_of(line, column, len),
      crate::diagnostics::Severity::Error,
      Details::Message { category: crate::diagnostics::Category::Lexical, message: message.to_string() },
    );
  }
}

fn is_ident_start(b: u8) -> bool { b.is_ascii_alphabetic() || b == b'_' }
fn is_ident_continue(b: u8) -> bool { b.is_ascii_alphanumeric() || b == b'_' }

fn structural_kind(b: u8) -> Option<TokenKind> {
  Some(match b {
    b'(' => TokenKind::LParen,
    b')' => TokenKind::RParen,
    b'{' => TokenKind::LBrace,
    b'}' => TokenKind::RBrace,
    b'[' => TokenKind::LBracket,
    b']' => TokenKind::RBracket,
    b';' => TokenKind::Semicolon,
    b',' => TokenKind::Comma,
    _ => return None,
  })
}

/// Decompose a big unsigned integer into 1..=16 little-endian 64-bit limbs
/// (§4.2). A value that fits in one `u64` still produces a one-element
/// vector so callers never special-case width.
fn biguint_to_limbs(v: &BigUint) -> Vec<u64> {
  let digits = v.to_u64_digits();
  if digits.is_empty() { vec![0] } else { digits }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::diagnostics::DiagnosticHandler;

  fn lex_all(src: &str) -> Vec<TokenKind> {
    let mut interner = Interner::new();
    let file = interner.intern("test.fcx");
    let mut dx = DiagnosticHandler::new(100);
    let mut lexer = Lexer::new(src.as_bytes(), file, &mut interner, &mut dx);
    let mut out = Vec::new();
    loop {
      let t = lexer.next_token();
      let is_eof = t.is_eof();
      out.push(t.kind);
      if is_eof { break }
    }
    out
  }

  #[test]
  fn lexes_boolean_literals_distinct_from_identifiers() {
    let toks = lex_all("true false maybe");
    assert!(matches!(toks[0], TokenKind::BoolLiteral(true)));
    assert!(matches!(toks[1], TokenKind::BoolLiteral(false)));
    assert!(matches!(toks[2], TokenKind::Identifier));
  }

  #[test]
  fn lexes_identifier_and_keyword() {
    let toks = lex_all("let x");
    assert!(matches!(toks[0], TokenKind::Keyword(Keyword::Let)));
    assert!(matches!(toks[1], TokenKind::Identifier));
  }

  #[test]
  fn lexes_big_integer_literal_into_multiple_limbs() {
    let huge = "340282366920938463463374607431768211456"; // 2^128
    let toks = lex_all(huge);
    match &toks[0] {
      TokenKind::IntLiteral(LiteralValue::Int(limbs)) => assert_eq!(limbs.len(), 3),
      other => panic!("expected int literal, got {other:?}"),
    }
  }

  #[test]
  fn ampersand_resolves_to_prefix_after_operator() {
    let toks = lex_all("x := &y");
    let last_op = toks.iter().rev().find_map(|t| match t {
      TokenKind::Operator { descriptor, .. } if descriptor.symbol == "&" => Some(*descriptor),
      _ => None,
    }).unwrap();
    assert_eq!(descriptor_position(last_op), crate::operators::Position::Prefix);
  }

  #[test]
  fn ampersand_resolves_to_infix_after_value() {
    let toks = lex_all("x & y");
    let op = toks.iter().find_map(|t| match t {
      TokenKind::Operator { descriptor, .. } if descriptor.symbol == "&" => Some(*descriptor),
      _ => None,
    }).unwrap();
    assert_eq!(descriptor_position(op), crate::operators::Position::Infix);
  }

  fn descriptor_position(d: &'static crate::operators::OperatorDescriptor) -> crate::operators::Position {
    d.position
  }

  #[test]
  fn lexes_character_literal_and_escape() {
    let toks = lex_all("'a'");
    assert!(matches!(toks[0], TokenKind::CharLiteral(LiteralValue::Char(b'a'))));
    let toks = lex_all("'\\n'");
    assert!(matches!(toks[0], TokenKind::CharLiteral(LiteralValue::Char(b'\n'))));
  }

  #[test]
  fn unrecognized_escape_is_preserved_literally_without_an_error() {
    let toks = lex_all(r#""\z""#);
    match &toks[0] {
      TokenKind::StringLiteral(LiteralValue::Str(bytes)) => assert_eq!(bytes, b"z"),
      other => panic!("expected string literal, got {other:?}"),
    }
  }

  #[test]
  fn escaped_single_quote_decodes_in_a_string() {
    let toks = lex_all(r#""\'""#);
    match &toks[0] {
      TokenKind::StringLiteral(LiteralValue::Str(bytes)) => assert_eq!(bytes, b"'"),
      other => panic!("expected string literal, got {other:?}"),
    }
  }

  #[test]
  fn cas_symbol_lexes_as_one_token() {
    let toks = lex_all("p <=> e, n");
    assert!(toks.iter().any(|t| matches!(t, TokenKind::Operator { descriptor, .. } if descriptor.symbol == "<=>")));
  }

  #[test]
  fn unknown_byte_reports_diagnostic_and_keeps_scanning() {
    let mut interner = Interner::new();
    let file = interner.intern("test.fcx");
    let mut dx = DiagnosticHandler::new(100);
    let mut lexer = Lexer::new(b"x ` y", file, &mut interner, &mut dx);
    let mut kinds = Vec::new();
    loop {
      let t = lexer.next_token();
      let eof = t.is_eof();
      kinds.push(t.kind);
      if eof { break }
    }
    assert!(kinds.iter().any(|k| matches!(k, TokenKind::Error)));
    assert!(dx.has_errors());
  }
}
