//! Diagnostics (C3): the structured error/warning taxonomy the rest of the
//! front end reports into, and the "did you mean" suggestion engine used
//! when an unknown operator symbol is lexed.
//!
//! Diagnostics accumulate in an append-only [`DiagnosticHandler`] instead of
//! being thrown as exceptions: internal invariant violations panic
//! (`assert!`/`unreachable!`), while
//! user-facing problems get recorded and rendering is deferred to the end of
//! the pass so one run reports everything wrong with a file at once.

use std::io::{self, Write};

use crate::operators::OperatorRegistry;
use crate::span::{FileSpan, Position};
use crate::symbol::{Interner, Symbol};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum Severity {
  Warning,
  Error,
  /// Stops the pass immediately; `DiagnosticHandler::has_fatal_errors`
  /// exists for callers (the IR generator) that need to bail out early
  /// rather than push on with a corrupted program.
  Fatal,
}

/// The ten error categories (§4.3). Every [`Diagnostic`] belongs to exactly
/// one, independent of which [`Details`] shape it carries.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Category {
  Lexical,
  Syntax,
  Semantic,
  TypeMismatch,
  UnknownOperator,
  OperatorAmbiguity,
  PointerTypeMismatch,
  Codegen,
  Link,
  Internal,
}

impl Category {
  fn as_str(self) -> &'static str {
    match self {
      Category::Lexical => "lexical",
      Category::Syntax => "syntax",
      Category::Semantic => "semantic",
      Category::TypeMismatch => "type-mismatch",
      Category::UnknownOperator => "unknown-operator",
      Category::OperatorAmbiguity => "operator-ambiguity",
      Category::PointerTypeMismatch => "pointer-type-mismatch",
      Category::Codegen => "codegen",
      Category::Link => "link",
      Category::Internal => "internal",
    }
  }
}

/// A single "did you mean" candidate for an unknown operator symbol:
/// the registered symbol, its similarity score (0-100), and its
/// human-readable description straight from the registry.
#[derive(Clone, Debug)]
pub struct Suggestion {
  pub symbol: String,
  pub similarity: u8,
  pub description: &'static str,
}

/// The structured payload a [`Diagnostic`] carries, discriminated by shape
/// rather than by category: several categories share a shape (§4.3 groups
/// type-mismatch and pointer-type-mismatch under one `(from, to, hint)`
/// shape), while plain messages cover the categories with no further
/// structure (lexical, syntax-without-expected/found, semantic, codegen,
/// link, internal).
#[derive(Clone, Debug)]
pub enum Details {
  Message { category: Category, message: String },
  ExpectedFound { category: Category, expected: String, found: String },
  TypeMismatch { category: Category, from: String, to: String, hint: Option<String> },
  UnknownOperator { symbol: String, suggestions: Vec<Suggestion> },
  OperatorAmbiguity { symbol: String, possible_meanings: Vec<String>, disambiguation_hint: Option<String> },
}

impl Details {
  #[must_use] pub fn category(&self) -> Category {
    match self {
      Details::Message { category, .. }
      | Details::ExpectedFound { category, .. }
      | Details::TypeMismatch { category, .. } => *category,
      Details::UnknownOperator { .. } => Category::UnknownOperator,
      Details::OperatorAmbiguity { .. } => Category::OperatorAmbiguity,
    }
  }

  /// The `= note:` line content: the structured detail, formatted.
  fn note(&self) -> Option<String> {
    match self {
      Details::Message { .. } => None,
      Details::ExpectedFound { expected, found, .. } => {
        Some(format!("expected {expected}, found {found}"))
      }
      Details::TypeMismatch { from, to, .. } => Some(format!("from `{from}` to `{to}`")),
      Details::UnknownOperator { symbol, .. } => Some(format!("no registered operator matches `{symbol}`")),
      Details::OperatorAmbiguity { symbol, possible_meanings, .. } => Some(format!(
        "`{symbol}` could mean: {}",
        possible_meanings.join(", ")
      )),
    }
  }

  /// The `= help:` line content: a hint or a rendered suggestion list.
  fn help(&self) -> Option<String> {
    match self {
      Details::Message { .. } | Details::ExpectedFound { .. } => None,
      Details::TypeMismatch { hint, .. } => hint.clone(),
      Details::UnknownOperator { suggestions, .. } => {
        if suggestions.is_empty() {
          None
        } else {
          let rendered: Vec<String> = suggestions
            .iter()
            .map(|s| format!("`{}` ({}% match, {})", s.symbol, s.similarity, s.description))
            .collect();
          Some(format!("did you mean {}?", rendered.join(", ")))
        }
      }
      Details::OperatorAmbiguity { disambiguation_hint, .. } => disambiguation_hint.clone(),
    }
  }
}

#[derive(Clone, Debug)]
pub struct Diagnostic {
  pub file: Symbol,
  pub pos: Position,
  pub severity: Severity,
  pub details: Details,
}

impl Diagnostic {
  fn message(&self) -> String {
    match &self.details {
      Details::Message { message, .. } => message.clone(),
      Details::ExpectedFound { category, expected, found } => {
        format!("{} error: expected {expected}, found {found}", category.as_str())
      }
      Details::TypeMismatch { category, from, to, .. } => {
        let noun = if *category == Category::PointerTypeMismatch { "pointer type" } else { "type" };
        format!("expected {noun} `{to}`, found `{from}`")
      }
      Details::UnknownOperator { symbol, suggestions } => {
        if suggestions.is_empty() {
          format!("unknown operator `{symbol}`")
        } else {
          let names: Vec<&str> = suggestions.iter().map(|s| s.symbol.as_str()).collect();
          format!("unknown operator `{symbol}`; did you mean {}?", names.join(", "))
        }
      }
      Details::OperatorAmbiguity { symbol, .. } => {
        format!("operator `{symbol}` is ambiguous in this position")
      }
    }
  }
}

/// Accumulates diagnostics for a compilation run. Caps the number of
/// `Error`/`Fatal` diagnostics collected at `max_errors` (default 100, per
/// §4.3) so a badly malformed file can't produce unbounded output; warnings
/// are never capped.
pub struct DiagnosticHandler {
  diagnostics: Vec<Diagnostic>,
  max_errors: usize,
  error_count: usize,
  warning_count: usize,
}

impl DiagnosticHandler {
  #[must_use] pub fn new(max_errors: usize) -> Self {
    Self { diagnostics: Vec::new(), max_errors, error_count: 0, warning_count: 0 }
  }

  #[must_use] pub fn has_errors(&self) -> bool { self.error_count > 0 }
  #[must_use] pub fn has_fatal_errors(&self) -> bool {
    self.diagnostics.iter().any(|d| d.severity == Severity::Fatal)
  }
  #[must_use] pub fn diagnostics(&self) -> &[Diagnostic] { &self.diagnostics }
  #[must_use] pub fn warning_count(&self) -> usize { self.warning_count }
  #[must_use] pub fn error_count(&self) -> usize { self.error_count }

  pub fn report(&mut self, file: Symbol, pos: Position, severity: Severity, details: Details) {
    match severity {
      Severity::Warning => self.warning_count += 1,
      Severity::Error | Severity::Fatal => {
        if self.error_count >= self.max_errors { return }
        self.error_count += 1;
      }
    }
    self.diagnostics.push(Diagnostic { file, pos, severity, details });
  }

  pub fn report_at(&mut self, span: FileSpan, severity: Severity, details: Details) {
    self.report(span.file, span.pos, severity, details);
  }

  /// Report an unknown operator symbol, computing "did you mean" candidates
  /// against every symbol in the operator registry.
  pub fn report_unknown_operator(&mut self, file: Symbol, pos: Position, symbol: &str) {
    let suggestions = suggest_operators(symbol);
    self.report(file, pos, Severity::Error, Details::UnknownOperator { symbol: symbol.to_string(), suggestions });
  }

  /// Report an operator symbol that resolves to more than one registry
  /// entry at a position where the caller (the out-of-scope parser) could
  /// not resolve the ambiguity by context. `disambiguation_hint` is a
  /// free-form suggestion for how to break the tie (e.g. parenthesization).
  pub fn report_operator_ambiguity(
    &mut self,
    file: Symbol,
    pos: Position,
    symbol: &str,
    possible_meanings: Vec<String>,
    disambiguation_hint: Option<String>,
  ) {
    self.report(
      file,
      pos,
      Severity::Error,
      Details::OperatorAmbiguity { symbol: symbol.to_string(), possible_meanings, disambiguation_hint },
    );
  }

  /// Render every accumulated diagnostic to `out`, multi-line with source
  /// context (§4.3), optionally with ANSI color codes. `source_of` looks up
  /// a file's full text by its interned name; when it returns `None` (or
  /// the referenced line doesn't exist) the context line and carets are
  /// omitted rather than padded with placeholders.
  pub fn render(
    &self,
    out: &mut dyn Write,
    interner: &Interner,
    source_of: &dyn Fn(&str) -> Option<&str>,
    color: bool,
  ) -> io::Result<()> {
    for d in &self.diagnostics {
      self.render_one(out, interner, source_of, color, d)?;
    }
    Ok(())
  }

  fn render_one(
    &self,
    out: &mut dyn Write,
    interner: &Interner,
    source_of: &dyn Fn(&str) -> Option<&str>,
    color: bool,
    d: &Diagnostic,
  ) -> io::Result<()> {
    let (tag, code) = match d.severity {
      Severity::Warning => ("warning", 33),
      Severity::Error => ("error", 31),
      Severity::Fatal => ("fatal error", 91),
    };
    let filename = interner.resolve(d.file);
    if color {
      writeln!(out, "\x1b[1;{code}m{tag}\x1b[0m: {}", d.message())?;
    } else {
      writeln!(out, "{tag}: {}", d.message())?;
    }
    writeln!(out, "  --> {filename}:{}:{}", d.pos.line, d.pos.column)?;
    writeln!(out, "   |")?;
    if let Some(line_text) = source_of(filename).and_then(|src| src.lines().nth(d.pos.line.saturating_sub(1) as usize)) {
      writeln!(out, "{:>3}| {line_text}", d.pos.line)?;
      let pad = " ".repeat(d.pos.column.saturating_sub(1) as usize);
      let carets = "^".repeat(d.pos.caret_width() as usize);
      if color {
        writeln!(out, "   | {pad}\x1b[1;{code}m{carets}\x1b[0m")?;
      } else {
        writeln!(out, "   | {pad}{carets}")?;
      }
    }
    if let Some(note) = d.details.note() {
      writeln!(out, "   = note: {note}")?;
    }
    if let Some(help) = d.details.help() {
      writeln!(out, "   = help: {help}")?;
    }
    Ok(())
  }
}

/// Suggest up to 5 registered operator symbols similar to `unknown`, using
/// the normalized-Levenshtein similarity `sim = max(0, 100 - 100*D/max(|S|,|O|))`.
/// Candidates with `sim <= 40` are dropped; ties break by registry
/// declaration order (the order `OperatorRegistry::iterate` yields).
#[must_use] pub fn suggest_operators(unknown: &str) -> Vec<Suggestion> {
  let mut scored: Vec<(i64, usize, &'static str, &'static str)> = OperatorRegistry::iterate()
    .map(|d| (d.symbol, d.description))
    .enumerate()
    .map(|(order, (sym, desc))| {
      let d = levenshtein(unknown, sym) as i64;
      let denom = unknown.len().max(sym.len()).max(1) as i64;
      let sim = (100 - 100 * d / denom).max(0);
      (sim, order, sym, desc)
    })
    .collect();
  scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
  scored
    .into_iter()
    .filter(|(sim, _, _, _)| *sim > 40)
    .take(5)
    .map(|(sim, _, sym, desc)| Suggestion {
      symbol: sym.to_string(),
      similarity: sim.clamp(0, 100) as u8,
      description: desc,
    })
    .collect()
}

fn levenshtein(a: &str, b: &str) -> usize {
  let a: Vec<char> = a.chars().collect();
  let b: Vec<char> = b.chars().collect();
  let mut row: Vec<usize> = (0..=b.len()).collect();
  for i in 1..=a.len() {
    let mut prev = row[0];
    row[0] = i;
    for j in 1..=b.len() {
      let cur = row[j];
      row[j] = if a[i - 1] == b[j - 1] {
        prev
      } else {
        1 + prev.min(row[j]).min(row[j - 1])
      };
      prev = cur;
    }
  }
  row[b.len()]
}

#[cfg(test)]
mod tests {
  use super::*;

  fn msg(category: Category, message: &str) -> Details {
    Details::Message { category, message: message.to_string() }
  }

  #[test]
  fn max_errors_caps_error_reports_but_not_warnings() {
    let mut dx = DiagnosticHandler::new(2);
    let mut interner = Interner::new();
    let file = interner.intern("f.fcx");
    for _ in 0..5 {
      dx.report(file, Position::default(), Severity::Error, msg(Category::Internal, "x"));
      dx.report(file, Position::default(), Severity::Warning, msg(Category::Internal, "y"));
    }
    assert_eq!(dx.error_count(), 2);
    assert_eq!(dx.warning_count(), 5);
  }

  #[test]
  fn suggests_close_operators() {
    let s = suggest_operators(">>>>"); // one byte off from the 3-byte `>>>`
    let hit = s.iter().find(|sug| sug.symbol == ">>>").expect("`>>>` suggested");
    // sim = 100 - 100*1/max(4,3) = 75, regardless of `>>>`'s position in the registry.
    assert_eq!(hit.similarity, 75);
  }

  #[test]
  fn no_suggestions_for_wildly_different_symbol() {
    let s = suggest_operators("###???");
    assert!(s.is_empty() || s.len() <= 5);
  }

  #[test]
  fn render_includes_filename_position_and_source_context() {
    let mut dx = DiagnosticHandler::new(10);
    let mut interner = Interner::new();
    let file = interner.intern("main.fcx");
    dx.report(file, Position::new(1, 5, 3), Severity::Error, msg(Category::Semantic, "bad"));
    let mut buf = Vec::new();
    dx.render(&mut buf, &interner, &|name| if name == "main.fcx" { Some("let abcde = 1;") } else { None }, false).unwrap();
    let s = String::from_utf8(buf).unwrap();
    assert!(s.contains("--> main.fcx:1:5"));
    assert!(s.contains("bad"));
    assert!(s.contains("let abcde = 1;"));
    assert!(s.contains("^^^"));
  }

  #[test]
  fn render_omits_context_when_source_unavailable() {
    let mut dx = DiagnosticHandler::new(10);
    let mut interner = Interner::new();
    let file = interner.intern("nowhere.fcx");
    dx.report(file, Position::new(3, 7, 1), Severity::Error, msg(Category::Lexical, "bad"));
    let mut buf = Vec::new();
    dx.render(&mut buf, &interner, &|_| None, false).unwrap();
    let s = String::from_utf8(buf).unwrap();
    assert!(s.contains("nowhere.fcx:3:7"));
    assert!(!s.contains('^'));
  }

  #[test]
  fn type_mismatch_renders_note_and_help() {
    let mut dx = DiagnosticHandler::new(10);
    let mut interner = Interner::new();
    let file = interner.intern("t.fcx");
    dx.report(file, Position::default(), Severity::Error, Details::TypeMismatch {
      category: Category::PointerTypeMismatch,
      from: "*u8".to_string(),
      to: "*i64".to_string(),
      hint: Some("insert a cast".to_string()),
    });
    let mut buf = Vec::new();
    dx.render(&mut buf, &interner, &|_| None, false).unwrap();
    let s = String::from_utf8(buf).unwrap();
    assert!(s.contains("note: from `*u8` to `*i64`"));
    assert!(s.contains("help: insert a cast"));
  }

  #[test]
  fn operator_ambiguity_records_possible_meanings() {
    let mut dx = DiagnosticHandler::new(10);
    let mut interner = Interner::new();
    let file = interner.intern("t.fcx");
    dx.report_operator_ambiguity(
      file,
      Position::default(),
      "*",
      vec!["multiply".to_string(), "dereference".to_string()],
      Some("add a left operand to force infix".to_string()),
    );
    assert_eq!(dx.error_count(), 1);
    assert_eq!(dx.diagnostics()[0].details.category(), Category::OperatorAmbiguity);
  }
}
