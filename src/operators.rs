//! The operator registry (C1): an immutable catalog of every symbolic
//! operator the language recognizes, queried by the lexer (longest-match
//! tokenizing) and by diagnostics (similarity-based suggestions for unknown
//! symbols).
//!
//! The table is built once, at program startup, from the `make_ops!` macro
//! below — a closed-table-plus-macro shape generalized from "one symbol per
//! descriptor" to "symbol plus contextual position", since this language
//! overloads several symbols by position (`&` is bitwise AND infix and
//! address-of prefix; `*` is multiply infix and dereference prefix).

use smallvec::SmallVec;
use std::sync::OnceLock;

/// The semantic family an operator belongs to. Mirrors the grouping used by
/// the diagnostics renderer and by the IR generator's desugaring dispatch.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum Category {
  Arithmetic,
  Bitwise,
  Comparison,
  Assignment,
  Pointer,
  Memory,
  Atomic,
  Syscall,
  Control,
  Miscellaneous,
}

/// How many operands an operator takes.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Arity {
  Unary,
  Binary,
  Ternary,
  NAry,
}

/// Where in an expression the operator's symbol appears. Two descriptors
/// may share a symbol as long as they differ in `Position` (§3.1 invariant).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Position {
  Prefix,
  Infix,
  Postfix,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Associativity {
  Left,
  Right,
  None,
}

/// A single entry in the operator registry.
#[derive(Clone, Copy, Debug)]
pub struct OperatorDescriptor {
  pub symbol: &'static str,
  pub category: Category,
  pub arity: Arity,
  pub precedence: i32,
  pub associativity: Associativity,
  pub position: Position,
  pub description: &'static str,
}

macro_rules! make_ops {
  ($($(#[$attr:meta])* $name:ident: $sym:literal, $cat:ident, $arity:ident,
     $prec:literal, $assoc:ident, $pos:ident, $desc:literal;)*) => {
    /// Stable names for every registry entry, for use from the IR generator
    /// when it needs to dispatch on "which operator was this" rather than
    /// re-parsing the symbol text.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    #[allow(non_camel_case_types)]
    pub enum OpName { $($name),* }

    const TABLE: &[(OpName, OperatorDescriptor)] = &[
      $(($(#[$attr])* OpName::$name, OperatorDescriptor {
        symbol: $sym,
        category: Category::$cat,
        arity: Arity::$arity,
        precedence: $prec,
        associativity: Associativity::$assoc,
        position: Position::$pos,
        description: $desc,
      })),*
    ];
  }
}

make_ops! {
  // --- arithmetic ---------------------------------------------------------
  Add:    "+",  Arithmetic, Binary, 60, Left,  Infix,  "integer sum";
  Sub:    "-",  Arithmetic, Binary, 60, Left,  Infix,  "integer difference";
  Neg:    "-",  Arithmetic, Unary,  90, Right, Prefix, "arithmetic negation";
  Mul:    "*",  Arithmetic, Binary, 70, Left,  Infix,  "integer product";
  Div:    "/",  Arithmetic, Binary, 70, Left,  Infix,  "integer quotient";
  Mod:    "%",  Arithmetic, Binary, 70, Left,  Infix,  "integer remainder";

  // --- bitwise -------------------------------------------------------------
  BitAnd: "&",   Bitwise, Binary, 40, Left,  Infix,  "bitwise AND";
  BitOr:  "|",   Bitwise, Binary, 30, Left,  Infix,  "bitwise OR";
  BitXor: "^",   Bitwise, Binary, 35, Left,  Infix,  "bitwise XOR";
  BitNot: "~",   Bitwise, Unary,  90, Right, Prefix, "bitwise NOT";
  Shl:    "<<",  Bitwise, Binary, 50, Left,  Infix,  "left shift";
  AShr:   ">>",  Bitwise, Binary, 50, Left,  Infix,  "arithmetic right shift";
  LShr:   ">>>", Bitwise, Binary, 50, Left,  Infix,  "logical right shift";
  RotL:   "<|",  Bitwise, Binary, 50, Left,  Infix,  "rotate left";
  RotR:   "|>",  Bitwise, Binary, 50, Left,  Infix,  "rotate right";

  // --- comparison -----------------------------------------------------------
  Eq: "==", Comparison, Binary, 20, None, Infix, "equality";
  Ne: "!=", Comparison, Binary, 20, None, Infix, "inequality";
  Lt: "<",  Comparison, Binary, 20, None, Infix, "less than";
  Le: "<=", Comparison, Binary, 20, None, Infix, "less than or equal";
  Gt: ">",  Comparison, Binary, 20, None, Infix, "greater than";
  Ge: ">=", Comparison, Binary, 20, None, Infix, "greater than or equal";

  // --- assignment -------------------------------------------------------------
  Assign: ":=", Assignment, Binary, 10, Right, Infix, "assignment";

  // --- pointer ---------------------------------------------------------------
  Borrow: "&", Pointer, Unary, 90, Right, Prefix, "address-of / borrow";
  Deref:  "*", Pointer, Unary, 90, Right, Prefix, "pointer dereference";
  At:     "@", Pointer, Unary, 90, Right, Prefix, "dereference target for assignment/read";

  // --- control -----------------------------------------------------------------
  Ternary: "?", Control, Ternary, 15, Right, Infix, "conditional expression: cond ? then : else";

  // --- memory ($ sigil family) ---------------------------------------------------
  MemAlloc:        "$+", Memory, Binary, 5, None, Prefix, "heap allocate(size, align)";
  MemDealloc:      "$-", Memory, Unary,  5, None, Prefix, "heap deallocate(ptr)";
  MemStackAlloc:   "$^", Memory, Unary,  5, None, Prefix, "stack allocate(size)";
  MemStackFree:    "$v", Memory, Unary,  5, None, Prefix, "stack free(ptr)";
  MemArenaAlloc:   "$#", Memory, Binary, 5, None, Prefix, "arena allocate(size, align)";
  MemArenaReset:   "$~", Memory, NAry,   5, None, Prefix, "arena reset()";
  MemSlabAlloc:    "$%", Memory, Binary, 5, None, Prefix, "slab allocate(size, type)";
  MemSlabFree:     "$&", Memory, Binary, 5, None, Prefix, "slab free(ptr, type)";
  MemMmioMap:      "$@", Memory, Binary, 5, None, Prefix, "map MMIO region(phys, size)";
  MemAlignUp:      "$.", Memory, Binary, 5, None, Prefix, "align value up to alignment";
  MemAlignDown:    "$_", Memory, Binary, 5, None, Prefix, "align value down to alignment";
  MemIsAligned:    "$?", Memory, Binary, 5, None, Prefix, "test whether value is aligned";
  MemPrefetch:     "$*", Memory, Unary,  5, None, Prefix, "prefetch for read";
  MemPrefetchW:    "$!", Memory, Unary,  5, None, Prefix, "prefetch for write";

  // --- syscall -------------------------------------------------------------------
  SyscallWrite: "$/", Syscall, Binary, 5, None, Prefix, "write syscall(fd, buf)";
  SyscallRead:  "$\\", Syscall, Binary, 5, None, Prefix, "read syscall(fd, buf)";
  SyscallRaw:   "$;", Syscall, NAry,   5, None, Prefix, "raw syscall(number, args...)";

  // --- atomic -----------------------------------------------------------------
  AtomicRead:  "$r",  Atomic, Unary,   5, None, Prefix, "atomic load(ptr)";
  AtomicWrite: "$w",  Atomic, Binary,  5, None, Prefix, "atomic store(ptr, value)";
  AtomicSwap:  "$x",  Atomic, Binary,  5, None, Prefix, "atomic swap(ptr, value)";
  AtomicCas:   "<=>", Atomic, Ternary, 15, None, Infix,  "atomic compare-and-swap: ptr <=> expected, new";

  // --- intrinsics (desugar to a call to the runtime's `_fcx_intrinsic`) -----------
  Popcount: "#p", Arithmetic, Unary, 90, Right, Prefix, "population count";
  Clz:      "#z", Arithmetic, Unary, 90, Right, Prefix, "count leading zeros";
  Ctz:      "#t", Arithmetic, Unary, 90, Right, Prefix, "count trailing zeros";
  Byteswap: "#b", Arithmetic, Unary, 90, Right, Prefix, "reverse byte order";
  Sqrt:     "#s", Arithmetic, Unary, 90, Right, Prefix, "square root";
  Rsqrt:    "#q", Arithmetic, Unary, 90, Right, Prefix, "reciprocal square root";
  Floor:    "#f", Arithmetic, Unary, 90, Right, Prefix, "round toward negative infinity";
  Ceil:     "#c", Arithmetic, Unary, 90, Right, Prefix, "round toward positive infinity";
  Trunc:    "#u", Arithmetic, Unary, 90, Right, Prefix, "round toward zero";
  Round:    "#o", Arithmetic, Unary, 90, Right, Prefix, "round to nearest";
  Abs:      "#a", Arithmetic, Unary, 90, Right, Prefix, "absolute value";

  // --- miscellaneous -------------------------------------------------------------
  Print: "!!", Miscellaneous, Unary, 5, Right, Prefix, "print operand to the runtime's output stream";
}

/// The operator registry: `lookup`, `iterate`, and `longest_match` over the
/// static [`TABLE`].
pub struct OperatorRegistry;

/// Index of registry entries bucketed by the first byte of their symbol, so
/// `longest_match` only scans candidates that could possibly match instead
/// of the whole table. Built once, lazily, on first use.
fn buckets() -> &'static [SmallVec<[u16; 4]>; 256] {
  static BUCKETS: OnceLock<[SmallVec<[u16; 4]>; 256]> = OnceLock::new();
  BUCKETS.get_or_init(|| {
    let mut b: [SmallVec<[u16; 4]>; 256] = std::array::from_fn(|_| SmallVec::new());
    for (i, (_, desc)) in TABLE.iter().enumerate() {
      let first = desc.symbol.as_bytes()[0];
      b[first as usize].push(u16::try_from(i).expect("registry overflow"));
    }
    b
  })
}

impl OperatorRegistry {
  /// All registered descriptors, in table-declaration order.
  #[must_use] pub fn iterate() -> impl Iterator<Item = &'static OperatorDescriptor> {
    TABLE.iter().map(|(_, d)| d)
  }

  /// All registered descriptors together with their stable [`OpName`].
  #[must_use] pub fn iterate_named() -> impl Iterator<Item = (OpName, &'static OperatorDescriptor)> {
    TABLE.iter().map(|(n, d)| (*n, d))
  }

  /// Every descriptor whose symbol is exactly `symbol`. Usually 0 or 1
  /// entries; exactly 2 for the handful of symbols this language overloads
  /// by position (`&`, `*`).
  #[must_use] pub fn lookup(symbol: &str) -> SmallVec<[&'static OperatorDescriptor; 2]> {
    TABLE.iter().filter(|(_, d)| d.symbol == symbol).map(|(_, d)| d).collect()
  }

  /// Resolve a single descriptor by symbol and exact position. Used once a
  /// position heuristic has disambiguated an overloaded symbol.
  #[must_use] pub fn lookup_at(symbol: &str, position: Position) -> Option<&'static OperatorDescriptor> {
    TABLE.iter().find(|(_, d)| d.symbol == symbol && d.position == position).map(|(_, d)| d)
  }

  #[must_use] pub fn by_name(name: OpName) -> &'static OperatorDescriptor {
    &TABLE.iter().find(|(n, _)| *n == name).expect("OpName always present in TABLE").1
  }

  /// The lexer's primary primitive: among all registry symbols that are a
  /// prefix of `bytes`, return the descriptors for the *longest* one, along
  /// with how many bytes it consumed. Returns `None` if no registry symbol
  /// prefixes `bytes` at all.
  ///
  /// More than one descriptor is returned only when the matched symbol is
  /// overloaded by position (§3.1); the caller (the lexer) picks one with a
  /// position heuristic and marks the token ambiguous if more than one
  /// candidate existed.
  #[must_use] pub fn longest_match(bytes: &[u8]) -> Option<(SmallVec<[&'static OperatorDescriptor; 2]>, usize)> {
    let first = *bytes.first()?;
    let mut best_len = 0usize;
    let mut best: SmallVec<[&'static OperatorDescriptor; 2]> = SmallVec::new();
    for &idx in &buckets()[first as usize] {
      let (_, desc) = &TABLE[idx as usize];
      let sym = desc.symbol.as_bytes();
      if sym.len() <= bytes.len() && &bytes[..sym.len()] == sym {
        match sym.len().cmp(&best_len) {
          std::cmp::Ordering::Greater => { best_len = sym.len(); best.clear(); best.push(desc); }
          std::cmp::Ordering::Equal => best.push(desc),
          std::cmp::Ordering::Less => {}
        }
      }
    }
    if best.is_empty() { None } else { Some((best, best_len)) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn longest_match_prefers_longer_symbol() {
    let (descs, len) = OperatorRegistry::longest_match(b">>>foo").unwrap();
    assert_eq!(len, 3);
    assert_eq!(descs[0].symbol, ">>>");
  }

  #[test]
  fn longest_match_falls_back_when_longer_prefix_absent() {
    let (descs, len) = OperatorRegistry::longest_match(b">= 1").unwrap();
    assert_eq!(len, 2);
    assert_eq!(descs[0].symbol, ">=");
  }

  #[test]
  fn cas_outranks_le_prefix() {
    let (descs, len) = OperatorRegistry::longest_match(b"<=> x, y").unwrap();
    assert_eq!(len, 3);
    assert_eq!(descs[0].symbol, "<=>");
  }

  #[test]
  fn ampersand_is_overloaded_by_position() {
    let found = OperatorRegistry::lookup("&");
    assert_eq!(found.len(), 2);
    assert!(found.iter().any(|d| d.category == Category::Bitwise && d.position == Position::Infix));
    assert!(found.iter().any(|d| d.category == Category::Pointer && d.position == Position::Prefix));
  }

  #[test]
  fn no_match_on_unknown_symbol() {
    assert!(OperatorRegistry::longest_match(b"xyz").is_none());
  }

  #[test]
  fn every_symbol_is_1_to_4_printable_bytes() {
    for d in OperatorRegistry::iterate() {
      assert!((1..=4).contains(&d.symbol.len()), "{}", d.symbol);
      assert!(d.symbol.bytes().all(|b| b.is_ascii_graphic()));
    }
  }
}
