//! The top-level IR container: a module's functions, globals, and
//! deduplicated string/byte tables.

use std::ops::{Index, IndexMut};

use hashbrown::HashMap;

use crate::ir::function::Function;
use crate::ir::types::IrType;
use crate::symbol::Symbol;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct FuncId(pub u32);
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct GlobalId(pub u32);
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct StringId(pub u32);
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct BytesId(pub u32);

impl std::fmt::Display for FuncId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "@{}", self.0) }
}
impl std::fmt::Display for GlobalId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "global{}", self.0) }
}
impl std::fmt::Display for StringId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "str{}", self.0) }
}
impl std::fmt::Display for BytesId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "bytes{}", self.0) }
}

#[derive(Clone, Debug)]
pub struct Global {
  pub name: Symbol,
  pub ty: IrType,
  pub is_const: bool,
  /// `Some` iff `has_init` (§3.4): constant integer initializers are
  /// recorded directly here; any other initializer expression marks
  /// `has_init = false` (this field `None`) since the IR generator emits
  /// no code at module scope to evaluate it.
  pub initial: Option<Vec<u64>>,
}

impl Global {
  #[must_use] pub fn has_init(&self) -> bool { self.initial.is_some() }
}

/// A module: the unit the IR generator produces from one parsed `module`
/// declaration (or one top-level file, when no `module` statement wraps it).
#[derive(Debug, Default)]
pub struct Module {
  pub name: Option<Symbol>,
  functions: Vec<Function>,
  globals: Vec<Global>,
  strings: Vec<Vec<u8>>,
  string_dedup: HashMap<Vec<u8>, StringId>,
  bytes: Vec<Vec<u8>>,
  bytes_dedup: HashMap<Vec<u8>, BytesId>,
}

impl Module {
  #[must_use] pub fn new(name: Option<Symbol>) -> Self { Self { name, ..Self::default() } }

  pub fn add_function(&mut self, f: Function) -> FuncId {
    let id = FuncId(self.functions.len().try_into().expect("too many functions"));
    self.functions.push(f);
    id
  }

  pub fn add_global(&mut self, g: Global) -> GlobalId {
    let id = GlobalId(self.globals.len().try_into().expect("too many globals"));
    self.globals.push(g);
    id
  }

  /// Intern a string literal's decoded bytes, deduplicating identical
  /// literals to one table entry.
  pub fn intern_string(&mut self, bytes: Vec<u8>) -> StringId {
    if let Some(&id) = self.string_dedup.get(&bytes) { return id }
    let id = StringId(self.strings.len().try_into().expect("too many string literals"));
    self.string_dedup.insert(bytes.clone(), id);
    self.strings.push(bytes);
    id
  }

  pub fn intern_bytes(&mut self, bytes: Vec<u8>) -> BytesId {
    if let Some(&id) = self.bytes_dedup.get(&bytes) { return id }
    let id = BytesId(self.bytes.len().try_into().expect("too many byte literals"));
    self.bytes_dedup.insert(bytes.clone(), id);
    self.bytes.push(bytes);
    id
  }

  #[must_use] pub fn functions(&self) -> impl Iterator<Item = (FuncId, &Function)> {
    self.functions.iter().enumerate().map(|(i, f)| (FuncId(i as u32), f))
  }
  #[must_use] pub fn globals(&self) -> &[Global] { &self.globals }
  #[must_use] pub fn strings(&self) -> &[Vec<u8>] { &self.strings }
  #[must_use] pub fn bytes_table(&self) -> &[Vec<u8>] { &self.bytes }
}

impl Index<FuncId> for Module {
  type Output = Function;
  fn index(&self, id: FuncId) -> &Function { &self.functions[id.0 as usize] }
}
impl IndexMut<FuncId> for Module {
  fn index_mut(&mut self, id: FuncId) -> &mut Function { &mut self.functions[id.0 as usize] }
}
