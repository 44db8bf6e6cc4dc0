//! Functions: a name, a parameter list, and the [`Cfg`] the IR generator
//! built for its body.

use crate::ir::block::{BlockId, Cfg};
use crate::ir::types::{IrType, SlotId, VReg};
use crate::symbol::Symbol;

#[derive(Clone, Debug)]
pub struct Function {
  pub name: Symbol,
  pub params: Vec<(Symbol, IrType)>,
  pub ret_ty: Option<IrType>,
  pub cfg: Cfg,
  pub entry: BlockId,
  next_vreg: u32,
  next_slot: u32,
}

impl Function {
  #[must_use] pub fn new(name: Symbol, params: Vec<(Symbol, IrType)>, ret_ty: Option<IrType>) -> Self {
    let mut cfg = Cfg::new();
    let entry = cfg.new_entry_block();
    Self { name, params, ret_ty, cfg, entry, next_vreg: 0, next_slot: 0 }
  }

  /// Allocate a fresh virtual register of type `ty`.
  pub fn fresh_vreg(&mut self, ty: IrType) -> VReg {
    let idx = self.next_vreg;
    self.next_vreg += 1;
    VReg::new(idx, ty)
  }

  /// Allocate a fresh mutable local slot (backs one `let` binding, or one
  /// loop-carried variable).
  pub fn fresh_slot(&mut self) -> SlotId {
    let id = SlotId(self.next_slot);
    self.next_slot += 1;
    id
  }

  #[must_use] pub fn vreg_count(&self) -> u32 { self.next_vreg }
  #[must_use] pub fn slot_count(&self) -> u32 { self.next_slot }
}
