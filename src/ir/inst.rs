//! Instructions: the tagged union every operator family desugars into
//! (§4.5.2), plus one constructor function per family so the IR generator
//! never builds an [`Instruction`] by hand.

use smallvec::SmallVec;

use crate::ir::module::{BytesId, GlobalId, StringId};
use crate::ir::types::{IrType, VReg};

#[derive(Clone, Debug)]
pub enum Immediate {
  Int(Vec<u64>),
  Float(f64),
  Bool(bool),
  StringRef(StringId),
  BytesRef(BytesId),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Opcode {
  // arithmetic
  Add, Sub, Mul, Div, Mod, Neg,
  // bitwise
  And, Or, Xor, Not, Shl, AShr, LShr, RotL, RotR,
  // comparison
  ICmpEq, ICmpNe, ICmpLt, ICmpLe, ICmpGt, ICmpGe,
  FCmpEq, FCmpNe, FCmpLt, FCmpLe, FCmpGt, FCmpGe,
  // locals / constants
  Const,
  MovToSlot,
  LoadSlot,
  // pointers
  PtrAdd,
  PtrSub,
  Load,
  Store,
  AddressOf,
  // calls
  Call,
  // memory family
  MemAlloc, MemDealloc, MemStackAlloc, MemStackFree,
  MemArenaAlloc, MemArenaReset, MemSlabAlloc, MemSlabFree,
  MemMmioRead, MemAlignUp, MemAlignDown, MemIsAligned,
  MemPrefetch, MemPrefetchWrite,
  // syscalls
  SyscallWrite, SyscallRead, SyscallRaw,
  // atomics
  AtomicLoad, AtomicStore, AtomicSwap, AtomicCas,
  // globals
  LoadGlobal,
  StoreGlobal,
  // misc
  InlineAsm,
}

#[derive(Clone, Debug)]
pub struct Instruction {
  pub dest: Option<VReg>,
  pub ty: IrType,
  pub opcode: Opcode,
  pub args: SmallVec<[VReg; 3]>,
  pub imm: Option<Immediate>,
  /// Only populated for `Opcode::MovToSlot`/`Opcode::LoadSlot`.
  pub slot: Option<crate::ir::types::SlotId>,
  /// Only populated for `Opcode::LoadGlobal`/`Opcode::StoreGlobal`.
  pub global: Option<GlobalId>,
  /// Only populated for `Opcode::InlineAsm`.
  pub asm_template: Option<String>,
  /// Only populated for `Opcode::Call` when the callee is a fixed runtime
  /// ABI entry (the print and intrinsic families, §4.5.2) rather than a
  /// user-defined function looked up through a `VReg`. Carries the ABI
  /// symbol name (`abi.rs`) plus, for the intrinsic family, which specific
  /// intrinsic this placeholder call stands for.
  pub runtime_symbol: Option<&'static str>,
  /// Only populated for `Opcode::SyscallWrite`/`SyscallRead`/`SyscallRaw`.
  /// Holds the syscall number as its own operand, separate from `args`
  /// (which carries just the syscall's own arguments: `fd`, `buffer`,
  /// `length`), so a write/read syscall's number can be a materialized
  /// `const` feeding this slot rather than being implied by the opcode.
  pub syscall_number: Option<VReg>,
}

impl Instruction {
  fn bare(dest: Option<VReg>, ty: IrType, opcode: Opcode, args: SmallVec<[VReg; 3]>) -> Self {
    Self {
      dest, ty, opcode, args,
      imm: None, slot: None, global: None, asm_template: None, runtime_symbol: None,
      syscall_number: None,
    }
  }
}

/// Binary arithmetic/bitwise/comparison family: `dest := op(lhs, rhs)`.
#[must_use] pub fn binary(dest: VReg, ty: IrType, opcode: Opcode, lhs: VReg, rhs: VReg) -> Instruction {
  Instruction::bare(Some(dest), ty, opcode, SmallVec::from_slice(&[lhs, rhs]))
}

/// Unary family: negation, bitwise not, address-of, dereference-read.
#[must_use] pub fn unary(dest: VReg, ty: IrType, opcode: Opcode, operand: VReg) -> Instruction {
  Instruction::bare(Some(dest), ty, opcode, SmallVec::from_slice(&[operand]))
}

#[must_use] pub fn constant(dest: VReg, ty: IrType, imm: Immediate) -> Instruction {
  let mut i = Instruction::bare(Some(dest), ty, Opcode::Const, SmallVec::new());
  i.imm = Some(imm);
  i
}

#[must_use] pub fn mov_to_slot(slot: crate::ir::types::SlotId, ty: IrType, value: VReg) -> Instruction {
  let mut i = Instruction::bare(None, ty, Opcode::MovToSlot, SmallVec::from_slice(&[value]));
  i.slot = Some(slot);
  i
}

#[must_use] pub fn load_slot(dest: VReg, ty: IrType, slot: crate::ir::types::SlotId) -> Instruction {
  let mut i = Instruction::bare(Some(dest), ty, Opcode::LoadSlot, SmallVec::new());
  i.slot = Some(slot);
  i
}

#[must_use] pub fn load_global(dest: VReg, ty: IrType, global: GlobalId) -> Instruction {
  let mut i = Instruction::bare(Some(dest), ty, Opcode::LoadGlobal, SmallVec::new());
  i.global = Some(global);
  i
}

#[must_use] pub fn store_global(ty: IrType, global: GlobalId, value: VReg) -> Instruction {
  let mut i = Instruction::bare(None, ty, Opcode::StoreGlobal, SmallVec::from_slice(&[value]));
  i.global = Some(global);
  i
}

#[must_use] pub fn store(ptr: VReg, value: VReg, ty: IrType) -> Instruction {
  Instruction::bare(None, ty, Opcode::Store, SmallVec::from_slice(&[ptr, value]))
}

#[must_use] pub fn load(dest: VReg, ptr: VReg, ty: IrType) -> Instruction {
  Instruction::bare(Some(dest), ty, Opcode::Load, SmallVec::from_slice(&[ptr]))
}

#[must_use] pub fn call(dest: Option<VReg>, ty: IrType, callee: VReg, args: &[VReg]) -> Instruction {
  let mut v = SmallVec::from_slice(&[callee]);
  v.extend_from_slice(args);
  Instruction::bare(dest, ty, Opcode::Call, v)
}

/// A call to a fixed runtime ABI entry (no user-level `VReg` callee) —
/// the print family and the `_fcx_intrinsic` placeholder (§4.5.2, §6.3).
#[must_use] pub fn runtime_call(dest: Option<VReg>, ty: IrType, symbol: &'static str, args: &[VReg]) -> Instruction {
  let mut i = Instruction::bare(dest, ty, Opcode::Call, SmallVec::from_slice(args));
  i.runtime_symbol = Some(symbol);
  i
}

/// Memory family: every subkind shares the "up to two operand" shape
/// (§4.5.2), except `arena-reset`, which takes none.
#[must_use] pub fn memory_op(dest: Option<VReg>, ty: IrType, opcode: Opcode, operands: &[VReg]) -> Instruction {
  Instruction::bare(dest, ty, opcode, SmallVec::from_slice(operands))
}

#[must_use] pub fn syscall_op(dest: Option<VReg>, opcode: Opcode, number: VReg, operands: &[VReg]) -> Instruction {
  let mut i = Instruction::bare(dest, IrType::I64, opcode, SmallVec::from_slice(operands));
  i.syscall_number = Some(number);
  i
}

#[must_use] pub fn atomic_op(dest: Option<VReg>, ty: IrType, opcode: Opcode, operands: &[VReg]) -> Instruction {
  Instruction::bare(dest, ty, opcode, SmallVec::from_slice(operands))
}

#[must_use] pub fn inline_asm(template: String, operands: &[VReg]) -> Instruction {
  let mut i = Instruction::bare(None, IrType::I64, Opcode::InlineAsm, SmallVec::from_slice(operands));
  i.asm_template = Some(template);
  i
}
