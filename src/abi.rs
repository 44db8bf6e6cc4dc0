//! Runtime ABI symbol names (§6.3): the exported entry points the IR
//! generator's memory/syscall/atomic desugarings eventually call into. The
//! IR itself only names opcodes; a later lowering pass (out of scope here)
//! is what turns, say, `Opcode::MemAlloc` into a call to `_fcx_alloc`. This
//! module is the single place that spells those names, so that pass and any
//! tests asserting on linkage agree on them.

pub const ALLOC: &str = "_fcx_alloc";
pub const DEALLOC: &str = "_fcx_free";
pub const STACK_ALLOC: &str = "_fcx_stack_alloc";
pub const STACK_FREE: &str = "_fcx_stack_free";
pub const ARENA_ALLOC: &str = "_fcx_arena_alloc";
pub const ARENA_RESET: &str = "_fcx_arena_reset";
pub const SLAB_ALLOC: &str = "_fcx_slab_alloc";
pub const SLAB_FREE: &str = "_fcx_slab_free";
pub const MMIO_MAP: &str = "_fcx_mmio_map";
pub const PREFETCH: &str = "_fcx_prefetch";
pub const PREFETCH_WRITE: &str = "_fcx_prefetch_write";

/// `_fcx_syscall(num, a1..a6)`: the raw syscall entry every subkind of
/// `Opcode::Syscall*` ultimately funnels through at the ABI boundary.
/// `_fcx_write`/`_fcx_read` are the two-subkind-specific conveniences named
/// alongside it in §6.3; this crate's own `SyscallWrite`/`SyscallRead`
/// opcodes carry the fixed-number convention (1/0) straight through to a
/// later lowering pass rather than resolving the symbol name here.
pub const SYSCALL: &str = "_fcx_syscall";
pub const WRITE: &str = "_fcx_write";
pub const READ: &str = "_fcx_read";

pub const ATOMIC_LOAD: &str = "_fcx_atomic_load";
pub const ATOMIC_STORE: &str = "_fcx_atomic_store";
pub const ATOMIC_SWAP: &str = "_fcx_atomic_swap";
pub const ATOMIC_CAS: &str = "_fcx_atomic_cas";

/// Memory-ordering fences (§6.3). No opcode in this crate's IR lowers to
/// one directly — the language has no standalone fence operator, only the
/// atomic family's implicit ordering — but the symbols are named here since
/// the runtime ABI they belong to is otherwise fully enumerated in this
/// module.
pub const ATOMIC_FENCE: &str = "_fcx_atomic_fence";
pub const ATOMIC_LOAD_FENCE: &str = "_fcx_atomic_load_fence";
pub const ATOMIC_STORE_FENCE: &str = "_fcx_atomic_store_fence";

/// Print family (§6.3, §4.5.2): `PRINTLN`/`PRINTLN_INT` back literal strings
/// and (possibly negated) literal integers; every other operand dispatches
/// on its `VReg`'s IR type through [`println_type_symbol`].
pub const PRINTLN: &str = "_fcx_println";
pub const PRINTLN_INT: &str = "_fcx_println_int";
/// `char` gets its own entry distinct from `u8` (§4.5.2 names both), even
/// though this IR's `char` literals are otherwise typed as `IrType::U8`.
pub const PRINTLN_CHAR: &str = "_fcx_println_char";

/// The `_fcx_println_{type}` entry for a variable/expression operand's
/// [`crate::ir::types::IrType`] — one per named type variant in §4.5.2.
/// `Ptr` covers every pointer-shaped type this IR produces, since `IrType`
/// doesn't distinguish pointee types.
#[must_use] pub fn println_type_symbol(ty: crate::ir::types::IrType) -> &'static str {
  use crate::ir::types::IrType;
  match ty {
    IrType::I8 => "_fcx_println_i8", IrType::U8 => "_fcx_println_u8",
    IrType::I16 => "_fcx_println_i16", IrType::U16 => "_fcx_println_u16",
    IrType::I32 => "_fcx_println_i32", IrType::U32 => "_fcx_println_u32",
    IrType::I64 => "_fcx_println_i64", IrType::U64 => "_fcx_println_u64",
    IrType::I128 => "_fcx_println_i128", IrType::U128 => "_fcx_println_u128",
    IrType::I256 => "_fcx_println_i256", IrType::U256 => "_fcx_println_u256",
    IrType::I512 => "_fcx_println_i512", IrType::U512 => "_fcx_println_u512",
    IrType::I1024 => "_fcx_println_i1024", IrType::U1024 => "_fcx_println_u1024",
    IrType::F32 => "_fcx_println_f32",
    IrType::F64 => "_fcx_println_f64",
    IrType::Bool => "_fcx_println_bool",
    IrType::Ptr => "_fcx_println_ptr",
  }
}

/// `_fcx_intrinsic(operand)` (§6.3): the placeholder every intrinsic-family
/// unary operator (popcount, clz/ctz, byteswap, sqrt/rsqrt, floor/ceil/
/// trunc/round, abs — §4.5.2) lowers a call to. A later lowering stage,
/// out of scope here, specializes the call per intrinsic kind.
pub const INTRINSIC: &str = "_fcx_intrinsic";

/// Maps a memory-family opcode to the ABI symbol the lowering pass must
/// call for it. `Opcode::MemAlignUp`/`MemAlignDown`/`MemIsAligned` are
/// deliberately absent: they fold to pure arithmetic at lowering time
/// (§4.5.2) and never reach the runtime ABI.
#[must_use] pub fn memory_symbol(op: crate::ir::inst::Opcode) -> Option<&'static str> {
  use crate::ir::inst::Opcode;
  Some(match op {
    Opcode::MemAlloc => ALLOC,
    Opcode::MemDealloc => DEALLOC,
    Opcode::MemStackAlloc => STACK_ALLOC,
    Opcode::MemStackFree => STACK_FREE,
    Opcode::MemArenaAlloc => ARENA_ALLOC,
    Opcode::MemArenaReset => ARENA_RESET,
    Opcode::MemSlabAlloc => SLAB_ALLOC,
    Opcode::MemSlabFree => SLAB_FREE,
    Opcode::MemMmioRead => MMIO_MAP,
    Opcode::MemPrefetch => PREFETCH,
    Opcode::MemPrefetchWrite => PREFETCH_WRITE,
    _ => return None,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ir::inst::Opcode;

  #[test]
  fn every_runtime_memory_op_has_a_symbol() {
    for op in [
      Opcode::MemAlloc, Opcode::MemDealloc, Opcode::MemStackAlloc, Opcode::MemStackFree,
      Opcode::MemArenaAlloc, Opcode::MemArenaReset, Opcode::MemSlabAlloc, Opcode::MemSlabFree,
      Opcode::MemMmioRead, Opcode::MemPrefetch, Opcode::MemPrefetchWrite,
    ] {
      assert!(memory_symbol(op).is_some(), "{op:?}");
    }
  }

  #[test]
  fn align_ops_have_no_runtime_symbol() {
    assert!(memory_symbol(Opcode::MemAlignUp).is_none());
    assert!(memory_symbol(Opcode::MemAlignDown).is_none());
    assert!(memory_symbol(Opcode::MemIsAligned).is_none());
  }
}
