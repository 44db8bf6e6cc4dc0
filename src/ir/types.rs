//! IR-level types and virtual registers.

use bitflags::bitflags;

use crate::ast::{IntWidth, TypeKind};

/// The IR's own (smaller, opcode-relevant) type lattice. Distinct from
/// [`TypeKind`] because the IR doesn't care about a pointer's pointee past
/// "this is a pointer", only its ABI-visible width and signedness.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum IrType {
  I8, I16, I32, I64, I128, I256, I512, I1024,
  U8, U16, U32, U64, U128, U256, U512, U1024,
  F32,
  F64,
  Bool,
  Ptr,
}

impl IrType {
  #[must_use] pub fn from_surface(ty: &TypeKind) -> Self {
    match ty {
      TypeKind::Int { width, signed } => match (width, signed) {
        (IntWidth::W8, true) => Self::I8,
        (IntWidth::W8, false) => Self::U8,
        (IntWidth::W16, true) => Self::I16,
        (IntWidth::W16, false) => Self::U16,
        (IntWidth::W32, true) => Self::I32,
        (IntWidth::W32, false) => Self::U32,
        (IntWidth::W64, true) => Self::I64,
        (IntWidth::W64, false) => Self::U64,
        (IntWidth::W128, true) => Self::I128,
        (IntWidth::W128, false) => Self::U128,
        (IntWidth::W256, true) => Self::I256,
        (IntWidth::W256, false) => Self::U256,
        (IntWidth::W512, true) => Self::I512,
        (IntWidth::W512, false) => Self::U512,
        (IntWidth::W1024, true) => Self::I1024,
        (IntWidth::W1024, false) => Self::U1024,
      },
      TypeKind::F32 => Self::F32,
      TypeKind::F64 => Self::F64,
      TypeKind::Bool => Self::Bool,
      TypeKind::Ptr(_) | TypeKind::RawPointer | TypeKind::BytePointer => Self::Ptr,
    }
  }

  /// Number of 64-bit limbs a value of this type occupies (§4.2); 1 for
  /// everything except the wide integer family.
  #[must_use] pub fn limb_count(self) -> u32 {
    match self {
      Self::I128 | Self::U128 => 2,
      Self::I256 | Self::U256 => 4,
      Self::I512 | Self::U512 => 8,
      Self::I1024 | Self::U1024 => 16,
      _ => 1,
    }
  }

  /// The narrowest signed integer type that can hold a big-integer literal
  /// decomposed into `limb_count` 64-bit limbs (§4.5.1, §8 boundary case):
  /// one limb is a plain `i64`, 2/4/8 limbs type as i128/i256/i512, and
  /// anything wider (9..=16 limbs) types as i1024.
  #[must_use] pub fn narrowest_for_limbs(limb_count: usize) -> Self {
    match limb_count {
      0 | 1 => Self::I64,
      2 => Self::I128,
      3 | 4 => Self::I256,
      5..=8 => Self::I512,
      _ => Self::I1024,
    }
  }

  #[must_use] pub fn is_pointer(self) -> bool { matches!(self, Self::Ptr) }
  #[must_use] pub fn is_float(self) -> bool { matches!(self, Self::F32 | Self::F64) }
  #[must_use] pub fn is_signed(self) -> bool {
    matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64 | Self::I128 | Self::I256 | Self::I512 | Self::I1024)
  }
}

bitflags! {
  /// High bits packed into a [`VReg`]'s raw index, set by the value that
  /// produced it rather than by how it's later used.
  #[derive(Clone, Copy, PartialEq, Eq, Debug)]
  pub struct VRegFlags: u32 {
    /// This register holds an index into the module's string table, not a
    /// raw value — the consumer must look the string up through
    /// `Module::strings` rather than treating the bits as a number.
    const STRING_TABLE_REF = 0x8000;
    /// This register holds an index into the module's raw-bytes table
    /// (`b"..."` literals), analogous to `STRING_TABLE_REF`.
    const RAW_BYTES_REF = 0x4000;
  }
}

/// A virtual register: an SSA-lite value produced by exactly one
/// instruction (or a block parameter) and consumed by any number of later
/// instructions in the same function. Mutable locals are modeled as a
/// dedicated "slot" written with `mov`-family instructions rather than
/// phi nodes (§5.1) — simpler to generate and simpler to print.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct VReg(u32);

const INDEX_MASK: u32 = 0x3FFF;

impl VReg {
  #[must_use] pub fn new(index: u32, ty: IrType) -> Self {
    let _ = ty;
    assert!(index <= INDEX_MASK, "virtual register index overflow: {index}");
    Self(index)
  }

  #[must_use] pub fn with_flags(index: u32, flags: VRegFlags) -> Self {
    assert!(index <= INDEX_MASK, "virtual register index overflow: {index}");
    Self(index | flags.bits())
  }

  #[must_use] pub fn index(self) -> u32 { self.0 & INDEX_MASK }
  #[must_use] pub fn flags(self) -> VRegFlags { VRegFlags::from_bits_truncate(self.0 & !INDEX_MASK) }
  #[must_use] pub fn is_string_ref(self) -> bool { self.flags().contains(VRegFlags::STRING_TABLE_REF) }
  #[must_use] pub fn is_raw_bytes_ref(self) -> bool { self.flags().contains(VRegFlags::RAW_BYTES_REF) }
}

impl std::fmt::Debug for VReg {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "%{}", self.index()) }
}

impl std::fmt::Display for VReg {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "%{}", self.index()) }
}

/// A mutable local slot (the `let`-bound name storage), distinct from a
/// `VReg`: slots are written by `mov` and read by `load`-from-slot, so a
/// local reassigned in a loop doesn't need phi nodes at the loop header.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SlotId(pub u32);

impl std::fmt::Display for SlotId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "$slot{}", self.0) }
}
