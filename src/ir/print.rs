//! Textual IR dump, used by integration tests to assert on generated code
//! without reaching into the `Cfg`/`Instruction` structures directly.

use std::fmt;

use crate::ir::block::Terminator;
use crate::ir::inst::{Immediate, Instruction, Opcode};
use crate::ir::module::Module;
use crate::symbol::Interner;

/// Wraps a [`Module`] together with the [`Interner`] needed to resolve its
/// `Symbol`s, since `Module` itself carries no name strings.
pub struct PrintModule<'a> {
  pub module: &'a Module,
  pub interner: &'a Interner,
}

impl fmt::Display for PrintModule<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if let Some(name) = self.module.name {
      writeln!(f, "module {} {{", self.interner.resolve(name))?;
    }
    for (id, func) in self.module.functions() {
      write!(f, "fn {}{}(", id, self.interner.resolve(func.name))?;
      for (i, (pname, ty)) in func.params.iter().enumerate() {
        if i > 0 { write!(f, ", ")?; }
        write!(f, "{}: {:?}", self.interner.resolve(*pname), ty)?;
      }
      writeln!(f, ") {{")?;
      for (bid, block) in func.cfg.iter() {
        writeln!(f, "  {bid}:")?;
        for inst in &block.insts {
          writeln!(f, "    {}", self.fmt_inst(inst))?;
        }
        if let Some(term) = block.terminator() {
          writeln!(f, "    {}", fmt_term(term))?;
        } else {
          writeln!(f, "    <missing terminator>")?;
        }
      }
      writeln!(f, "}}")?;
    }
    if self.module.name.is_some() { writeln!(f, "}}")?; }
    Ok(())
  }
}

fn fmt_term(term: &Terminator) -> String {
  match term {
    Terminator::Jump(b) => format!("jump {b}"),
    Terminator::Branch { cond, if_true, if_false } => format!("branch {cond}, {if_true}, {if_false}"),
    Terminator::Return(Some(v)) => format!("return {v}"),
    Terminator::Return(None) => "return".to_string(),
    Terminator::Halt(Some(v)) => format!("halt {v}"),
    Terminator::Halt(None) => "halt".to_string(),
    Terminator::Unreachable => "unreachable".to_string(),
  }
}

impl PrintModule<'_> {
  /// Render one instruction. String/bytes-table references print their id
  /// plus a hex preview of the underlying bytes (truncated to 16 source
  /// bytes so a large literal doesn't blow out a single IR-dump line),
  /// rather than a bare id, so a dump is useful without cross-referencing
  /// the module's string/bytes tables by hand.
  fn fmt_inst(&self, inst: &Instruction) -> String {
    let args: Vec<String> = inst.args.iter().map(std::string::ToString::to_string).collect();
    let dest = inst.dest.map(|d| format!("{d} := ")).unwrap_or_default();
    let opname = opcode_name(inst.opcode);
    let imm = match &inst.imm {
      Some(Immediate::Int(limbs)) => format!(" #{limbs:?}"),
      Some(Immediate::Float(v)) => format!(" #{v}"),
      Some(Immediate::Bool(v)) => format!(" #{v}"),
      Some(Immediate::StringRef(s)) => {
        let preview = self.module.strings().get(s.0 as usize).map(|b| hex_preview(b)).unwrap_or_default();
        format!(" {s} [{preview}]")
      }
      Some(Immediate::BytesRef(b)) => {
        let preview = self.module.bytes_table().get(b.0 as usize).map(|bs| hex_preview(bs)).unwrap_or_default();
        format!(" {b} [{preview}]")
      }
      None => String::new(),
    };
    let slot = inst.slot.map(|s| format!(" {s}")).unwrap_or_default();
    let global = inst.global.map(|g| format!(" {g}")).unwrap_or_default();
    let runtime = inst.runtime_symbol.map(|s| format!(" -> {s}")).unwrap_or_default();
    let number = inst.syscall_number.map(|n| format!(" num={n}")).unwrap_or_default();
    format!("{dest}{opname}({}){imm}{slot}{global}{runtime}{number}", args.join(", "))
  }
}

fn hex_preview(bytes: &[u8]) -> String {
  const MAX: usize = 16;
  if bytes.len() > MAX {
    format!("{}..", hex::encode(&bytes[..MAX]))
  } else {
    hex::encode(bytes)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ir::function::Function;
  use crate::ir::inst;
  use crate::ir::types::IrType;
  use crate::symbol::Interner;

  #[test]
  fn string_constant_prints_its_hex_preview() {
    let mut interner = Interner::new();
    let name = interner.intern("f");
    let mut module = Module::new(None);
    let id = module.intern_string(b"hi".to_vec());
    let mut func = Function::new(name, vec![], None);
    let dest = func.fresh_vreg(IrType::Ptr);
    func.cfg[func.entry].push(inst::constant(dest, IrType::Ptr, inst::Immediate::StringRef(id)));
    func.cfg[func.entry].terminate(crate::ir::block::Terminator::Return(Some(dest)));
    module.add_function(func);
    let rendered = format!("{}", PrintModule { module: &module, interner: &interner });
    assert!(rendered.contains(&hex::encode(b"hi")), "expected hex preview of `hi` in:\n{rendered}");
  }

  #[test]
  fn long_bytes_literal_preview_is_truncated() {
    assert!(hex_preview(&[0u8; 32]).ends_with(".."));
    assert!(!hex_preview(&[0u8; 8]).ends_with(".."));
  }
}

fn opcode_name(op: Opcode) -> &'static str {
  match op {
    Opcode::Add => "add", Opcode::Sub => "sub", Opcode::Mul => "mul", Opcode::Div => "div",
    Opcode::Mod => "mod", Opcode::Neg => "neg",
    Opcode::And => "and", Opcode::Or => "or", Opcode::Xor => "xor", Opcode::Not => "not",
    Opcode::Shl => "shl", Opcode::AShr => "ashr", Opcode::LShr => "lshr",
    Opcode::RotL => "rotl", Opcode::RotR => "rotr",
    Opcode::ICmpEq => "icmp.eq", Opcode::ICmpNe => "icmp.ne", Opcode::ICmpLt => "icmp.lt",
    Opcode::ICmpLe => "icmp.le", Opcode::ICmpGt => "icmp.gt", Opcode::ICmpGe => "icmp.ge",
    Opcode::FCmpEq => "fcmp.eq", Opcode::FCmpNe => "fcmp.ne", Opcode::FCmpLt => "fcmp.lt",
    Opcode::FCmpLe => "fcmp.le", Opcode::FCmpGt => "fcmp.gt", Opcode::FCmpGe => "fcmp.ge",
    Opcode::Const => "const",
    Opcode::MovToSlot => "mov.slot",
    Opcode::LoadSlot => "load.slot",
    Opcode::PtrAdd => "ptr.add", Opcode::PtrSub => "ptr.sub",
    Opcode::Load => "load", Opcode::Store => "store", Opcode::AddressOf => "addr.of",
    Opcode::Call => "call",
    Opcode::MemAlloc => "mem.alloc", Opcode::MemDealloc => "mem.dealloc",
    Opcode::MemStackAlloc => "mem.stack_alloc", Opcode::MemStackFree => "mem.stack_free",
    Opcode::MemArenaAlloc => "mem.arena_alloc", Opcode::MemArenaReset => "mem.arena_reset",
    Opcode::MemSlabAlloc => "mem.slab_alloc", Opcode::MemSlabFree => "mem.slab_free",
    Opcode::MemMmioRead => "mem.mmio_read", Opcode::MemAlignUp => "mem.align_up",
    Opcode::MemAlignDown => "mem.align_down", Opcode::MemIsAligned => "mem.is_aligned",
    Opcode::MemPrefetch => "mem.prefetch", Opcode::MemPrefetchWrite => "mem.prefetch_write",
    Opcode::SyscallWrite => "sys.write", Opcode::SyscallRead => "sys.read", Opcode::SyscallRaw => "sys.raw",
    Opcode::AtomicLoad => "atomic.load", Opcode::AtomicStore => "atomic.store",
    Opcode::AtomicSwap => "atomic.swap", Opcode::AtomicCas => "atomic.cas",
    Opcode::LoadGlobal => "load.global", Opcode::StoreGlobal => "store.global",
    Opcode::InlineAsm => "asm",
  }
}
