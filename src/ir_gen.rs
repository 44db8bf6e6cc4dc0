//! The IR generator (C5): lowers the syntax tree (§3.3) into the IR (§5).
//!
//! A `Translator`/`Translate` split: a `FuncCtx` carries
//! the mutable state for one function in progress (current block, scopes,
//! loop stack), while `IrGen` owns the module-level state (the function
//! table, diagnostics, the interner). Expression lowering always returns
//! the `VReg` holding the expression's value; statement lowering returns
//! nothing, since statements affect control flow and scopes instead.

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::ast::{
  AtomicSubkind, Expr, IntWidth, LoopHeader, LoopKind, MemorySubkind, Param, SExpr, SStmt, Stmt, SyscallSubkind,
  TypeKind,
};
use crate::diagnostics::{DiagnosticHandler, Details, Severity};
use crate::ir::block::Terminator;
use crate::ir::function::Function;
use crate::ir::inst::{self, Immediate, Opcode};
use crate::ir::module::{FuncId, GlobalId, Module};
use crate::ir::types::{IrType, SlotId, VReg};
use crate::operators::OpName;
use crate::span::FileSpan;
use crate::symbol::{Interner, Symbol};
use crate::token::LiteralValue;

#[derive(Clone, Copy, Debug)]
enum Binding {
  Local { slot: SlotId, ty: IrType },
  Function { id: FuncId, ret_ty: Option<IrType> },
  Global { id: GlobalId, ty: IrType },
}

struct LoopCtx {
  break_target: crate::ir::block::BlockId,
  continue_target: crate::ir::block::BlockId,
}

/// Per-function lowering state.
struct FuncCtx {
  func: Function,
  cur_block: crate::ir::block::BlockId,
  scopes: Vec<HashMap<Symbol, Binding>>,
  loops: Vec<LoopCtx>,
}

impl FuncCtx {
  fn new(func: Function) -> Self {
    let entry = func.entry;
    Self { func, cur_block: entry, scopes: vec![HashMap::new()], loops: Vec::new() }
  }

  fn push_scope(&mut self) { self.scopes.push(HashMap::new()); }
  fn pop_scope(&mut self) { self.scopes.pop(); }

  fn bind(&mut self, name: Symbol, binding: Binding) {
    self.scopes.last_mut().expect("at least one scope").insert(name, binding);
  }

  fn lookup_local(&self, name: Symbol) -> Option<Binding> {
    self.scopes.iter().rev().find_map(|s| s.get(&name).copied())
  }
}

pub struct IrGen<'dx> {
  module: Module,
  globals: HashMap<Symbol, Binding>,
  diagnostics: &'dx mut DiagnosticHandler,
  interner: &'dx mut Interner,
  file: Symbol,
}

impl<'dx> IrGen<'dx> {
  #[must_use] pub fn new(
    module_name: Option<Symbol>,
    file: Symbol,
    diagnostics: &'dx mut DiagnosticHandler,
    interner: &'dx mut Interner,
  ) -> Self {
    Self { module: Module::new(module_name), globals: HashMap::new(), diagnostics, interner, file }
  }

  /// Generate a whole program: declare every top-level `let` as a global
  /// and every function's signature first (so a call or a `load-global`
  /// can reference a declaration appearing later in the file), then
  /// generate every function body (§4.5.4's two-pass protocol).
  pub fn generate(mut self, items: &[SStmt]) -> Module {
    self.declare_pass(items);
    self.body_pass(items);
    self.module
  }

  /// Pass 1: collect every top-level `let` as a module global and every
  /// function's signature, recursing into `module` blocks so declarations
  /// nested under one are visible module-wide too (this language has no
  /// per-module namespacing, only the `module`/`import` statement shapes
  /// of §3.3).
  fn declare_pass(&mut self, items: &[SStmt]) {
    for item in items {
      match &item.k {
        Stmt::Function { name, params, ret_ty, .. } => {
          let param_tys: Vec<(Symbol, IrType)> =
            params.iter().map(|p: &Param| (p.name, IrType::from_surface(&p.ty))).collect();
          let ret = ret_ty.as_ref().map(IrType::from_surface);
          let f = Function::new(*name, param_tys, ret);
          let id = self.module.add_function(f);
          self.globals.insert(*name, Binding::Function { id, ret_ty: ret });
        }
        Stmt::Let { name, ty, value, is_const } => {
          let declared_ty = ty.as_ref().map(IrType::from_surface).unwrap_or(IrType::I64);
          // Only a constant integer initializer is recorded directly
          // (§3.4); anything else (no initializer, a call, a reference to
          // another global, an arbitrary expression) marks `has_init =
          // false` since the generator emits no module-scope code to
          // evaluate it.
          let initial = match value.as_ref().map(|v| &v.k) {
            Some(Expr::Literal(LiteralValue::Int(limbs))) => Some(limbs.clone()),
            _ => None,
          };
          let g = crate::ir::module::Global { name: *name, ty: declared_ty, is_const: *is_const, initial };
          let id = self.module.add_global(g);
          self.globals.insert(*name, Binding::Global { id, ty: declared_ty });
        }
        Stmt::Module { items, .. } => self.declare_pass(items),
        _ => {}
      }
    }
  }

  /// Pass 2: lower every function body, recursing into `module` blocks the
  /// same way `declare_pass` does.
  fn body_pass(&mut self, items: &[SStmt]) {
    for item in items {
      match &item.k {
        Stmt::Function { name, params, ret_ty, body } => {
          self.generate_function(*name, params, ret_ty.as_ref(), body);
        }
        Stmt::Module { items, .. } => self.body_pass(items),
        _ => {}
      }
    }
  }

  fn generate_function(&mut self, name: Symbol, params: &[Param], _ret_ty: Option<&TypeKind>, body: &[SStmt]) {
    let Binding::Function { id, .. } = *self.globals.get(&name).expect("declared in declare_pass") else {
      unreachable!("function binding must be Binding::Function")
    };
    // Pull the already-constructed `Function` out of the module, build it
    // up in a `FuncCtx`, then put it back — avoids holding `&mut self.module`
    // and `&mut self` (for diagnostics/interner) at once.
    let func = std::mem::replace(&mut self.module[id], Function::new(name, vec![], None));
    let mut fc = FuncCtx::new(func);
    for (pname, ty) in params.iter().map(|p| (p.name, IrType::from_surface(&p.ty))) {
      let slot = fc.func.fresh_slot();
      let v = fc.func.fresh_vreg(ty);
      fc.func.cfg[fc.cur_block].push(inst::mov_to_slot(slot, ty, v));
      fc.bind(pname, Binding::Local { slot, ty });
    }
    self.lower_block(&mut fc, body);
    if !fc.func.cfg[fc.cur_block].is_terminated() {
      fc.func.cfg[fc.cur_block].terminate(Terminator::Return(None));
    }
    self.module[id] = fc.func;
  }

  fn lower_block(&mut self, fc: &mut FuncCtx, stmts: &[SStmt]) {
    fc.push_scope();
    for s in stmts {
      if fc.func.cfg[fc.cur_block].is_terminated() { break }
      self.lower_stmt(fc, s);
    }
    fc.pop_scope();
  }

  fn lower_stmt(&mut self, fc: &mut FuncCtx, stmt: &SStmt) {
    match &stmt.k {
      Stmt::Expr(e) => { self.lower_expr(fc, e); }
      Stmt::Let { name, ty, value, .. } => {
        let declared = ty.as_ref().map(IrType::from_surface)
          .unwrap_or_else(|| value.as_ref().map_or(IrType::I64, |v| self.infer_type(fc, v)));
        let slot = fc.func.fresh_slot();
        // An uninitialized `let` still reserves a slot (so later reads
        // resolve) but emits no `mov` until something assigns into it.
        if let Some(value) = value {
          let v = self.lower_expr(fc, value);
          fc.func.cfg[fc.cur_block].push(inst::mov_to_slot(slot, declared, v));
        }
        fc.bind(*name, Binding::Local { slot, ty: declared });
      }
      Stmt::Return(value) => {
        let v = value.as_ref().map(|e| self.lower_expr(fc, e));
        fc.func.cfg[fc.cur_block].terminate(Terminator::Return(v));
      }
      Stmt::Halt(value) => {
        let v = value.as_ref().map(|e| self.lower_expr(fc, e));
        fc.func.cfg[fc.cur_block].terminate(Terminator::Halt(v));
      }
      Stmt::Break => {
        match fc.loops.last() {
          Some(loop_ctx) => fc.func.cfg[fc.cur_block].terminate(Terminator::Jump(loop_ctx.break_target)),
          None => self.report_outside_loop(stmt.span),
        }
      }
      Stmt::Continue => {
        match fc.loops.last() {
          Some(loop_ctx) => fc.func.cfg[fc.cur_block].terminate(Terminator::Jump(loop_ctx.continue_target)),
          None => self.report_outside_loop(stmt.span),
        }
      }
      Stmt::If { cond, then_body, else_body } => self.lower_if(fc, cond, then_body, else_body.as_deref()),
      Stmt::Loop { kind, header, body } => self.lower_loop(fc, *kind, header, body),
      Stmt::Function { .. } => {
        // Nested function declarations are hoisted to the module level by
        // the parser; nothing left to do at statement position.
      }
      Stmt::Module { items, .. } => self.declare_pass(items),
      Stmt::Import { .. } => {}
    }
  }

  /// Block-creation protocol for `if`/`else` (§4.5.3): allocate a `then`
  /// block, an optional `else` block, and a join block; generate the
  /// condition into the current block, branch, and merge both arms into
  /// the join unless an arm already terminated (e.g. with `return`).
  fn lower_if(&mut self, fc: &mut FuncCtx, cond: &SExpr, then_body: &[SStmt], else_body: Option<&[SStmt]>) {
    let cond_block = fc.cur_block;
    let cond_v = self.lower_expr(fc, cond);
    let then_blk = fc.func.cfg.new_block(cond_block);
    let else_blk = fc.func.cfg.new_block(cond_block);
    let join_blk = fc.func.cfg.new_block(cond_block);
    fc.func.cfg[cond_block].terminate(Terminator::Branch { cond: cond_v, if_true: then_blk, if_false: else_blk });

    fc.cur_block = then_blk;
    self.lower_block(fc, then_body);
    if !fc.func.cfg[fc.cur_block].is_terminated() {
      fc.func.cfg[fc.cur_block].terminate(Terminator::Jump(join_blk));
    }

    fc.cur_block = else_blk;
    if let Some(else_body) = else_body {
      self.lower_block(fc, else_body);
    }
    if !fc.func.cfg[fc.cur_block].is_terminated() {
      fc.func.cfg[fc.cur_block].terminate(Terminator::Jump(join_blk));
    }

    fc.cur_block = join_blk;
  }

  /// Block-creation protocol for every [`LoopKind`] (§4.5.3). `infinite`/
  /// `count`/`range` share the shape `header -> body -> header`, checking
  /// their condition once per iteration in a shared header block. `while`
  /// is special-cased per §4.5.3's explicit rule: "body re-evaluates
  /// condition at end (mirroring the preheader), so the condition is
  /// lowered twice in the IR" — the preheader and the body's latch each
  /// lower their own copy of the condition expression rather than sharing
  /// one header block.
  fn lower_loop(&mut self, fc: &mut FuncCtx, kind: LoopKind, header: &LoopHeader, body: &[SStmt]) {
    if kind == LoopKind::While {
      self.lower_while_loop(fc, header, body);
      return
    }

    let preheader = fc.cur_block;
    let header_blk = fc.func.cfg.new_block(preheader);
    let body_blk = fc.func.cfg.new_block(header_blk);
    let exit_blk = fc.func.cfg.new_block(header_blk);

    // Range/count loops carry an induction variable in a slot, written once
    // in the preheader and bumped in the body's latch.
    let induction = match (kind, header) {
      (LoopKind::Count, LoopHeader::Count(count_expr)) => {
        let count_v = self.lower_expr(fc, count_expr);
        let slot = fc.func.fresh_slot();
        let zero = self.emit_int_const(fc, IrType::I64, 0);
        fc.func.cfg[preheader].push(inst::mov_to_slot(slot, IrType::I64, zero));
        Some((slot, count_v))
      }
      (LoopKind::Range, LoopHeader::Range { start, end }) => {
        let start_v = self.lower_expr(fc, start);
        let end_v = self.lower_expr(fc, end);
        let slot = fc.func.fresh_slot();
        fc.func.cfg[preheader].push(inst::mov_to_slot(slot, IrType::I64, start_v));
        Some((slot, end_v))
      }
      _ => None,
    };
    fc.func.cfg[preheader].terminate(Terminator::Jump(header_blk));

    fc.cur_block = header_blk;
    match kind {
      LoopKind::Infinite => {
        fc.func.cfg[header_blk].terminate(Terminator::Jump(body_blk));
      }
      LoopKind::Count | LoopKind::Range => {
        let (slot, limit) = induction.expect("count/range loop always carries an induction variable");
        let cur = fc.func.fresh_vreg(IrType::I64);
        fc.func.cfg[header_blk].push(inst::load_slot(cur, IrType::I64, slot));
        let cond_v = fc.func.fresh_vreg(IrType::Bool);
        fc.func.cfg[header_blk].push(inst::binary(cond_v, IrType::Bool, Opcode::ICmpLt, cur, limit));
        fc.func.cfg[header_blk].terminate(Terminator::Branch { cond: cond_v, if_true: body_blk, if_false: exit_blk });
      }
      LoopKind::While => unreachable!("handled by lower_while_loop"),
    }

    fc.cur_block = body_blk;
    fc.loops.push(LoopCtx { break_target: exit_blk, continue_target: header_blk });
    self.lower_block(fc, body);
    fc.loops.pop();
    if !fc.func.cfg[fc.cur_block].is_terminated() {
      if let (LoopKind::Count | LoopKind::Range, Some((slot, _))) = (kind, induction) {
        let cur = fc.func.fresh_vreg(IrType::I64);
        fc.func.cfg[fc.cur_block].push(inst::load_slot(cur, IrType::I64, slot));
        let one = self.emit_int_const(fc, IrType::I64, 1);
        let next = fc.func.fresh_vreg(IrType::I64);
        fc.func.cfg[fc.cur_block].push(inst::binary(next, IrType::I64, Opcode::Add, cur, one));
        fc.func.cfg[fc.cur_block].push(inst::mov_to_slot(slot, IrType::I64, next));
      }
      fc.func.cfg[fc.cur_block].terminate(Terminator::Jump(header_blk));
    }

    fc.cur_block = exit_blk;
  }

  /// `while cond { body }` (§4.5.3): the preheader lowers `cond` once and
  /// branches straight into the body or the exit; the body's latch lowers
  /// a second, independent copy of `cond` and branches again, so `continue`
  /// re-checks the condition instead of jumping back to a shared header.
  fn lower_while_loop(&mut self, fc: &mut FuncCtx, header: &LoopHeader, body: &[SStmt]) {
    let LoopHeader::Condition(cond) = header else { unreachable!("while loop missing condition") };
    let preheader = fc.cur_block;
    let cond_v = self.lower_expr(fc, cond);
    let body_blk = fc.func.cfg.new_block(preheader);
    let exit_blk = fc.func.cfg.new_block(preheader);
    let latch_blk = fc.func.cfg.new_block(preheader);
    fc.func.cfg[preheader].terminate(Terminator::Branch { cond: cond_v, if_true: body_blk, if_false: exit_blk });

    fc.cur_block = body_blk;
    fc.loops.push(LoopCtx { break_target: exit_blk, continue_target: latch_blk });
    self.lower_block(fc, body);
    fc.loops.pop();
    if !fc.func.cfg[fc.cur_block].is_terminated() {
      fc.func.cfg[fc.cur_block].terminate(Terminator::Jump(latch_blk));
    }

    fc.cur_block = latch_blk;
    let cond_v2 = self.lower_expr(fc, cond);
    fc.func.cfg[latch_blk].terminate(Terminator::Branch { cond: cond_v2, if_true: body_blk, if_false: exit_blk });

    fc.cur_block = exit_blk;
  }

  fn emit_int_const(&mut self, fc: &mut FuncCtx, ty: IrType, v: u64) -> VReg {
    let dest = fc.func.fresh_vreg(ty);
    fc.func.cfg[fc.cur_block].push(inst::constant(dest, ty, Immediate::Int(vec![v])));
    dest
  }

  /// Best-effort type for a `let` with no annotation: look through the
  /// value's own shape rather than threading a full inference pass through
  /// (this language's surface grammar requires every function parameter and
  /// return type to be annotated; only locals may omit theirs).
  fn infer_type(&self, fc: &FuncCtx, expr: &SExpr) -> IrType {
    match &expr.k {
      Expr::Literal(LiteralValue::Int(limbs)) => IrType::narrowest_for_limbs(limbs.len()),
      Expr::Literal(LiteralValue::Float(_)) => IrType::F64,
      Expr::Literal(LiteralValue::Bool(_)) => IrType::Bool,
      Expr::Literal(LiteralValue::Str(_) | LiteralValue::Bytes(_)) => IrType::Ptr,
      Expr::Literal(LiteralValue::Char(_)) => IrType::U8,
      Expr::Identifier(name) => match fc.lookup_local(*name).or_else(|| self.globals.get(name).copied()) {
        Some(Binding::Local { ty, .. } | Binding::Global { ty, .. }) => ty,
        Some(Binding::Function { ret_ty, .. }) => ret_ty.unwrap_or(IrType::I64),
        None => IrType::I64,
      },
      Expr::Unary { op: OpName::Deref | OpName::At, .. } => IrType::I64,
      Expr::Unary { op: OpName::Borrow, .. } => IrType::Ptr,
      _ => IrType::I64,
    }
  }

  /// Lower an expression, returning the `VReg` holding its value.
  fn lower_expr(&mut self, fc: &mut FuncCtx, expr: &SExpr) -> VReg {
    match &expr.k {
      Expr::Literal(lit) => self.lower_literal(fc, lit),
      Expr::Identifier(name) => self.lower_identifier(fc, *name, expr.span),
      Expr::Binary { op, left, right } => self.lower_binary(fc, *op, left, right),
      Expr::Unary { op, operand } => self.lower_unary(fc, *op, operand),
      Expr::Ternary { cond, then_expr, else_expr } => self.lower_ternary(fc, cond, then_expr, else_expr),
      Expr::ConditionalExpr { cond, then_body, else_body } => {
        self.lower_conditional_expr(fc, cond, then_body, else_body)
      }
      Expr::Assignment { target, value } => self.lower_assignment(fc, target, value),
      Expr::MultiAssignment { targets, value } => self.lower_multi_assignment(fc, targets, value),
      Expr::Call { callee, args } => self.lower_call(fc, callee, args),
      Expr::Index { base, index } => self.lower_index(fc, base, index),
      Expr::Dereference { pointer, value, is_write } => self.lower_dereference(fc, pointer, value.as_deref(), *is_write),
      Expr::SyscallOp { subkind, operands } => self.lower_syscall(fc, *subkind, operands),
      Expr::AtomicOp { subkind, operands } => self.lower_atomic(fc, *subkind, operands),
      Expr::MemoryOp { subkind, operands } => self.lower_memory(fc, *subkind, operands),
      Expr::InlineAssembly { template, operands } => self.lower_inline_asm(fc, template, operands),
      Expr::Comma { left, right } => {
        // A bare comma outside a recombination context (syscalls, CAS)
        // evaluates both sides for effect and yields the right one, the
        // usual comma-operator semantics.
        self.lower_expr(fc, left);
        self.lower_expr(fc, right)
      }
    }
  }

  fn lower_literal(&mut self, fc: &mut FuncCtx, lit: &LiteralValue) -> VReg {
    let (ty, imm) = match lit {
      LiteralValue::Int(limbs) => (IrType::narrowest_for_limbs(limbs.len()), Immediate::Int(limbs.clone())),
      LiteralValue::Float(v) => (IrType::F64, Immediate::Float(*v)),
      LiteralValue::Bool(v) => (IrType::Bool, Immediate::Bool(*v)),
      LiteralValue::Str(bytes) => {
        let id = self.module.intern_string(bytes.clone());
        (IrType::Ptr, Immediate::StringRef(id))
      }
      LiteralValue::Bytes(bytes) => {
        let id = self.module.intern_bytes(bytes.clone());
        (IrType::Ptr, Immediate::BytesRef(id))
      }
      LiteralValue::Char(c) => (IrType::U8, Immediate::Int(vec![u64::from(*c)])),
    };
    let plain = fc.func.fresh_vreg(ty);
    let dest = match &imm {
      Immediate::StringRef(_) => VReg::with_flags(plain.index(), crate::ir::types::VRegFlags::STRING_TABLE_REF),
      Immediate::BytesRef(_) => VReg::with_flags(plain.index(), crate::ir::types::VRegFlags::RAW_BYTES_REF),
      _ => plain,
    };
    fc.func.cfg[fc.cur_block].push(inst::constant(dest, ty, imm));
    dest
  }

  /// §3.5/§8: `break`/`continue` with an empty loop stack is a semantic
  /// error, not a panic — the caller still has a (terminator-less) block
  /// to fall through from, which `lower_block`'s end-of-body handling
  /// closes off the same way an empty statement list would.
  fn report_outside_loop(&mut self, span: FileSpan) {
    self.diagnostics.report_at(span, Severity::Error, Details::Message {
      category: crate::diagnostics::Category::Semantic,
      message: "outside of loop".to_string(),
    });
  }

  fn lower_identifier(&mut self, fc: &mut FuncCtx, name: Symbol, span: FileSpan) -> VReg {
    match fc.lookup_local(name).or_else(|| self.globals.get(&name).copied()) {
      Some(Binding::Local { slot, ty }) => {
        let dest = fc.func.fresh_vreg(ty);
        fc.func.cfg[fc.cur_block].push(inst::load_slot(dest, ty, slot));
        dest
      }
      Some(Binding::Global { id, ty }) => {
        let dest = fc.func.fresh_vreg(ty);
        fc.func.cfg[fc.cur_block].push(inst::load_global(dest, ty, id));
        dest
      }
      Some(Binding::Function { .. }) => {
        // A function used as a bare value (e.g. passed by name rather than
        // called) resolves to an address-sized placeholder; call sites
        // that actually invoke it look the binding up directly instead of
        // going through this path.
        fc.func.fresh_vreg(IrType::Ptr)
      }
      None => {
        self.diagnostics.report_at(span, Severity::Error, Details::Message {
          category: crate::diagnostics::Category::Semantic,
          message: format!("undefined name `{}`", self.interner.resolve(name)),
        });
        fc.func.fresh_vreg(IrType::I64)
      }
    }
  }

  fn lower_binary(&mut self, fc: &mut FuncCtx, op: OpName, left: &SExpr, right: &SExpr) -> VReg {
    let lhs = self.lower_expr(fc, left);
    let rhs = self.lower_expr(fc, right);
    let lty = self.infer_type(fc, left);
    // Pointer arithmetic is type-directed rather than a separate operator
    // family: `+`/`-` applied to a pointer-typed left operand lower to
    // `ptr.add`/`ptr.sub` instead of the plain integer opcode.
    if lty.is_pointer() && matches!(op, OpName::Add | OpName::Sub) {
      let dest = fc.func.fresh_vreg(IrType::Ptr);
      let opcode = if op == OpName::Add { Opcode::PtrAdd } else { Opcode::PtrSub };
      fc.func.cfg[fc.cur_block].push(inst::binary(dest, IrType::Ptr, opcode, lhs, rhs));
      return dest
    }
    let opcode = arith_opcode(op, lty);
    let result_ty = if is_comparison(op) { IrType::Bool } else { lty };
    let dest = fc.func.fresh_vreg(result_ty);
    fc.func.cfg[fc.cur_block].push(inst::binary(dest, result_ty, opcode, lhs, rhs));
    dest
  }

  fn lower_unary(&mut self, fc: &mut FuncCtx, op: OpName, operand: &SExpr) -> VReg {
    match op {
      OpName::Borrow => {
        let v = self.lower_expr(fc, operand);
        let dest = fc.func.fresh_vreg(IrType::Ptr);
        fc.func.cfg[fc.cur_block].push(inst::unary(dest, IrType::Ptr, Opcode::AddressOf, v));
        dest
      }
      OpName::Deref | OpName::At => {
        let ptr = self.lower_expr(fc, operand);
        let dest = fc.func.fresh_vreg(IrType::I64);
        fc.func.cfg[fc.cur_block].push(inst::load(dest, ptr, IrType::I64));
        dest
      }
      OpName::Neg => {
        let v = self.lower_expr(fc, operand);
        let ty = self.infer_type(fc, operand);
        let dest = fc.func.fresh_vreg(ty);
        fc.func.cfg[fc.cur_block].push(inst::unary(dest, ty, Opcode::Neg, v));
        dest
      }
      OpName::BitNot => {
        let v = self.lower_expr(fc, operand);
        let ty = self.infer_type(fc, operand);
        let dest = fc.func.fresh_vreg(ty);
        fc.func.cfg[fc.cur_block].push(inst::unary(dest, ty, Opcode::Not, v));
        dest
      }
      OpName::Print => self.lower_print(fc, operand),
      intrinsic if intrinsic_name(intrinsic).is_some() => {
        let v = self.lower_expr(fc, operand);
        let ty = self.infer_type(fc, operand);
        let dest = fc.func.fresh_vreg(ty);
        fc.func.cfg[fc.cur_block].push(inst::runtime_call(Some(dest), ty, crate::abi::INTRINSIC, &[v]));
        dest
      }
      other => unreachable!("{other:?} is not a registered unary operator"),
    }
  }

  /// The print operator (§4.5.2): literal strings and (possibly negated)
  /// literal integers route to the two untyped print entries; every other
  /// operand dispatches on its `VReg`'s type to a `_fcx_println_{type}`
  /// entry. The operand is still lowered and returned either way, since
  /// `print` is a value-producing unary operator like any other.
  fn lower_print(&mut self, fc: &mut FuncCtx, operand: &SExpr) -> VReg {
    let is_negative_int_literal = matches!(
      &operand.k,
      Expr::Unary { op: OpName::Neg, operand: inner } if matches!(inner.k, Expr::Literal(LiteralValue::Int(_)))
    );
    let symbol = match &operand.k {
      Expr::Literal(LiteralValue::Str(_)) => Some(crate::abi::PRINTLN),
      Expr::Literal(LiteralValue::Int(_)) => Some(crate::abi::PRINTLN_INT),
      Expr::Literal(LiteralValue::Char(_)) => Some(crate::abi::PRINTLN_CHAR),
      _ if is_negative_int_literal => Some(crate::abi::PRINTLN_INT),
      _ => None,
    };
    let v = self.lower_expr(fc, operand);
    let ty = self.infer_type(fc, operand);
    let symbol = symbol.unwrap_or_else(|| crate::abi::println_type_symbol(ty));
    fc.func.cfg[fc.cur_block].push(inst::runtime_call(None, ty, symbol, &[v]));
    v
  }

  /// `cond ? then : else` (§4.5.3): both arms are plain expressions, so
  /// this lowers to a single select-shaped diamond rather than the
  /// statement-list protocol `lower_conditional_expr` uses.
  fn lower_ternary(&mut self, fc: &mut FuncCtx, cond: &SExpr, then_expr: &SExpr, else_expr: &SExpr) -> VReg {
    let cond_block = fc.cur_block;
    let cond_v = self.lower_expr(fc, cond);
    let then_blk = fc.func.cfg.new_block(cond_block);
    let else_blk = fc.func.cfg.new_block(cond_block);
    let join_blk = fc.func.cfg.new_block(cond_block);
    fc.func.cfg[cond_block].terminate(Terminator::Branch { cond: cond_v, if_true: then_blk, if_false: else_blk });

    let ty = self.infer_type(fc, then_expr);
    let result_slot = fc.func.fresh_slot();

    fc.cur_block = then_blk;
    let then_v = self.lower_expr(fc, then_expr);
    fc.func.cfg[fc.cur_block].push(inst::mov_to_slot(result_slot, ty, then_v));
    fc.func.cfg[fc.cur_block].terminate(Terminator::Jump(join_blk));

    fc.cur_block = else_blk;
    let else_v = self.lower_expr(fc, else_expr);
    fc.func.cfg[fc.cur_block].push(inst::mov_to_slot(result_slot, ty, else_v));
    fc.func.cfg[fc.cur_block].terminate(Terminator::Jump(join_blk));

    fc.cur_block = join_blk;
    let dest = fc.func.fresh_vreg(ty);
    fc.func.cfg[fc.cur_block].push(inst::load_slot(dest, ty, result_slot));
    dest
  }

  /// `if cond { then } else { else }` used in value position: same
  /// diamond as the ternary, but each arm runs a full statement list and
  /// the arm's value comes from its trailing expression statement.
  fn lower_conditional_expr(&mut self, fc: &mut FuncCtx, cond: &SExpr, then_body: &[SStmt], else_body: &[SStmt]) -> VReg {
    let cond_block = fc.cur_block;
    let cond_v = self.lower_expr(fc, cond);
    let then_blk = fc.func.cfg.new_block(cond_block);
    let else_blk = fc.func.cfg.new_block(cond_block);
    let join_blk = fc.func.cfg.new_block(cond_block);
    fc.func.cfg[cond_block].terminate(Terminator::Branch { cond: cond_v, if_true: then_blk, if_false: else_blk });

    let result_slot = fc.func.fresh_slot();
    let mut result_ty = IrType::I64;

    fc.cur_block = then_blk;
    if let Some((last, rest)) = then_body.split_last() {
      self.lower_block(fc, rest);
      if let Stmt::Expr(e) = &last.k {
        let v = self.lower_expr(fc, e);
        result_ty = self.infer_type(fc, e);
        fc.func.cfg[fc.cur_block].push(inst::mov_to_slot(result_slot, result_ty, v));
      } else {
        self.lower_stmt(fc, last);
      }
    }
    if !fc.func.cfg[fc.cur_block].is_terminated() { fc.func.cfg[fc.cur_block].terminate(Terminator::Jump(join_blk)); }

    fc.cur_block = else_blk;
    if let Some((last, rest)) = else_body.split_last() {
      self.lower_block(fc, rest);
      if let Stmt::Expr(e) = &last.k {
        let v = self.lower_expr(fc, e);
        fc.func.cfg[fc.cur_block].push(inst::mov_to_slot(result_slot, result_ty, v));
      } else {
        self.lower_stmt(fc, last);
      }
    }
    if !fc.func.cfg[fc.cur_block].is_terminated() { fc.func.cfg[fc.cur_block].terminate(Terminator::Jump(join_blk)); }

    fc.cur_block = join_blk;
    let dest = fc.func.fresh_vreg(result_ty);
    fc.func.cfg[fc.cur_block].push(inst::load_slot(dest, result_ty, result_slot));
    dest
  }

  /// `target := value`. `@ptr := value` routes through `lower_dereference`
  /// instead (the parser already produces `Expr::Dereference{is_write}`
  /// for that case, per §4.5.2's "to `@ptr`: emit store" rule).
  fn lower_assignment(&mut self, fc: &mut FuncCtx, target: &SExpr, value: &SExpr) -> VReg {
    let v = self.lower_expr(fc, value);
    let ty_hint = self.infer_type(fc, value);
    self.store_to_target(fc, target, v, ty_hint);
    v
  }

  fn lower_multi_assignment(&mut self, fc: &mut FuncCtx, targets: &[SExpr], value: &SExpr) -> VReg {
    let v = self.lower_expr(fc, value);
    let ty_hint = self.infer_type(fc, value);
    for t in targets { self.store_to_target(fc, t, v, ty_hint); }
    v
  }

  fn store_to_target(&mut self, fc: &mut FuncCtx, target: &SExpr, v: VReg, ty_hint: IrType) {
    match &target.k {
      Expr::Identifier(name) => match fc.lookup_local(*name).or_else(|| self.globals.get(name).copied()) {
        // §4.5.2 assignment rules: an existing local is `mov`-ed in place
        // (the symbol table entry is never rebound, so later reads still
        // resolve to the same slot); a global goes through `store-global`.
        Some(Binding::Local { slot, ty }) => fc.func.cfg[fc.cur_block].push(inst::mov_to_slot(slot, ty, v)),
        Some(Binding::Global { id, ty }) => fc.func.cfg[fc.cur_block].push(inst::store_global(ty, id, v)),
        Some(Binding::Function { .. }) => self.diagnostics.report_at(target.span, Severity::Error, Details::Message {
          category: crate::diagnostics::Category::Semantic,
          message: format!("cannot assign to function `{}`", self.interner.resolve(*name)),
        }),
        // An identifier not yet bound registers a fresh local pointing at
        // the assigned value's vreg, rather than an error — this is how
        // the surface language lets `x := 0;` stand in for a `let`.
        None => {
          let slot = fc.func.fresh_slot();
          fc.func.cfg[fc.cur_block].push(inst::mov_to_slot(slot, ty_hint, v));
          fc.bind(*name, Binding::Local { slot, ty: ty_hint });
        }
      },
      Expr::Dereference { pointer, .. } => {
        let ptr = self.lower_expr(fc, pointer);
        fc.func.cfg[fc.cur_block].push(inst::store(ptr, v, IrType::I64));
      }
      Expr::Index { base, index } => {
        let addr = self.lower_index_addr(fc, base, index);
        fc.func.cfg[fc.cur_block].push(inst::store(addr, v, IrType::I64));
      }
      _ => self.diagnostics.report_at(target.span, Severity::Error, Details::Message {
        category: crate::diagnostics::Category::Semantic,
        message: "invalid assignment target".to_string(),
      }),
    }
  }

  fn lower_call(&mut self, fc: &mut FuncCtx, callee: &SExpr, args: &[SExpr]) -> VReg {
    let arg_vs: Vec<VReg> = args.iter().map(|a| self.lower_expr(fc, a)).collect();
    if let Expr::Identifier(name) = &callee.k {
      if let Some(Binding::Function { id, ret_ty }) = self.globals.get(name).copied() {
        let callee_v = fc.func.fresh_vreg(IrType::Ptr);
        let ret_ty = ret_ty.unwrap_or(IrType::I64);
        let dest = fc.func.fresh_vreg(ret_ty);
        fc.func.cfg[fc.cur_block].push(inst::call(Some(dest), ret_ty, callee_v, &arg_vs));
        let _ = id;
        return dest
      }
    }
    let callee_v = self.lower_expr(fc, callee);
    let dest = fc.func.fresh_vreg(IrType::I64);
    fc.func.cfg[fc.cur_block].push(inst::call(Some(dest), IrType::I64, callee_v, &arg_vs));
    dest
  }

  /// `arr[i]` (§4.5.2): `addr = base + i * element_size`, element size
  /// defaulting to 8 — spelled out as explicit `mul`/`ptr-add` rather than
  /// a dedicated addressing opcode, since §3.4's opcode list has no slot
  /// for one.
  fn lower_index_addr(&mut self, fc: &mut FuncCtx, base: &SExpr, index: &SExpr) -> VReg {
    let base_v = self.lower_expr(fc, base);
    let index_v = self.lower_expr(fc, index);
    let elem_size = fc.func.fresh_vreg(IrType::I64);
    fc.func.cfg[fc.cur_block].push(inst::constant(elem_size, IrType::I64, Immediate::Int(vec![8])));
    let offset = fc.func.fresh_vreg(IrType::I64);
    fc.func.cfg[fc.cur_block].push(inst::binary(offset, IrType::I64, Opcode::Mul, index_v, elem_size));
    let dest = fc.func.fresh_vreg(IrType::Ptr);
    fc.func.cfg[fc.cur_block].push(inst::binary(dest, IrType::Ptr, Opcode::PtrAdd, base_v, offset));
    dest
  }

  fn lower_index(&mut self, fc: &mut FuncCtx, base: &SExpr, index: &SExpr) -> VReg {
    let addr = self.lower_index_addr(fc, base, index);
    let dest = fc.func.fresh_vreg(IrType::I64);
    fc.func.cfg[fc.cur_block].push(inst::load(dest, addr, IrType::I64));
    dest
  }

  fn lower_dereference(&mut self, fc: &mut FuncCtx, pointer: &SExpr, value: Option<&SExpr>, is_write: bool) -> VReg {
    let ptr = self.lower_expr(fc, pointer);
    if is_write {
      let v = value.map(|e| self.lower_expr(fc, e)).expect("write dereference always carries a value");
      fc.func.cfg[fc.cur_block].push(inst::store(ptr, v, IrType::I64));
      v
    } else {
      let dest = fc.func.fresh_vreg(IrType::I64);
      fc.func.cfg[fc.cur_block].push(inst::load(dest, ptr, IrType::I64));
      dest
    }
  }

  /// Syscall family (§4.5.2): `fd $/ buf` lowers straight to a two-operand
  /// op, but a trailing `, len` (parsed as `Expr::Comma` on the right
  /// operand, since the comma appears where a syscall operand list is
  /// expected) must be folded in as a third operand before emission. The
  /// syscall number (1 for write, 0 for read) is materialized as its own
  /// `const` instruction rather than left implicit in the opcode choice,
  /// since it feeds a dedicated number operand a caller may want to read
  /// back; `raw` instead takes the number from its first argument, the
  /// user-supplied number expression.
  fn lower_syscall(&mut self, fc: &mut FuncCtx, subkind: SyscallSubkind, operands: &[SExpr]) -> VReg {
    let flat = flatten_commas(operands);
    let (number, arg_vs, opcode) = match subkind {
      SyscallSubkind::Write => {
        let number = self.emit_int_const(fc, IrType::I64, 1);
        let args: SmallVec<[VReg; 3]> = flat.iter().map(|e| self.lower_expr(fc, e)).collect();
        (number, args, Opcode::SyscallWrite)
      }
      SyscallSubkind::Read => {
        let number = self.emit_int_const(fc, IrType::I64, 0);
        let args: SmallVec<[VReg; 3]> = flat.iter().map(|e| self.lower_expr(fc, e)).collect();
        (number, args, Opcode::SyscallRead)
      }
      SyscallSubkind::Raw => {
        let number = self.lower_expr(fc, &flat[0]);
        let args: SmallVec<[VReg; 3]> = flat[1..].iter().map(|e| self.lower_expr(fc, e)).collect();
        (number, args, Opcode::SyscallRaw)
      }
    };
    let dest = fc.func.fresh_vreg(IrType::I64);
    fc.func.cfg[fc.cur_block].push(inst::syscall_op(Some(dest), opcode, number, &arg_vs));
    dest
  }

  /// `ptr <=> expected, new` (§4.5.2, testable scenario): the parser
  /// already flattens this into a 3-operand `AtomicOp`, so no comma
  /// recombination is needed here (unlike the syscall family, where the
  /// comma is reconstructed from a binary-operator parse).
  fn lower_atomic(&mut self, fc: &mut FuncCtx, subkind: AtomicSubkind, operands: &[SExpr]) -> VReg {
    let flat = flatten_commas(operands);
    let arg_vs: SmallVec<[VReg; 3]> = flat.iter().map(|e| self.lower_expr(fc, e)).collect();
    let ty = flat.first().map(|e| self.infer_type(fc, e)).unwrap_or(IrType::I64);
    let opcode = match subkind {
      AtomicSubkind::Read => Opcode::AtomicLoad,
      AtomicSubkind::Write => Opcode::AtomicStore,
      AtomicSubkind::Swap => Opcode::AtomicSwap,
      AtomicSubkind::Cas => Opcode::AtomicCas,
    };
    let result_ty = if subkind == AtomicSubkind::Write { IrType::Bool } else { ty };
    let dest = fc.func.fresh_vreg(result_ty);
    fc.func.cfg[fc.cur_block].push(inst::atomic_op(Some(dest), result_ty, opcode, &arg_vs));
    dest
  }

  /// Memory family (§4.5.2): `align-up`/`align-down`/`is-aligned` fold to
  /// pure arithmetic at lowering time instead of an ABI call (`abi.rs`
  /// documents this split) — `align-up(v, a) = (v + a - 1) & ~(a - 1)` for
  /// a power-of-two alignment `a`.
  fn lower_memory(&mut self, fc: &mut FuncCtx, subkind: MemorySubkind, operands: &[SExpr]) -> VReg {
    match subkind {
      MemorySubkind::AlignUp | MemorySubkind::AlignDown | MemorySubkind::IsAligned => {
        let v = self.lower_expr(fc, &operands[0]);
        let a = self.lower_expr(fc, &operands[1]);
        match subkind {
          MemorySubkind::AlignUp => self.emit_align_up(fc, v, a),
          MemorySubkind::AlignDown => self.emit_align_down(fc, v, a),
          MemorySubkind::IsAligned => {
            let aligned = self.emit_align_down(fc, v, a);
            let dest = fc.func.fresh_vreg(IrType::Bool);
            fc.func.cfg[fc.cur_block].push(inst::binary(dest, IrType::Bool, Opcode::ICmpEq, v, aligned));
            dest
          }
          _ => unreachable!("matched above"),
        }
      }
      MemorySubkind::SlabAlloc | MemorySubkind::SlabFree => {
        // The second operand is a type identifier, not a value to
        // evaluate: its name (or the literal "unknown" if absent) is
        // hashed at lowering time and folded into a constant (§4.5.2).
        let first = self.lower_expr(fc, &operands[0]);
        let type_name = match operands.get(1).map(|e| &e.k) {
          Some(Expr::Identifier(name)) => self.interner.resolve(*name).to_string(),
          _ => "unknown".to_string(),
        };
        let hash = fnv1a(type_name.as_bytes());
        let hash_v = self.emit_int_const(fc, IrType::U64, hash);
        let opcode = if subkind == MemorySubkind::SlabAlloc { Opcode::MemSlabAlloc } else { Opcode::MemSlabFree };
        let dest = (subkind == MemorySubkind::SlabAlloc).then(|| fc.func.fresh_vreg(IrType::Ptr));
        fc.func.cfg[fc.cur_block].push(inst::memory_op(dest, IrType::Ptr, opcode, &[first, hash_v]));
        dest.unwrap_or(first)
      }
      MemorySubkind::MmioMap => {
        if !matches!(operands[0].k, Expr::Literal(LiteralValue::Int(_))) {
          self.diagnostics.report_at(operands[0].span, Severity::Error, Details::Message {
            category: crate::diagnostics::Category::Semantic,
            message: "mmio-map address must be a constant".to_string(),
          });
        }
        let arg_vs: Vec<VReg> = operands.iter().map(|e| self.lower_expr(fc, e)).collect();
        let dest = fc.func.fresh_vreg(IrType::Ptr);
        fc.func.cfg[fc.cur_block].push(inst::memory_op(Some(dest), IrType::Ptr, Opcode::MemMmioRead, &arg_vs));
        dest
      }
      _ => {
        let arg_vs: Vec<VReg> = operands.iter().map(|e| self.lower_expr(fc, e)).collect();
        let opcode = match subkind {
          MemorySubkind::Alloc => Opcode::MemAlloc,
          MemorySubkind::Dealloc => Opcode::MemDealloc,
          MemorySubkind::StackAlloc => Opcode::MemStackAlloc,
          MemorySubkind::StackFree => Opcode::MemStackFree,
          MemorySubkind::ArenaAlloc => Opcode::MemArenaAlloc,
          MemorySubkind::ArenaReset => Opcode::MemArenaReset,
          MemorySubkind::Prefetch => Opcode::MemPrefetch,
          MemorySubkind::PrefetchWrite => Opcode::MemPrefetchWrite,
          MemorySubkind::SlabAlloc | MemorySubkind::SlabFree | MemorySubkind::MmioMap
          | MemorySubkind::AlignUp | MemorySubkind::AlignDown | MemorySubkind::IsAligned => unreachable!("handled above"),
        };
        let produces_value = !matches!(subkind, MemorySubkind::Dealloc | MemorySubkind::StackFree
          | MemorySubkind::ArenaReset | MemorySubkind::Prefetch | MemorySubkind::PrefetchWrite);
        let dest = produces_value.then(|| fc.func.fresh_vreg(IrType::Ptr));
        fc.func.cfg[fc.cur_block].push(inst::memory_op(dest, IrType::Ptr, opcode, &arg_vs));
        dest.unwrap_or_else(|| fc.func.fresh_vreg(IrType::Ptr))
      }
    }
  }

  fn emit_align_up(&mut self, fc: &mut FuncCtx, v: VReg, a: VReg) -> VReg {
    let one = self.emit_int_const(fc, IrType::I64, 1);
    let a_minus_1 = fc.func.fresh_vreg(IrType::I64);
    fc.func.cfg[fc.cur_block].push(inst::binary(a_minus_1, IrType::I64, Opcode::Sub, a, one));
    let sum = fc.func.fresh_vreg(IrType::I64);
    fc.func.cfg[fc.cur_block].push(inst::binary(sum, IrType::I64, Opcode::Add, v, a_minus_1));
    let not_mask = fc.func.fresh_vreg(IrType::I64);
    fc.func.cfg[fc.cur_block].push(inst::unary(not_mask, IrType::I64, Opcode::Not, a_minus_1));
    let dest = fc.func.fresh_vreg(IrType::I64);
    fc.func.cfg[fc.cur_block].push(inst::binary(dest, IrType::I64, Opcode::And, sum, not_mask));
    dest
  }

  fn emit_align_down(&mut self, fc: &mut FuncCtx, v: VReg, a: VReg) -> VReg {
    let one = self.emit_int_const(fc, IrType::I64, 1);
    let a_minus_1 = fc.func.fresh_vreg(IrType::I64);
    fc.func.cfg[fc.cur_block].push(inst::binary(a_minus_1, IrType::I64, Opcode::Sub, a, one));
    let not_mask = fc.func.fresh_vreg(IrType::I64);
    fc.func.cfg[fc.cur_block].push(inst::unary(not_mask, IrType::I64, Opcode::Not, a_minus_1));
    let dest = fc.func.fresh_vreg(IrType::I64);
    fc.func.cfg[fc.cur_block].push(inst::binary(dest, IrType::I64, Opcode::And, v, not_mask));
    dest
  }

  fn lower_inline_asm(&mut self, fc: &mut FuncCtx, template: &str, operands: &[SExpr]) -> VReg {
    let arg_vs: Vec<VReg> = operands.iter().map(|e| self.lower_expr(fc, e)).collect();
    fc.func.cfg[fc.cur_block].push(inst::inline_asm(template.to_string(), &arg_vs));
    fc.func.fresh_vreg(IrType::I64)
  }
}

/// Recursively flatten a right-leaning chain of `Expr::Comma` nodes into a
/// flat operand list, in left-to-right order. A syscall's `fd $/ buf, len`
/// parses as `Binary(SyscallWrite-ish, fd, Comma(buf, len))`, i.e. the
/// comma only ever shows up nested in the rightmost operand.
fn flatten_commas(operands: &[SExpr]) -> Vec<SExpr> {
  let mut out = Vec::with_capacity(operands.len() + 1);
  for op in operands {
    flatten_one(op, &mut out);
  }
  out
}

fn flatten_one(expr: &SExpr, out: &mut Vec<SExpr>) {
  if let Expr::Comma { left, right } = &expr.k {
    flatten_one(left, out);
    flatten_one(right, out);
  } else {
    out.push(expr.clone());
  }
}

/// Whether `op` is one of the intrinsic-family unary operators (§4.5.2)
/// that lower to a call into `_fcx_intrinsic` rather than a dedicated
/// opcode. Returns the intrinsic's name (for documentation / future use by
/// the out-of-scope lowering stage that specializes the placeholder call).
fn intrinsic_name(op: OpName) -> Option<&'static str> {
  Some(match op {
    OpName::Popcount => "popcount",
    OpName::Clz => "clz",
    OpName::Ctz => "ctz",
    OpName::Byteswap => "byteswap",
    OpName::Sqrt => "sqrt",
    OpName::Rsqrt => "rsqrt",
    OpName::Floor => "floor",
    OpName::Ceil => "ceil",
    OpName::Trunc => "trunc",
    OpName::Round => "round",
    OpName::Abs => "abs",
    _ => return None,
  })
}

/// FNV-1a over `bytes` (§4.5.2): used to fold a slab's type identifier into
/// a constant operand at lowering time, rather than carrying the type name
/// itself into the IR.
fn fnv1a(bytes: &[u8]) -> u64 {
  const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
  const PRIME: u64 = 0x0000_0100_0000_01b3;
  let mut hash = OFFSET_BASIS;
  for &b in bytes {
    hash ^= u64::from(b);
    hash = hash.wrapping_mul(PRIME);
  }
  hash
}

fn is_comparison(op: OpName) -> bool {
  matches!(op, OpName::Eq | OpName::Ne | OpName::Lt | OpName::Le | OpName::Gt | OpName::Ge)
}

fn arith_opcode(op: OpName, ty: IrType) -> Opcode {
  match op {
    OpName::Add => Opcode::Add,
    OpName::Sub => Opcode::Sub,
    OpName::Mul => Opcode::Mul,
    OpName::Div => Opcode::Div,
    OpName::Mod => Opcode::Mod,
    OpName::BitAnd => Opcode::And,
    OpName::BitOr => Opcode::Or,
    OpName::BitXor => Opcode::Xor,
    OpName::Shl => Opcode::Shl,
    OpName::AShr => Opcode::AShr,
    OpName::LShr => Opcode::LShr,
    OpName::RotL => Opcode::RotL,
    OpName::RotR => Opcode::RotR,
    OpName::Eq => {
      if ty.is_float() { Opcode::FCmpEq } else { Opcode::ICmpEq }
    }
    OpName::Ne => if ty.is_float() { Opcode::FCmpNe } else { Opcode::ICmpNe },
    OpName::Lt => if ty.is_float() { Opcode::FCmpLt } else { Opcode::ICmpLt },
    OpName::Le => if ty.is_float() { Opcode::FCmpLe } else { Opcode::ICmpLe },
    OpName::Gt => if ty.is_float() { Opcode::FCmpGt } else { Opcode::ICmpGt },
    OpName::Ge => if ty.is_float() { Opcode::FCmpGe } else { Opcode::ICmpGe },
    other => unreachable!("{other:?} is not a binary arithmetic/bitwise/comparison operator"),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ast::{IntWidth, LoopHeader, Param, TypeKind};
  use crate::span::{FileSpan, Position, Spanned};

  fn spanned<T>(interner: &mut Interner, k: T) -> Spanned<T> {
    let file = interner.intern("t.fcx");
    Spanned::new(FileSpan::new(file, Position::default()), k)
  }

  #[test]
  fn empty_function_gets_an_implicit_return() {
    let mut interner = Interner::new();
    let mut dx = DiagnosticHandler::new(100);
    let file = interner.intern("t.fcx");
    let name = interner.intern("empty");
    let stmts = vec![spanned(&mut interner, Stmt::Function {
      name,
      params: Vec::<Param>::new(),
      ret_ty: None,
      body: Vec::new(),
    })];
    let gen = IrGen::new(None, file, &mut dx, &mut interner);
    let module = gen.generate(&stmts);
    let (_, f) = module.functions().next().unwrap();
    assert!(f.cfg.all_terminated());
    assert!(matches!(f.cfg[f.entry].terminator(), Some(Terminator::Return(None))));
  }

  #[test]
  fn flatten_commas_handles_nested_chain() {
    let mut interner = Interner::new();
    let a = spanned(&mut interner, Expr::Literal(LiteralValue::Int(vec![1])));
    let b = spanned(&mut interner, Expr::Literal(LiteralValue::Int(vec![2])));
    let c = spanned(&mut interner, Expr::Literal(LiteralValue::Int(vec![3])));
    let comma = spanned(&mut interner, Expr::Comma { left: Box::new(b), right: Box::new(c) });
    let flat = flatten_commas(&[a, comma]);
    assert_eq!(flat.len(), 3);
  }

  #[test]
  fn slab_alloc_hashes_its_type_operand() {
    let mut interner = Interner::new();
    let mut dx = DiagnosticHandler::new(100);
    let file = interner.intern("t.fcx");
    let name = interner.intern("f");
    let ty_name = interner.intern("Widget");
    let size = spanned(&mut interner, Expr::Literal(LiteralValue::Int(vec![8])));
    let ty_ident = spanned(&mut interner, Expr::Identifier(ty_name));
    let slab = spanned(&mut interner, Expr::MemoryOp {
      subkind: MemorySubkind::SlabAlloc,
      operands: vec![size, ty_ident],
    });
    let stmts = vec![spanned(&mut interner, Stmt::Function {
      name,
      params: Vec::<Param>::new(),
      ret_ty: None,
      body: vec![spanned(&mut interner, Stmt::Expr(slab))],
    })];
    let gen = IrGen::new(None, file, &mut dx, &mut interner);
    let module = gen.generate(&stmts);
    let (_, f) = module.functions().next().unwrap();
    let found = f.cfg.iter().flat_map(|(_, b)| &b.insts)
      .any(|i| i.opcode == Opcode::MemSlabAlloc
        && matches!(&i.imm, None)
        && i.args.len() == 2);
    assert!(found, "expected a mem.slab_alloc(size, hash) instruction");
  }

  #[test]
  fn if_else_generates_a_connected_cfg() {
    let mut interner = Interner::new();
    let mut dx = DiagnosticHandler::new(100);
    let file = interner.intern("t.fcx");
    let name = interner.intern("branchy");
    let cond = spanned(&mut interner, Expr::Literal(LiteralValue::Bool(true)));
    let then_body = Vec::new();
    let else_body = Vec::new();
    let stmts = vec![spanned(&mut interner, Stmt::Function {
      name,
      params: Vec::<Param>::new(),
      ret_ty: None,
      body: vec![spanned(&mut interner, Stmt::If { cond, then_body, else_body: Some(else_body) })],
    })];
    let gen = IrGen::new(None, file, &mut dx, &mut interner);
    let module = gen.generate(&stmts);
    let (_, f) = module.functions().next().unwrap();
    assert!(f.cfg.all_terminated());
    assert!(f.cfg.all_reachable_from(f.entry));
  }

  #[test]
  fn while_loop_lowers_its_condition_twice_and_stays_connected() {
    let mut interner = Interner::new();
    let mut dx = DiagnosticHandler::new(100);
    let file = interner.intern("t.fcx");
    let name = interner.intern("f");
    let i = interner.intern("i");
    let cond = spanned(&mut interner, Expr::Identifier(i));
    let body = vec![spanned(&mut interner, Stmt::Continue)];
    let stmts = vec![spanned(&mut interner, Stmt::Function {
      name,
      params: vec![Param { name: i, ty: TypeKind::Int { width: IntWidth::W64, signed: true } }],
      ret_ty: None,
      body: vec![spanned(&mut interner, Stmt::Loop {
        kind: LoopKind::While,
        header: LoopHeader::Condition(cond),
        body,
      })],
    })];
    let gen = IrGen::new(None, file, &mut dx, &mut interner);
    let module = gen.generate(&stmts);
    let (_, f) = module.functions().next().unwrap();
    assert!(!dx.has_errors());
    assert!(f.cfg.all_terminated());
    assert!(f.cfg.all_reachable_from(f.entry));
    // One `load` of `i` in the preheader, a second independent one in the
    // latch block that re-checks the condition — §4.5.3's "lowered twice".
    let load_count = f.cfg.iter().flat_map(|(_, b)| &b.insts).filter(|i| i.opcode == Opcode::LoadSlot).count();
    assert_eq!(load_count, 2);
  }

  #[test]
  fn write_syscall_with_trailing_len_materializes_its_number_as_a_const() {
    let mut interner = Interner::new();
    let mut dx = DiagnosticHandler::new(100);
    let file = interner.intern("t.fcx");
    let name = interner.intern("f");
    let fd = spanned(&mut interner, Expr::Literal(LiteralValue::Int(vec![1])));
    let buf = spanned(&mut interner, Expr::Literal(LiteralValue::Int(vec![0])));
    let len = spanned(&mut interner, Expr::Literal(LiteralValue::Int(vec![5])));
    let comma = spanned(&mut interner, Expr::Comma { left: Box::new(buf), right: Box::new(len) });
    let syscall = spanned(&mut interner, Expr::SyscallOp { subkind: SyscallSubkind::Write, operands: vec![fd, comma] });
    let stmts = vec![spanned(&mut interner, Stmt::Function {
      name,
      params: Vec::<Param>::new(),
      ret_ty: None,
      body: vec![spanned(&mut interner, Stmt::Expr(syscall))],
    })];
    let gen = IrGen::new(None, file, &mut dx, &mut interner);
    let module = gen.generate(&stmts);
    let (_, f) = module.functions().next().unwrap();
    let insts: Vec<_> = f.cfg.iter().flat_map(|(_, b)| &b.insts).collect();
    let call = insts.iter().find(|i| i.opcode == Opcode::SyscallWrite).expect("a sys.write instruction");
    assert_eq!(call.args.len(), 3, "fd, buffer, length");
    let number = call.syscall_number.expect("a number operand");
    let feeding_const = insts.iter().find(|i| i.dest == Some(number))
      .expect("a const feeding the number slot");
    assert!(matches!(feeding_const.opcode, Opcode::Const));
    assert!(matches!(&feeding_const.imm, Some(Immediate::Int(limbs)) if limbs == &[1]));
  }

  #[test]
  fn fnv1a_matches_known_vector() {
    assert_eq!(fnv1a(b""), 0xcbf2_9ce4_8422_2325);
    assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
  }

  #[test]
  fn big_integer_literal_types_by_limb_count() {
    assert_eq!(IrType::narrowest_for_limbs(1), IrType::I64);
    assert_eq!(IrType::narrowest_for_limbs(2), IrType::I128);
    assert_eq!(IrType::narrowest_for_limbs(4), IrType::I256);
    assert_eq!(IrType::narrowest_for_limbs(8), IrType::I512);
    assert_eq!(IrType::narrowest_for_limbs(9), IrType::I1024);
    assert_eq!(IrType::narrowest_for_limbs(16), IrType::I1024);
  }

  #[test]
  fn break_outside_a_loop_reports_a_diagnostic_instead_of_panicking() {
    let mut interner = Interner::new();
    let mut dx = DiagnosticHandler::new(100);
    let file = interner.intern("t.fcx");
    let name = interner.intern("f");
    let stmts = vec![spanned(&mut interner, Stmt::Function {
      name,
      params: Vec::<Param>::new(),
      ret_ty: None,
      body: vec![spanned(&mut interner, Stmt::Break)],
    })];
    let gen = IrGen::new(None, file, &mut dx, &mut interner);
    let _module = gen.generate(&stmts);
    assert!(dx.has_errors());
  }

  #[test]
  fn index_address_scales_by_the_default_element_size() {
    let mut interner = Interner::new();
    let mut dx = DiagnosticHandler::new(100);
    let file = interner.intern("t.fcx");
    let name = interner.intern("f");
    let arr = interner.intern("arr");
    let base = spanned(&mut interner, Expr::Identifier(arr));
    let idx = spanned(&mut interner, Expr::Literal(LiteralValue::Int(vec![3])));
    let index_expr = spanned(&mut interner, Expr::Index { base: Box::new(base), index: Box::new(idx) });
    let stmts = vec![spanned(&mut interner, Stmt::Function {
      name,
      params: vec![Param { name: arr, ty: TypeKind::Ptr(Box::new(TypeKind::Int { width: IntWidth::W64, signed: true })) }],
      ret_ty: None,
      body: vec![spanned(&mut interner, Stmt::Expr(index_expr))],
    })];
    let gen = IrGen::new(None, file, &mut dx, &mut interner);
    let module = gen.generate(&stmts);
    let (_, f) = module.functions().next().unwrap();
    let insts: Vec<_> = f.cfg.iter().flat_map(|(_, b)| &b.insts).collect();
    let has_mul_by_eight = insts.iter().any(|i| {
      i.opcode == Opcode::Mul && matches!(&i.imm, None)
    });
    let has_eight_const = insts.iter().any(|i| matches!(&i.imm, Some(Immediate::Int(limbs)) if limbs == &[8]));
    let has_ptr_add = insts.iter().any(|i| i.opcode == Opcode::PtrAdd);
    assert!(has_mul_by_eight && has_eight_const && has_ptr_add);
  }
}
