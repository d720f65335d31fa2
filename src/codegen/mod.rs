//! Code generation over the value stack.
//!
//! `crate::parser` calls straight into these methods as it recognizes
//! each production — there is no intermediate AST. Every function here is
//! grounded in `gen.c`'s generic (target-independent) layer, which in
//! turn calls down into [`x86_64`] for the actual bytes.

pub mod x86_64;

use crate::label::Label;
use crate::registers::{Reg, RegClass, ALL_REGS};
use crate::session::Session;
use crate::symbol::Sym;
use crate::types::{self};
use crate::value::{GlobalFixup, GlobalSection, Location, SValue, ValueFlags};
use x86_64::Condition;

impl Session {
    /// Pushes an rvalue constant.
    pub fn push_const(&mut self, ty: u32, value: i64) {
        self.vstack.push_const(ty, value);
    }

    /// Pushes the lvalue of a local variable (a stack slot).
    pub fn push_local(&mut self, sym: &Sym) {
        self.vstack
            .push(SValue {
                ty: sym.ty,
                location: Location::Local(sym.offset as i32),
                flags: ValueFlags::LVAL,
                constant: 0,
                sym: None,
            })
            .expect("value stack overflow");
    }

    /// Pushes the lvalue of a global object: `.data`/`.bss` storage,
    /// addressed RIP-relative rather than through `rbp` like a stack
    /// local (spec §4.7 requires object symbols to push "at their storage
    /// location", not at whatever happens to be at the current frame's
    /// matching byte offset).
    pub fn push_global(&mut self, sym: &Sym, section: GlobalSection) {
        self.vstack
            .push(SValue {
                ty: sym.ty,
                location: Location::Global(section, sym.offset as i32),
                flags: ValueFlags::LVAL,
                constant: 0,
                sym: None,
            })
            .expect("value stack overflow");
    }

    /// Loads `size` bytes from an addressable (`Local`/`Global`) location
    /// into `dst`, recording a post-layout fixup if it's a global.
    fn load_from(&mut self, dst: Reg, loc: Location, size: u32, unsigned: bool) {
        match loc {
            Location::Local(disp) => {
                x86_64::load_local(&mut self.sections.text, dst, disp, size, unsigned);
            }
            Location::Global(section, offset) => {
                let slot =
                    x86_64::load_global_placeholder(&mut self.sections.text, dst, size, unsigned);
                self.global_fixups.push(GlobalFixup { text_slot: slot, section, offset });
            }
            _ => unreachable!("load_from only handles addressable locations"),
        }
    }

    /// Stores `src` into an addressable (`Local`/`Global`) location,
    /// recording a post-layout fixup if it's a global.
    fn store_to(&mut self, src: Reg, loc: Location, size: u32) {
        match loc {
            Location::Local(disp) => {
                x86_64::store_local(&mut self.sections.text, src, disp, size);
            }
            Location::Global(section, offset) => {
                let slot = x86_64::store_global_placeholder(&mut self.sections.text, src, size);
                self.global_fixups.push(GlobalFixup { text_slot: slot, section, offset });
            }
            _ => unreachable!("store_to only handles addressable locations"),
        }
    }

    /// Pushes a reference to a (possibly still-undefined) function
    /// symbol, for use as a call target.
    pub fn push_function(&mut self, sym_index: usize, ty: u32) {
        self.vstack
            .push(SValue {
                ty,
                location: Location::Const,
                flags: ValueFlags::SYM,
                constant: 0,
                sym: Some(sym_index),
            })
            .expect("value stack overflow");
    }

    /// Spills whichever value-stack entry currently owns `reg` (other
    /// than the entry at `protect`, if any) to a freshly allocated local
    /// slot, matching `save_reg`. Called before an operation is about to
    /// clobber `reg` so a live value isn't silently destroyed.
    pub fn save_reg(&mut self, reg: Reg, protect: Option<usize>) {
        let owner = self.reg_owner[reg.index()];
        let owner = match owner {
            Some(i) if Some(i) != protect => i,
            _ => return,
        };
        let value = *self.vstack_get(owner);
        let size = types::size_of(value.ty).max(8);
        let offset = self.alloc_local(size);
        x86_64::store_local(&mut self.sections.text, reg, offset, size.min(8));
        let slot = self.vstack_get_mut(owner);
        slot.location = Location::Local(offset);
        slot.flags.remove(ValueFlags::LVAL);
        self.reg_owner[reg.index()] = None;
    }

    fn vstack_get(&self, index: usize) -> &SValue {
        self.vstack.as_slice().get(index).expect("vstack index out of range")
    }
    fn vstack_get_mut(&mut self, index: usize) -> &mut SValue {
        self.vstack.as_mut_slice().get_mut(index).expect("vstack index out of range")
    }

    /// Picks a free register of class `rc`, spilling the least-recently
    /// assigned occupant if none is free. Mirrors `gv`'s allocation
    /// fallback: prefer an empty register in the requested class, else
    /// evict whichever one already-assigned register it can.
    fn pick_register(&mut self, rc: RegClass, protect: Option<usize>) -> Reg {
        for reg in ALL_REGS {
            if rc.contains_reg(reg) && self.reg_owner[reg.index()].is_none() {
                return reg;
            }
        }
        let reg = ALL_REGS.into_iter().find(|r| rc.contains_reg(*r)).unwrap();
        self.save_reg(reg, protect);
        reg
    }

    /// Forces the top-of-stack value into a register from class `rc`,
    /// returning which one, and updates the value stack entry in place.
    /// Mirrors `gv`: constants are loaded, lvalues are read, pending
    /// comparison flags are materialized via `setcc`, and values already
    /// sitting in a register of the right class are left alone.
    pub fn gv(&mut self, rc: RegClass) -> Reg {
        let index = self.vstack.len() - 1;
        self.gv_at(index, rc)
    }

    /// As [`Session::gv`], but materializes the value at an arbitrary
    /// stack depth rather than only the top. Used by [`Session::call`] to
    /// force each argument into a register without disturbing the
    /// relative order of the others.
    fn gv_at(&mut self, index: usize, rc: RegClass) -> Reg {
        let value = *self.vstack_get(index);

        if let Location::Register(r) = value.location {
            if !value.is_lvalue() && rc.contains_reg(r) {
                return r;
            }
        }

        let reg = self.pick_register(rc, Some(index));
        match value.location {
            Location::Const if !value.flags.contains(ValueFlags::SYM) => {
                x86_64::mov_imm(&mut self.sections.text, reg, value.constant);
            }
            Location::Const => {
                // Symbol reference: materialize its (possibly still
                // unresolved) address. Functions used as data pointers
                // are out of this core's scope; this path only feeds
                // `call`, which reads `sym` directly rather than forcing
                // the address into a register first.
                x86_64::mov_imm(&mut self.sections.text, reg, 0);
            }
            Location::Register(r) => {
                // lvalue held in a register names an address held there
                // (VT_LLOCAL in the original); not produced by this
                // core's parser, kept only so the match is exhaustive.
                x86_64::mov_rr(&mut self.sections.text, reg, r);
            }
            Location::Local(disp) => {
                if value.is_lvalue() {
                    let size = types::size_of(value.ty).max(4);
                    let unsigned = (value.ty & types::UNSIGNED) != 0;
                    x86_64::load_local(&mut self.sections.text, reg, disp, size, unsigned);
                } else {
                    x86_64::lea_local(&mut self.sections.text, reg, disp);
                }
            }
            Location::Global(section, offset) => {
                if value.is_lvalue() {
                    let size = types::size_of(value.ty).max(4);
                    let unsigned = (value.ty & types::UNSIGNED) != 0;
                    self.load_from(reg, Location::Global(section, offset), size, unsigned);
                } else {
                    let slot = x86_64::lea_global_placeholder(&mut self.sections.text, reg);
                    self.global_fixups.push(GlobalFixup { text_slot: slot, section, offset });
                }
            }
            Location::Flags(cond) => {
                x86_64::setcc(&mut self.sections.text, cond, reg);
            }
            Location::Jump | Location::JumpInverted => {
                // Short-circuit boolean result: both chains already
                // target fixed fall-through points set up by the parser
                // before calling `gv`; materializing here only needs to
                // leave 0/1 in `reg`, which the parser arranges by
                // emitting the load sequence itself around the jumps.
                x86_64::mov_imm(&mut self.sections.text, reg, value.constant);
            }
        }

        self.reg_owner[reg.index()] = Some(index);
        let slot = self.vstack_get_mut(index);
        slot.location = Location::Register(reg);
        slot.flags.remove(ValueFlags::LVAL);
        reg
    }

    /// Forces the left operand into `rax` and the right operand into
    /// `rcx`, returning `(lhs, rhs)` in that order so callers can emit
    /// `op lhs, rhs` directly. Mirrors `gv2`'s fixed-pair quirk (ignoring
    /// the register classes its caller would otherwise pick), but reads
    /// back the register each value actually landed in rather than
    /// assuming stack positions.
    pub fn gv2(&mut self) -> (Reg, Reg) {
        self.gv(RegClass::RCX);
        self.vstack.swap().expect("gv2 needs two operands");
        let rax = self.gv(RegClass::RAX);
        self.vstack.swap().expect("gv2 needs two operands");
        let rcx_index = self.vstack.len() - 1;
        let rcx = match self.vstack_get(rcx_index).location {
            Location::Register(r) => r,
            _ => unreachable!("gv just forced this operand into rcx"),
        };
        (rax, rcx)
    }

    /// Applies a binary arithmetic/comparison operator to the top two
    /// stack values, replacing them with the result. `op` is one of the
    /// single-byte punctuators or the comparison `TokenKind`s the parser
    /// recognizes; see `crate::parser` for the call sites.
    pub fn gen_op_arith(&mut self, op: BinOp) {
        // Usual arithmetic conversions are not modeled (see Non-goals);
        // the result simply keeps the right-hand operand's type, matching
        // `gen_opi`'s lack of promotion logic.
        let result_ty = self.vstack.top().unwrap().ty;
        let (lhs, rhs) = self.gv2();

        use x86_64 as enc;
        match op {
            BinOp::Add => enc::add_rr(&mut self.sections.text, lhs, rhs),
            BinOp::Sub => enc::sub_rr(&mut self.sections.text, lhs, rhs),
            BinOp::And => enc::and_rr(&mut self.sections.text, lhs, rhs),
            BinOp::Or => enc::or_rr(&mut self.sections.text, lhs, rhs),
            BinOp::Xor => enc::xor_rr(&mut self.sections.text, lhs, rhs),
            BinOp::Mul => {
                // imul forces both operands through rax, matching the
                // original's "move result out to rax regardless of which
                // register gv2 happened to choose" behavior.
                enc::mov_rr(&mut self.sections.text, Reg::Rax, lhs);
                enc::imul_rr(&mut self.sections.text, Reg::Rax, rhs);
                self.finish_binop(Reg::Rax, result_ty);
                return;
            }
            BinOp::Div | BinOp::Mod => {
                let unsigned = types::is_integer(result_ty) && (result_ty & types::UNSIGNED) != 0;
                // idiv's divisor can't be rdx; if gv2 put it there, shuttle
                // it through rcx first, exactly as gen_opi does.
                let divisor = if rhs == Reg::Rdx {
                    enc::mov_rr(&mut self.sections.text, Reg::Rcx, rhs);
                    Reg::Rcx
                } else {
                    rhs
                };
                enc::mov_rr(&mut self.sections.text, Reg::Rax, lhs);
                if unsigned {
                    enc::xor_rr(&mut self.sections.text, Reg::Rdx, Reg::Rdx);
                } else {
                    enc::cqo(&mut self.sections.text);
                }
                enc::idiv_r(&mut self.sections.text, divisor);
                let result_reg = if matches!(op, BinOp::Div) { Reg::Rax } else { Reg::Rdx };
                self.finish_binop(result_reg, result_ty);
                return;
            }
            BinOp::Shl => {
                enc::mov_rr(&mut self.sections.text, Reg::Rcx, rhs);
                enc::shl_cl(&mut self.sections.text, lhs);
            }
            BinOp::Shr => {
                let unsigned = (result_ty & types::UNSIGNED) != 0;
                enc::mov_rr(&mut self.sections.text, Reg::Rcx, rhs);
                enc::shift_cl(&mut self.sections.text, lhs, unsigned);
            }
            BinOp::Cmp(cond) => {
                enc::cmp_rr(&mut self.sections.text, lhs, rhs);
                self.reg_owner[lhs.index()] = None;
                self.reg_owner[rhs.index()] = None;
                self.vstack.pop().unwrap();
                self.vstack.pop().unwrap();
                self.vstack
                    .push(SValue {
                        ty: types::INT,
                        location: Location::Flags(cond),
                        flags: ValueFlags::empty(),
                        constant: 0,
                        sym: None,
                    })
                    .expect("value stack overflow");
                return;
            }
        }
        self.finish_binop(lhs, result_ty);
    }

    fn finish_binop(&mut self, result_reg: Reg, result_ty: u32) {
        let rhs_index = self.vstack.len() - 1;
        let lhs_index = self.vstack.len() - 2;
        self.reg_owner[result_reg.index()] = Some(lhs_index);
        // The other operand's register, if different, is now free.
        for reg in ALL_REGS {
            if self.reg_owner[reg.index()] == Some(rhs_index) {
                self.reg_owner[reg.index()] = None;
            }
        }
        self.vstack.pop().unwrap();
        let slot = self.vstack.top_mut().unwrap();
        slot.ty = result_ty;
        slot.location = Location::Register(result_reg);
        slot.flags = ValueFlags::empty();
        let _ = lhs_index;
    }

    /// `~x` / `!x` / unary `-x`.
    pub fn gen_unary(&mut self, op: UnaryOp) {
        use x86_64 as enc;
        match op {
            UnaryOp::Neg => {
                let reg = self.gv(RegClass::INT);
                enc::neg_r(&mut self.sections.text, reg);
            }
            UnaryOp::Not => {
                let reg = self.gv(RegClass::INT);
                enc::not_r(&mut self.sections.text, reg);
            }
            UnaryOp::LogicalNot => {
                let reg = self.gv(RegClass::INT);
                enc::test_rr(&mut self.sections.text, reg, reg);
                self.reg_owner[reg.index()] = None;
                let slot = self.vstack.top_mut().unwrap();
                slot.ty = types::INT;
                slot.location = Location::Flags(Condition::Eq);
                slot.flags = ValueFlags::empty();
            }
        }
    }

    /// Casts the top value to `ty`. Integer-to-integer conversions are
    /// modeled by re-reading the value at its new width the next time it
    /// is loaded (the value stack just records the new type here, matching
    /// `gen_cast`'s "same-size or widening integer cast is a no-op at the
    /// bit level" fast path); floating-point casts are out of scope.
    pub fn gen_cast(&mut self, ty: u32) {
        let slot = self.vstack.top_mut().unwrap();
        slot.ty = ty;
    }

    /// Reads, increments/decrements, and stores back the lvalue at the
    /// top of the stack, replacing it with either the old value
    /// (`postfix`) or the new one. Unlike the reference parser (which
    /// degrades both forms to a bare `+`/`-` with no store at all — see
    /// the crate's design notes), this performs the real
    /// read-modify-write C semantics.
    pub fn inc_dec(&mut self, is_inc: bool, postfix: bool) {
        let index = self.vstack.len() - 1;
        let value = *self.vstack_get(index);
        let loc = match value.location {
            Location::Local(_) | Location::Global(..) if value.is_lvalue() => value.location,
            _ => {
                self.diagnostics.error("increment/decrement of a non-lvalue");
                return;
            }
        };
        let size = types::size_of(value.ty).max(4);
        let unsigned = (value.ty & types::UNSIGNED) != 0;

        let old_reg = self.pick_register(RegClass::INT, Some(index));
        self.load_from(old_reg, loc, size, unsigned);

        let result_reg = if postfix {
            self.reg_owner[old_reg.index()] = Some(index);
            let r = self.pick_register(RegClass::INT, Some(index));
            x86_64::mov_rr(&mut self.sections.text, r, old_reg);
            r
        } else {
            old_reg
        };
        if is_inc {
            x86_64::inc_r(&mut self.sections.text, result_reg);
        } else {
            x86_64::dec_r(&mut self.sections.text, result_reg);
        }
        self.store_to(result_reg, loc, size);

        if result_reg != old_reg {
            self.reg_owner[result_reg.index()] = None;
        }
        self.reg_owner[old_reg.index()] = Some(index);
        let slot = self.vstack_get_mut(index);
        *slot = SValue {
            ty: value.ty,
            location: Location::Register(old_reg),
            flags: ValueFlags::empty(),
            constant: 0,
            sym: None,
        };
    }

    /// Assigns the top (rvalue) into the value beneath it (an lvalue),
    /// leaving the stored value as the expression's result, matching C's
    /// assignment-expression semantics and the original's `=` handling in
    /// `gen_op`.
    pub fn gen_assign(&mut self) {
        let rhs_reg = self.gv(RegClass::INT);
        let lhs_index = self.vstack.len() - 2;
        let lhs = *self.vstack_get(lhs_index);
        match lhs.location {
            Location::Local(_) | Location::Global(..) if lhs.is_lvalue() => {
                let size = types::size_of(lhs.ty).max(4);
                self.store_to(rhs_reg, lhs.location, size);
            }
            _ => {
                self.diagnostics.error("assignment to non-lvalue");
            }
        }
        self.reg_owner[rhs_reg.index()] = Some(lhs_index);
        let rhs_value = self.vstack.pop().unwrap();
        let slot = self.vstack.top_mut().unwrap();
        *slot = SValue {
            ty: lhs.ty,
            location: Location::Register(rhs_reg),
            flags: ValueFlags::empty(),
            constant: 0,
            sym: None,
        };
        let _ = rhs_value;
    }

    // --- control flow -------------------------------------------------

    /// Pops the top value (its truth value) and emits a conditional jump
    /// to `label`'s eventual definition: jumps when the value is false if
    /// `on_false`, otherwise jumps when true. Matches `gtst`.
    pub fn test_and_jump(&mut self, label: &mut Label, on_false: bool) {
        let value = self.vstack.pop().unwrap();
        let cond = match value.location {
            Location::Flags(c) => c,
            _ => {
                // Force to a register and compare against zero.
                self.vstack.push(value).unwrap();
                let reg = self.gv(RegClass::INT);
                x86_64::test_rr(&mut self.sections.text, reg, reg);
                self.reg_owner[reg.index()] = None;
                self.vstack.pop().unwrap();
                Condition::Ne
            }
        };
        let cond = if on_false { cond.invert() } else { cond };
        let slot = x86_64::jcc_rel32_placeholder(&mut self.sections.text, cond);
        label.reference(&mut self.sections.text, slot);
    }

    /// Unconditional jump to `label`.
    pub fn jump(&mut self, label: &mut Label) {
        let slot = x86_64::jmp_rel32_placeholder(&mut self.sections.text);
        label.reference(&mut self.sections.text, slot);
    }

    /// Defines `label` at the current end of `.text`.
    pub fn define_label(&mut self, label: &mut Label) {
        let target = self.sections.text.len() as u32;
        label.define(&mut self.sections.text, target);
    }

    pub fn text_offset(&self) -> u32 {
        self.sections.text.len() as u32
    }

    // --- function prologue / epilogue / calls --------------------------

    /// Emits the fixed prologue this core always generates: save the
    /// caller's frame pointer, establish a new one, reserve a fixed
    /// 96-byte frame, and spill the first `param_count` integer
    /// arguments into their shadow-space slots. Matches `gfunc_prolog`.
    pub fn function_prologue(&mut self, param_count: usize) {
        x86_64::push_rbp(&mut self.sections.text);
        x86_64::mov_rbp_rsp(&mut self.sections.text);
        x86_64::sub_rsp_imm8(&mut self.sections.text, 0x60);
        x86_64::spill_shadow_args(&mut self.sections.text, param_count);
        self.local_offset = 0;
        self.reg_owner = [None; crate::registers::NUM_REGS];
    }

    /// Emits the fixed epilogue: restore `rsp`/`rbp`, return. Matches
    /// `gfunc_epilog`.
    pub fn function_epilogue(&mut self) {
        x86_64::mov_rsp_rbp(&mut self.sections.text);
        x86_64::pop_rbp(&mut self.sections.text);
        x86_64::ret(&mut self.sections.text);
    }

    /// Forces the top value into `rax` ahead of a `return`, matching the
    /// Windows x64 integer return-value convention.
    pub fn gen_return_value(&mut self) {
        let reg = self.gv(RegClass::RAX);
        if reg != Reg::Rax {
            x86_64::mov_rr(&mut self.sections.text, Reg::Rax, reg);
        }
        self.vstack.pop().unwrap();
    }

    /// Emits a call to `sym_index` with `arg_count` already-pushed
    /// argument values on the value stack (in left-to-right source
    /// order), then replaces them with the call's result in `rax`.
    /// Matches `gfunc_call`'s reverse-order argument handling, fixed
    /// (per the crate's design notes) to resolve direct calls to
    /// not-yet-defined functions through the same patch-chain mechanism
    /// as forward jumps instead of emitting a bogus zero displacement.
    pub fn call(&mut self, target: &mut dyn FnMut(&mut Self) -> CallTarget, arg_count: usize) {
        // Materialize arguments right-to-left (matching the reference
        // source's loop direction, which evaluates push/register moves
        // from the last argument back to the first so that stack-passed
        // arguments land in the correct order).
        let base = self.vstack.len() - arg_count;
        for i in (0..arg_count).rev() {
            let idx = base + i;
            self.force_index_to_int_reg(idx);
            let reg = match self.vstack_get(idx).location {
                Location::Register(r) => r,
                _ => unreachable!("just materialized"),
            };
            if i < 4 {
                x86_64::mov_to_arg_reg(&mut self.sections.text, i, reg);
            } else {
                x86_64::push_r(&mut self.sections.text, reg);
            }
            self.reg_owner[reg.index()] = None;
        }
        for _ in 0..arg_count {
            self.vstack.pop().unwrap();
        }
        self.reg_owner = [None; crate::registers::NUM_REGS];

        match target(self) {
            CallTarget::Direct(sym_index) => {
                let slot = x86_64::call_rel32_placeholder(&mut self.sections.text);
                // Borrow the symbol back out of whichever stack owns it;
                // the caller is responsible for passing an index valid in
                // `global_stack` (functions are always file-scope in this
                // core — see Non-goals on nested functions).
                self.global_stack.get_mut(sym_index).reference_call(
                    &mut self.sections.text,
                    slot,
                );
            }
            CallTarget::Indirect(reg) => {
                x86_64::call_indirect(&mut self.sections.text, reg);
            }
        }

        self.vstack
            .push(SValue {
                ty: types::INT,
                location: Location::Register(Reg::Rax),
                flags: ValueFlags::empty(),
                constant: 0,
                sym: None,
            })
            .expect("value stack overflow");
        let idx = self.vstack.len() - 1;
        self.reg_owner[Reg::Rax.index()] = Some(idx);
    }

    fn force_index_to_int_reg(&mut self, index: usize) {
        self.gv_at(index, RegClass::INT);
    }
}

/// Where a [`Session::call`] should dispatch to, decided by the caller
/// after argument materialization (so that, e.g., a not-yet-declared
/// identifier can still be treated as an implicit function declaration
/// at the point of the call, matching `unary`'s primary-expression
/// handling in the reference parser).
pub enum CallTarget {
    Direct(usize),
    Indirect(Reg),
}

/// Binary arithmetic/bitwise/shift/comparison operators recognized by
/// [`Session::gen_op_arith`].
#[derive(Debug, Clone, Copy)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Cmp(Condition),
}

#[derive(Debug, Clone, Copy)]
pub enum UnaryOp {
    Neg,
    Not,
    LogicalNot,
}
