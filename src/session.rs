//! The compilation session: the aggregate root tying every collaborator
//! together, mirroring the original's `TCCState`.

use crate::error::{Diagnostics, Error, Result};
use crate::label::Label;
use crate::lexer::Lexer;
use crate::reader::ByteReader;
use crate::registers::Reg;
use crate::section::SectionTable;
use crate::symbol::SymStack;
use crate::token::Token;
use crate::value::{GlobalFixup, VStack};

/// Control-flow context for a `while`/`for`/`do` loop currently being
/// generated, giving `break`/`continue` somewhere to jump to — the gap
/// the reference parser left open (it parses both keywords but never
/// wires them to anything, see the crate-level design notes).
pub struct LoopContext {
    pub break_label: Label,
    pub continue_label: Label,
}

/// Owns every piece of compiler state for a single compilation: symbol
/// tables, output sections, the value stack, the diagnostics sink, and
/// the handful of codegen-local registers this core tracks directly
/// (which of the three allocatable registers currently holds which
/// value-stack entry).
pub struct Session {
    pub global_stack: SymStack,
    pub local_stack: SymStack,
    /// Present for parity with the original's symbol-stack quartet; the
    /// core never expands macros, so nothing is ever pushed here.
    pub define_stack: SymStack,
    /// Present for parity; anonymous control-flow labels are tracked
    /// directly via [`LoopContext`]/[`Label`] rather than through a named
    /// symbol stack, since they have no identifier to hash.
    pub label_stack: SymStack,

    pub sections: SectionTable,
    pub vstack: VStack,
    pub diagnostics: Diagnostics,

    /// `> 0` while inside a block scope; routes new declarations to
    /// `local_stack` instead of `global_stack`.
    pub local_scope: u32,
    /// Next free byte below `rbp` for a local declared in the function
    /// currently being generated. Reset to 0 (nothing allocated yet) at
    /// each function's prologue.
    pub local_offset: i32,
    /// Which value-stack index (if any) currently owns each of the three
    /// allocatable registers, indexed by [`Reg::index`].
    pub(crate) reg_owner: [Option<usize>; crate::registers::NUM_REGS],

    pub(crate) loops: Vec<LoopContext>,

    /// Pending `[rip + disp32]` patches for global-object references,
    /// applied by `crate::pe::write_image` once section virtual addresses
    /// are final.
    pub(crate) global_fixups: Vec<GlobalFixup>,

    pub(crate) source_name: String,
    pub(crate) token: Token,
}

impl Session {
    pub fn new(source_name: &str) -> Self {
        Session {
            global_stack: SymStack::new(),
            local_stack: SymStack::new(),
            define_stack: SymStack::new(),
            label_stack: SymStack::new(),
            sections: SectionTable::new(),
            vstack: VStack::new(),
            diagnostics: Diagnostics::new(),
            local_scope: 0,
            local_offset: 0,
            reg_owner: [None; crate::registers::NUM_REGS],
            loops: Vec::new(),
            global_fixups: Vec::new(),
            source_name: source_name.to_string(),
            token: Token::new(crate::token::TokenKind::Eof, 1),
        }
    }

    pub fn reg_index_owner(&self, reg: Reg) -> Option<usize> {
        self.reg_owner[reg.index()]
    }

    pub fn set_reg_owner(&mut self, reg: Reg, owner: Option<usize>) {
        self.reg_owner[reg.index()] = owner;
    }

    /// Allocates `size` bytes (rounded up to 8-byte alignment, matching
    /// the original's uniform slot width) of new local storage in the
    /// function currently being generated, growing downward from `rbp`,
    /// and returns the `rbp`-relative offset of the slot's start.
    pub fn alloc_local(&mut self, size: u32) -> i32 {
        let aligned = ((size as i32) + 7) & !7;
        self.local_offset -= aligned.max(8);
        self.local_offset
    }
}

/// Compiles the C source in `source` (named `file_name` for diagnostics),
/// returning the populated [`SectionTable`] on success. Fails iff the
/// diagnostics sink recorded at least one error, matching the original's
/// "`tcc_compile` returns -1 iff `nb_errors > 0`" contract.
pub fn compile(file_name: &str, source: &[u8]) -> Result<SectionTable> {
    compile_program(file_name, source).map(|(sections, _entry, _fixups)| sections)
}

/// Like [`compile`], but also returns `main`'s `.text` offset (if a
/// `main` function was defined) and the deferred global-address fixups,
/// so a caller building a PE image (see [`crate::pe::write_image`]) can
/// set the real entry point and patch global references instead of
/// falling back to the start of `.text`.
pub fn compile_program(
    file_name: &str,
    source: &[u8],
) -> Result<(SectionTable, Option<u32>, Vec<GlobalFixup>)> {
    let mut session = Session::new(file_name);
    session.diagnostics.set_location(file_name, 1);
    log::debug!("compiling {}", file_name);

    let reader = ByteReader::new(source);
    let mut lexer = Lexer::new(reader);
    session.token = lexer.next_token();

    crate::parser::parse_translation_unit(&mut session, &mut lexer);

    if session.diagnostics.error_count() > 0 {
        return Err(Error::compile(
            session.diagnostics.error_count(),
            session.diagnostics.warning_count(),
        ));
    }

    let entry = session
        .global_stack
        .find("main")
        .filter(|sym| sym.defined)
        .map(|sym| sym.offset as u32);

    Ok((session.sections, entry, session.global_fixups))
}
