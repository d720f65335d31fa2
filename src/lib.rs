//! `nanocc`: a compiler for a small subset of C that emits native
//! Windows PE32+ executables directly, without invoking an external
//! assembler or linker.
//!
//! The pipeline is four fused stages with no intermediate AST: a lexer
//! feeds tokens to a recursive-descent parser, which calls straight into
//! a value-stack-based x86-64 code generator as it recognizes each
//! production, and the resulting machine code is written into in-memory
//! sections that [`pe::write_image`] serializes as a PE32+ image.
//!
//! ```no_run
//! let source = b"int main() { return 42; }";
//! let sections = nanocc::compile("example.c", source).unwrap();
//! let image = nanocc::pe::write_image(&sections, None, &[]);
//! assert_eq!(&image[0..2], b"MZ");
//! ```

#![warn(missing_debug_implementations)]

mod codegen;
mod error;
mod label;
mod lexer;
pub mod pe;
mod reader;
mod registers;
mod section;
mod session;
mod symbol;
mod token;
mod types;
mod value;

mod parser;

pub use error::{Diagnostic, Diagnostics, Error, ErrorKind, Result};
pub use section::{Section, SectionKind, SectionTable};
pub use session::{compile, compile_program, LoopContext, Session};
pub use value::{GlobalFixup, GlobalSection};

/// Compiles `source` and writes a complete PE32+ image for it, using
/// `main`'s offset as the entry point when `main` was defined. Returns
/// the same error as [`compile`] on a compile failure; never fails on
/// the write side, since the writer has no I/O of its own (callers
/// decide how the bytes reach disk).
pub fn compile_to_image(file_name: &str, source: &[u8]) -> Result<Vec<u8>> {
    let (sections, entry, global_fixups) = compile_program(file_name, source)?;
    Ok(pe::write_image(&sections, entry, &global_fixups))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_empty_function_produces_no_errors() {
        let result = compile("t.c", b"int main() { return 0; }");
        assert!(result.is_ok());
    }

    #[test]
    fn compile_to_image_emits_pe_signature() {
        let image = compile_to_image("t.c", b"int main() { return 0; }").unwrap();
        assert_eq!(&image[0..2], b"MZ");
        assert_eq!(&image[0x80..0x84], b"PE\0\0");
    }

    #[test]
    fn syntax_error_is_reported_as_compile_error() {
        let result = compile("t.c", b"int main( { return 0; }");
        assert!(result.is_err());
    }
}
