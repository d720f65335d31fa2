//! Forward-jump and forward-call patch chains.
//!
//! A [`Label`] that hasn't been defined yet remembers every site that
//! needs to jump (or call) to it by threading them together: each site
//! writes the *previous* chain head into its own 4-byte displacement
//! slot instead of a real displacement, and the label remembers the most
//! recently added site as its new head. When the label is finally
//! defined, [`Label::resolve`] walks the chain — reading each slot's old
//! "previous head" value back out before overwriting it with the real
//! relative displacement — until it reaches the `-1` sentinel. This is
//! `gjmp`/`glabel` from the reference source translated directly; no
//! separate side-table of pending fixups is needed because the pending
//! list lives inside the bytes that will eventually hold the real jump
//! targets anyway.

use crate::section::Section;

/// Sentinel value stored in a slot (or in [`Label::chain`]) denoting "no
/// more sites in this chain".
pub const NO_CHAIN: i64 = -1;

#[derive(Debug, Clone, Copy)]
pub struct Label {
    /// Head of the forward-reference chain, or [`NO_CHAIN`] if this label
    /// has no unresolved forward references (including the case where it
    /// is already defined and nothing ever referenced it before that).
    chain: i64,
    /// Set once `.text` offset is known.
    target: Option<u32>,
}

impl Label {
    pub fn new() -> Self {
        Label {
            chain: NO_CHAIN,
            target: None,
        }
    }

    pub fn is_defined(&self) -> bool {
        self.target.is_some()
    }

    pub fn target(&self) -> Option<u32> {
        self.target
    }

    pub fn chain(&self) -> i64 {
        self.chain
    }

    /// Reconstructs a `Label` from its two raw fields, used where the
    /// chain/target pair is stored inline on another struct (a function
    /// symbol's call-site patch chain) rather than as a standalone
    /// `Label` value.
    pub fn from_parts(chain: i64, target: Option<u32>) -> Self {
        Label { chain, target }
    }

    /// Reserves a 4-byte slot in `text` for a jump/call to this label and
    /// threads it onto the chain. If the label is already defined, the
    /// slot is immediately patched with the real displacement and the
    /// label is left untouched; otherwise the slot is made to carry the
    /// previous chain head and becomes the new head.
    pub fn reference(&mut self, text: &mut Section, slot_offset: u32) {
        match self.target {
            Some(target) => {
                let instr_end = slot_offset + 4;
                let disp = crate::codegen::x86_64::rel32(instr_end, target);
                text.patch_le32(slot_offset, disp);
            }
            None => {
                text.patch_le32(slot_offset, self.chain as i32);
                self.chain = slot_offset as i64;
            }
        }
    }

    /// Defines this label at `target` (an already-known `.text` offset),
    /// walking and patching every site on its forward-reference chain.
    /// Panics if the label is already defined — codegen call sites should
    /// never define the same label twice.
    pub fn define(&mut self, text: &mut Section, target: u32) {
        debug_assert!(!self.is_defined(), "label defined twice");
        let mut cursor = self.chain;
        while cursor != NO_CHAIN {
            let slot_offset = cursor as u32;
            let next = text.read_le32(slot_offset) as i64;
            let instr_end = slot_offset + 4;
            let disp = crate::codegen::x86_64::rel32(instr_end, target);
            text.patch_le32(slot_offset, disp);
            cursor = next;
        }
        self.chain = NO_CHAIN;
        self.target = Some(target);
    }
}

impl Default for Label {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::{Section, SectionKind};

    #[test]
    fn forward_reference_then_define_patches_all_sites() {
        let mut text = Section::from_parts(".text", SectionKind::Text);
        let mut label = Label::new();

        text.append(&[0xe9]);
        let slot1 = text.reserve(4);
        label.reference(&mut text, slot1);

        text.append(&[0x90]); // filler nop
        text.append(&[0xe9]);
        let slot2 = text.reserve(4);
        label.reference(&mut text, slot2);

        let target = text.len() as u32;
        label.define(&mut text, target);

        assert_eq!(text.read_le32(slot1), crate::codegen::x86_64::rel32(slot1 + 4, target));
        assert_eq!(text.read_le32(slot2), crate::codegen::x86_64::rel32(slot2 + 4, target));
        assert!(label.is_defined());
    }

    #[test]
    fn reference_after_define_resolves_immediately() {
        let mut text = Section::from_parts(".text", SectionKind::Text);
        let mut label = Label::new();
        label.define(&mut text, 0);

        text.append(&[0xe9]);
        let slot = text.reserve(4);
        label.reference(&mut text, slot);
        assert_eq!(text.read_le32(slot), crate::codegen::x86_64::rel32(slot + 4, 0));
    }
}
