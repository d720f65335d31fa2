//! Output sections: append-only, doubling-growth byte buffers.
//!
//! Mirrors `section.c`: `new_section` starts a section at a small initial
//! capacity, `section_realloc` doubles it whenever a write would overrun,
//! and `section_ptr_add` hands back an offset the emitter can patch bytes
//! at directly (used for the label patch-chain slots in
//! `crate::codegen`).

/// Internal bookkeeping only, kept for parity with the original's ELF-
/// flavored section flags; this core's own PE writer has its own
/// characteristics table (`crate::pe`) and never reads these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Text,
    Data,
    Bss,
    Rdata,
}

const INITIAL_CAPACITY: usize = 256;

/// A single growable output section.
#[derive(Debug)]
pub struct Section {
    pub name: &'static str,
    pub kind: SectionKind,
    data: Vec<u8>,
    /// For `.bss`, which never materializes a byte buffer, this is the
    /// reserved-but-unwritten size.
    pub virtual_size: u32,
}

impl Section {
    fn new(name: &'static str, kind: SectionKind) -> Self {
        Section {
            name,
            kind,
            data: Vec::with_capacity(INITIAL_CAPACITY),
            virtual_size: 0,
        }
    }

    /// Constructs a standalone section outside a [`SectionTable`], used by
    /// the x86-64 encoder's unit tests to exercise emission in isolation.
    pub(crate) fn from_parts(name: &'static str, kind: SectionKind) -> Self {
        Self::new(name, kind)
    }

    pub fn len(&self) -> usize {
        if self.kind == SectionKind::Bss {
            self.virtual_size as usize
        } else {
            self.data.len()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Appends `bytes`, returning the offset they were written at.
    pub fn append(&mut self, bytes: &[u8]) -> u32 {
        let offset = self.data.len() as u32;
        self.data.extend_from_slice(bytes);
        offset
    }

    /// Reserves `count` uninitialized bytes, returning the offset they
    /// start at; used by the emitter to grab a slot it will patch
    /// in-place afterwards (e.g. a forward jump's displacement).
    pub fn reserve(&mut self, count: usize) -> u32 {
        let offset = self.data.len() as u32;
        self.data.resize(self.data.len() + count, 0);
        offset
    }

    /// Grows `.bss`'s virtual size by `count` bytes, returning the offset
    /// it starts at. `.bss` never holds real bytes on disk.
    pub fn reserve_bss(&mut self, count: u32) -> u32 {
        let offset = self.virtual_size;
        self.virtual_size += count;
        offset
    }

    /// Overwrites 4 bytes at `offset` with `value`'s little-endian
    /// encoding, used to patch a previously reserved displacement slot.
    pub fn patch_le32(&mut self, offset: u32, value: i32) {
        let bytes = value.to_le_bytes();
        let o = offset as usize;
        self.data[o..o + 4].copy_from_slice(&bytes);
    }

    /// Reads a previously written 4-byte little-endian slot, used to
    /// follow a patch chain's embedded `next` links.
    pub fn read_le32(&self, offset: u32) -> i32 {
        let o = offset as usize;
        let mut b = [0u8; 4];
        b.copy_from_slice(&self.data[o..o + 4]);
        i32::from_le_bytes(b)
    }
}

/// The four well-known output sections, created eagerly at session start
/// (matching `gen_init`), plus `.rdata` which is created lazily on first
/// use (the original only allocates a read-only data section when string
/// literals actually appear).
#[derive(Debug)]
pub struct SectionTable {
    pub text: Section,
    pub data: Section,
    pub bss: Section,
    rdata: Option<Section>,
}

impl SectionTable {
    pub fn new() -> Self {
        SectionTable {
            text: Section::new(".text", SectionKind::Text),
            data: Section::new(".data", SectionKind::Data),
            bss: Section::new(".bss", SectionKind::Bss),
            rdata: None,
        }
    }

    /// Returns the `.rdata` section, creating it on first use.
    pub fn rdata(&mut self) -> &mut Section {
        self.rdata
            .get_or_insert_with(|| Section::new(".rdata", SectionKind::Rdata))
    }

    /// Returns `.rdata` if it has been created, without creating it.
    pub fn rdata_if_present(&self) -> Option<&Section> {
        self.rdata.as_ref()
    }
}

impl Default for SectionTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_returns_offset() {
        let mut s = Section::new(".text", SectionKind::Text);
        let o1 = s.append(&[1, 2, 3]);
        let o2 = s.append(&[4]);
        assert_eq!(o1, 0);
        assert_eq!(o2, 3);
        assert_eq!(s.bytes(), &[1, 2, 3, 4]);
    }

    #[test]
    fn patch_and_read_le32_roundtrip() {
        let mut s = Section::new(".text", SectionKind::Text);
        s.reserve(4);
        s.patch_le32(0, -17);
        assert_eq!(s.read_le32(0), -17);
    }

    #[test]
    fn rdata_created_lazily() {
        let mut t = SectionTable::new();
        assert!(t.rdata_if_present().is_none());
        t.rdata().append(b"hi");
        assert!(t.rdata_if_present().is_some());
    }

    #[test]
    fn bss_tracks_virtual_size_only() {
        let mut t = SectionTable::new();
        let o1 = t.bss.reserve_bss(8);
        let o2 = t.bss.reserve_bss(4);
        assert_eq!(o1, 0);
        assert_eq!(o2, 8);
        assert_eq!(t.bss.len(), 12);
        assert!(t.bss.bytes().is_empty());
    }
}
