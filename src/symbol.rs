//! Symbol table: a hashed, scope-stacked symbol store.
//!
//! Mirrors `sym.c`: symbols are chained into power-of-two hash buckets by
//! name for `find`, and simultaneously threaded onto a flat scope stack so
//! that [`SymStack::pop_to`] can peel a block's declarations off in O(k)
//! for k declarations in that block, restoring each popped symbol's bucket
//! head to what it was before the symbol was pushed (this is what makes
//! shadowing work: a block-local `x` hides an outer `x` in the hash chain
//! while the block is open, and the outer `x` reappears the instant the
//! inner one is popped).

const HASH_SIZE: usize = 8192;

/// A declared name: variable, function, or (future) typedef.
#[derive(Debug, Clone)]
pub struct Sym {
    pub name: String,
    pub ty: u32,
    /// Storage location: for locals, the byte offset from `rbp` (negative);
    /// for functions/globals, `-1` until defined, then the `.text`/`.data`
    /// offset of the definition. Mirrors `Sym.c` (the original's
    /// `constant_or_offset` field name was shortened for clarity).
    pub offset: i64,
    /// Chain of call sites / forward references awaiting this symbol's
    /// definition, reusing the label patch-chain representation described
    /// in `crate::codegen`. `-1` means the chain is empty.
    pub patch_chain: i64,
    pub defined: bool,
    /// `Some` iff this symbol is a global object (not a local, not a
    /// function): which section `offset` is relative to.
    pub global_section: Option<crate::value::GlobalSection>,
}

/// A mark returned by [`SymStack::mark`] for later use with
/// [`SymStack::pop_to`], identifying a point in the scope stack to unwind
/// back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark(usize);

struct StackEntry {
    sym_index: usize,
    prev_bucket_head: Option<usize>,
    bucket: usize,
}

/// A single named symbol-table instance. The session keeps two of these
/// (`global_stack`/`local_stack`), as described in the data model.
#[derive(Default)]
pub struct SymStack {
    syms: Vec<Sym>,
    buckets: Vec<Option<usize>>,
    scope: Vec<StackEntry>,
}

fn hash_name(name: &str) -> usize {
    let mut h: u32 = 0;
    for &b in name.as_bytes() {
        h = h.wrapping_mul(31).wrapping_add(b as u32);
    }
    (h as usize) & (HASH_SIZE - 1)
}

impl SymStack {
    pub fn new() -> Self {
        SymStack {
            syms: Vec::new(),
            buckets: vec![None; HASH_SIZE],
            scope: Vec::new(),
        }
    }

    /// Declares `name` in this stack, returning its index. Shadows any
    /// existing symbol of the same name in this stack until popped.
    pub fn push(&mut self, name: &str, ty: u32, offset: i64) -> usize {
        let bucket = hash_name(name);
        let prev_head = self.buckets[bucket];
        let index = self.syms.len();
        self.syms.push(Sym {
            name: name.to_string(),
            ty,
            offset,
            patch_chain: -1,
            defined: false,
            global_section: None,
        });
        self.buckets[bucket] = Some(index);
        self.scope.push(StackEntry {
            sym_index: index,
            prev_bucket_head: prev_head,
            bucket,
        });
        index
    }

    /// Returns a mark identifying the current top of scope.
    pub fn mark(&self) -> Mark {
        Mark(self.scope.len())
    }

    /// Pops every symbol pushed since `mark`, restoring bucket heads so
    /// that any shadowed outer symbol becomes findable again.
    pub fn pop_to(&mut self, mark: Mark) {
        while self.scope.len() > mark.0 {
            let entry = self.scope.pop().unwrap();
            self.buckets[entry.bucket] = entry.prev_bucket_head;
        }
    }

    /// Finds the index of the innermost-scoped symbol named `name`,
    /// searching the hash bucket chain (already ordered innermost-first
    /// because `push` always prepends). Rust's owned `Vec<Sym>` makes an
    /// intrusive next-in-bucket pointer awkward, so instead of chasing
    /// bucket links this rescans `scope` entries sharing the bucket,
    /// most-recent first — equivalent in outcome to the original's
    /// linked-chain walk.
    pub fn find_index(&self, name: &str) -> Option<usize> {
        let bucket = hash_name(name);
        for entry in self.scope.iter().rev() {
            if entry.bucket == bucket && self.syms[entry.sym_index].name == name {
                return Some(entry.sym_index);
            }
        }
        None
    }

    pub fn find(&self, name: &str) -> Option<&Sym> {
        self.find_index(name).map(|i| &self.syms[i])
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Sym> {
        self.find_index(name).map(move |i| &mut self.syms[i])
    }

    /// Number of symbols ever pushed onto this stack (including ones
    /// since popped out of scope but not removed from storage).
    pub fn len(&self) -> usize {
        self.syms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.syms.is_empty()
    }

    pub fn get(&self, index: usize) -> &Sym {
        &self.syms[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut Sym {
        &mut self.syms[index]
    }
}

impl Sym {
    /// Records a call site targeting this symbol at `slot_offset` in
    /// `text`: patches it immediately if the symbol is already defined,
    /// otherwise threads it onto the symbol's patch chain. See the
    /// direct-call fixup described in the crate's design notes.
    pub fn reference_call(&mut self, text: &mut crate::section::Section, slot_offset: u32) {
        let target = if self.defined {
            Some(self.offset as u32)
        } else {
            None
        };
        let mut label = crate::label::Label::from_parts(self.patch_chain, target);
        label.reference(text, slot_offset);
        self.patch_chain = label.chain();
    }

    /// Defines this symbol (a function body starting) at `target`,
    /// resolving every deferred call site on its patch chain.
    pub fn define_at(&mut self, text: &mut crate::section::Section, target: u32) {
        let mut label = crate::label::Label::from_parts(self.patch_chain, None);
        label.define(text, target);
        self.patch_chain = label.chain();
        self.offset = target as i64;
        self.defined = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_find() {
        let mut s = SymStack::new();
        s.push("x", crate::types::INT, -4);
        assert!(s.find("x").is_some());
        assert!(s.find("y").is_none());
    }

    #[test]
    fn shadowing_and_pop_restores_outer() {
        let mut s = SymStack::new();
        s.push("x", crate::types::INT, -4);
        let mark = s.mark();
        s.push("x", crate::types::INT, -8);
        assert_eq!(s.find("x").unwrap().offset, -8);
        s.pop_to(mark);
        assert_eq!(s.find("x").unwrap().offset, -4);
    }

    #[test]
    fn pop_removes_block_locals_entirely() {
        let mut s = SymStack::new();
        let mark = s.mark();
        s.push("tmp", crate::types::INT, -4);
        assert!(s.find("tmp").is_some());
        s.pop_to(mark);
        assert!(s.find("tmp").is_none());
    }
}
