//! The small, fixed register file this core allocates from.
//!
//! Only three general-purpose registers are ever handed out to hold
//! intermediate values — `rax`, `rcx`, `rdx` — matching the original's
//! `NB_REGS = 3` (it keeps more physical registers reserved for argument
//! passing and the frame pointer than it exposes to the allocator). A
//! register class is a small bitset over these three, used to ask the
//! value stack for "any free int register" vs. "specifically rax" (the
//! `imul`/`idiv` encodings require their operands in fixed registers).

/// One of the three allocatable general-purpose registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg {
    Rax,
    Rcx,
    Rdx,
}

pub const NUM_REGS: usize = 3;
pub const ALL_REGS: [Reg; NUM_REGS] = [Reg::Rax, Reg::Rcx, Reg::Rdx];

impl Reg {
    /// The register's 4-bit encoding for ModRM/REX purposes.
    pub fn code(self) -> u8 {
        match self {
            Reg::Rax => 0,
            Reg::Rcx => 1,
            Reg::Rdx => 2,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Reg::Rax => 0,
            Reg::Rcx => 1,
            Reg::Rdx => 2,
        }
    }
}

bitflags::bitflags! {
    /// A set of candidate registers a value may be materialized into.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct RegClass: u8 {
        const RAX = 0b001;
        const RCX = 0b010;
        const RDX = 0b100;
        /// Any of the three — used for ordinary arithmetic operands that
        /// don't care which physical register they land in.
        const INT = Self::RAX.bits() | Self::RCX.bits() | Self::RDX.bits();
    }
}

impl RegClass {
    pub fn single(reg: Reg) -> RegClass {
        match reg {
            Reg::Rax => RegClass::RAX,
            Reg::Rcx => RegClass::RCX,
            Reg::Rdx => RegClass::RDX,
        }
    }

    pub fn contains_reg(self, reg: Reg) -> bool {
        self.contains(RegClass::single(reg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_membership() {
        assert!(RegClass::INT.contains_reg(Reg::Rax));
        assert!(RegClass::INT.contains_reg(Reg::Rdx));
        assert!(!RegClass::RCX.contains_reg(Reg::Rax));
    }
}
