//! 6502 processor status register (P) flag bits.

use bitflags::bitflags;

bitflags! {
    /// Status flags held by the CPU. `BREAK` and `UNUSED` only exist in the pushed copy.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct Status: u8 {
        const CARRY = 1 << 0;
        const ZERO = 1 << 1;
        const INTERRUPT_DISABLE = 1 << 2;
        const DECIMAL = 1 << 3;  // Stored only; the 2A03 has no BCD unit
        const BREAK = 1 << 4;    // Set in the BRK / PHP stack frame
        const UNUSED = 1 << 5;   // Always 1 when pushed
        const OVERFLOW = 1 << 6;
        const NEGATIVE = 1 << 7;
    }
}

impl Status {
    /// Flags as restored from a pulled byte: B and bit 5 do not exist in the register.
    pub fn from_stack(value: u8) -> Self {
        Self::from_bits_truncate(value) - (Self::BREAK | Self::UNUSED)
    }

    /// Byte image with bit 5 forced on.
    pub fn to_byte(self) -> u8 {
        (self | Self::UNUSED).bits()
    }
}
