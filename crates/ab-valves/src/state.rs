//! Packed automaton state.

/// Bits per piston field.
pub const STATE_BITS: u32 = 4;
pub const MAX_STATES_PER_PISTON: usize = 1 << STATE_BITS;
pub const MAX_PISTONS: usize = (u32::BITS / STATE_BITS) as usize;

const FIELD_MASK: u32 = (1 << STATE_BITS) - 1;

/// State index of every piston of a valve, 4 bits each; piston `i` lives in bits
/// `[4i, 4i + 4)`. Piston 0 is the primary triple-valve portion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ValveState(u32);

impl ValveState {
    /// Every piston in its first declared state.
    pub const INITIAL: ValveState = ValveState(0);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// State index of `piston`. Pistons beyond the word read as 0.
    pub fn piston(self, piston: usize) -> usize {
        if piston >= MAX_PISTONS {
            return 0;
        }
        ((self.0 >> (STATE_BITS * piston as u32)) & FIELD_MASK) as usize
    }

    /// Copy with `piston` set to `state` (truncated to 4 bits).
    pub fn with_piston(self, piston: usize, state: usize) -> Self {
        if piston >= MAX_PISTONS {
            return self;
        }
        let shift = STATE_BITS * piston as u32;
        let cleared = self.0 & !(FIELD_MASK << shift);
        Self(cleared | (((state as u32) & FIELD_MASK) << shift))
    }

    /// State of piston 0.
    pub fn primary(self) -> usize {
        self.piston(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits() {
        assert_eq!(MAX_STATES_PER_PISTON, 16);
        assert_eq!(MAX_PISTONS, 8);
    }

    #[test]
    fn fields_are_independent() {
        let s = ValveState::INITIAL.with_piston(0, 3).with_piston(1, 15).with_piston(7, 9);
        assert_eq!(s.piston(0), 3);
        assert_eq!(s.piston(1), 15);
        assert_eq!(s.piston(7), 9);
        assert_eq!(s.piston(2), 0);
        assert_eq!(s.primary(), 3);
        assert_eq!(s.bits(), 0x9000_00F3);

        let s = s.with_piston(1, 2);
        assert_eq!(s.piston(0), 3);
        assert_eq!(s.piston(1), 2);
    }

    #[test]
    fn out_of_range_piston_is_ignored() {
        let s = ValveState::from_bits(0x21);
        assert_eq!(s.with_piston(8, 5), s);
        assert_eq!(s.piston(8), 0);
    }
}
