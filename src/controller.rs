//! The two joypad ports behind $4016/$4017.
//!
//! The host holds and releases [`Buttons`]; a $4016 write snapshots them, and each port read
//! then yields the next button as bit 0. Once all eight are out the port reads 1.
//! Protocol: [Standard controller](https://www.nesdev.org/wiki/Standard_controller).

use bitflags::bitflags;

bitflags! {
    /// Buttons in shift-out order.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct Buttons: u8 {
        const A = 1 << 0;
        const B = 1 << 1;
        const SELECT = 1 << 2;
        const START = 1 << 3;
        const UP = 1 << 4;
        const DOWN = 1 << 5;
        const LEFT = 1 << 6;
        const RIGHT = 1 << 7;
    }
}

/// One controller port.
#[derive(Debug, Default)]
pub struct Controller {
    /// Buttons currently held.
    pub state: Buttons,
    /// State before the most recent press/release.
    previous: Buttons,
    /// Shift register: latched from `state` on write; shifted out LSB-first on read.
    /// Bit 8 is fed with 1s so reads past the eighth return 1.
    shift: u16,
}

impl Controller {
    /// Create a new controller with no buttons pressed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold `buttons`. Opposite directions held together keep whichever was held first.
    pub fn press(&mut self, buttons: Buttons) {
        self.previous = self.state;
        self.state |= buttons;

        for pair in [Buttons::UP | Buttons::DOWN, Buttons::LEFT | Buttons::RIGHT] {
            if self.state.contains(pair) {
                self.state.remove(pair);
                self.state |= self.previous & pair;
            }
        }
    }

    pub fn release(&mut self, buttons: Buttons) {
        self.previous = self.state;
        self.state.remove(buttons);
    }

    /// Write to $4016: latch current button state into the shift register.
    pub fn latch(&mut self) {
        self.shift = self.state.bits() as u16;
    }

    /// Shift one button out. Returns 0 or 1.
    pub fn read(&mut self) -> u8 {
        let bit = (self.shift & 1) as u8;
        self.shift = (self.shift >> 1) | 0x100;
        bit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shifts_out_latched_buttons_then_ones() {
        let mut pad = Controller::new();
        pad.press(Buttons::A | Buttons::START | Buttons::LEFT);
        pad.latch();
        pad.release(Buttons::A);

        let bits: Vec<u8> = (0..10).map(|_| pad.read()).collect();
        assert_eq!(bits, [1, 0, 0, 1, 0, 0, 1, 0, 1, 1]);
    }

    #[test]
    fn relatch_restarts_sequence() {
        let mut pad = Controller::new();
        pad.press(Buttons::B);
        pad.latch();
        pad.read();
        pad.read();
        pad.latch();
        assert_eq!(pad.read(), 0);
        assert_eq!(pad.read(), 1);
    }

    #[test]
    fn opposite_directions_keep_first_held() {
        let mut pad = Controller::new();
        pad.press(Buttons::LEFT);
        pad.press(Buttons::RIGHT);
        assert_eq!(pad.state, Buttons::LEFT);

        pad.press(Buttons::UP | Buttons::DOWN);
        assert_eq!(pad.state, Buttons::LEFT);

        pad.release(Buttons::LEFT);
        pad.press(Buttons::RIGHT);
        assert_eq!(pad.state, Buttons::RIGHT);
    }
}
