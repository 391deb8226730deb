//! Joypad (FF00) selector register and rising-edge interrupt (§4.6).

use crate::interrupts::{InterruptController, InterruptKind};
use serde::{Deserialize, Serialize};

/// Per-frame button snapshot supplied by the host (§6 `Input`).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    pub a: bool,
    pub b: bool,
    pub select: bool,
    pub start: bool,
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Joypad {
    /// Bits 4-5 of FF00 as last written by the CPU (0 = group selected).
    select_mask: u8,
    prev_input: Input,
}

impl Default for Joypad {
    fn default() -> Self {
        Joypad { select_mask: 0x30, prev_input: Input::default() }
    }
}

impl Joypad {
    pub fn write(&mut self, value: u8) {
        self.select_mask = value & 0x30;
    }

    pub fn read(&self, input: &Input) -> u8 {
        let mut low = 0x0F;
        let select_directions = self.select_mask & 0x10 == 0;
        let select_buttons = self.select_mask & 0x20 == 0;
        if select_directions {
            if input.right {
                low &= !0x01;
            }
            if input.left {
                low &= !0x02;
            }
            if input.up {
                low &= !0x04;
            }
            if input.down {
                low &= !0x08;
            }
        }
        if select_buttons {
            if input.a {
                low &= !0x01;
            }
            if input.b {
                low &= !0x02;
            }
            if input.select {
                low &= !0x04;
            }
            if input.start {
                low &= !0x08;
            }
        }
        0xC0 | self.select_mask | low
    }

    /// Updates the latched input state for the frame and raises the
    /// Joypad interrupt on any released->pressed transition (§4.6,
    /// "acceptable simplification": unconditional on any button).
    pub fn update_input(&mut self, input: Input, ic: &mut InterruptController) {
        let pressed_now = [
            input.a, input.b, input.select, input.start, input.up, input.down, input.left, input.right,
        ];
        let pressed_before = [
            self.prev_input.a,
            self.prev_input.b,
            self.prev_input.select,
            self.prev_input.start,
            self.prev_input.up,
            self.prev_input.down,
            self.prev_input.left,
            self.prev_input.right,
        ];
        let rising_edge = pressed_now
            .iter()
            .zip(pressed_before.iter())
            .any(|(now, before)| *now && !*before);
        if rising_edge {
            ic.request(InterruptKind::Joypad);
        }
        self.prev_input = input;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unselected_group_reads_released() {
        let jp = Joypad::default(); // both groups deselected
        let input = Input { a: true, ..Default::default() };
        assert_eq!(jp.read(&input) & 0x0F, 0x0F);
    }

    #[test]
    fn directions_selected() {
        let mut jp = Joypad::default();
        jp.write(0x20); // P14=0 selects directions (bit4 cleared)
        let input = Input { up: true, ..Default::default() };
        let v = jp.read(&input);
        assert_eq!(v & 0x04, 0); // Up pressed -> bit 2 clear
        assert_eq!(v & 0x01, 0x01); // Right not pressed -> bit 0 set
    }

    #[test]
    fn rising_edge_raises_interrupt() {
        let mut jp = Joypad::default();
        let mut ic = InterruptController::default();
        jp.update_input(Input::default(), &mut ic);
        assert!(!ic.any_pending_raw());
        let pressed = Input { a: true, ..Default::default() };
        ic.write_ie(0x1F);
        jp.update_input(pressed, &mut ic);
        assert!(ic.any_pending_raw());
    }

    #[test]
    fn high_bits_always_one() {
        let jp = Joypad::default();
        let v = jp.read(&Input::default());
        assert_eq!(v & 0xC0, 0xC0);
    }
}
