//! CB-prefixed rotate/shift/BIT/RES/SET opcodes (§4.1 CB table).

use super::Cpu;
use crate::bus::Bus;

impl Cpu {
    fn shift_flags(&mut self, result: u8, carry: bool) {
        self.regs.set_flag_z(result == 0);
        self.regs.set_flag_n(false);
        self.regs.set_flag_h(false);
        self.regs.set_flag_c(carry);
    }

    fn rlc(&mut self, v: u8) -> u8 {
        let carry = v & 0x80 != 0;
        let r = v.rotate_left(1);
        self.shift_flags(r, carry);
        r
    }

    fn rrc(&mut self, v: u8) -> u8 {
        let carry = v & 0x01 != 0;
        let r = v.rotate_right(1);
        self.shift_flags(r, carry);
        r
    }

    fn rl(&mut self, v: u8) -> u8 {
        let old_carry = self.regs.flag_c() as u8;
        let carry = v & 0x80 != 0;
        let r = (v << 1) | old_carry;
        self.shift_flags(r, carry);
        r
    }

    fn rr(&mut self, v: u8) -> u8 {
        let old_carry = self.regs.flag_c() as u8;
        let carry = v & 0x01 != 0;
        let r = (v >> 1) | (old_carry << 7);
        self.shift_flags(r, carry);
        r
    }

    fn sla(&mut self, v: u8) -> u8 {
        let carry = v & 0x80 != 0;
        let r = v << 1;
        self.shift_flags(r, carry);
        r
    }

    /// Arithmetic shift right: bit 7 is preserved (sign-extended).
    fn sra(&mut self, v: u8) -> u8 {
        let carry = v & 0x01 != 0;
        let r = (v >> 1) | (v & 0x80);
        self.shift_flags(r, carry);
        r
    }

    fn srl(&mut self, v: u8) -> u8 {
        let carry = v & 0x01 != 0;
        let r = v >> 1;
        self.shift_flags(r, carry);
        r
    }

    fn swap(&mut self, v: u8) -> u8 {
        let r = (v << 4) | (v >> 4);
        self.regs.set_flag_z(r == 0);
        self.regs.set_flag_n(false);
        self.regs.set_flag_h(false);
        self.regs.set_flag_c(false);
        r
    }

    fn bit_test(&mut self, v: u8, bit: u8) {
        self.regs.set_flag_z(v & (1 << bit) == 0);
        self.regs.set_flag_n(false);
        self.regs.set_flag_h(true);
    }

    /// Dispatches one CB-prefixed opcode. PC has already advanced past both
    /// the 0xCB byte and this one.
    pub(super) fn execute_cb(&mut self, bus: &mut Bus, opcode: u8) -> u8 {
        let r8_idx = opcode & 0x07;
        let group = opcode >> 6;
        let sub = (opcode >> 3) & 0x07;
        let is_hl = r8_idx == 6;

        match group {
            0 => {
                let v = self.read_r8(bus, r8_idx);
                let r = match sub {
                    0 => self.rlc(v),
                    1 => self.rrc(v),
                    2 => self.rl(v),
                    3 => self.rr(v),
                    4 => self.sla(v),
                    5 => self.sra(v),
                    6 => self.swap(v),
                    7 => self.srl(v),
                    _ => unreachable!("rotate/shift selector is always 3 bits"),
                };
                self.write_r8(bus, r8_idx, r);
                if is_hl { 16 } else { 8 }
            }
            1 => {
                let v = self.read_r8(bus, r8_idx);
                self.bit_test(v, sub);
                if is_hl { 12 } else { 8 }
            }
            2 => {
                let v = self.read_r8(bus, r8_idx) & !(1 << sub);
                self.write_r8(bus, r8_idx, v);
                if is_hl { 16 } else { 8 }
            }
            3 => {
                let v = self.read_r8(bus, r8_idx) | (1 << sub);
                self.write_r8(bus, r8_idx, v);
                if is_hl { 16 } else { 8 }
            }
            _ => unreachable!("CB group is always 2 bits"),
        }
    }
}
