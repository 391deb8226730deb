//! Control-flow opcodes: JP/JR/CALL/RET/RST and condition-code evaluation (§4.1).

use super::Cpu;
use crate::bus::Bus;

impl Cpu {
    pub(super) fn check_cc(&self, idx: u8) -> bool {
        match idx {
            0 => !self.regs.flag_z(),
            1 => self.regs.flag_z(),
            2 => !self.regs.flag_c(),
            3 => self.regs.flag_c(),
            _ => unreachable!("condition code index is always 2 bits"),
        }
    }

    pub(super) fn op_jp_nn(&mut self, bus: &Bus) -> u8 {
        self.regs.pc = self.fetch_u16(bus);
        16
    }

    pub(super) fn op_jp_cc_nn(&mut self, bus: &Bus, cc: u8) -> u8 {
        let addr = self.fetch_u16(bus);
        if self.check_cc(cc) {
            self.regs.pc = addr;
            16
        } else {
            12
        }
    }

    pub(super) fn op_jp_hl(&mut self) -> u8 {
        self.regs.pc = self.regs.hl();
        4
    }

    pub(super) fn op_jr_e(&mut self, bus: &Bus) -> u8 {
        let e = self.fetch_i8(bus);
        self.regs.pc = self.regs.pc.wrapping_add(e as i16 as u16);
        12
    }

    pub(super) fn op_jr_cc_e(&mut self, bus: &Bus, cc: u8) -> u8 {
        let e = self.fetch_i8(bus);
        if self.check_cc(cc) {
            self.regs.pc = self.regs.pc.wrapping_add(e as i16 as u16);
            12
        } else {
            8
        }
    }

    pub(super) fn op_call_nn(&mut self, bus: &mut Bus) -> u8 {
        let addr = self.fetch_u16(bus);
        self.push16(bus, self.regs.pc);
        self.regs.pc = addr;
        24
    }

    pub(super) fn op_call_cc_nn(&mut self, bus: &mut Bus, cc: u8) -> u8 {
        let addr = self.fetch_u16(bus);
        if self.check_cc(cc) {
            self.push16(bus, self.regs.pc);
            self.regs.pc = addr;
            24
        } else {
            12
        }
    }

    pub(super) fn op_ret(&mut self, bus: &Bus) -> u8 {
        self.regs.pc = self.pop16(bus);
        16
    }

    pub(super) fn op_ret_cc(&mut self, bus: &Bus, cc: u8) -> u8 {
        if self.check_cc(cc) {
            self.regs.pc = self.pop16(bus);
            20
        } else {
            8
        }
    }

    pub(super) fn op_reti(&mut self, bus: &Bus) -> u8 {
        self.regs.pc = self.pop16(bus);
        self.ime = true;
        self.ime_enable_pending = false;
        16
    }

    pub(super) fn op_rst(&mut self, bus: &mut Bus, vector: u16) -> u8 {
        self.push16(bus, self.regs.pc);
        self.regs.pc = vector;
        16
    }
}
