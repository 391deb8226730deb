//! SM83 CPU core: fetch/decode/execute, interrupt service, HALT/STOP (§4.1).

mod alu;
mod bit;
mod branch;
mod load_store;
mod stack;

use crate::bus::Bus;
use crate::error::RuntimeError;
use crate::interrupts::InterruptKind;
use crate::registers::Registers;
use log::trace;
use serde::{Deserialize, Serialize};

/// Opcodes the SM83 never defines (§4.1 Decoding).
const ILLEGAL_OPCODES: [u8; 11] =
    [0xD3, 0xDB, 0xDD, 0xE3, 0xE4, 0xEB, 0xEC, 0xED, 0xF4, 0xFC, 0xFD];

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Cpu {
    pub regs: Registers,
    pub ime: bool,
    ime_enable_pending: bool,
    pub halted: bool,
    pub stopped: bool,
    /// Set when HALT was entered with IME=0 and an interrupt already
    /// pending; consumed on the very next fetch to suppress that fetch's
    /// PC advance, so the following byte is read (and, for multi-byte
    /// instructions, mis-decoded) a second time (§4.1 HALT bug).
    halt_bug_pending: bool,
}

impl Cpu {
    pub fn new() -> Self {
        Cpu { regs: Registers::power_on(), ..Default::default() }
    }

    fn fetch_u8(&mut self, bus: &Bus) -> u8 {
        let v = bus.read(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        v
    }

    fn fetch_u16(&mut self, bus: &Bus) -> u16 {
        let lo = self.fetch_u8(bus) as u16;
        let hi = self.fetch_u8(bus) as u16;
        (hi << 8) | lo
    }

    fn fetch_i8(&mut self, bus: &Bus) -> i8 {
        self.fetch_u8(bus) as i8
    }

    fn read_r8(&self, bus: &Bus, idx: u8) -> u8 {
        match idx {
            0 => self.regs.b,
            1 => self.regs.c,
            2 => self.regs.d,
            3 => self.regs.e,
            4 => self.regs.h,
            5 => self.regs.l,
            6 => bus.read(self.regs.hl()),
            7 => self.regs.a,
            _ => unreachable!("r8 index is always 3 bits"),
        }
    }

    fn write_r8(&mut self, bus: &mut Bus, idx: u8, val: u8) {
        match idx {
            0 => self.regs.b = val,
            1 => self.regs.c = val,
            2 => self.regs.d = val,
            3 => self.regs.e = val,
            4 => self.regs.h = val,
            5 => self.regs.l = val,
            6 => bus.write(self.regs.hl(), val),
            7 => self.regs.a = val,
            _ => unreachable!("r8 index is always 3 bits"),
        }
    }

    /// BC/DE/HL/SP register-pair group used by most 16-bit opcodes.
    fn read_r16_sp(&self, idx: u8) -> u16 {
        match idx {
            0 => self.regs.bc(),
            1 => self.regs.de(),
            2 => self.regs.hl(),
            3 => self.regs.sp,
            _ => unreachable!("r16 index is always 2 bits"),
        }
    }

    fn write_r16_sp(&mut self, idx: u8, val: u16) {
        match idx {
            0 => self.regs.set_bc(val),
            1 => self.regs.set_de(val),
            2 => self.regs.set_hl(val),
            3 => self.regs.sp = val,
            _ => unreachable!("r16 index is always 2 bits"),
        }
    }

    /// BC/DE/HL/AF register-pair group used by PUSH/POP.
    fn read_r16_af(&self, idx: u8) -> u16 {
        match idx {
            0 => self.regs.bc(),
            1 => self.regs.de(),
            2 => self.regs.hl(),
            3 => self.regs.af(),
            _ => unreachable!("r16 index is always 2 bits"),
        }
    }

    fn write_r16_af(&mut self, idx: u8, val: u16) {
        match idx {
            0 => self.regs.set_bc(val),
            1 => self.regs.set_de(val),
            2 => self.regs.set_hl(val),
            3 => self.regs.set_af(val),
            _ => unreachable!("r16 index is always 2 bits"),
        }
    }

    /// Executes one instruction (or one HALT/STOP tick) and returns the
    /// number of T-cycles it consumed.
    pub fn step_instruction(&mut self, bus: &mut Bus) -> Result<u8, RuntimeError> {
        if self.ime_enable_pending {
            self.ime = true;
            self.ime_enable_pending = false;
        }

        if self.stopped {
            // STOP holds until any button is pressed; the joypad read
            // already reflects latched input, so probe it directly.
            if bus.read(0xFF00) & 0x0F != 0x0F {
                self.stopped = false;
            } else {
                return Ok(4);
            }
        }

        if self.halted {
            if bus.interrupts.any_pending_raw() {
                self.halted = false;
                if self.ime {
                    // IME=1: the pending interrupt is serviced before the
                    // instruction following HALT runs. Return without
                    // fetching so the caller's post-step service sees it.
                    return Ok(4);
                }
                // IME=0: resume without servicing; fall through to fetch.
            } else {
                return Ok(4);
            }
        }

        let pre_fetch_pc = self.regs.pc;
        let opcode = self.fetch_u8(bus);

        if ILLEGAL_OPCODES.contains(&opcode) {
            return Err(RuntimeError::IllegalOpcode { pc: pre_fetch_pc, opcode });
        }

        if self.halt_bug_pending {
            self.halt_bug_pending = false;
            self.regs.pc = pre_fetch_pc;
        }

        let cycles = if opcode == 0xCB {
            let cb_opcode = self.fetch_u8(bus);
            self.execute_cb(bus, cb_opcode)
        } else {
            self.execute(bus, opcode)
        };

        Ok(cycles)
    }

    /// Services the highest-priority pending interrupt. Clears IF, clears
    /// IME, pushes PC, jumps to the vector, and returns the 20 T-cycle cost.
    pub fn service_interrupt(&mut self, bus: &mut Bus, kind: InterruptKind) -> u8 {
        trace!("servicing interrupt {kind:?} at pc=0x{:04X}", self.regs.pc);
        bus.interrupts.clear(kind);
        self.ime = false;
        self.ime_enable_pending = false;
        self.halted = false;
        self.push16(bus, self.regs.pc);
        self.regs.pc = kind.vector();
        20
    }

    fn enter_halt(&mut self, bus: &Bus) {
        if !self.ime && bus.interrupts.any_pending_raw() {
            self.halt_bug_pending = true;
        } else {
            self.halted = true;
        }
    }

    /// Dispatches one non-CB opcode. PC has already advanced past it.
    fn execute(&mut self, bus: &mut Bus, opcode: u8) -> u8 {
        match opcode {
            0x00 => 4,
            // STOP: one byte of hardware padding follows in practice.
            0x10 => {
                self.fetch_u8(bus);
                self.stopped = true;
                4
            }
            0x76 => {
                self.enter_halt(bus);
                4
            }
            0xF3 => {
                self.ime = false;
                self.ime_enable_pending = false;
                4
            }
            0xFB => {
                self.ime_enable_pending = true;
                4
            }

            0x01 | 0x11 | 0x21 | 0x31 => self.op_ld_r16_nn(bus, (opcode >> 4) & 0x03),
            0x02 => self.op_ld_mem_bc_a(bus),
            0x12 => self.op_ld_mem_de_a(bus),
            0x0A => self.op_ld_a_mem_bc(bus),
            0x1A => self.op_ld_a_mem_de(bus),
            0x22 => self.op_ld_hl_inc_a(bus),
            0x32 => self.op_ld_hl_dec_a(bus),
            0x2A => self.op_ld_a_hl_inc(bus),
            0x3A => self.op_ld_a_hl_dec(bus),
            0x08 => self.op_ld_nn_sp(bus),

            0x03 | 0x13 | 0x23 | 0x33 => {
                let idx = (opcode >> 4) & 0x03;
                let v = self.read_r16_sp(idx).wrapping_add(1);
                self.write_r16_sp(idx, v);
                8
            }
            0x0B | 0x1B | 0x2B | 0x3B => {
                let idx = (opcode >> 4) & 0x03;
                let v = self.read_r16_sp(idx).wrapping_sub(1);
                self.write_r16_sp(idx, v);
                8
            }
            0x09 | 0x19 | 0x29 | 0x39 => {
                let v = self.read_r16_sp((opcode >> 4) & 0x03);
                self.add_hl_rr(v);
                8
            }

            0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x34 | 0x3C => {
                let idx = (opcode >> 3) & 0x07;
                let v = self.read_r8(bus, idx);
                let r = self.inc8(v);
                self.write_r8(bus, idx, r);
                if idx == 6 { 12 } else { 4 }
            }
            0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x35 | 0x3D => {
                let idx = (opcode >> 3) & 0x07;
                let v = self.read_r8(bus, idx);
                let r = self.dec8(v);
                self.write_r8(bus, idx, r);
                if idx == 6 { 12 } else { 4 }
            }
            0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x36 | 0x3E => {
                self.op_ld_r8_n(bus, (opcode >> 3) & 0x07)
            }

            0x07 => {
                self.rlca();
                4
            }
            0x0F => {
                self.rrca();
                4
            }
            0x17 => {
                self.rla();
                4
            }
            0x1F => {
                self.rra();
                4
            }
            0x27 => {
                self.daa();
                4
            }
            0x2F => {
                self.cpl();
                4
            }
            0x37 => {
                self.scf();
                4
            }
            0x3F => {
                self.ccf();
                4
            }

            0x18 => self.op_jr_e(bus),
            0x20 | 0x28 | 0x30 | 0x38 => self.op_jr_cc_e(bus, (opcode >> 3) & 0x03),

            0x40..=0x7F => self.op_ld_r8_r8(bus, opcode),

            0x80..=0xBF => {
                let group = (opcode >> 3) & 0x07;
                let idx = opcode & 0x07;
                let v = self.read_r8(bus, idx);
                self.apply_alu_op(group, v);
                if idx == 6 { 8 } else { 4 }
            }
            0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
                let group = (opcode >> 3) & 0x07;
                let n = self.fetch_u8(bus);
                self.apply_alu_op(group, n);
                8
            }

            0xC0 | 0xC8 | 0xD0 | 0xD8 => self.op_ret_cc(bus, (opcode >> 3) & 0x03),
            0xC1 | 0xD1 | 0xE1 | 0xF1 => self.op_pop_r16(bus, (opcode >> 4) & 0x03),
            0xC2 | 0xCA | 0xD2 | 0xDA => self.op_jp_cc_nn(bus, (opcode >> 3) & 0x03),
            0xC3 => self.op_jp_nn(bus),
            0xC4 | 0xCC | 0xD4 | 0xDC => self.op_call_cc_nn(bus, (opcode >> 3) & 0x03),
            0xC5 | 0xD5 | 0xE5 | 0xF5 => self.op_push_r16(bus, (opcode >> 4) & 0x03),
            0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
                self.op_rst(bus, (opcode & 0x38) as u16)
            }
            0xC9 => self.op_ret(bus),
            0xCD => self.op_call_nn(bus),
            0xD9 => self.op_reti(bus),

            0xE0 => self.op_ldh_n_a(bus),
            0xF0 => self.op_ldh_a_n(bus),
            0xE2 => self.op_ld_mem_c_a(bus),
            0xF2 => self.op_ld_a_mem_c(bus),
            0xE8 => {
                let e = self.fetch_i8(bus);
                self.regs.sp = self.add_sp_signed(e);
                16
            }
            0xE9 => self.op_jp_hl(),
            0xEA => self.op_ld_nn_a(bus),
            0xFA => self.op_ld_a_nn(bus),
            0xF8 => self.op_ld_hl_sp_e(bus),
            0xF9 => self.op_ld_sp_hl(),

            _ => unreachable!("opcode 0x{opcode:02X} is illegal and filtered before dispatch"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::Cartridge;

    fn bus_with_program(prog: &[u8]) -> Bus {
        let mut rom = vec![0u8; 0x8000];
        rom[0x100..0x100 + prog.len()].copy_from_slice(prog);
        let cart = Cartridge::from_bytes(rom).unwrap();
        Bus::new(cart)
    }

    #[test]
    fn nop_advances_pc_by_one_and_takes_4_cycles() {
        let mut bus = bus_with_program(&[0x00]);
        let mut cpu = Cpu::new();
        let cycles = cpu.step_instruction(&mut bus).unwrap();
        assert_eq!(cycles, 4);
        assert_eq!(cpu.regs.pc, 0x0101);
    }

    #[test]
    fn illegal_opcode_errors_without_advancing_state_further() {
        let mut bus = bus_with_program(&[0xD3]);
        let mut cpu = Cpu::new();
        let err = cpu.step_instruction(&mut bus).unwrap_err();
        assert_eq!(err, RuntimeError::IllegalOpcode { pc: 0x0100, opcode: 0xD3 });
    }

    #[test]
    fn ei_takes_effect_after_next_instruction() {
        // EI; NOP; NOP
        let mut bus = bus_with_program(&[0xFB, 0x00, 0x00]);
        let mut cpu = Cpu::new();
        cpu.step_instruction(&mut bus).unwrap(); // EI
        assert!(!cpu.ime);
        cpu.step_instruction(&mut bus).unwrap(); // first NOP after EI
        assert!(cpu.ime);
    }

    #[test]
    fn di_clears_ime_immediately() {
        let mut bus = bus_with_program(&[0xFB, 0xF3]);
        let mut cpu = Cpu::new();
        cpu.step_instruction(&mut bus).unwrap(); // EI (pending)
        cpu.step_instruction(&mut bus).unwrap(); // DI fires before EI would land
        assert!(!cpu.ime);
    }

    #[test]
    fn halt_bug_executes_following_byte_twice() {
        // HALT; INC B. With IME=0 and a pending-but-disabled-at-IE interrupt
        // already latched, the HALT bug fires: the INC B byte at 0x0101 is
        // fetched once per step but its PC advance is suppressed the first
        // time, so it runs twice before PC moves past it.
        let mut bus = bus_with_program(&[0x76, 0x04]); // HALT; INC B
        bus.interrupts.write_ie(0x01);
        bus.interrupts.request(crate::interrupts::InterruptKind::VBlank);
        let mut cpu = Cpu::new();
        cpu.ime = false;
        cpu.step_instruction(&mut bus).unwrap(); // HALT triggers the bug
        assert!(!cpu.halted);
        assert_eq!(cpu.regs.b, 0);
        assert_eq!(cpu.regs.pc, 0x0101);

        cpu.step_instruction(&mut bus).unwrap(); // INC B, PC advance suppressed
        assert_eq!(cpu.regs.b, 1);
        assert_eq!(cpu.regs.pc, 0x0101);

        cpu.step_instruction(&mut bus).unwrap(); // INC B again, PC now advances
        assert_eq!(cpu.regs.b, 2);
        assert_eq!(cpu.regs.pc, 0x0102);
    }

    #[test]
    fn halt_without_bug_waits_for_interrupt() {
        let mut bus = bus_with_program(&[0x76]);
        let mut cpu = Cpu::new();
        cpu.ime = true;
        bus.interrupts.write_ie(0x00);
        cpu.step_instruction(&mut bus).unwrap();
        assert!(cpu.halted);
        let cycles = cpu.step_instruction(&mut bus).unwrap();
        assert_eq!(cycles, 4);
        assert!(cpu.halted); // still halted, no pending interrupt
    }

    #[test]
    fn halt_exit_with_ime_defers_to_interrupt_before_next_instruction() {
        // HALT; INC B -- with IME=1 and a pending interrupt, waking must
        // not let INC B run before the interrupt is serviced (§4.1): the
        // step that wakes the CPU returns immediately without fetching,
        // so the caller's post-step service sees the pending bit first.
        let mut bus = bus_with_program(&[0x76, 0x04]);
        bus.interrupts.write_ie(0x01);
        let mut cpu = Cpu::new();
        cpu.ime = true;
        cpu.step_instruction(&mut bus).unwrap(); // HALT
        assert!(cpu.halted);

        bus.interrupts.request(crate::interrupts::InterruptKind::VBlank);
        let cycles = cpu.step_instruction(&mut bus).unwrap();
        assert_eq!(cycles, 4);
        assert!(!cpu.halted);
        assert_eq!(cpu.regs.b, 0, "INC B must not execute before the interrupt is serviced");
        assert_eq!(cpu.regs.pc, 0x0101, "PC must still point at INC B, awaiting service");

        let kind = bus.interrupts.pending().unwrap();
        cpu.service_interrupt(&mut bus, kind);
        assert_eq!(cpu.regs.pc, kind.vector());
        assert_eq!(cpu.pop16(&bus), 0x0101, "pushed return address must be INC B, not past it");
    }

    #[test]
    fn jp_nn_sets_pc_and_takes_16_cycles() {
        let mut bus = bus_with_program(&[0xC3, 0x34, 0x12]); // JP 0x1234
        let mut cpu = Cpu::new();
        let cycles = cpu.step_instruction(&mut bus).unwrap();
        assert_eq!(cycles, 16);
        assert_eq!(cpu.regs.pc, 0x1234);
    }

    #[test]
    fn call_and_ret_round_trip_through_stack() {
        let mut bus = bus_with_program(&[0xCD, 0x05, 0x01, 0x00, 0x00, 0xC9]); // CALL 0x0105; .. ; RET
        let mut cpu = Cpu::new();
        cpu.step_instruction(&mut bus).unwrap(); // CALL
        assert_eq!(cpu.regs.pc, 0x0105);
        assert_eq!(cpu.regs.sp, 0xFFFC);
        cpu.step_instruction(&mut bus).unwrap(); // RET
        assert_eq!(cpu.regs.pc, 0x0103);
        assert_eq!(cpu.regs.sp, 0xFFFE);
    }

    #[test]
    fn inc_dec_r8_flag_rules() {
        let mut bus = bus_with_program(&[0x3C, 0x3D]); // INC A; DEC A
        let mut cpu = Cpu::new();
        cpu.regs.a = 0x0F;
        cpu.step_instruction(&mut bus).unwrap(); // INC A -> 0x10, H set
        assert_eq!(cpu.regs.a, 0x10);
        assert!(cpu.regs.flag_h());
        assert!(!cpu.regs.flag_n());
        cpu.step_instruction(&mut bus).unwrap(); // DEC A -> 0x0F, H set (borrow from bit 4)
        assert_eq!(cpu.regs.a, 0x0F);
        assert!(cpu.regs.flag_h());
        assert!(cpu.regs.flag_n());
    }

    #[test]
    fn push_pop_round_trips_af_with_masked_flags() {
        let mut bus = bus_with_program(&[0xF5, 0xC1]); // PUSH AF; POP BC
        let mut cpu = Cpu::new();
        cpu.regs.set_af(0x12F0);
        cpu.step_instruction(&mut bus).unwrap();
        cpu.step_instruction(&mut bus).unwrap();
        assert_eq!(cpu.regs.bc(), 0x12F0);
    }
}
