//! gb-core — cycle-driven Game Boy (DMG) emulator core.
//!
//! Wires the SM83 [`Cpu`] to a [`Bus`] (ROM/MBC1, PPU, APU, timer, joypad,
//! interrupt controller) behind a single [`Machine`] façade: load a ROM,
//! reset, and step it one video frame at a time.

pub mod apu;
pub mod bus;
pub mod cartridge;
pub mod cpu;
pub mod error;
pub mod interrupts;
pub mod joypad;
pub mod mbc1;
pub mod ppu;
pub mod registers;
pub mod timer;

use bus::Bus;
use cartridge::Cartridge;
use cpu::Cpu;
use error::{LoadError, RuntimeError};
use log::trace;
use serde::{Deserialize, Serialize};

pub use error::{CoreError as Error, LoadError as RomLoadError, RuntimeError as CoreRuntimeError};
pub use joypad::Input;

/// SM83 clock speed in Hz.
pub const CPU_HZ: u64 = 4_194_304;
/// Scanlines per frame.
pub const SCANLINES: u32 = 154;
/// T-cycles (dots) per scanline.
pub const DOTS_PER_LINE: u32 = 456;
/// Total T-cycles in one video frame (§2).
pub const CYCLES_PER_FRAME: u64 = SCANLINES as u64 * DOTS_PER_LINE as u64;

pub const LCD_WIDTH: usize = 160;
pub const LCD_HEIGHT: usize = 144;

/// Per-frame statistics returned alongside the pixel/audio buffers (§6 `Frame`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameStats {
    pub frame_index: u64,
    pub cycles: u64,
}

/// One rendered video frame plus the audio samples generated while
/// producing it (§6 `Frame`).
#[derive(Debug, Clone)]
pub struct Frame {
    pub pixels: Vec<u32>,
    pub audio: Vec<i16>,
    pub stats: FrameStats,
}

/// Top-level emulator façade: owns the CPU and bus, and drives both forward
/// one video frame at a time (§5, §6).
#[derive(Clone, Serialize, Deserialize)]
pub struct Machine {
    cpu: Cpu,
    bus: Option<Bus>,
    rom: Option<Vec<u8>>,
    frame_index: u64,
}

impl Default for Machine {
    fn default() -> Self {
        Machine { cpu: Cpu::new(), bus: None, rom: None, frame_index: 0 }
    }
}

impl Machine {
    pub fn new() -> Self {
        Machine::default()
    }

    /// Parses and installs a ROM image, replacing any previously loaded one.
    pub fn load_rom(&mut self, rom: Vec<u8>) -> Result<(), LoadError> {
        let cartridge = Cartridge::from_bytes(rom.clone())?;
        self.bus = Some(Bus::new(cartridge));
        self.rom = Some(rom);
        self.cpu = Cpu::new();
        self.frame_index = 0;
        Ok(())
    }

    /// Resets CPU and peripheral state to power-on values without
    /// discarding the loaded ROM (§3 Lifecycles). Cartridge RAM carries
    /// over, matching a real console's reset button.
    pub fn reset(&mut self) -> Result<(), RuntimeError> {
        let rom = self.rom.clone().ok_or(RuntimeError::RomNotLoaded)?;
        let saved_ram = self.bus.as_ref().map(|b| b.cart_ram().to_vec()).unwrap_or_default();
        let cartridge = Cartridge::from_bytes(rom)
            .map_err(|e| RuntimeError::InternalInvariant(format!("reset could not re-parse loaded ROM: {e}")))?;
        let mut bus = Bus::new(cartridge);
        if bus.cart_ram().len() == saved_ram.len() {
            bus.cart_ram_mut().copy_from_slice(&saved_ram);
        }
        self.bus = Some(bus);
        self.cpu = Cpu::new();
        self.frame_index = 0;
        Ok(())
    }

    /// Runs the machine forward by one video frame's worth of T-cycles
    /// (§2, §5). Per-instruction ordering: CPU executes, then Timer/PPU/APU
    /// are stepped by the same cycle count, then a pending-and-enabled
    /// interrupt (if IME is set) is serviced, charging its own cost to the
    /// same three units.
    pub fn run_frame(&mut self, input: Input) -> Result<Frame, RuntimeError> {
        let Machine { cpu, bus, frame_index, .. } = self;
        let bus = bus.as_mut().ok_or(RuntimeError::RomNotLoaded)?;
        bus.set_input(input);

        let mut cycles_this_frame: u64 = 0;
        while cycles_this_frame < CYCLES_PER_FRAME {
            let cycles = cpu.step_instruction(bus)?;
            Self::advance_peripherals(bus, cycles);
            cycles_this_frame += cycles as u64;

            if cpu.ime {
                if let Some(kind) = bus.interrupts.pending() {
                    trace!("dispatching interrupt {kind:?}");
                    let service_cycles = cpu.service_interrupt(bus, kind);
                    Self::advance_peripherals(bus, service_cycles);
                    cycles_this_frame += service_cycles as u64;
                }
            }
        }

        *frame_index += 1;
        Ok(Frame {
            pixels: bus.ppu.framebuffer.clone(),
            audio: bus.apu.drain_samples(),
            stats: FrameStats { frame_index: *frame_index, cycles: cycles_this_frame },
        })
    }

    fn advance_peripherals(bus: &mut Bus, cycles: u8) {
        bus.timer.step(cycles, &mut bus.interrupts);
        bus.ppu.step(cycles, &mut bus.interrupts);
        bus.apu.step(cycles);
        bus.step_dma(cycles);
    }

    /// Read-only access to cartridge RAM, for hosts that persist saves
    /// between sessions (§3 Non-goals: persistence itself is out of scope).
    pub fn cart_ram(&self) -> Result<&[u8], RuntimeError> {
        self.bus.as_ref().map(|b| b.cart_ram()).ok_or(RuntimeError::RomNotLoaded)
    }

    /// Snapshot of CPU registers, for diagnostic/training tooling that
    /// wants to log per-frame state without a full `snapshot()`.
    pub fn cpu_registers(&self) -> registers::Registers {
        self.cpu.regs.clone()
    }

    pub fn mbc_rom_bank(&self) -> Result<usize, RuntimeError> {
        self.bus.as_ref().map(|b| b.mbc_rom_bank()).ok_or(RuntimeError::RomNotLoaded)
    }

    pub fn mbc_ram_bank(&self) -> Result<usize, RuntimeError> {
        self.bus.as_ref().map(|b| b.mbc_ram_bank()).ok_or(RuntimeError::RomNotLoaded)
    }

    pub fn wram(&self) -> Result<&[u8], RuntimeError> {
        self.bus.as_ref().map(|b| b.wram()).ok_or(RuntimeError::RomNotLoaded)
    }

    pub fn cart_ram_mut(&mut self) -> Result<&mut [u8], RuntimeError> {
        self.bus.as_mut().map(|b| b.cart_ram_mut()).ok_or(RuntimeError::RomNotLoaded)
    }

    /// Serializes the full machine state (§6 `snapshot`).
    pub fn snapshot(&self) -> Result<Vec<u8>, RuntimeError> {
        if self.bus.is_none() {
            return Err(RuntimeError::RomNotLoaded);
        }
        bincode::serialize(self)
            .map_err(|e| RuntimeError::InternalInvariant(format!("snapshot encode failed: {e}")))
    }

    /// Restores machine state previously produced by [`Machine::snapshot`]
    /// (§6 `restore`).
    pub fn restore(&mut self, bytes: &[u8]) -> Result<(), RuntimeError> {
        let restored: Machine = bincode::deserialize(bytes)
            .map_err(|e| RuntimeError::InternalInvariant(format!("snapshot decode failed: {e}")))?;
        *self = restored;
        Ok(())
    }
}
