//! Error taxonomy for ROM loading and core execution.

use thiserror::Error;

/// Failures that can occur while loading a ROM image.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("ROM image is empty")]
    EmptyRom,
    #[error("ROM image is too small to contain a valid header (need at least 0x150 bytes)")]
    TooSmall,
    #[error("unsupported cartridge mapper byte 0x{0:02X}")]
    UnsupportedMapper(u8),
}

/// Failures that can occur while running a loaded ROM.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("no ROM has been loaded")]
    RomNotLoaded,
    #[error("illegal opcode 0x{opcode:02X} at PC=0x{pc:04X}")]
    IllegalOpcode { pc: u16, opcode: u8 },
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}

/// Umbrella error for callers that want a single type across both phases
/// (ROM load and frame execution).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
