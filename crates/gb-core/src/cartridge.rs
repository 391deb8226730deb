//! ROM header parsing and mapper identification.

use crate::error::LoadError;
use serde::{Deserialize, Serialize};

/// Cartridge mapper kind, decoded from header byte 0x0147.
///
/// Only plain ROM and MBC1 (0x00-0x03) are required by spec.md; other
/// known mapper bytes are recognized for diagnostics but rejected by
/// `Cartridge::from_bytes` since the bus only implements MBC1 translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapperKind {
    RomOnly,
    Mbc1,
}

#[derive(Debug, Clone)]
pub struct Cartridge {
    pub rom: Vec<u8>,
    pub mapper: MapperKind,
    pub title: String,
    pub rom_size_kb: u32,
    pub ram_size_kb: u32,
    pub header_byte: u8,
}

impl Cartridge {
    /// Parses and validates a raw ROM image (§6 `load_rom`).
    pub fn from_bytes(rom: Vec<u8>) -> Result<Self, LoadError> {
        if rom.is_empty() {
            return Err(LoadError::EmptyRom);
        }
        if rom.len() < 0x150 {
            return Err(LoadError::TooSmall);
        }
        let header_byte = rom[0x147];
        let mapper = match header_byte {
            0x00 => MapperKind::RomOnly,
            0x01..=0x03 => MapperKind::Mbc1,
            other => return Err(LoadError::UnsupportedMapper(other)),
        };
        let title = String::from_utf8_lossy(&rom[0x134..0x143])
            .trim_matches('\0')
            .trim()
            .to_string();
        let rom_size_kb = 32u32.saturating_mul(1 << rom[0x148].min(8));
        let ram_size_kb = match rom[0x149] {
            0x02 => 8,
            0x03 => 32,
            0x04 => 128,
            0x05 => 64,
            _ => 0,
        };
        Ok(Cartridge { rom, mapper, title, rom_size_kb, ram_size_kb, header_byte })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_rom(mapper_byte: u8) -> Vec<u8> {
        let mut rom = vec![0u8; 0x8000];
        for (i, b) in b"GBCORE_TEST".iter().enumerate() {
            rom[0x134 + i] = *b;
        }
        rom[0x147] = mapper_byte;
        rom[0x148] = 0x00;
        rom[0x149] = 0x00;
        rom
    }

    #[test]
    fn empty_rom_rejected() {
        assert_eq!(Cartridge::from_bytes(Vec::new()).unwrap_err(), LoadError::EmptyRom);
    }

    #[test]
    fn too_small_rejected() {
        let rom = vec![0u8; 0x10];
        assert_eq!(Cartridge::from_bytes(rom).unwrap_err(), LoadError::TooSmall);
    }

    #[test]
    fn unsupported_mapper_rejected() {
        let rom = minimal_rom(0x1B); // MBC5
        assert_eq!(Cartridge::from_bytes(rom).unwrap_err(), LoadError::UnsupportedMapper(0x1B));
    }

    #[test]
    fn parses_title_and_mapper() {
        let cart = Cartridge::from_bytes(minimal_rom(0x01)).unwrap();
        assert_eq!(cart.title, "GBCORE_TEST");
        assert_eq!(cart.mapper, MapperKind::Mbc1);
        assert_eq!(cart.rom_size_kb, 32);
    }
}
