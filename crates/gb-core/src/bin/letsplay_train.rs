//! letsplay_train -- training-data extraction runner.
//! Plays a ROM (or a synthetic built-in test ROM) for N frames and dumps a
//! `.train.json` file with one record per frame.
//!
//! Usage:
//!   cargo run --bin letsplay_train -- [frames] [output_path]

use gb_core::cartridge::Cartridge;
use gb_core::{Input, Machine};

fn fnv1a(data: &[u8]) -> u32 {
    let mut h: u32 = 0x811c_9dc5;
    for &b in data {
        h ^= b as u32;
        h = h.wrapping_mul(0x0100_0193);
    }
    h
}

fn synthetic_rom() -> Vec<u8> {
    let mut rom = vec![0u8; 0x8000];
    rom[0x0100] = 0x00;
    rom[0x0101] = 0xC3;
    rom[0x0102] = 0x50;
    rom[0x0103] = 0x01;
    let title = b"GBCORE-TRAIN";
    for (i, &b) in title.iter().enumerate() {
        rom[0x0134 + i] = b;
    }
    rom[0x0147] = 0x00;
    rom[0x0148] = 0x00;
    rom[0x0149] = 0x00;
    // Program: LCD on, VBlank IRQ enabled, spin with periodic LCDC rewrite.
    let prog: &[u8] = &[
        0x3E, 0x00, 0xE0, 0x40, // LCD off
        0x01, 0x00, 0x98, // LD BC,0x9800
        0x3E, 0x01, 0x02, // LD A,1 / LD (BC),A
        0x3E, 0x91, 0xE0, 0x40, // LCD on, BG on
        0x3E, 0x01, 0xE0, 0xFF, // IE = 1 (VBlank)
        0xFB, // EI
        0x3E, 0xAA, 0xE0, 0x40, // periodic LCDC write to exercise register path
        0xC3, 0x50, 0x01, // JP back (spin)
    ];
    for (i, &b) in prog.iter().enumerate() {
        rom[0x0150 + i] = b;
    }
    rom
}

fn play_to_json(rom: Vec<u8>, rom_title: &str, max_frames: u64) -> String {
    let rom_sha = format!("{:08x}", fnv1a(&rom));
    let rom_size = rom.len();

    let mut machine = Machine::new();
    machine.load_rom(rom).expect("ROM invalid");

    let mut records: Vec<String> = Vec::with_capacity(max_frames as usize);
    let mut last_cycles = 0u64;

    for frame in 0..max_frames {
        let result = match machine.run_frame(Input::default()) {
            Ok(r) => r,
            Err(_) => break,
        };
        last_cycles = result.stats.cycles;
        let regs = machine.cpu_registers();
        let wram_hash = machine.wram().map(fnv1a).unwrap_or(0);
        let rom_bank = machine.mbc_rom_bank().unwrap_or(0);
        let ram_bank = machine.mbc_ram_bank().unwrap_or(0);

        let rec = format!(
            concat!(
                "{{\"frame\":{},\"t_cycles\":{},",
                "\"pc\":{},\"sp\":{},\"a\":{},\"f\":{},",
                "\"bc\":{},\"de\":{},\"hl\":{},",
                "\"samples\":{},",
                "\"rom_bank\":{},\"ram_bank\":{},",
                "\"wram_hash\":{}}}"
            ),
            frame,
            result.stats.cycles,
            regs.pc,
            regs.sp,
            regs.a,
            regs.f,
            regs.bc(),
            regs.de(),
            regs.hl(),
            result.audio.len(),
            rom_bank,
            ram_bank,
            wram_hash
        );
        records.push(rec);
    }

    let frames_json = records.join(",\n  ");
    format!(
        concat!(
            "{{\n",
            "  \"version\": \"gbcore.train.v1\",\n",
            "  \"rom_title\": \"{}\",\n",
            "  \"rom_sha\": \"{}\",\n",
            "  \"rom_size_bytes\": {},\n",
            "  \"total_frames\": {},\n",
            "  \"total_cycles\": {},\n",
            "  \"frames\": [\n  {}\n  ]\n",
            "}}"
        ),
        rom_title,
        rom_sha,
        rom_size,
        records.len(),
        last_cycles,
        frames_json
    )
}

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();
    let max_frames: u64 = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(60);
    let out_path = args.get(2).cloned().unwrap_or_else(|| "output.train.json".to_string());

    println!("gb-core LetsPlay Training Runner");
    println!("frames={max_frames} output={out_path}");
    println!("Building synthetic GBCORE-TRAIN ROM...");

    let rom = synthetic_rom();
    let cart = Cartridge::from_bytes(rom.clone()).expect("ROM invalid");
    println!("ROM: {} | mapper: {:?} | {}KB", cart.title, cart.mapper, cart.rom_size_kb);

    let json = play_to_json(rom, &cart.title, max_frames);

    std::fs::write(&out_path, &json).expect("failed to write training file");
    println!("Training file written: {out_path} ({} bytes)", json.len());
    println!("=== TRAINING EXTRACTION COMPLETE ===");
}
