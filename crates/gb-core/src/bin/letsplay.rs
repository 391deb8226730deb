//! letsplay -- gb-core letsplay runner
//! Runs a synthetic test ROM for N frames, prints an ASCII render plus a
//! state summary every so often.
//! Usage: cargo run --bin letsplay -- [frames]

use gb_core::cartridge::Cartridge;
use gb_core::{Input, Machine, CYCLES_PER_FRAME, LCD_HEIGHT, LCD_WIDTH};

fn synthetic_rom() -> Vec<u8> {
    let mut rom = vec![0u8; 0x8000];
    rom[0x0100] = 0x00; // NOP
    rom[0x0101] = 0xC3; // JP nn
    rom[0x0102] = 0x50; // -> 0x0150
    rom[0x0103] = 0x01;
    let title = b"GBCORE-TEST";
    for (i, &b) in title.iter().enumerate() {
        rom[0x0134 + i] = b;
    }
    rom[0x0147] = 0x00; // ROM only
    rom[0x0148] = 0x00;
    rom[0x0149] = 0x00;
    // Program: init LCD, draw a checkerboard tile, spin on VBlank.
    let prog: &[u8] = &[
        0x3E, 0x00, 0xE0, 0x40, // LD A,0 / LDH (0x40),A -- LCD off
        0x01, 0x00, 0x80, // LD BC, 0x8000
        0x3E, 0xAA, 0x02, 0x03, // LD A,0xAA / LD (BC),A / INC BC
        0x3E, 0x55, 0x02, 0x03, // LD A,0x55 / LD (BC),A / INC BC
        0x3E, 0xAA, 0x02, 0x03, 0x3E, 0x55, 0x02, 0x03, 0x01, 0x00, 0x98, // LD BC, 0x9800
        0x3E, 0x00, 0x02, // LD A,0 / LD (BC),A
        0x3E, 0x91, 0xE0, 0x40, // LCD on, BG on
        0x3E, 0x01, 0xE0, 0xFF, // IE = 1 (VBlank)
        0xFB, // EI
        0xC3, 0x86, 0x01, // JP 0x0186 (spin)
    ];
    for (i, &b) in prog.iter().enumerate() {
        rom[0x0150 + i] = b;
    }
    rom
}

fn frame_to_ascii(pixels: &[u32]) -> String {
    let mut out = String::with_capacity(LCD_WIDTH * LCD_HEIGHT / 4);
    for y in (0..LCD_HEIGHT).step_by(2) {
        for x in 0..LCD_WIDTH {
            let shade = pixels[y * LCD_WIDTH + x] & 0xFF;
            let ch = match shade {
                0xFF => ' ',
                0xAA => '.',
                0x55 => '+',
                _ => '#',
            };
            out.push(ch);
        }
        out.push('\n');
    }
    out
}

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();
    let n_frames: u64 = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(10);
    println!("gb-core LetsPlay Runner | target_frames={n_frames}");
    println!("Resolution: {LCD_WIDTH}x{LCD_HEIGHT} | CyclesPerFrame: {CYCLES_PER_FRAME}");
    println!();

    let rom = synthetic_rom();
    let cart = Cartridge::from_bytes(rom.clone()).expect("ROM invalid");
    println!(
        "ROM: {} | mapper: {:?} | {}KB ROM | {}KB RAM",
        cart.title, cart.mapper, cart.rom_size_kb, cart.ram_size_kb
    );
    println!();

    let mut machine = Machine::new();
    machine.load_rom(rom).expect("ROM invalid");

    let mut last_frame = None;
    for frame in 0..n_frames {
        let result = machine.run_frame(Input::default()).expect("emulator crash");
        if frame < 3 || frame == n_frames - 1 {
            println!("--- Frame {} (cycles={}) ---", result.stats.frame_index, result.stats.cycles);
            for row in frame_to_ascii(&result.pixels).lines().take(8) {
                println!("  {}", &row[..row.len().min(40)]);
            }
            if frame < n_frames - 1 {
                println!("  ...");
            }
            println!();
        }
        last_frame = Some(result);
    }

    println!("=== LETSPLAY COMPLETE ===");
    let last = last_frame.expect("at least one frame must have run");
    println!("Frames: {n_frames} | last frame T-cycles: {}", last.stats.cycles);
    println!();
    println!("Final frame ({} rows):", LCD_HEIGHT / 2);
    print!("{}", frame_to_ascii(&last.pixels));
}
