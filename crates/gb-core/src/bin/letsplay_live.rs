//! letsplay_live — live replay runner with frame capture and save state.
//! Usage: letsplay_live <rom_path> <n_frames> [output_dir] [--save-state] [--broadcast]
//!
//! Runs the emulator for N frames, captures a `gbcore.replay.v1` JSON log,
//! optionally writes a binary save state via `Machine::snapshot`, and can
//! broadcast a per-frame summary to stdout as NDJSON.

use gb_core::{Input, Machine};
use std::{env, fs, path::Path, time::Instant};

struct ReplayCapture {
    rom_title: String,
    records: Vec<String>,
}

impl ReplayCapture {
    fn new(capacity: usize, rom_title: &str) -> Self {
        ReplayCapture { rom_title: rom_title.to_string(), records: Vec::with_capacity(capacity) }
    }

    fn capture(&mut self, machine: &Machine, frame_cycles: u64, frame_index: u64) {
        let regs = machine.cpu_registers();
        self.records.push(format!(
            "{{\"frame\":{frame_index},\"t_cycles\":{frame_cycles},\"pc\":{},\"sp\":{},\"a\":{},\"bc\":{},\"de\":{},\"hl\":{}}}",
            regs.pc,
            regs.sp,
            regs.a,
            regs.bc(),
            regs.de(),
            regs.hl()
        ));
    }

    fn save(&self, path: &Path) -> std::io::Result<()> {
        let json = format!(
            "{{\n  \"version\": \"gbcore.replay.v1\",\n  \"rom_title\": \"{}\",\n  \"frames\": [\n  {}\n  ]\n}}",
            self.rom_title,
            self.records.join(",\n  ")
        );
        fs::write(path, json)
    }
}

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <rom_path> <n_frames> [output_dir] [--save-state] [--broadcast]", args[0]);
        std::process::exit(1);
    }

    let rom_path = &args[1];
    let n_frames: u64 = args[2].parse().unwrap_or(60);
    let output_dir = if args.len() > 3 && !args[3].starts_with("--") { &args[3] } else { "." };
    let save_state = args.iter().any(|a| a == "--save-state");
    let broadcast = args.iter().any(|a| a == "--broadcast");

    let rom_bytes = fs::read(rom_path).unwrap_or_else(|e| {
        eprintln!("Cannot read ROM: {e}");
        std::process::exit(1);
    });

    let mut machine = Machine::new();
    machine.load_rom(rom_bytes).unwrap_or_else(|e| {
        eprintln!("Invalid ROM: {e}");
        std::process::exit(1);
    });

    let stem = Path::new(rom_path).file_stem().unwrap_or_default().to_str().unwrap_or("rom").to_string();
    let mut replay = ReplayCapture::new(n_frames as usize, &stem);

    let t0 = Instant::now();
    let mut frame_count = 0u64;

    eprintln!("[letsplay_live] ROM: {stem} | Frames: {n_frames} | Save: {save_state} | Broadcast: {broadcast}");

    for _ in 0..n_frames {
        let result = match machine.run_frame(Input::default()) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("[letsplay_live] emulator error: {e}");
                break;
            }
        };

        replay.capture(&machine, result.stats.cycles, result.stats.frame_index);

        if broadcast {
            let regs = machine.cpu_registers();
            println!(
                "{{\"frame\":{},\"pc\":{},\"cycles\":{}}}",
                result.stats.frame_index, regs.pc, result.stats.cycles
            );
        }

        frame_count += 1;
        if frame_count % 60 == 0 {
            let regs = machine.cpu_registers();
            eprintln!("[letsplay_live] Frame {frame_count} — pc=0x{:04X} cycles={}", regs.pc, result.stats.cycles);
        }
    }

    let elapsed = t0.elapsed().as_secs_f64();
    eprintln!(
        "[letsplay_live] Done: {frame_count} frames in {elapsed:.2}s ({:.1} fps)",
        frame_count as f64 / elapsed.max(0.001)
    );

    fs::create_dir_all(output_dir).ok();

    let replay_path = format!("{output_dir}/{stem}.replay.json");
    replay.save(Path::new(&replay_path)).unwrap_or_else(|e| eprintln!("Replay save error: {e}"));
    eprintln!("[letsplay_live] Replay: {replay_path}");

    if save_state {
        let sav_path = format!("{output_dir}/{stem}.sav");
        match machine.snapshot() {
            Ok(bytes) => {
                if let Err(e) = fs::write(&sav_path, bytes) {
                    eprintln!("Save state error: {e}");
                } else {
                    eprintln!("[letsplay_live] State: {sav_path}");
                }
            }
            Err(e) => eprintln!("Save state error: {e}"),
        }
    }

    if !broadcast {
        let regs = machine.cpu_registers();
        println!("{{\"frames\":{frame_count},\"final_pc\":{}}}", regs.pc);
    }
}
