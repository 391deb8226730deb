//! letsplay_batch — ROM batch training-data runner.
//! Iterates over a directory of .gb ROM files and produces one
//! `.train.json` per ROM plus a manifest summarizing the batch.
//!
//! Usage:
//!   cargo run --bin letsplay_batch -- <roms_dir> <output_dir> [frames_per_rom]

use gb_core::{Input, Machine};
use std::path::{Path, PathBuf};
use std::time::Instant;

fn fnv1a(data: &[u8]) -> u32 {
    let mut h: u32 = 0x811c_9dc5;
    for &b in data {
        h ^= b as u32;
        h = h.wrapping_mul(0x0100_0193);
    }
    h
}

fn fnv1a_pixels(pixels: &[u32]) -> u32 {
    let mut h: u32 = 0x811c_9dc5;
    for &p in pixels {
        for byte in p.to_le_bytes() {
            h ^= byte as u32;
            h = h.wrapping_mul(0x0100_0193);
        }
    }
    h
}

#[derive(Debug)]
struct RomResult {
    path: String,
    title: String,
    frames: u64,
    cycles: u64,
    output_path: String,
    elapsed_ms: u128,
    error: Option<String>,
}

fn process_rom(rom_path: &Path, output_dir: &Path, frames: u64) -> RomResult {
    let start = Instant::now();
    let stem = rom_path.file_stem().unwrap_or_default().to_string_lossy().to_string();
    let out_path = output_dir.join(format!("{stem}.train.json"));

    let rom_bytes = match std::fs::read(rom_path) {
        Ok(b) => b,
        Err(e) => {
            return RomResult {
                path: rom_path.to_string_lossy().to_string(),
                title: stem,
                frames: 0,
                cycles: 0,
                output_path: out_path.to_string_lossy().to_string(),
                elapsed_ms: start.elapsed().as_millis(),
                error: Some(format!("read error: {e}")),
            }
        }
    };
    let rom_sha = format!("{:08x}", fnv1a(&rom_bytes));

    let mut machine = Machine::new();
    if let Err(e) = machine.load_rom(rom_bytes) {
        return RomResult {
            path: rom_path.to_string_lossy().to_string(),
            title: stem,
            frames: 0,
            cycles: 0,
            output_path: out_path.to_string_lossy().to_string(),
            elapsed_ms: start.elapsed().as_millis(),
            error: Some(format!("ROM load error: {e}")),
        };
    }

    let mut records: Vec<String> = Vec::with_capacity(frames as usize);
    let mut total_cycles = 0u64;
    for frame in 0..frames {
        let result = match machine.run_frame(Input::default()) {
            Ok(r) => r,
            Err(_) => break,
        };
        total_cycles = result.stats.cycles;
        let regs = machine.cpu_registers();
        let pixel_hash = fnv1a_pixels(&result.pixels);
        let rom_bank = machine.mbc_rom_bank().unwrap_or(0);
        let ram_bank = machine.mbc_ram_bank().unwrap_or(0);

        records.push(format!(
            concat!(
                "{{\"frame\":{},\"t_cycles\":{},\"pc\":{},\"sp\":{},",
                "\"a\":{},\"f\":{},\"bc\":{},\"de\":{},\"hl\":{},",
                "\"rom_bank\":{},\"ram_bank\":{},\"audio_samples\":{},\"pixel_hash\":{}}}"
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
            rom_bank,
            ram_bank,
            result.audio.len(),
            pixel_hash
        ));
    }

    let frames_done = records.len() as u64;
    let frames_json = records.join(",\n  ");
    let json = format!(
        "{{\n  \"version\": \"gbcore.train.v1\",\n  \"rom_sha\": \"{rom_sha}\",\n  \"total_frames\": {frames_done},\n  \"total_cycles\": {total_cycles},\n  \"frames\": [\n  {frames_json}\n  ]\n}}"
    );

    if let Err(e) = std::fs::write(&out_path, &json) {
        return RomResult {
            path: rom_path.to_string_lossy().to_string(),
            title: stem,
            frames: frames_done,
            cycles: total_cycles,
            output_path: out_path.to_string_lossy().to_string(),
            elapsed_ms: start.elapsed().as_millis(),
            error: Some(format!("write error: {e}")),
        };
    }

    RomResult {
        path: rom_path.to_string_lossy().to_string(),
        title: stem,
        frames: frames_done,
        cycles: total_cycles,
        output_path: out_path.to_string_lossy().to_string(),
        elapsed_ms: start.elapsed().as_millis(),
        error: None,
    }
}

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();
    let roms_dir = args.get(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("roms"));
    let output_dir = args.get(2).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("training_output"));
    let frames: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(300);

    println!("gb-core Batch Training Runner");
    println!("  roms_dir:   {}", roms_dir.display());
    println!("  output_dir: {}", output_dir.display());
    println!("  frames/ROM: {frames}");

    std::fs::create_dir_all(&output_dir).expect("cannot create output dir");

    let rom_files: Vec<PathBuf> = std::fs::read_dir(&roms_dir)
        .expect("cannot read roms dir")
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            let ext = p.extension().and_then(|s| s.to_str()).unwrap_or("");
            matches!(ext.to_lowercase().as_str(), "gb" | "rom")
        })
        .collect();

    if rom_files.is_empty() {
        println!("No ROMs found in {}. Drop .gb files in and re-run.", roms_dir.display());
        return;
    }

    println!("Found {} ROM file(s). Processing...\n", rom_files.len());

    let mut results: Vec<RomResult> = Vec::new();
    for (i, path) in rom_files.iter().enumerate() {
        print!("[{}/{}] {} ... ", i + 1, rom_files.len(), path.file_name().unwrap_or_default().to_string_lossy());
        let r = process_rom(path, &output_dir, frames);
        match &r.error {
            None => println!("OK ({} frames, {}ms) -> {}", r.frames, r.elapsed_ms, r.output_path),
            Some(e) => println!("FAILED: {e}"),
        }
        results.push(r);
    }

    let ok_count = results.iter().filter(|r| r.error.is_none()).count();
    let fail_count = results.len() - ok_count;
    let total_frames: u64 = results.iter().map(|r| r.frames).sum();

    let manifest_entries: Vec<String> = results
        .iter()
        .map(|r| {
            format!(
                "  {{\"title\":\"{}\",\"frames\":{},\"ok\":{},\"path\":\"{}\"}}",
                r.title,
                r.frames,
                r.error.is_none(),
                r.output_path
            )
        })
        .collect();

    let manifest = format!(
        "{{\n  \"total_roms\":{},\"ok\":{},\"failed\":{},\"total_frames\":{},\n  \"roms\":[\n{}\n  ]\n}}",
        results.len(),
        ok_count,
        fail_count,
        total_frames,
        manifest_entries.join(",\n")
    );

    let manifest_path = output_dir.join("batch_manifest.json");
    std::fs::write(&manifest_path, &manifest).expect("cannot write manifest");

    println!("\n=== BATCH COMPLETE ===");
    println!("  ROMs processed: {}", results.len());
    println!("  Succeeded:      {ok_count}");
    println!("  Failed:         {fail_count}");
    println!("  Total frames:   {total_frames}");
    println!("  Manifest:       {}", manifest_path.display());
}
