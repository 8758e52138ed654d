use std::env;
use std::fs;
use std::path::Path;
use std::process;

use chartgrid::export::{format_chord_chart, section_summary, to_lrc, to_records, to_vtt};
use chartgrid::{SongTimeline, TimelineConfig};

const USAGE: &str = "Usage: chartgrid <input.mid> [--lyrics FILE] [--live] [--config FILE] \
[--format json|records|lrc|vtt|chart|sections] [--output FILE]";

fn arg_value<'a>(args: &'a [String], name: &str) -> Option<&'a String> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
}

fn render(song: &SongTimeline, format: &str, title: &str) -> Result<String, String> {
    match format {
        "json" => serde_json::to_string_pretty(song).map_err(|e| e.to_string()),
        "records" => serde_json::to_string_pretty(&to_records(&song.rows)).map_err(|e| e.to_string()),
        "lrc" => Ok(to_lrc(&song.rows)),
        "vtt" => Ok(to_vtt(&song.rows)),
        "chart" => Ok(format_chord_chart(&song.rows, title)),
        "sections" => Ok(section_summary(&song.sections)),
        other => Err(format!("unknown format '{}'", other)),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args[1].starts_with("--") {
        eprintln!("{}", USAGE);
        process::exit(1);
    }

    let input_path = Path::new(&args[1]);
    let lyrics_path = arg_value(&args, "--lyrics").map(Path::new);
    let output_path = arg_value(&args, "--output");
    let format = arg_value(&args, "--format").map(String::as_str).unwrap_or("json");

    let cfg = match arg_value(&args, "--config") {
        Some(path) => match TimelineConfig::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Error loading config '{}': {}", path, e);
                process::exit(1);
            }
        },
        None => TimelineConfig::default(),
    };

    let live = args.iter().any(|a| a == "--live");
    let result = if live {
        chartgrid::process_files_live(input_path, lyrics_path, &cfg)
    } else {
        chartgrid::process_files(input_path, lyrics_path, &cfg)
    };
    let song = match result {
        Ok(song) => song,
        Err(e) => {
            eprintln!("Error processing '{}': {}", input_path.display(), e);
            process::exit(1);
        }
    };

    let title = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Untitled");
    let text = match render(&song, format, title) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("{}", USAGE);
            process::exit(1);
        }
    };

    match output_path {
        Some(path) => {
            if let Err(e) = fs::write(path, &text) {
                eprintln!("Error writing to '{}': {}", path, e);
                process::exit(1);
            }
            eprintln!("Wrote {} output to {}", format, path);
        }
        None => {
            print!("{}", text);
        }
    }
}
