/// Raw Record Refiner - Re-flattens a stored raw record into a refined transcript
///
/// Usage: cargo run --bin refine_trace <raw-record.json> [auto|trace|log]

use distill_core::{RawRecord, TraceDocument};
use distill_flatten::{FlattenConfig, Flattener, TranscriptSource};
use std::fs;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: cargo run --bin refine_trace <raw-record.json> [auto|trace|log]");
        eprintln!();
        eprintln!("Example:");
        eprintln!("  cargo run --bin refine_trace data/raw/trace_0190b4c2.json log");
        std::process::exit(1);
    }

    let path = &args[1];
    let source = match args.get(2).map(|s| s.parse::<TranscriptSource>()) {
        None => TranscriptSource::Auto,
        Some(Ok(source)) => source,
        Some(Err(e)) => {
            eprintln!("Invalid transcript source: {}", e);
            std::process::exit(1);
        }
    };

    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to read {}: {}", path, e);
            std::process::exit(1);
        }
    };

    let record: RawRecord = match serde_json::from_str(&content) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{} is not a raw record: {}", path, e);
            std::process::exit(1);
        }
    };

    let flattener = match Flattener::new(FlattenConfig::default()) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Failed to build flattener: {}", e);
            std::process::exit(1);
        }
    };

    // A trace that no longer parses is treated as absent.
    let trace: Option<TraceDocument> = record
        .langfuse_full_trace
        .as_ref()
        .and_then(|value| match serde_json::from_value(value.clone()) {
            Ok(doc) => Some(doc),
            Err(e) => {
                eprintln!("Ignoring unreadable trace document: {}", e);
                None
            }
        });

    let flattened = flattener.flatten(
        source,
        trace.as_ref(),
        &record.response_log,
        &record.instruction,
        &record.final_answer,
    );
    eprintln!(
        "Flattened {} steps from {} ({} thoughts, {} tool results)",
        flattened.steps.len(),
        flattened.origin,
        flattened.thoughts().len(),
        flattened.tool_results().len()
    );

    let refined = flattened.into_refined(record.trace_id);
    match serde_json::to_string_pretty(&refined) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to serialize refined transcript: {}", e);
            std::process::exit(1);
        }
    }
}
