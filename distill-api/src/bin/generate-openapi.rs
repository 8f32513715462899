//! OpenAPI Specification Generator Binary
//!
//! Prints the DISTILL OpenAPI specification as JSON to stdout.
//!
//! Usage:
//!   cargo run -p distill-api --bin generate-openapi > openapi.json

use distill_api::ApiDoc;

fn main() {
    match ApiDoc::to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to serialize OpenAPI document: {}", e);
            std::process::exit(1);
        }
    }
}
