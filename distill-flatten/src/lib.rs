//! DISTILL Flatten - Trace Flattening
//!
//! Turns the tree of observations recorded for one agent invocation (or the
//! agent's raw execution log) into an ordered, role-tagged message list:
//!
//! - system and human messages first
//! - assistant steps deduplicated by cleaned content
//! - intermediate reasoning wrapped in one delimiter block for training
//! - the step matching the final answer left unwrapped
//!
//! Output is a pure function of the input: flattening the same document
//! twice serializes to identical bytes.

pub mod extract;
pub mod flattener;
pub mod system;

pub use extract::{extract_log_messages, message_from_record, output_text};
pub use flattener::{
    FlattenConfig, FlattenedTranscript, Flattener, Step, StepKind, TranscriptOrigin,
    TranscriptSource,
};
pub use system::{discover_system_prompt, discover_system_prompt_in_log};
