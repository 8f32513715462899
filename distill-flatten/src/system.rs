//! System prompt discovery.
//!
//! The prompt is looked up through the typed [`PromptInput`] shapes instead
//! of a blind scan: generation inputs first (in time order), then the other
//! observations, then the trace's own input.

use distill_core::{Observation, ObservationKind, PromptInput, Role, TraceDocument};
use serde_json::Value;

/// First non-empty system prompt recorded in the trace, if any.
pub fn discover_system_prompt(trace: &TraceDocument) -> Option<String> {
    let sorted = trace.sorted_observations();
    let (generations, others): (Vec<&Observation>, Vec<&Observation>) = sorted
        .into_iter()
        .partition(|o| o.kind == ObservationKind::Generation);

    generations
        .iter()
        .chain(others.iter())
        .find_map(|o| system_prompt_in(&o.input))
        .or_else(|| system_prompt_in(&trace.input))
}

/// First non-empty system prompt found among raw log entries, if any.
pub fn discover_system_prompt_in_log(log: &[Value]) -> Option<String> {
    log.iter().find_map(system_prompt_in)
}

fn system_prompt_in(value: &Value) -> Option<String> {
    let input = PromptInput::from_value(value)?;
    input
        .messages()
        .into_iter()
        .filter(|m| m.role() == Role::System)
        .map(|m| m.content_text())
        .find(|content| !content.trim().is_empty())
}
