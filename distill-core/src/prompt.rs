//! Prompt constants shared by the flattener and the server.

/// Opening reasoning delimiter.
pub const REASONING_OPEN: &str = "<think>";

/// Closing reasoning delimiter.
pub const REASONING_CLOSE: &str = "</think>";

/// System prompt emitted when the trace carries none.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Biomni-R0, an advanced reasoning and acting agent. \
Use <think>...</think> tags to show your step-by-step reasoning process before acting. \
Use <execute> to run python code and gather data. \
Use <solution> to provide the final answer.";

/// Appended to a discovered system prompt that does not already ask for
/// reasoning delimiters.
pub const REASONING_SUFFIX: &str =
    "\n\nUse <think>...</think> tags to show your step-by-step reasoning process before acting.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompt_mentions_delimiters() {
        assert!(DEFAULT_SYSTEM_PROMPT.contains(REASONING_OPEN));
        assert!(DEFAULT_SYSTEM_PROMPT.contains(REASONING_CLOSE));
    }

    #[test]
    fn test_suffix_mentions_delimiters() {
        assert!(REASONING_SUFFIX.contains(REASONING_OPEN));
    }
}
