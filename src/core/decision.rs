use serde::Serialize;

/// Prompt shown while a pair is waiting for a decision.
pub const DECISION_PROMPT: &str = "Keep which image? [1]first, [2]second, [b]oth, [s]kip, [q]uit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Decision {
    KeepFirst,
    KeepSecond,
    Skip,
    Quit,
}

impl Decision {
    /// Parse one line of user input. Case-insensitive; `None` for anything
    /// that is not a known choice.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "1" => Some(Decision::KeepFirst),
            "2" => Some(Decision::KeepSecond),
            // keeping both is the same as skipping
            "b" | "s" => Some(Decision::Skip),
            "q" => Some(Decision::Quit),
            _ => None,
        }
    }
}
