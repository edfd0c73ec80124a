//! Operator interaction
//!
//! Every question the tool asks goes through an [`InteractionGate`]. The
//! terminal implementation is the only code in the crate that reads stdin.

mod scripted;
mod terminal;

pub use scripted::ScriptedGate;
pub use terminal::TerminalGate;

pub trait InteractionGate {
    /// Ask a yes/no question. Anything other than an explicit yes, including
    /// end of input, is a no.
    fn confirm(&self, prompt: &str) -> bool;

    /// Ask for a line of free text, returned trimmed. End of input yields an
    /// empty string.
    fn read_line(&self, prompt: &str) -> String;
}

/// Ask for a value, falling back to `default` when the answer is empty.
pub fn read_line_or(gate: &dyn InteractionGate, prompt: &str, default: &str) -> String {
    let answer = gate.read_line(&format!("{prompt} [{default}]"));
    if answer.is_empty() {
        default.to_string()
    } else {
        answer
    }
}
