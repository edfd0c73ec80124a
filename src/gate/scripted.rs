use std::cell::RefCell;
use std::collections::VecDeque;
use tracing::debug;

use super::InteractionGate;

/// Answers questions from a prepared script.
///
/// Used by tests and by `--yes`. Confirmations are taken from the queue and
/// fall back to a fixed answer when it runs dry; free-text questions get
/// the queued lines, then empty strings.
#[derive(Debug, Default)]
pub struct ScriptedGate {
    confirmations: RefCell<VecDeque<bool>>,
    lines: RefCell<VecDeque<String>>,
    fallback: bool,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedGate {
    /// Every confirmation is declined unless queued otherwise
    pub fn new() -> Self {
        Self::default()
    }

    /// Every confirmation is accepted unless queued otherwise
    pub fn assume_yes() -> Self {
        Self {
            fallback: true,
            ..Self::default()
        }
    }

    pub fn with_confirmations(self, answers: impl IntoIterator<Item = bool>) -> Self {
        self.confirmations.borrow_mut().extend(answers);
        self
    }

    pub fn with_lines<I, S>(self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lines.borrow_mut().extend(lines.into_iter().map(Into::into));
        self
    }

    /// Every prompt shown so far, in order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }

    /// Whether a prompt containing `text` was shown
    pub fn asked(&self, text: &str) -> bool {
        self.prompts.borrow().iter().any(|p| p.contains(text))
    }
}

impl InteractionGate for ScriptedGate {
    fn confirm(&self, prompt: &str) -> bool {
        self.prompts.borrow_mut().push(prompt.to_string());
        let answer = self
            .confirmations
            .borrow_mut()
            .pop_front()
            .unwrap_or(self.fallback);
        debug!(prompt, answer, "Scripted confirmation");
        answer
    }

    fn read_line(&self, prompt: &str) -> String {
        self.prompts.borrow_mut().push(prompt.to_string());
        self.lines.borrow_mut().pop_front().unwrap_or_default()
    }
}
