use colored::Colorize;
use std::io::{self, BufRead, Write};

use super::InteractionGate;

/// Prompts on stdout and reads answers from stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalGate;

impl TerminalGate {
    pub fn new() -> Self {
        Self
    }

    /// `None` on end of input or a read error
    fn ask(&self, prompt: &str) -> Option<String> {
        let mut out = io::stdout();
        let _ = write!(out, "{} ", prompt.bold());
        let _ = out.flush();

        let mut input = String::new();
        match io::stdin().lock().read_line(&mut input) {
            Ok(0) | Err(_) => {
                let _ = writeln!(out);
                None
            }
            Ok(_) => Some(input.trim().to_string()),
        }
    }
}

impl InteractionGate for TerminalGate {
    fn confirm(&self, prompt: &str) -> bool {
        let question = format!("{prompt} {}", "[y/N]".dimmed());
        loop {
            let Some(answer) = self.ask(&question) else {
                println!("No input received. Treating as no.");
                return false;
            };
            match parse_answer(&answer) {
                Some(decision) => return decision,
                None => println!("{}", "Please answer 'y' (yes) or 'n' (no).".yellow()),
            }
        }
    }

    fn read_line(&self, prompt: &str) -> String {
        self.ask(&format!("{prompt}:")).unwrap_or_default()
    }
}

/// Empty input means the default answer, no.
fn parse_answer(input: &str) -> Option<bool> {
    match input.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "" | "n" | "no" => Some(false),
        _ => None,
    }
}
