//! Pre-programmed command runner for non-interactive tests
//!
//! Commands are matched by argument prefix; the most recently registered
//! matching rule wins. Unmatched commands succeed with empty output.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::Duration;

use super::{display_command, CommandOutput, CommandRunner, DEFAULT_COMMAND_TIMEOUT};
use crate::error::{HardenError, Result};

/// What a scripted command does when invoked
#[derive(Debug, Clone)]
pub enum Reply {
    Exit {
        code: i32,
        stdout: String,
        stderr: String,
    },
    NotFound,
    TimedOut,
}

impl Reply {
    pub fn success() -> Self {
        Reply::exit(0)
    }

    pub fn exit(code: i32) -> Self {
        Reply::Exit {
            code,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    pub fn stdout(text: impl Into<String>) -> Self {
        Reply::Exit {
            code: 0,
            stdout: text.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Reply::Exit {
            code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

#[derive(Debug)]
struct Rule {
    prefix: Vec<String>,
    /// Replies are consumed in order; the last one repeats forever
    replies: VecDeque<Reply>,
}

impl Rule {
    fn matches(&self, argv: &[String]) -> bool {
        argv.len() >= self.prefix.len() && argv.iter().zip(&self.prefix).all(|(a, p)| a == p)
    }

    fn next_reply(&mut self) -> Reply {
        if self.replies.len() > 1 {
            self.replies.pop_front().unwrap_or_else(Reply::success)
        } else {
            self.replies.front().cloned().unwrap_or_else(Reply::success)
        }
    }
}

#[derive(Debug, Default)]
pub struct ScriptedRunner {
    rules: RefCell<Vec<Rule>>,
    calls: RefCell<Vec<Vec<String>>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply with `reply` to every command starting with `prefix`
    pub fn on(self, prefix: &[&str], reply: Reply) -> Self {
        self.on_sequence(prefix, vec![reply])
    }

    /// Reply with each of `replies` in turn; the last one repeats
    pub fn on_sequence(self, prefix: &[&str], replies: Vec<Reply>) -> Self {
        self.rules.borrow_mut().push(Rule {
            prefix: prefix.iter().map(|s| s.to_string()).collect(),
            replies: replies.into(),
        });
        self
    }

    /// Every argument vector run so far, in order
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.borrow().clone()
    }

    /// Whether any command starting with `prefix` was run
    pub fn ran(&self, prefix: &[&str]) -> bool {
        self.count(prefix) > 0
    }

    /// Number of commands run that start with `prefix`
    pub fn count(&self, prefix: &[&str]) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| {
                call.len() >= prefix.len() && call.iter().zip(prefix).all(|(a, p)| a == p)
            })
            .count()
    }
}

impl CommandRunner for ScriptedRunner {
    fn default_timeout(&self) -> Duration {
        DEFAULT_COMMAND_TIMEOUT
    }

    fn run_with_timeout(&self, argv: &[String], timeout: Duration) -> Result<CommandOutput> {
        self.calls.borrow_mut().push(argv.to_vec());
        let command = display_command(argv);

        let reply = self
            .rules
            .borrow_mut()
            .iter_mut()
            .rev()
            .find(|rule| rule.matches(argv))
            .map(Rule::next_reply)
            .unwrap_or_else(Reply::success);

        match reply {
            Reply::Exit {
                code,
                stdout,
                stderr,
            } => Ok(CommandOutput::new(
                command,
                Some(code),
                stdout,
                stderr,
                Duration::ZERO,
            )),
            Reply::NotFound => Err(HardenError::Execution {
                command,
                message: "not found in PATH".to_string(),
            }),
            Reply::TimedOut => Err(HardenError::Timeout {
                command,
                after: timeout,
            }),
        }
    }
}
