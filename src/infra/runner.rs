//! External command execution for the git and tmux adapters.
//!
//! `ProcessRunner` spawns the program directly (no shell). `MockRunner` records
//! invocations and replays queued responses.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::process::Command;

pub trait CommandRunner {
    /// Run `program args...`; `Ok(stdout)` on a zero exit status, `Err(stderr)` otherwise.
    fn run(&self, program: &str, args: &[&str]) -> Result<String, String>;
}

pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<String, String> {
        tracing::trace!(program, ?args, "exec");
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| format!("failed to execute {}: {}", program, e))?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(String::from_utf8_lossy(&output.stderr).trim().to_string())
        }
    }
}

/// Test double: records each command line and pops queued responses in order.
/// Once the queue is empty every call succeeds with empty output.
#[derive(Default)]
pub struct MockRunner {
    responses: RefCell<VecDeque<Result<String, String>>>,
    commands: RefCell<Vec<String>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses(responses: Vec<Result<String, String>>) -> Self {
        MockRunner {
            responses: RefCell::new(responses.into()),
            commands: RefCell::new(Vec::new()),
        }
    }

    pub fn push_response(&self, response: Result<String, String>) {
        self.responses.borrow_mut().push_back(response);
    }

    pub fn executed_commands(&self) -> Vec<String> {
        self.commands.borrow().clone()
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<String, String> {
        let mut line = program.to_string();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        self.commands.borrow_mut().push(line);
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()))
    }
}
