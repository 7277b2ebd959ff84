use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::error::ProcessError;
use super::runner::{ExitStatus, ProcessCommand, ProcessOutput, ProcessRunner};

type ArgsMatcher = Box<dyn Fn(&[String]) -> bool + Send + Sync>;

/// A canned answer for one program, optionally narrowed by its arguments.
struct Scripted {
    program: String,
    matcher: Option<ArgsMatcher>,
    output: ProcessOutput,
}

impl Scripted {
    fn matches(&self, command: &ProcessCommand) -> bool {
        self.program == command.program
            && self
                .matcher
                .as_ref()
                .map_or(true, |matcher| matcher(&command.args))
    }
}

#[derive(Default)]
struct MockState {
    scripted: Vec<Scripted>,
    history: Vec<ProcessCommand>,
}

/// Runner answering from a script instead of spawning anything. The first
/// scripted entry that matches a command answers it; a command nothing
/// matches is an error, so tests notice unexpected invocations.
#[derive(Clone, Default)]
pub struct MockProcessRunner {
    state: Arc<Mutex<MockState>>,
}

/// Builder returned by [`MockProcessRunner::expect_command`]. Nothing is
/// registered until [`ExpectedCommand::finish`].
pub struct ExpectedCommand {
    runner: MockProcessRunner,
    scripted: Scripted,
}

impl MockProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_command(&self, program: &str) -> ExpectedCommand {
        ExpectedCommand {
            runner: self.clone(),
            scripted: Scripted {
                program: program.to_string(),
                matcher: None,
                output: ProcessOutput {
                    status: ExitStatus::Success,
                    stdout: String::new(),
                    stderr: String::new(),
                    duration: Duration::ZERO,
                },
            },
        }
    }

    /// Every command run so far, matched or not.
    pub fn get_call_history(&self) -> Vec<ProcessCommand> {
        self.state.lock().unwrap().history.clone()
    }
}

#[async_trait]
impl ProcessRunner for MockProcessRunner {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        let mut state = self.state.lock().unwrap();
        state.history.push(command.clone());
        state
            .scripted
            .iter()
            .find(|s| s.matches(&command))
            .map(|s| s.output.clone())
            .ok_or_else(|| {
                ProcessError::MockExpectationNotMet(format!(
                    "unexpected command: {} {}",
                    command.program,
                    command.args.join(" ")
                ))
            })
    }
}

impl ExpectedCommand {
    pub fn with_args<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&[String]) -> bool + Send + Sync + 'static,
    {
        self.scripted.matcher = Some(Box::new(matcher));
        self
    }

    pub fn returns_stdout(mut self, stdout: &str) -> Self {
        self.scripted.output.stdout = stdout.to_string();
        self
    }

    pub fn returns_stderr(mut self, stderr: &str) -> Self {
        self.scripted.output.stderr = stderr.to_string();
        self
    }

    pub fn returns_exit_code(mut self, code: i32) -> Self {
        self.scripted.output.status = match code {
            0 => ExitStatus::Success,
            code => ExitStatus::Error(code),
        };
        self
    }

    pub fn finish(self) {
        self.runner
            .state
            .lock()
            .unwrap()
            .scripted
            .push(self.scripted);
    }
}
