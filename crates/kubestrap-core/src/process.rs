//! Process execution
//!
//! External binaries (`ssh-keygen`, `docker`, `psql`) are only ever reached
//! through [`CommandRunner`]. A [`CommandSpec`] carries the program, its
//! arguments, the environment and optional stdin; the runner returns the exit
//! code and captured output. Environment values and stdin are redacted from
//! `Debug`/`Display` so passwords never reach a log line.

use async_trait::async_trait;
use std::fmt;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// A single command invocation
#[derive(Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    /// When false the child starts from an empty environment plus `env`
    pub inherit_env: bool,
    pub stdin: Option<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            inherit_env: true,
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Start the child from an empty environment
    pub fn isolated_env(mut self) -> Self {
        self.inherit_env = false;
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Value of an environment entry (tests only inspect, never log, these)
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let env_keys: Vec<&str> = self.env.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("CommandSpec")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("env", &env_keys)
            .field("inherit_env", &self.inherit_env)
            .field("stdin", &self.stdin.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Captured result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }

    /// Short description of a failed exit for error messages
    pub fn describe_failure(&self) -> String {
        let status = match self.code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        };
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            status
        } else {
            format!("{}: {}", status, stderr)
        }
    }
}

/// Failure to run a process at all (a non-zero exit is not an error here)
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write stdin of '{program}': {source}")]
    Stdin {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for '{program}': {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Runs external commands
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ProcessError>;
}

/// Runs commands as real child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ProcessError> {
        let mut command = Command::new(&spec.program);
        command.args(&spec.args);
        if !spec.inherit_env {
            command.env_clear();
        }
        command.envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        command
            .stdin(if spec.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        tracing::debug!(command = %spec, "spawning process");

        let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

        if let (Some(input), Some(mut stdin)) = (&spec.stdin, child.stdin.take()) {
            stdin
                .write_all(input.as_bytes())
                .await
                .map_err(|source| ProcessError::Stdin {
                    program: spec.program.clone(),
                    source,
                })?;
            // closing stdin signals EOF to the child
            drop(stdin);
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|source| ProcessError::Wait {
                program: spec.program.clone(),
                source,
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

type Matcher = Box<dyn Fn(&CommandSpec) -> bool + Send + Sync>;
type Responder = Box<dyn Fn(&CommandSpec) -> CommandOutput + Send + Sync>;

enum Scripted {
    Output(CommandOutput),
    Computed(Responder),
    SpawnFailure(String),
}

/// Scripted runner for tests
///
/// Rules are checked in registration order; the first match answers. An
/// unmatched command succeeds with empty output. Every invocation is recorded.
#[derive(Clone, Default)]
pub struct MockCommandRunner {
    rules: Arc<Mutex<Vec<(Matcher, Scripted)>>>,
    calls: Arc<Mutex<Vec<CommandSpec>>>,
}

impl MockCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands matching `matcher` with `output`
    pub fn respond<F>(&self, matcher: F, output: CommandOutput) -> &Self
    where
        F: Fn(&CommandSpec) -> bool + Send + Sync + 'static,
    {
        self.rules
            .lock()
            .unwrap()
            .push((Box::new(matcher), Scripted::Output(output)));
        self
    }

    /// Answer commands matching `matcher` by calling `responder`
    ///
    /// Lets a test emulate a tool's side effects, such as writing a key file.
    pub fn respond_with<F, R>(&self, matcher: F, responder: R) -> &Self
    where
        F: Fn(&CommandSpec) -> bool + Send + Sync + 'static,
        R: Fn(&CommandSpec) -> CommandOutput + Send + Sync + 'static,
    {
        self.rules
            .lock()
            .unwrap()
            .push((Box::new(matcher), Scripted::Computed(Box::new(responder))));
        self
    }

    /// Make commands matching `matcher` fail to start
    pub fn fail_to_spawn<F>(&self, matcher: F, message: &str) -> &Self
    where
        F: Fn(&CommandSpec) -> bool + Send + Sync + 'static,
    {
        self.rules
            .lock()
            .unwrap()
            .push((Box::new(matcher), Scripted::SpawnFailure(message.to_string())));
        self
    }

    /// All recorded invocations
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// Recorded invocations whose first argument is `subcommand`
    pub fn calls_with_first_arg(&self, subcommand: &str) -> Vec<CommandSpec> {
        self.calls()
            .into_iter()
            .filter(|spec| spec.args.first().map(String::as_str) == Some(subcommand))
            .collect()
    }
}

#[async_trait]
impl CommandRunner for MockCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ProcessError> {
        self.calls.lock().unwrap().push(spec.clone());

        let rules = self.rules.lock().unwrap();
        match rules.iter().find(|(matcher, _)| matcher(spec)) {
            Some((_, Scripted::Output(output))) => Ok(output.clone()),
            Some((_, Scripted::Computed(responder))) => Ok(responder(spec)),
            Some((_, Scripted::SpawnFailure(message))) => Err(ProcessError::Spawn {
                program: spec.program.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, message.clone()),
            }),
            None => Ok(CommandOutput::success("")),
        }
    }
}
