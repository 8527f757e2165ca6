//! Child process launching

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};

use crate::error::{Error, Result};

/// What to launch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchSpec {
    pub command: String,
    pub args: Vec<String>,
    /// Added on top of the supervisor's own environment
    pub env: BTreeMap<String, String>,
    pub working_dir: Option<PathBuf>,
}

impl LaunchSpec {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Command line for display
    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }
}

/// A freshly spawned child with its pipes taken out
pub(crate) struct SpawnedChild {
    pub child: Child,
    pub pid: u32,
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
}

fn spawn_error(spec: &LaunchSpec, reason: impl ToString) -> Error {
    Error::SpawnFailed {
        command: spec.command.clone(),
        reason: reason.to_string(),
    }
}

/// Spawn `spec` with all three standard streams piped. On Unix the child
/// leads its own process group so signals reach its descendants too.
pub(crate) fn spawn_child(spec: &LaunchSpec) -> Result<SpawnedChild> {
    if spec.command.trim().is_empty() {
        return Err(spawn_error(spec, "no command given"));
    }

    debug!(command = %spec.command, args = ?spec.args, "Spawning child process");

    let mut cmd = Command::new(&spec.command);
    cmd.args(&spec.args);

    if let Some(ref dir) = spec.working_dir {
        cmd.current_dir(dir);
    }

    for (key, value) in &spec.env {
        cmd.env(key, value);
    }

    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd.spawn().map_err(|e| spawn_error(spec, e))?;

    let pid = child
        .id()
        .ok_or_else(|| spawn_error(spec, "process exited before its id was read"))?;

    let (stdin, stdout, stderr) = match (child.stdin.take(), child.stdout.take(), child.stderr.take()) {
        (Some(stdin), Some(stdout), Some(stderr)) => (stdin, stdout, stderr),
        _ => return Err(spawn_error(spec, "standard streams were not piped")),
    };

    info!(pid, command = %spec.command, "Child process spawned");

    Ok(SpawnedChild {
        child,
        pid,
        stdin,
        stdout,
        stderr,
    })
}
