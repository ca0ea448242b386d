#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Result, TcoreError};

/// How much of the Nix environment a command runs inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// Bare `sh -c`.
    Plain,
    /// Nix profile script sourced first (`nix-env`, `git` installed through it).
    Profile,
    /// Profile sourced, then executed inside `nix-shell` bound to the theCore tree.
    Shell,
}

/// A single external invocation. The working directory is explicit; the
/// process-wide cwd is never changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    pub script: String,
    pub cwd: Option<PathBuf>,
    pub activation: Activation,
}

impl ShellCommand {
    pub fn plain(script: impl Into<String>) -> Self {
        Self::new(script, Activation::Plain)
    }

    pub fn profile(script: impl Into<String>) -> Self {
        Self::new(script, Activation::Profile)
    }

    pub fn shell(script: impl Into<String>) -> Self {
        Self::new(script, Activation::Shell)
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    fn new(script: impl Into<String>, activation: Activation) -> Self {
        Self {
            script: script.into(),
            cwd: None,
            activation,
        }
    }
}

/// Executes shell commands on behalf of the bootstrapper and the build plan.
pub trait CommandRunner {
    fn run(&self, command: &ShellCommand) -> Result<()>;
}

/// Runs commands through `sh -c`, inheriting stdio and environment.
#[derive(Debug, Clone)]
pub struct SystemShell {
    nix_profile_script: PathBuf,
    core_src_dir: PathBuf,
}

impl SystemShell {
    pub fn new(config: &Config) -> Self {
        Self {
            nix_profile_script: config.nix_profile_script.clone(),
            core_src_dir: config.core_src_dir.clone(),
        }
    }

    /// Expands a command into the exact script handed to `sh -c`.
    pub fn wrap(&self, command: &ShellCommand) -> Result<String> {
        let wrapped = match command.activation {
            Activation::Plain => command.script.clone(),
            Activation::Profile => format!(
                ". {} && {}",
                quote_path(&self.nix_profile_script)?,
                command.script
            ),
            Activation::Shell => format!(
                ". {} && nix-shell --run {} {}",
                quote_path(&self.nix_profile_script)?,
                quote(&command.script)?,
                quote_path(&self.core_src_dir)?
            ),
        };
        Ok(wrapped)
    }
}

impl CommandRunner for SystemShell {
    fn run(&self, command: &ShellCommand) -> Result<()> {
        let wrapped = self.wrap(command)?;
        info!(
            command = %command.script,
            cwd = ?command.cwd.as_deref().map(Path::display),
            activation = ?command.activation,
            "running command"
        );
        debug!(script = %wrapped, "expanded command");

        let mut process = Command::new("sh");
        process.arg("-c").arg(&wrapped);
        if let Some(dir) = &command.cwd {
            process.current_dir(dir);
        }

        let status = process
            .status()
            .map_err(|err| TcoreError::io(command.cwd.clone().unwrap_or_default(), err))?;

        if !status.success() {
            return Err(TcoreError::ExecutionFailed { command: wrapped });
        }
        Ok(())
    }
}

/// Quotes a single shell word. Fails only for words containing NUL bytes.
pub fn quote(word: &str) -> Result<String> {
    shlex::try_quote(word)
        .map(|quoted| quoted.into_owned())
        .map_err(|_| TcoreError::UnquotableWord {
            word: word.to_string(),
        })
}

pub fn quote_path(path: &Path) -> Result<String> {
    quote(&path.to_string_lossy())
}

/// Records commands instead of running them. A command whose script contains
/// `fail_on` is reported as failed after being recorded.
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Default)]
pub struct RecordingShell {
    commands: std::cell::RefCell<Vec<ShellCommand>>,
    fail_on: Option<String>,
}

#[cfg(any(test, feature = "test-support"))]
impl RecordingShell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(pattern: impl Into<String>) -> Self {
        Self {
            commands: Default::default(),
            fail_on: Some(pattern.into()),
        }
    }

    pub fn commands(&self) -> Vec<ShellCommand> {
        self.commands.borrow().clone()
    }

    pub fn scripts(&self) -> Vec<String> {
        self.commands
            .borrow()
            .iter()
            .map(|command| command.script.clone())
            .collect()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl CommandRunner for RecordingShell {
    fn run(&self, command: &ShellCommand) -> Result<()> {
        self.commands.borrow_mut().push(command.clone());
        match &self.fail_on {
            Some(pattern) if command.script.contains(pattern.as_str()) => {
                Err(TcoreError::ExecutionFailed {
                    command: command.script.clone(),
                })
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell() -> SystemShell {
        let mut config = Config::with_install_dir("/home/dev/.theCore");
        config.nix_profile_script = PathBuf::from("/home/dev/.nix-profile/etc/profile.d/nix.sh");
        SystemShell::new(&config)
    }

    #[test]
    fn plain_commands_are_not_wrapped() {
        let wrapped = shell().wrap(&ShellCommand::plain("make")).expect("wrap");
        assert_eq!(wrapped, "make");
    }

    #[test]
    fn profile_commands_source_nix_first() {
        let wrapped = shell()
            .wrap(&ShellCommand::profile("nix-env -i git"))
            .expect("wrap");
        assert_eq!(
            wrapped,
            ". /home/dev/.nix-profile/etc/profile.d/nix.sh && nix-env -i git"
        );
    }

    #[test]
    fn shell_commands_enter_nix_shell_bound_to_sources() {
        let wrapped = shell()
            .wrap(&ShellCommand::shell("cmake -DCORE_DIR=/x ."))
            .expect("wrap");
        assert!(
            wrapped.starts_with(". /home/dev/.nix-profile/etc/profile.d/nix.sh && nix-shell --run '"),
            "{wrapped}"
        );
        assert!(wrapped.contains("cmake -DCORE_DIR=/x ."), "{wrapped}");
        assert!(wrapped.ends_with(" /home/dev/.theCore/theCore"), "{wrapped}");
    }

    #[test]
    fn system_shell_reports_non_zero_exit() {
        let err = shell()
            .run(&ShellCommand::plain("exit 3"))
            .expect_err("must fail");
        assert!(matches!(err, TcoreError::ExecutionFailed { ref command } if command == "exit 3"));
    }

    #[test]
    fn system_shell_honours_working_directory() {
        let dir = tempfile::tempdir().expect("temp dir");
        shell()
            .run(&ShellCommand::plain("touch marker").in_dir(dir.path()))
            .expect("touch succeeds");
        assert!(dir.path().join("marker").is_file());
    }

    #[test]
    fn recording_shell_fails_on_pattern() {
        let runner = RecordingShell::failing_on("git clone");
        runner.run(&ShellCommand::profile("nix-env -i git")).expect("ok");
        assert!(runner.run(&ShellCommand::profile("git clone a b")).is_err());
        assert_eq!(runner.scripts().len(), 2);
    }

    #[test]
    fn nul_bytes_cannot_be_quoted() {
        let err = quote("a\0b").expect_err("NUL rejected");
        assert!(matches!(err, TcoreError::UnquotableWord { ref word } if word == "a\0b"));
    }
}
