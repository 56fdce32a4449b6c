//! Process execution shared by the xcodebuild driver, the tool context and
//! project loading.
//!
//! Everything that shells out goes through [`CommandExecutor`], so tests can
//! replay canned output without a Mac.
//!
//! ## Error Messages
//!
//! A tool that cannot be started produces [`XcError::Build`] with a hint on
//! how to install it. A tool that exits non-zero produces
//! [`XcError::Execution`] carrying the exit code and every captured line.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use crate::types::{Result, XcError};

/// A program plus arguments, environment and working directory.
///
/// # Example
///
/// ```
/// use xcforge_sdk::builders::CommandLine;
///
/// let cmd = CommandLine::new("xcodebuild").arg("-list").arg("-project").arg("My App.xcodeproj");
/// assert_eq!(cmd.to_string(), "xcodebuild -list -project 'My App.xcodeproj'");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub current_dir: Option<PathBuf>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
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

    /// Appends a path argument.
    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().into_owned())
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).envs(&self.env);
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&shell_quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        Ok(())
    }
}

/// Quotes a word for display in a POSIX shell.
pub fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// Runs external tools, streaming their output one line at a time.
pub trait CommandExecutor {
    /// Runs `command`, calling `on_line` for every output line as it arrives.
    ///
    /// Returns every captured line on success.
    ///
    /// # Errors
    ///
    /// [`XcError::Execution`] when the process exits non-zero, and
    /// [`XcError::Build`] when it cannot be started at all.
    fn execute(&self, command: &CommandLine, on_line: &mut dyn FnMut(&str)) -> Result<Vec<String>>;

    /// Runs `command` and only collects its output.
    fn capture(&self, command: &CommandLine) -> Result<Vec<String>> {
        self.execute(command, &mut |_| {})
    }
}

/// Executes commands with [`std::process::Command`].
///
/// Standard output and standard error are read on one thread each and merged
/// into a single stream in arrival order. Lines that are not valid UTF-8 are
/// decoded lossily.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor {
    verbose: bool,
}

impl SystemExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Echoes every command before running it.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

impl CommandExecutor for SystemExecutor {
    fn execute(&self, command: &CommandLine, on_line: &mut dyn FnMut(&str)) -> Result<Vec<String>> {
        if self.verbose {
            println!("  Running: {}", command);
        }
        tracing::debug!(%command, "spawning");

        let mut child = command
            .to_command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                XcError::Build(format!(
                    "Failed to start {}.\n\n\
                     Error: {}\n\n\
                     Ensure the tool is installed and available on PATH \
                     (xcode-select --install provides xcodebuild, xcrun and plutil).",
                    command.program, e
                ))
            })?;

        let (sender, receiver) = mpsc::channel();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(forward_lines(stdout, sender.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(forward_lines(stderr, sender.clone()));
        }
        drop(sender);

        let mut output = Vec::new();
        for line in receiver {
            on_line(&line);
            output.push(line);
        }
        for reader in readers {
            if reader.join().is_err() {
                tracing::warn!(%command, "output reader thread panicked");
            }
        }

        let status = child.wait()?;
        if !status.success() {
            return Err(XcError::Execution {
                command: command.to_string(),
                exit_code: status.code(),
                output,
            });
        }
        Ok(output)
    }
}

/// Sends every line of `pipe` to `lines` until end of file.
fn forward_lines<R>(pipe: R, lines: Sender<String>) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        for chunk in BufReader::new(pipe).split(b'\n') {
            let mut bytes = match chunk {
                Ok(bytes) => bytes,
                Err(err) => {
                    tracing::warn!(error = %err, "stopped reading command output");
                    break;
                }
            };
            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }
            if lines.send(String::from_utf8_lossy(&bytes).into_owned()).is_err() {
                break;
            }
        }
    })
}

/// Checks that `path` exists, with a hint naming what was expected.
pub fn require_path(path: &Path, what: &str) -> Result<()> {
    if !path.exists() {
        return Err(XcError::Build(format!(
            "{what} not found at {}\n\n\
             Check the path in xcforge.toml or pass it on the command line.",
            path.display()
        )));
    }
    Ok(())
}
