use std::ffi::OsStr;
use std::fmt::Display;
use std::process::{ExitStatus, Stdio};
use std::str::FromStr;
use tokio::process::Command as BaseCommand;

use thiserror::Error;

pub use shell_words::ParseError as CommandLineParseError;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("failed to run command: {command}")]
    Run {
        command: String,
        #[source]
        error: tokio::io::Error,
    },

    #[error("command failed: {command}\n{stderr}")]
    Failure { command: String, stderr: String },
}

/// A parsed command line (program plus leading arguments), the form commands
/// take in configuration, e.g. `kubectl = "kubectl --context dev"`.
///
/// Each invocation builds a fresh [`Command`] from the prototype.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: String,
    args: Vec<String>,
}

impl CommandLine {
    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

impl FromStr for CommandLine {
    type Err = shell_words::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = shell_words::split(s)?;
        if words.is_empty() {
            Ok(CommandLine {
                program: String::new(),
                args: Vec::new(),
            })
        } else {
            let args = words.split_off(1);
            let program = words.remove(0);
            Ok(CommandLine { program, args })
        }
    }
}

impl Display for CommandLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.command().fmt(f)
    }
}

#[derive(Debug)]
pub struct Command {
    cmd: BaseCommand,
}

impl Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cmd = self.cmd.as_std();
        let program = cmd.get_program().to_string_lossy();
        let args = cmd
            .get_args()
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");
        if args.is_empty() {
            write!(f, "{program}",)
        } else {
            write!(f, "{program} {args}",)
        }
    }
}

impl Command {
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            cmd: BaseCommand::new(program),
        }
    }

    pub fn arg<S: AsRef<OsStr>>(&mut self, arg: S) -> &mut Self {
        self.cmd.arg(arg);
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.cmd.args(args);
        self
    }

    /// Run to completion, capturing stdout. A non-zero exit is an error
    /// carrying whatever the program wrote to stderr.
    pub async fn output(&mut self) -> Result<Vec<u8>, CommandError> {
        let output = self
            .cmd
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|error| CommandError::Run {
                command: self.to_string(),
                error,
            })?;

        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(CommandError::Failure {
                command: self.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr)
                    .trim_end()
                    .to_string(),
            })
        }
    }

    /// Run to completion for commands whose output is uninteresting.
    pub async fn run(&mut self) -> Result<ExitStatus, CommandError> {
        let output = self
            .cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|error| CommandError::Run {
                command: self.to_string(),
                error,
            })?
            .wait_with_output()
            .await
            .map_err(|error| CommandError::Run {
                command: self.to_string(),
                error,
            })?;

        if output.status.success() {
            Ok(output.status)
        } else {
            Err(CommandError::Failure {
                command: self.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr)
                    .trim_end()
                    .to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_command() {
        assert_eq!(Command::new("kubectl").to_string(), "kubectl")
    }

    #[test]
    fn test_get_command_with_one_arg() {
        assert_eq!(Command::new("kubectl").arg("get").to_string(), "kubectl get")
    }

    #[test]
    fn test_get_command_with_two_args() {
        assert_eq!(
            Command::new("kubectl").arg("get").arg("all-runs").to_string(),
            "kubectl get all-runs"
        )
    }

    #[test]
    fn test_command_line_program_only() {
        let line: CommandLine = "kubectl".parse().unwrap();
        assert_eq!(line.program(), "kubectl");
        assert_eq!(line.command().to_string(), "kubectl");
    }

    #[test]
    fn test_command_line_with_args() {
        let line: CommandLine = "kubectl --context dev".parse().unwrap();
        assert_eq!(line.program(), "kubectl");
        assert_eq!(line.command().to_string(), "kubectl --context dev");
    }

    #[test]
    fn test_command_line_quoted_arg() {
        let line: CommandLine = r#"kubectl --context "my dev""#.parse().unwrap();
        assert_eq!(line.command().to_string(), "kubectl --context my dev");
    }

    #[tokio::test]
    async fn test_output_captures_stdout() {
        let stdout = Command::new("echo").arg("hi").output().await.unwrap();
        assert_eq!(String::from_utf8_lossy(&stdout), "hi\n");
    }

    #[tokio::test]
    async fn test_failure_carries_stderr() {
        let error = Command::new("sh")
            .args(["-c", "echo nope >&2; exit 2"])
            .output()
            .await
            .unwrap_err();
        match error {
            CommandError::Failure { stderr, .. } => assert_eq!(stderr, "nope"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
