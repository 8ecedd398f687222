//! What the process does once a token has been issued.

use std::io::Write;
use std::process::Command;

use anyhow::{Context, Result};
use tokentool_core::Secret;

/// The final step of an invocation.
pub enum TerminalAction {
    /// Write the rendered output to stdout and exit 0.
    Print(String),
    /// Hand the process over to another program.
    Exec { program: String, args: Vec<String> },
}

// The curl arguments carry the token.
impl std::fmt::Debug for TerminalAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Print(output) => f.debug_tuple("Print").field(&output.len()).finish(),
            Self::Exec { program, args } => f
                .debug_struct("Exec")
                .field("program", program)
                .field("args", &"[REDACTED]")
                .field("argc", &args.len())
                .finish(),
        }
    }
}

impl TerminalAction {
    /// `curl` with the token headers in front of the (substituted) user args.
    pub fn curl(program: &str, token: &Secret, args: Vec<String>) -> Self {
        let mut full = Vec::with_capacity(args.len() + 4);
        full.push("-H".to_string());
        full.push(format!("X-Auth-Token: {}", token.expose()));
        full.push("-H".to_string());
        full.push("Content-Type: application/json".to_string());
        full.extend(args);

        Self::Exec {
            program: program.to_string(),
            args: full,
        }
    }

    /// Perform the action. Returns the exit code for the process.
    pub fn run(self) -> Result<i32> {
        match self {
            Self::Print(output) => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(output.as_bytes())?;
                stdout.flush()?;
                Ok(0)
            }
            Self::Exec { program, args } => {
                tracing::debug!(%program, argc = args.len(), "starting downstream command");
                let mut command = Command::new(&program);
                command.args(&args);
                replace_process(command, &program)
            }
        }
    }
}

#[cfg(unix)]
fn replace_process(mut command: Command, program: &str) -> Result<i32> {
    use std::os::unix::process::CommandExt;

    // Only returns on failure.
    let err = command.exec();
    Err(err).with_context(|| format!("Failed to execute {}", program))
}

#[cfg(not(unix))]
fn replace_process(mut command: Command, program: &str) -> Result<i32> {
    let status = command
        .status()
        .with_context(|| format!("Failed to execute {}", program))?;
    Ok(status.code().unwrap_or(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curl_headers_come_first() {
        let action = TerminalAction::curl(
            "curl",
            &Secret::new("tok123"),
            vec!["-X".to_string(), "GET".to_string(), "https://compute.example".to_string()],
        );

        match action {
            TerminalAction::Exec { program, args } => {
                assert_eq!(program, "curl");
                assert_eq!(
                    args,
                    vec![
                        "-H",
                        "X-Auth-Token: tok123",
                        "-H",
                        "Content-Type: application/json",
                        "-X",
                        "GET",
                        "https://compute.example",
                    ]
                );
            }
            other => panic!("expected Exec, got {:?}", other),
        }
    }

    #[test]
    fn test_curl_without_user_args() {
        let action = TerminalAction::curl("/usr/local/bin/curl", &Secret::new("t"), Vec::new());
        assert!(matches!(
            action,
            TerminalAction::Exec { ref program, ref args }
                if program == "/usr/local/bin/curl" && args.len() == 4
        ));
    }

    #[test]
    fn test_debug_hides_token() {
        let action = TerminalAction::curl("curl", &Secret::new("tok123"), Vec::new());
        assert!(!format!("{:?}", action).contains("tok123"));
    }

    #[test]
    fn test_missing_program_is_an_error() {
        let action = TerminalAction::Exec {
            program: "/nonexistent/token-tool-test-binary".to_string(),
            args: Vec::new(),
        };
        let err = action.run().unwrap_err();
        assert!(err.to_string().contains("Failed to execute"));
    }
}
