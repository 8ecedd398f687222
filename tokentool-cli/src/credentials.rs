//! Password acquisition.
//!
//! Password authentication needs a password; when none was given by flag or
//! `OS_PASSWORD`, it is looked up in the OS keyring (service `openstack`,
//! account = username) and finally read from stdin, with a prompt on stderr
//! unless `--password-stdin` was given. Typed passwords are not echoed when
//! stdin is a terminal.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use tokentool_core::{CredentialInput, Secret, SecretStore};

/// How to read the password when nothing else provides one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSource {
    /// Print a prompt, then read a line.
    Prompt,
    /// Read a line without prompting (`--password-stdin`).
    Stdin,
}

/// Keyring account a password is stored under.
pub fn keyring_account(credentials: &CredentialInput) -> Option<&str> {
    [&credentials.username, &credentials.user_id]
        .into_iter()
        .filter_map(|value| value.as_deref())
        .find(|value| !value.is_empty())
}

/// Fill in `credentials.password` if the password method needs one.
///
/// Application credentials, and inputs that already carry a password, are
/// left untouched.
pub async fn fill_password<R: BufRead, W: Write>(
    credentials: &mut CredentialInput,
    store: Option<&dyn SecretStore>,
    source: LineSource,
    input: &mut R,
    prompt: &mut W,
) -> Result<()> {
    if credentials.uses_application_credential() {
        return Ok(());
    }
    if credentials.password.as_ref().is_some_and(|p| !p.is_empty()) {
        return Ok(());
    }

    let account = keyring_account(credentials).map(str::to_owned);

    if let (Some(store), Some(account)) = (store, account.as_deref()) {
        match store.get(account).await {
            Ok(Some(secret)) if !secret.is_empty() => {
                tracing::debug!(account, "using password from keyring");
                credentials.password = Some(secret);
                return Ok(());
            }
            Ok(_) => tracing::debug!(account, "no password in keyring"),
            Err(e) => tracing::warn!(account, "keyring lookup failed: {}", e),
        }
    }

    credentials.password = match source {
        LineSource::Prompt => {
            let message = match account.as_deref() {
                Some(account) => format!("Enter password for user {}: ", account),
                None => "Enter password: ".to_string(),
            };
            prompt_password(&message, input, prompt)?
        }
        LineSource::Stdin => read_password_line(input)?,
    };
    Ok(())
}

/// Write `message` to `prompt`, then read the answer with terminal echo off.
pub fn prompt_password<R: BufRead, W: Write>(
    message: &str,
    input: &mut R,
    prompt: &mut W,
) -> Result<Option<Secret>> {
    write!(prompt, "{}", message)?;
    prompt.flush()?;

    let _echo = hide_stdin_echo();
    read_password_line(input)
}

/// Read one line, without its line ending. `None` at end of input.
pub fn read_password_line<R: BufRead>(input: &mut R) -> Result<Option<Secret>> {
    let mut line = String::new();
    let read = input
        .read_line(&mut line)
        .context("Failed to read password")?;
    if read == 0 {
        return Ok(None);
    }

    let len = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(len);
    Ok(Some(Secret::from(line)))
}

#[cfg(unix)]
fn hide_stdin_echo() -> Option<EchoGuard> {
    use std::os::fd::AsFd;

    EchoGuard::new(std::io::stdin().as_fd())
}

#[cfg(not(unix))]
fn hide_stdin_echo() -> Option<()> {
    None
}

/// Terminal echo switched off until dropped. The newline is still echoed.
#[cfg(unix)]
struct EchoGuard {
    fd: std::os::fd::RawFd,
    saved: libc::termios,
}

#[cfg(unix)]
impl EchoGuard {
    /// `None` when `fd` is not a terminal or its settings cannot be changed.
    fn new(fd: std::os::fd::BorrowedFd<'_>) -> Option<Self> {
        use std::io::IsTerminal;
        use std::os::fd::AsRawFd;

        if !fd.is_terminal() {
            return None;
        }
        let fd = fd.as_raw_fd();

        let mut saved = std::mem::MaybeUninit::<libc::termios>::uninit();
        // SAFETY: `fd` is an open terminal and `saved` is written before use.
        let saved = unsafe {
            if libc::tcgetattr(fd, saved.as_mut_ptr()) != 0 {
                return None;
            }
            saved.assume_init()
        };

        let mut quiet = saved;
        quiet.c_lflag &= !libc::ECHO;
        quiet.c_lflag |= libc::ECHONL;
        // SAFETY: `quiet` is a valid termios copied from the terminal.
        if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &quiet) } != 0 {
            tracing::debug!("could not turn off terminal echo");
            return None;
        }

        Some(Self { fd, saved })
    }
}

#[cfg(unix)]
impl Drop for EchoGuard {
    fn drop(&mut self) {
        // SAFETY: restores the settings read in `new` on the same descriptor.
        unsafe {
            libc::tcsetattr(self.fd, libc::TCSANOW, &self.saved);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::io::Cursor;
    use tokentool_core::StoreError;

    /// Keyring stand-in holding at most one user's password.
    struct OneEntry(Option<(&'static str, Secret)>);

    #[async_trait]
    impl SecretStore for OneEntry {
        async fn get(&self, key: &str) -> Result<Option<Secret>, StoreError> {
            Ok(self
                .0
                .as_ref()
                .filter(|(account, _)| *account == key)
                .map(|(_, secret)| secret.clone()))
        }

        async fn set(&self, _key: &str, _secret: &Secret) -> Result<(), StoreError> {
            Ok(())
        }

        async fn delete(&self, _key: &str) -> Result<(), StoreError> {
            Ok(())
        }
    }

    /// Keyring that cannot be read.
    struct Locked;

    #[async_trait]
    impl SecretStore for Locked {
        async fn get(&self, key: &str) -> Result<Option<Secret>, StoreError> {
            Err(StoreError::AccessDenied {
                key: key.to_string(),
            })
        }

        async fn set(&self, key: &str, _secret: &Secret) -> Result<(), StoreError> {
            Err(StoreError::AccessDenied {
                key: key.to_string(),
            })
        }

        async fn delete(&self, key: &str) -> Result<(), StoreError> {
            Err(StoreError::AccessDenied {
                key: key.to_string(),
            })
        }
    }

    fn alice() -> CredentialInput {
        CredentialInput {
            username: Some("alice".to_string()),
            user_domain_name: Some("acme".to_string()),
            ..Default::default()
        }
    }

    async fn fill(
        credentials: &mut CredentialInput,
        store: Option<&dyn SecretStore>,
        source: LineSource,
        stdin: &str,
    ) -> String {
        let mut input = Cursor::new(stdin.as_bytes().to_vec());
        let mut prompt = Vec::new();
        fill_password(credentials, store, source, &mut input, &mut prompt)
            .await
            .unwrap();
        String::from_utf8(prompt).unwrap()
    }

    #[tokio::test]
    async fn test_given_password_is_kept() {
        let mut credentials = CredentialInput {
            password: Some(Secret::new("pw")),
            ..alice()
        };
        let prompt = fill(&mut credentials, None, LineSource::Prompt, "other\n").await;
        assert_eq!(credentials.password.unwrap().expose(), "pw");
        assert!(prompt.is_empty());
    }

    #[tokio::test]
    async fn test_keyring_password_is_used() {
        let store = OneEntry(Some(("alice", Secret::new("from-keyring"))));

        let mut credentials = alice();
        let prompt = fill(&mut credentials, Some(&store), LineSource::Prompt, "").await;
        assert_eq!(credentials.password.unwrap().expose(), "from-keyring");
        assert!(prompt.is_empty());
    }

    #[tokio::test]
    async fn test_prompt_when_keyring_has_nothing() {
        let store = OneEntry(Some(("bob", Secret::new("not-alices"))));
        let mut credentials = alice();
        let prompt = fill(&mut credentials, Some(&store), LineSource::Prompt, "typed\r\n").await;
        assert_eq!(prompt, "Enter password for user alice: ");
        assert_eq!(credentials.password.unwrap().expose(), "typed");
    }

    #[tokio::test]
    async fn test_unreadable_keyring_falls_back_to_stdin() {
        let mut credentials = alice();
        let prompt = fill(&mut credentials, Some(&Locked), LineSource::Stdin, "piped\n").await;
        assert!(prompt.is_empty());
        assert_eq!(credentials.password.unwrap().expose(), "piped");
    }

    #[test]
    fn test_prompt_password_without_user() {
        let mut input = Cursor::new(b"s3cret\n".to_vec());
        let mut prompt = Vec::new();
        let password = prompt_password("Enter password: ", &mut input, &mut prompt).unwrap();
        assert_eq!(prompt, b"Enter password: ");
        assert_eq!(password.unwrap().expose(), "s3cret");
    }

    #[cfg(unix)]
    #[test]
    fn test_echo_left_alone_when_not_a_terminal() {
        use std::os::fd::AsFd;

        let file = tempfile::tempfile().unwrap();
        assert!(EchoGuard::new(file.as_fd()).is_none());
    }

    #[tokio::test]
    async fn test_password_stdin_does_not_prompt() {
        let mut credentials = alice();
        let prompt = fill(&mut credentials, None, LineSource::Stdin, "piped\nsecond line\n").await;
        assert!(prompt.is_empty());
        assert_eq!(credentials.password.unwrap().expose(), "piped");
    }

    #[tokio::test]
    async fn test_end_of_input_leaves_password_unset() {
        let mut credentials = alice();
        fill(&mut credentials, None, LineSource::Stdin, "").await;
        assert!(credentials.password.is_none());
    }

    #[tokio::test]
    async fn test_application_credential_needs_no_password() {
        let mut credentials = CredentialInput {
            application_credential_id: Some("ac1".to_string()),
            ..Default::default()
        };
        let prompt = fill(&mut credentials, None, LineSource::Prompt, "typed\n").await;
        assert!(prompt.is_empty());
        assert!(credentials.password.is_none());
    }

    #[test]
    fn test_keyring_account_prefers_username() {
        assert_eq!(keyring_account(&alice()), Some("alice"));
        let by_id = CredentialInput {
            user_id: Some("u1".to_string()),
            ..Default::default()
        };
        assert_eq!(keyring_account(&by_id), Some("u1"));
        assert_eq!(keyring_account(&CredentialInput::default()), None);
    }
}
