use anyhow::{bail, Context as _};
use std::{
    process::{Command, Stdio},
    time::{Duration, Instant},
};

/// Hint appended to every authentication failure
pub const LOGIN_HINT: &str = "run `gcloud auth login` first";

/// Something that can hand out a bearer token for the role catalog
pub trait CredentialSource {
    fn token(&self) -> anyhow::Result<String>;
}

/// A token that was supplied up front, eg. via `GCP_ACCESS_TOKEN`
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl CredentialSource for StaticToken {
    fn token(&self) -> anyhow::Result<String> {
        let token = self.0.trim();
        if token.is_empty() {
            bail!("the supplied access token is empty, {LOGIN_HINT}");
        }

        Ok(token.to_owned())
    }
}

/// Obtains a token by running an external command and capturing its stdout
pub struct CommandCredentials {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandCredentials {
    pub fn new(
        program: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
        timeout: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            timeout,
        }
    }

    /// `gcloud auth print-access-token`
    pub fn gcloud(timeout: Duration) -> Self {
        Self::new("gcloud", ["auth", "print-access-token"], timeout)
    }

    fn display(&self) -> String {
        let mut s = self.program.clone();
        for arg in &self.args {
            s.push(' ');
            s.push_str(arg);
        }
        s
    }
}

/// Reads a child's pipe to completion on its own thread, so that a chatty
/// child can't fill the pipe buffer and stall while we wait on it
fn drain<R>(pipe: Option<R>) -> std::thread::JoinHandle<std::io::Result<String>>
where
    R: std::io::Read + Send + 'static,
{
    std::thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_string(&mut buf)?;
        }
        Ok(buf)
    })
}

impl CredentialSource for CommandCredentials {
    fn token(&self) -> anyhow::Result<String> {
        let cmd_str = self.display();
        log::debug!("obtaining access token via '{cmd_str}'");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn '{cmd_str}', {LOGIN_HINT}"))?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child
                .try_wait()
                .with_context(|| format!("failed to wait on '{cmd_str}'"))?
            {
                break status;
            }

            if started.elapsed() >= self.timeout {
                // The child is abandoned either way, a kill failure just means it
                // exited in the meantime. The reader threads are detached, a
                // grandchild may still hold the pipes open.
                let _ = child.kill();
                let _ = child.wait();
                bail!(
                    "'{cmd_str}' did not finish within {:?}, {LOGIN_HINT}",
                    self.timeout
                );
            }

            std::thread::sleep(Duration::from_millis(20));
        };

        let stdout = stdout
            .join()
            .map_err(|_panic| anyhow::anyhow!("stdout reader for '{cmd_str}' panicked"))?
            .with_context(|| format!("'{cmd_str}' gave non-utf8 output"))?;
        // stderr is only used to decorate the error message
        let stderr = stderr
            .join()
            .ok()
            .and_then(Result::ok)
            .unwrap_or_default();

        if !status.success() {
            bail!(
                "could not get an access token, '{cmd_str}' failed with {status}: {}, {LOGIN_HINT}",
                stderr.trim()
            );
        }

        let token = stdout.trim();
        if token.is_empty() {
            bail!("'{cmd_str}' succeeded but printed no token, {LOGIN_HINT}");
        }

        Ok(token.to_owned())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn static_token_is_trimmed() {
        let src = StaticToken::new("  ya29.token\n");
        assert_eq!(src.token().unwrap(), "ya29.token");
    }

    #[test]
    fn empty_static_token_fails() {
        let err = StaticToken::new(" ").token().unwrap_err();
        assert!(err.to_string().contains(LOGIN_HINT));
    }

    #[cfg(unix)]
    #[test]
    fn captures_stdout() {
        let src = CommandCredentials::new(
            "sh",
            ["-c", "echo ya29.from-command"],
            Duration::from_secs(10),
        );
        assert_eq!(src.token().unwrap(), "ya29.from-command");
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_fatal() {
        let src = CommandCredentials::new(
            "sh",
            ["-c", "echo 'not logged in' >&2; exit 1"],
            Duration::from_secs(10),
        );
        let err = format!("{:#}", src.token().unwrap_err());
        assert!(err.contains("not logged in"), "{err}");
        assert!(err.contains(LOGIN_HINT), "{err}");
    }

    #[cfg(unix)]
    #[test]
    fn output_larger_than_a_pipe_buffer() {
        let src = CommandCredentials::new(
            "sh",
            ["-c", "head -c 200000 /dev/zero | tr '\\0' a; head -c 100000 /dev/zero >&2"],
            Duration::from_secs(10),
        );

        let token = src.token().unwrap();
        assert_eq!(token.len(), 200_000);
        assert!(token.bytes().all(|b| b == b'a'));
    }

    #[cfg(unix)]
    #[test]
    fn empty_output_is_fatal() {
        let src = CommandCredentials::new("sh", ["-c", "true"], Duration::from_secs(10));
        assert!(src.token().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn times_out() {
        let src = CommandCredentials::new("sh", ["-c", "sleep 5"], Duration::from_millis(100));
        let err = src.token().unwrap_err().to_string();
        assert!(err.contains("did not finish"), "{err}");
    }

    #[test]
    fn missing_program_is_fatal() {
        let src = CommandCredentials::new(
            "definitely-not-a-real-credential-helper",
            Vec::<String>::new(),
            Duration::from_secs(1),
        );
        assert!(src.token().is_err());
    }
}
