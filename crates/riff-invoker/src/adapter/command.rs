//! Adapter that runs a local command per invocation.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use riff_proto::{header, Message, MessageBuilder};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{AdapterError, FunctionAdapter};
use crate::config::{ConfigError, FunctionConfig};

/// Runs a command for every message.
///
/// The payload is written to the command's stdin and its stdout becomes the
/// payload of the single reply, tagged `Content-Type: text/plain`. The
/// process is killed if the invocation is dropped or times out.
#[derive(Debug, Clone)]
pub struct CommandAdapter {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandAdapter {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    /// Builds the adapter described by the `[function]` section.
    pub fn from_config(config: &FunctionConfig) -> Result<Self, ConfigError> {
        let program = config
            .command
            .as_ref()
            .ok_or_else(|| ConfigError::Invalid("function.command is not set".to_owned()))?;
        Ok(Self::new(program, config.args.clone(), config.timeout))
    }

    async fn run(&self, payload: &[u8]) -> Result<Vec<u8>, AdapterError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take();
        let write = async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            match stdin.write_all(payload).await {
                // The command may exit without reading its input.
                Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
                result => result,
            }
        };

        let (written, output) = tokio::join!(write, child.wait_with_output());
        let output = output?;
        written?;

        if !output.status.success() {
            return Err(AdapterError::Exited {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl FunctionAdapter for CommandAdapter {
    async fn invoke(&self, message: Message) -> Result<Vec<Message>, AdapterError> {
        debug!(
            program = %self.program.display(),
            payload_len = message.payload().len(),
            "Running function command"
        );

        let stdout = tokio::time::timeout(self.timeout, self.run(message.payload()))
            .await
            .map_err(|_| AdapterError::Timeout(self.timeout))??;

        let reply = MessageBuilder::new()
            .add_header(header::CONTENT_TYPE, ["text/plain"])
            .map_err(|e| AdapterError::failed(e.to_string()))?
            .payload(stdout)
            .build();
        Ok(vec![reply])
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str, timeout: Duration) -> CommandAdapter {
        CommandAdapter::new("sh", vec!["-c".to_owned(), script.to_owned()], timeout)
    }

    #[tokio::test]
    async fn stdout_becomes_reply() {
        let adapter = CommandAdapter::new("cat", Vec::new(), Duration::from_secs(5));
        let input = MessageBuilder::new().payload("hello riff").build();

        let outputs = adapter.invoke(input).await.unwrap();

        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].payload().as_ref(), b"hello riff");
        assert_eq!(
            outputs[0].headers().get_value("content-type"),
            Some("text/plain")
        );
    }

    #[tokio::test]
    async fn command_ignoring_stdin_still_replies() {
        let adapter = sh("echo ready", Duration::from_secs(5));
        let input = MessageBuilder::new().payload(vec![b'x'; 256 * 1024]).build();

        let outputs = adapter.invoke(input).await.unwrap();
        assert_eq!(outputs[0].payload().as_ref(), b"ready\n");
    }

    #[tokio::test]
    async fn non_zero_exit_carries_stderr() {
        let adapter = sh("echo broken >&2; exit 3", Duration::from_secs(5));

        let err = adapter.invoke(Message::default()).await.unwrap_err();
        match err {
            AdapterError::Exited { code, stderr } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "broken");
            }
            other => panic!("expected exit error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let adapter = sh("sleep 5", Duration::from_millis(100));

        let err = adapter.invoke(Message::default()).await.unwrap_err();
        assert!(matches!(err, AdapterError::Timeout(d) if d == Duration::from_millis(100)));
    }

    #[tokio::test]
    async fn missing_program_is_io_error() {
        let adapter =
            CommandAdapter::new("/nonexistent/riff-function", Vec::new(), Duration::from_secs(1));
        let err = adapter.invoke(Message::default()).await.unwrap_err();
        assert!(matches!(err, AdapterError::Io(_)));
    }
}
