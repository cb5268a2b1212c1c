//! Function adapter abstractions.
//!
//! An adapter turns one inbound [`Message`] into zero or more outbound
//! messages. Transports only see the uniform [`AdapterError`] signal and
//! never learn how the function is loaded or run.

mod command;

pub use self::command::CommandAdapter;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use riff_proto::Message;
use thiserror::Error;

/// Failure reported by a function invocation.
#[derive(Error, Debug)]
pub enum AdapterError {
    /// The function reported a failure.
    #[error("{0}")]
    Failed(String),

    /// The function did not finish in time.
    #[error("function timed out after {0:?}")]
    Timeout(Duration),

    /// The function process exited unsuccessfully.
    #[error("function exited with status {code:?}: {stderr}")]
    Exited { code: Option<i32>, stderr: String },

    /// The function process could not be started or talked to.
    #[error("failed to run function: {0}")]
    Io(#[from] std::io::Error),
}

impl AdapterError {
    /// Creates a failure from any displayable message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Invokes a user function for one message.
#[async_trait]
pub trait FunctionAdapter: Send + Sync + std::fmt::Debug {
    /// Runs the function on `message`.
    ///
    /// Returning an empty vector is valid and means the function produced
    /// nothing for this input.
    async fn invoke(&self, message: Message) -> Result<Vec<Message>, AdapterError>;
}

/// Adapter backed by an in-process async closure.
pub struct FnAdapter<F> {
    function: F,
}

impl<F, Fut> FnAdapter<F>
where
    F: Fn(Message) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<Message>, AdapterError>> + Send,
{
    pub const fn new(function: F) -> Self {
        Self { function }
    }
}

impl<F> std::fmt::Debug for FnAdapter<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnAdapter").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, Fut> FunctionAdapter for FnAdapter<F>
where
    F: Fn(Message) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<Message>, AdapterError>> + Send,
{
    async fn invoke(&self, message: Message) -> Result<Vec<Message>, AdapterError> {
        (self.function)(message).await
    }
}
