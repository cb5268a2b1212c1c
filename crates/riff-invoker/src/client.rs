//! Client end of the invocation stream.
//!
//! A [`Call`] models one bidirectional session as two independent halves:
//! a request sender that can be closed on its own, and a reply receiver that
//! yields whatever the function produces, in whatever number.

use std::time::Duration;

use riff_proto::pb;
use riff_proto::service::message_function_client::MessageFunctionClient;
use riff_proto::Message;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::transport::{Channel, Endpoint};
use tonic::Streaming;
use tracing::{debug, info, warn};

use crate::backoff::Backoff;
use crate::error::InvokerError;

const DEFAULT_STREAM_BUFFER: usize = 16;

/// Lifecycle of a [`Call`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    /// Both directions are open.
    Open,
    /// The caller closed its sending half; replies may still arrive.
    HalfClosed,
    /// The function host ended the reply stream successfully.
    Completed,
    /// The call ended with an error status.
    Failed,
    /// The caller abandoned the call.
    Cancelled,
}

impl CallState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Connection to a function host.
#[derive(Debug, Clone)]
pub struct InvocationClient {
    inner: MessageFunctionClient<Channel>,
    stream_buffer: usize,
}

impl InvocationClient {
    /// Dials `endpoint`, retrying on the `backoff` schedule.
    ///
    /// Each attempt is bounded by `connect_timeout`. The last failure is
    /// returned once the schedule is exhausted.
    pub async fn connect(
        endpoint: impl Into<String>,
        connect_timeout: Duration,
        backoff: Backoff,
    ) -> Result<Self, InvokerError> {
        let endpoint = Endpoint::from_shared(endpoint.into())?.connect_timeout(connect_timeout);
        let mut delays = backoff.delays();
        let mut attempts = 0_u32;

        loop {
            attempts += 1;
            let err = match tokio::time::timeout(connect_timeout, endpoint.connect()).await {
                Ok(Ok(channel)) => {
                    info!(endpoint = %endpoint.uri(), attempts, "Connected to function host");
                    return Ok(Self::new(channel));
                }
                Ok(Err(e)) => InvokerError::Transport(e),
                Err(_) => InvokerError::ConnectTimeout(attempts),
            };

            match delays.next() {
                Some(delay) => {
                    warn!(
                        endpoint = %endpoint.uri(),
                        attempt = attempts,
                        max_retries = backoff.max_retries(),
                        delay_ms = delay.as_millis(),
                        error = %err,
                        "Connection failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => return Err(err),
            }
        }
    }

    /// Wraps an established channel.
    #[must_use]
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: MessageFunctionClient::new(channel),
            stream_buffer: DEFAULT_STREAM_BUFFER,
        }
    }

    /// Sets how many requests may be queued before [`Call::send`] waits.
    #[must_use]
    pub fn with_stream_buffer(mut self, stream_buffer: usize) -> Self {
        self.stream_buffer = stream_buffer.max(1);
        self
    }

    /// Limits the size of encoded and decoded messages.
    #[must_use]
    pub fn with_max_message_size(mut self, limit: usize) -> Self {
        self.inner = self
            .inner
            .max_decoding_message_size(limit)
            .max_encoding_message_size(limit);
        self
    }

    /// Opens a new call.
    pub async fn open(&mut self) -> Result<Call, InvokerError> {
        let (requests, rx) = mpsc::channel(self.stream_buffer);
        let response = self.inner.call(ReceiverStream::new(rx)).await?;
        debug!("Call opened");

        Ok(Call {
            requests: Some(requests),
            replies: Some(response.into_inner()),
            state: CallState::Open,
        })
    }

    /// Sends one message, closes the sending half and collects every reply.
    pub async fn invoke_once(&mut self, message: Message) -> Result<Vec<Message>, InvokerError> {
        let mut call = self.open().await?;
        call.send(message).await?;
        call.close_send();
        call.collect().await
    }
}

/// One open invocation session.
#[derive(Debug)]
pub struct Call {
    requests: Option<mpsc::Sender<pb::Message>>,
    replies: Option<Streaming<pb::Message>>,
    state: CallState,
}

impl Call {
    #[must_use]
    pub const fn state(&self) -> CallState {
        self.state
    }

    /// Queues a request for the function host.
    pub async fn send(&mut self, message: Message) -> Result<(), InvokerError> {
        match self.state {
            CallState::Cancelled => return Err(InvokerError::Cancelled),
            CallState::Open => {}
            _ => return Err(InvokerError::SendClosed),
        }
        let Some(requests) = &self.requests else {
            return Err(InvokerError::SendClosed);
        };
        // A closed channel means the host already ended the call; `recv`
        // reports how.
        requests
            .send(pb::Message::from(message))
            .await
            .map_err(|_| InvokerError::SendClosed)
    }

    /// Signals that no more requests follow. Replies keep flowing.
    pub fn close_send(&mut self) {
        self.requests = None;
        if self.state == CallState::Open {
            self.state = CallState::HalfClosed;
        }
    }

    /// Receives the next reply, or `None` once the host has completed.
    ///
    /// After the call has failed or been cancelled every further `recv`
    /// keeps returning an error.
    pub async fn recv(&mut self) -> Result<Option<Message>, InvokerError> {
        match self.state {
            CallState::Cancelled => return Err(InvokerError::Cancelled),
            CallState::Failed => return Err(InvokerError::CallFailed),
            _ => {}
        }
        let Some(replies) = self.replies.as_mut() else {
            return Ok(None);
        };

        match replies.message().await {
            Ok(Some(wire)) => match Message::try_from(wire) {
                Ok(message) => Ok(Some(message)),
                Err(e) => {
                    self.finish(CallState::Failed);
                    Err(e.into())
                }
            },
            Ok(None) => {
                self.finish(CallState::Completed);
                Ok(None)
            }
            Err(status) => {
                debug!(code = ?status.code(), error = %status.message(), "Call failed");
                self.finish(CallState::Failed);
                Err(InvokerError::Stream(status))
            }
        }
    }

    /// Receives replies until the host completes the call.
    pub async fn collect(&mut self) -> Result<Vec<Message>, InvokerError> {
        let mut messages = Vec::new();
        while let Some(message) = self.recv().await? {
            messages.push(message);
        }
        Ok(messages)
    }

    /// Abandons the call. Both directions are torn down and the host stops
    /// working on it.
    pub fn cancel(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        // Dropping the reply stream resets it on the wire.
        self.replies = None;
        self.requests = None;
        self.state = CallState::Cancelled;
    }

    fn finish(&mut self, state: CallState) {
        self.replies = None;
        self.requests = None;
        self.state = state;
    }
}
