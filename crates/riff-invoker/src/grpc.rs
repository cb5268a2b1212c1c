//! Invocation Service: the server end of `function.MessageFunction/Call`.
//!
//! Each call gets its own pump task that reads the inbound stream, runs the
//! adapter on every message and forwards the replies on a bounded channel.
//! The two directions are independent: the client may keep sending while
//! replies are still being produced, and the adapter may produce any number
//! of replies per request.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use riff_proto::pb;
use riff_proto::service::message_function_server::{MessageFunction, MessageFunctionServer};
use riff_proto::Message;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::{ReceiverStream, TcpListenerStream};
use tokio_stream::Stream;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tonic::{Request, Response, Status, Streaming};
use tracing::{debug, info, warn, Instrument};

use crate::adapter::FunctionAdapter;
use crate::config::GrpcConfig;
use crate::error::InvokerError;

type Replies = mpsc::Sender<Result<pb::Message, Status>>;

/// Hosts a [`FunctionAdapter`] behind the bidirectional `Call` stream.
#[derive(Debug)]
pub struct InvocationService {
    adapter: Arc<dyn FunctionAdapter>,
    config: GrpcConfig,
    shutdown: CancellationToken,
    next_call_id: AtomicU64,
}

impl InvocationService {
    /// Creates the service. Cancelling `shutdown` ends every open call with
    /// `UNAVAILABLE`.
    pub fn new(
        adapter: Arc<dyn FunctionAdapter>,
        config: GrpcConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            adapter,
            config,
            shutdown,
            next_call_id: AtomicU64::new(1),
        }
    }

    /// Wraps the service in the generated server with configured size limits.
    pub fn into_server(self) -> MessageFunctionServer<Self> {
        let limit = self.config.max_message_size;
        MessageFunctionServer::new(self)
            .max_decoding_message_size(limit)
            .max_encoding_message_size(limit)
    }
}

#[async_trait]
impl MessageFunction for InvocationService {
    type CallStream = ReplyStream;

    async fn call(
        &self,
        request: Request<Streaming<pb::Message>>,
    ) -> Result<Response<Self::CallStream>, Status> {
        let call_id = self.next_call_id.fetch_add(1, Ordering::Relaxed);
        let remote = request.remote_addr();
        let inbound = request.into_inner();
        let (replies, rx) = mpsc::channel(self.config.stream_buffer.max(1));

        let span = tracing::info_span!("invocation.call", call.id = call_id);
        span.in_scope(|| {
            info!(remote = ?remote, "Call opened");
        });

        let pump = Pump {
            adapter: Arc::clone(&self.adapter),
            inbound,
            replies,
            shutdown: self.shutdown.clone(),
        };
        tokio::spawn(pump.run().instrument(span));

        Ok(Response::new(ReplyStream::new(rx, self.shutdown.clone())))
    }
}

/// Response half of a call.
///
/// Yields the pump's replies until the server shuts down, then a single
/// `UNAVAILABLE` status. Replies still queued at that point are dropped.
pub struct ReplyStream {
    replies: ReceiverStream<Result<pb::Message, Status>>,
    shutdown: Pin<Box<WaitForCancellationFutureOwned>>,
    done: bool,
}

impl ReplyStream {
    fn new(rx: mpsc::Receiver<Result<pb::Message, Status>>, shutdown: CancellationToken) -> Self {
        Self {
            replies: ReceiverStream::new(rx),
            shutdown: Box::pin(shutdown.cancelled_owned()),
            done: false,
        }
    }
}

impl std::fmt::Debug for ReplyStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplyStream").field("done", &self.done).finish_non_exhaustive()
    }
}

impl Stream for ReplyStream {
    type Item = Result<pb::Message, Status>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        if this.shutdown.as_mut().poll(cx).is_ready() {
            this.done = true;
            return Poll::Ready(Some(Err(InvokerError::Cancelled.into())));
        }
        match Pin::new(&mut this.replies).poll_next(cx) {
            Poll::Ready(None) => {
                this.done = true;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

/// Outcome of one step of the pump loop.
enum Step<T> {
    Next(T),
    Stop,
}

struct Pump {
    adapter: Arc<dyn FunctionAdapter>,
    inbound: Streaming<pb::Message>,
    replies: Replies,
    shutdown: CancellationToken,
}

impl Pump {
    async fn run(mut self) {
        let mut requests = 0_u64;
        let mut responses = 0_u64;

        loop {
            let wire = match race(&self.shutdown, &self.replies, self.inbound.message()).await {
                Step::Next(Ok(Some(wire))) => wire,
                Step::Next(Ok(None)) => {
                    info!(requests, responses, "Call completed");
                    return;
                }
                Step::Next(Err(status)) => {
                    warn!(code = ?status.code(), error = %status.message(), "Inbound stream failed");
                    return;
                }
                Step::Stop => return,
            };
            requests += 1;

            let message = match Message::try_from(wire) {
                Ok(message) => message,
                Err(e) => {
                    warn!(error = %e, "Rejecting message with invalid header");
                    fail(&self.shutdown, &self.replies, InvokerError::Header(e)).await;
                    return;
                }
            };

            let adapter = Arc::clone(&self.adapter);
            let outputs = match race(&self.shutdown, &self.replies, adapter.invoke(message)).await {
                Step::Next(Ok(outputs)) => outputs,
                Step::Next(Err(e)) => {
                    warn!(error = %e, "Function failed");
                    fail(&self.shutdown, &self.replies, InvokerError::Adapter(e)).await;
                    return;
                }
                Step::Stop => return,
            };

            for output in outputs {
                let reply = self.replies.send(Ok(pb::Message::from(output)));
                match race(&self.shutdown, &self.replies, reply).await {
                    Step::Next(Ok(())) => responses += 1,
                    Step::Next(Err(_)) => {
                        debug!("Response stream dropped");
                        return;
                    }
                    Step::Stop => return,
                }
            }
        }
    }
}

/// Ends the call with the status for `err`.
async fn fail(shutdown: &CancellationToken, replies: &Replies, err: InvokerError) {
    let status = replies.send(Err(err.into()));
    let _ = race(shutdown, replies, status).await;
}

/// Runs `work` unless the server shuts down or the caller goes away first.
/// On shutdown the reply stream reports `UNAVAILABLE` itself.
async fn race<F: Future>(
    shutdown: &CancellationToken,
    replies: &Replies,
    work: F,
) -> Step<F::Output> {
    tokio::select! {
        biased;
        () = shutdown.cancelled() => {
            info!("Terminating call on shutdown");
            Step::Stop
        }
        () = replies.closed() => {
            info!("Call cancelled by client");
            Step::Stop
        }
        output = work => Step::Next(output),
    }
}

/// Serves the invocation stream on `listener` until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    service: InvocationService,
    shutdown: CancellationToken,
) -> Result<(), InvokerError> {
    let incoming = TcpListenerStream::new(listener);

    tonic::transport::Server::builder()
        .add_service(service.into_server())
        .serve_with_incoming_shutdown(incoming, async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}
