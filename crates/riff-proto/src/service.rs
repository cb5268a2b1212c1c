//! gRPC stubs for the `function.MessageFunction` service.
//!
//! Written in the shape `tonic-build` generates for a single
//! bidirectional-streaming method, so the crate does not depend on `protoc`
//! at build time.

/// Fully qualified service name.
pub const SERVICE_NAME: &str = "function.MessageFunction";

/// Request path of the `Call` method.
pub const CALL_PATH: &str = "/function.MessageFunction/Call";

/// Client side of the `MessageFunction` service.
pub mod message_function_client {
    #![allow(clippy::let_unit_value)]

    use tonic::codegen::http::Uri;
    use tonic::codegen::*;

    use crate::pb::Message;

    #[derive(Debug, Clone)]
    pub struct MessageFunctionClient<T> {
        inner: tonic::client::Grpc<T>,
    }

    impl MessageFunctionClient<tonic::transport::Channel> {
        /// Attempts to create a new client by connecting to a given endpoint.
        pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
        where
            D: TryInto<tonic::transport::Endpoint>,
            D::Error: Into<StdError>,
        {
            let conn = tonic::transport::Endpoint::new(dst)?.connect().await?;
            Ok(Self::new(conn))
        }
    }

    impl<T> MessageFunctionClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody>,
        T::Error: Into<StdError>,
        T::ResponseBody: Body<Data = Bytes> + Send + 'static,
        <T::ResponseBody as Body>::Error: Into<StdError> + Send,
    {
        pub fn new(inner: T) -> Self {
            let inner = tonic::client::Grpc::new(inner);
            Self { inner }
        }

        pub fn with_origin(inner: T, origin: Uri) -> Self {
            let inner = tonic::client::Grpc::with_origin(inner, origin);
            Self { inner }
        }

        /// Limits the maximum size of a decoded message.
        #[must_use]
        pub fn max_decoding_message_size(mut self, limit: usize) -> Self {
            self.inner = self.inner.max_decoding_message_size(limit);
            self
        }

        /// Limits the maximum size of an encoded message.
        #[must_use]
        pub fn max_encoding_message_size(mut self, limit: usize) -> Self {
            self.inner = self.inner.max_encoding_message_size(limit);
            self
        }

        /// Opens a bidirectional call.
        pub async fn call(
            &mut self,
            request: impl tonic::IntoStreamingRequest<Message = Message>,
        ) -> Result<tonic::Response<tonic::codec::Streaming<Message>>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static(super::CALL_PATH);
            let mut req = request.into_streaming_request();
            req.extensions_mut()
                .insert(GrpcMethod::new(super::SERVICE_NAME, "Call"));
            self.inner.streaming(req, path, codec).await
        }
    }
}

/// Server side of the `MessageFunction` service.
pub mod message_function_server {
    #![allow(clippy::let_unit_value)]

    use tonic::codegen::*;

    use crate::pb::Message;

    /// Implemented by the function host.
    #[async_trait]
    pub trait MessageFunction: Send + Sync + 'static {
        /// Response stream of a call.
        type CallStream: tonic::codegen::tokio_stream::Stream<Item = Result<Message, tonic::Status>>
            + Send
            + 'static;

        async fn call(
            &self,
            request: tonic::Request<tonic::Streaming<Message>>,
        ) -> Result<tonic::Response<Self::CallStream>, tonic::Status>;
    }

    #[derive(Debug)]
    pub struct MessageFunctionServer<T> {
        inner: Arc<T>,
        max_decoding_message_size: Option<usize>,
        max_encoding_message_size: Option<usize>,
    }

    impl<T> MessageFunctionServer<T> {
        pub fn new(inner: T) -> Self {
            Self::from_arc(Arc::new(inner))
        }

        pub fn from_arc(inner: Arc<T>) -> Self {
            Self {
                inner,
                max_decoding_message_size: None,
                max_encoding_message_size: None,
            }
        }

        /// Limits the maximum size of a decoded message.
        #[must_use]
        pub fn max_decoding_message_size(mut self, limit: usize) -> Self {
            self.max_decoding_message_size = Some(limit);
            self
        }

        /// Limits the maximum size of an encoded message.
        #[must_use]
        pub fn max_encoding_message_size(mut self, limit: usize) -> Self {
            self.max_encoding_message_size = Some(limit);
            self
        }
    }

    impl<T, B> tonic::codegen::Service<http::Request<B>> for MessageFunctionServer<T>
    where
        T: MessageFunction,
        B: Body + Send + 'static,
        B::Error: Into<StdError> + Send + 'static,
    {
        type Response = http::Response<tonic::body::BoxBody>;
        type Error = std::convert::Infallible;
        type Future = BoxFuture<Self::Response, Self::Error>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: http::Request<B>) -> Self::Future {
            match req.uri().path() {
                super::CALL_PATH => {
                    #[allow(non_camel_case_types)]
                    struct CallSvc<T: MessageFunction>(pub Arc<T>);

                    impl<T: MessageFunction> tonic::server::StreamingService<Message> for CallSvc<T> {
                        type Response = Message;
                        type ResponseStream = T::CallStream;
                        type Future = BoxFuture<tonic::Response<Self::ResponseStream>, tonic::Status>;

                        fn call(
                            &mut self,
                            request: tonic::Request<tonic::Streaming<Message>>,
                        ) -> Self::Future {
                            let inner = Arc::clone(&self.0);
                            let fut =
                                async move { <T as MessageFunction>::call(&inner, request).await };
                            Box::pin(fut)
                        }
                    }

                    let max_decoding_message_size = self.max_decoding_message_size;
                    let max_encoding_message_size = self.max_encoding_message_size;
                    let inner = self.inner.clone();
                    let fut = async move {
                        let method = CallSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = tonic::server::Grpc::new(codec).apply_max_message_size_config(
                            max_decoding_message_size,
                            max_encoding_message_size,
                        );
                        let res = grpc.streaming(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                _ => Box::pin(async move {
                    let mut response = http::Response::new(empty_body());
                    let headers = response.headers_mut();
                    headers.insert(
                        tonic::Status::GRPC_STATUS,
                        (tonic::Code::Unimplemented as i32).into(),
                    );
                    headers.insert(
                        http::header::CONTENT_TYPE,
                        tonic::metadata::GRPC_CONTENT_TYPE,
                    );
                    Ok(response)
                }),
            }
        }
    }

    impl<T> Clone for MessageFunctionServer<T> {
        fn clone(&self) -> Self {
            Self {
                inner: self.inner.clone(),
                max_decoding_message_size: self.max_decoding_message_size,
                max_encoding_message_size: self.max_encoding_message_size,
            }
        }
    }

    impl<T> tonic::server::NamedService for MessageFunctionServer<T> {
        const NAME: &'static str = super::SERVICE_NAME;
    }
}
