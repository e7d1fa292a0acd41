use crate::streamer_core::config::RuntimeConfig;
use async_trait::async_trait;
use futures::{stream::BoxStream, SinkExt, StreamExt};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use yellowstone_grpc_client::{ClientTlsConfig, GeyserGrpcClient};
use yellowstone_grpc_proto::geyser::{
    subscribe_update::UpdateOneof, SubscribeRequest, SubscribeRequestFilterTransactions,
    SubscribeRequestPing, SubscribeUpdate,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    InvalidEndpoint(String),
    Connection(String),
    Subscribe(String),
    Stream(String),
    StreamClosed,
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::InvalidEndpoint(addr) => write!(f, "Invalid endpoint: {}", addr),
            ClientError::Connection(msg) => write!(f, "Connection error: {}", msg),
            ClientError::Subscribe(msg) => write!(f, "Subscribe error: {}", msg),
            ClientError::Stream(msg) => write!(f, "Error receiving message: {}", msg),
            ClientError::StreamClosed => write!(f, "Stream closed by server"),
        }
    }
}

impl std::error::Error for ClientError {}

/// Stream of updates from one subscription
pub type UpdateStream = BoxStream<'static, Result<SubscribeUpdate, ClientError>>;

/// Opens subscriptions against a node address
///
/// The Geyser implementation is [`GeyserUpdateSource`]; tests plug in
/// scripted sources.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    async fn subscribe(
        &self,
        address: &str,
        request: SubscribeRequest,
    ) -> Result<UpdateStream, ClientError>;
}

/// Transport security chosen from the address scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tls,
    Plaintext,
}

impl Transport {
    pub fn for_address(address: &str) -> Result<Self, ClientError> {
        if address.starts_with("https://") {
            Ok(Transport::Tls)
        } else if address.starts_with("http://") {
            Ok(Transport::Plaintext)
        } else {
            Err(ClientError::InvalidEndpoint(address.to_string()))
        }
    }
}

/// Build the transaction subscription used for every node
///
/// Non-vote, successful transactions that include `detection_address`.
pub fn build_subscribe_request(detection_address: &str, config: &RuntimeConfig) -> SubscribeRequest {
    let transaction_filter = SubscribeRequestFilterTransactions {
        vote: Some(false),
        failed: Some(false),
        account_include: vec![detection_address.to_string()],
        account_exclude: vec![],
        account_required: vec![],
        signature: None,
    };

    let mut transactions = HashMap::new();
    transactions.insert("detection_filter".to_string(), transaction_filter);

    SubscribeRequest {
        transactions,
        commitment: Some(config.commitment_level as i32),
        ..Default::default()
    }
}

fn ping_request() -> SubscribeRequest {
    SubscribeRequest {
        ping: Some(SubscribeRequestPing { id: 1 }),
        ..Default::default()
    }
}

/// Yellowstone gRPC subscriptions over TLS or plaintext
///
/// Server pings are answered so the node keeps the subscription open.
#[derive(Debug, Clone)]
pub struct GeyserUpdateSource {
    x_token: Option<String>,
    connect_timeout: Duration,
    /// Updates buffered per subscription before the node is backpressured
    buffer: usize,
}

impl GeyserUpdateSource {
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            x_token: config.x_token.clone(),
            connect_timeout: config.connect_timeout,
            buffer: 1_024,
        }
    }
}

#[async_trait]
impl UpdateSource for GeyserUpdateSource {
    async fn subscribe(
        &self,
        address: &str,
        request: SubscribeRequest,
    ) -> Result<UpdateStream, ClientError> {
        let transport = Transport::for_address(address)?;
        let connection_err = |e: &dyn std::fmt::Display| {
            ClientError::Connection(format!("{}: {}", address, e))
        };

        let mut builder = GeyserGrpcClient::build_from_shared(address.to_string())
            .map_err(|e| connection_err(&e))?
            .x_token(self.x_token.clone())
            .map_err(|e| connection_err(&e))?
            .connect_timeout(self.connect_timeout);

        if transport == Transport::Tls {
            builder = builder
                .tls_config(ClientTlsConfig::new().with_native_roots())
                .map_err(|e| connection_err(&e))?;
        }

        log::info!("🔌 Connecting to {} ({:?})", address, transport);
        let client = builder.connect().await.map_err(|e| connection_err(&e))?;

        let (updates_tx, updates_rx) = mpsc::channel(self.buffer);
        let (subscribed_tx, subscribed_rx) = oneshot::channel();

        // The subscription task owns the client; it stops when the stream
        // ends or fails, or when the receiving side is dropped
        let task_address = address.to_string();
        tokio::spawn(async move {
            let address = task_address;
            let mut client = client;
            let (sink, stream) = match client.subscribe_with_request(Some(request)).await {
                Ok(pair) => pair,
                Err(e) => {
                    let error = ClientError::Subscribe(format!("{}: {}", address, e));
                    let _ = subscribed_tx.send(Err(error));
                    return;
                }
            };
            let _ = subscribed_tx.send(Ok(()));

            tokio::pin!(sink);
            tokio::pin!(stream);

            loop {
                let item = tokio::select! {
                    _ = updates_tx.closed() => break,
                    next = stream.next() => match next {
                        Some(Ok(update)) => {
                            if matches!(update.update_oneof, Some(UpdateOneof::Ping(_))) {
                                if let Err(e) = sink.send(ping_request()).await {
                                    log::warn!("Failed to answer ping from {}: {}", address, e);
                                }
                            }
                            Ok(update)
                        }
                        Some(Err(status)) => Err(ClientError::Stream(status.to_string())),
                        // Receiver sees the channel close and reports it
                        None => break,
                    }
                };

                let failed = item.is_err();
                if updates_tx.send(item).await.is_err() || failed {
                    break;
                }
            }

            log::debug!("Subscription to {} closed", address);
        });

        match subscribed_rx.await {
            Ok(Ok(())) => log::info!("✅ Subscribed to {}", address),
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(ClientError::Subscribe(format!(
                    "{}: subscription task stopped",
                    address
                )))
            }
        }

        let updates = futures::stream::unfold(updates_rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });

        Ok(updates.boxed())
    }
}
