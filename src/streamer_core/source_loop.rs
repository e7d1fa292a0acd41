use crate::detection::{EventId, Observation};
use crate::streamer_core::grpc_client::{ClientError, UpdateSource};
use futures::StreamExt;
use solana_signature::Signature;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use yellowstone_grpc_proto::geyser::{subscribe_update::UpdateOneof, SubscribeRequest, SubscribeUpdate};

/// A source loop failure, tagged with the node it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    pub address: String,
    pub error: ClientError,
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Source {} failed: {}", self.address, self.error)
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Event identifier of a transaction update (base58 signature)
///
/// Returns `None` for every other update variant and for malformed
/// signatures.
pub fn extract_event_id(update: &SubscribeUpdate) -> Option<EventId> {
    let Some(UpdateOneof::Transaction(tx)) = &update.update_oneof else {
        return None;
    };

    let info = tx.transaction.as_ref()?;

    match Signature::try_from(info.signature.as_slice()) {
        Ok(signature) => Some(signature.to_string()),
        Err(_) => {
            log::warn!(
                "Skipping transaction update with {}-byte signature",
                info.signature.len()
            );
            None
        }
    }
}

/// Subscribe to one node and forward its transactions until cancelled
///
/// Returns `Ok(())` when `cancel` fires or the ingestion side has shut down.
/// Subscribe failures, stream errors and a stream that ends are returned as
/// errors; the caller decides whether they abort the run.
pub async fn run_source<S>(
    address: String,
    updates: Arc<S>,
    request: SubscribeRequest,
    tx: mpsc::Sender<Observation>,
    cancel: CancellationToken,
) -> Result<(), SourceError>
where
    S: UpdateSource + ?Sized,
{
    let fail = |error: ClientError| SourceError {
        address: address.clone(),
        error,
    };

    let mut stream = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Ok(()),
        subscribed = updates.subscribe(&address, request) => subscribed.map_err(&fail)?,
    };

    let mut forwarded = 0u64;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log::debug!("{} stopped after {} transactions", address, forwarded);
                return Ok(());
            }
            next = stream.next() => match next {
                Some(Ok(update)) => {
                    let Some(event) = extract_event_id(&update) else {
                        continue;
                    };

                    if forwarded == 0 {
                        log::info!("📥 First transaction from {}: {}", address, event);
                    }

                    if tx.send(Observation::new(event, address.clone())).await.is_err() {
                        log::debug!("Ingestion closed, stopping {}", address);
                        return Ok(());
                    }
                    forwarded += 1;
                }
                Some(Err(e)) => return Err(fail(e)),
                None => return Err(fail(ClientError::StreamClosed)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yellowstone_grpc_proto::geyser::{
        SubscribeUpdatePing, SubscribeUpdateTransaction, SubscribeUpdateTransactionInfo,
    };

    fn transaction_update(signature: Vec<u8>) -> SubscribeUpdate {
        SubscribeUpdate {
            update_oneof: Some(UpdateOneof::Transaction(SubscribeUpdateTransaction {
                transaction: Some(SubscribeUpdateTransactionInfo {
                    signature,
                    ..Default::default()
                }),
                slot: 1,
            })),
            ..Default::default()
        }
    }

    #[test]
    fn test_extract_signature_from_transaction() {
        let raw = [7u8; 64];
        let update = transaction_update(raw.to_vec());

        let expected = Signature::from(raw).to_string();
        assert_eq!(extract_event_id(&update), Some(expected));
    }

    #[test]
    fn test_same_signature_maps_to_same_event() {
        let a = transaction_update(vec![3u8; 64]);
        let b = transaction_update(vec![3u8; 64]);
        assert_eq!(extract_event_id(&a), extract_event_id(&b));
    }

    #[test]
    fn test_non_transaction_updates_are_ignored() {
        let ping = SubscribeUpdate {
            update_oneof: Some(UpdateOneof::Ping(SubscribeUpdatePing {})),
            ..Default::default()
        };
        assert_eq!(extract_event_id(&ping), None);
        assert_eq!(extract_event_id(&SubscribeUpdate::default()), None);
    }

    #[test]
    fn test_malformed_signature_is_skipped() {
        let update = transaction_update(vec![1u8; 10]);
        assert_eq!(extract_event_id(&update), None);
    }
}
