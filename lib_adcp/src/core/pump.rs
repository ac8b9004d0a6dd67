//! # Connection Pump
//!
//! Bridges one subscriber transport to the hub. A pump runs two loops side by side:
//!
//! - **drain**: take the next payload from the connection's outbound queue and write it
//!   to the transport. Stops when the queue is closed (the hub dropped the connection)
//!   or a write fails.
//! - **inbound**: read from the transport only to notice that the peer went away.
//!   Subscribers are receive-only, so frame contents are ignored.
//!
//! Both race the subscription's eviction token, which the hub cancels when it drops
//! the connection for falling behind. A write stuck on a peer that stopped reading
//! is abandoned at that point.
//!
//! Whichever stops first ends the pump. The transport is then closed, bounded by
//! [`CLOSE_TIMEOUT`], and the hub is told to unregister the connection, exactly once
//! per pump.
//!
//! Transports plug in through [`OutboundSink`] and [`InboundSource`]; the server wires
//! them to websocket halves, tests use in-memory versions.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;

use crate::core::hub::{HubHandle, Subscription};
use crate::errors::PumpError;

/// Write side of a subscriber transport.
pub trait OutboundSink: Send {
    /// Writes one serialized projection.
    fn send(&mut self, payload: Bytes) -> impl Future<Output = Result<(), PumpError>> + Send;

    /// Best-effort close of the transport.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Read side of a subscriber transport.
pub trait InboundSource: Send {
    /// Next inbound frame, or `None` once the peer has closed.
    fn next_frame(&mut self) -> impl Future<Output = Option<Result<Bytes, PumpError>>> + Send;
}

/// Longest wait for a transport to close before the pump gives up on it.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a pump stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpExit {
    /// The hub closed the outbound queue.
    QueueClosed,
    /// The hub dropped the connection because its queue overflowed.
    Evicted,
    /// Writing to the transport failed.
    WriteFailed,
    /// The peer closed the transport.
    PeerClosed,
    /// Reading from the transport failed.
    ReadFailed,
}

/// Runs both loops for `subscription` until one of them stops, then closes the
/// transport and unregisters the connection.
pub async fn run_pump<S, I>(hub: &HubHandle, subscription: Subscription, mut sink: S, mut source: I) -> PumpExit
where
    S: OutboundSink,
    I: InboundSource,
{
    let Subscription {
        id,
        mut outbound,
        evicted,
    } = subscription;

    let drain = async {
        while let Some(payload) = outbound.recv().await {
            if let Err(e) = sink.send(payload).await {
                log::warn!("Websocket {}: {}", id, e);
                return PumpExit::WriteFailed;
            }
        }
        PumpExit::QueueClosed
    };

    let inbound = async {
        loop {
            match source.next_frame().await {
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    log::warn!("Websocket {}: {}", id, e);
                    return PumpExit::ReadFailed;
                }
                None => return PumpExit::PeerClosed,
            }
        }
    };

    let exit = tokio::select! {
        exit = drain => exit,
        exit = inbound => exit,
        _ = evicted.cancelled() => PumpExit::Evicted,
    };

    if tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await.is_err() {
        log::warn!("Websocket {}: close timed out", id);
    }
    hub.unregister(id);
    log::info!("Websocket {} pump stopped: {:?}", id, exit);
    exit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hub::{BroadcastHub, HubConfig};
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;

    #[derive(Clone, Default)]
    struct RecordingSink {
        sent: Arc<Mutex<Vec<Bytes>>>,
        closed: Arc<Mutex<bool>>,
        fail_writes: bool,
        block_writes: bool,
    }

    impl OutboundSink for RecordingSink {
        async fn send(&mut self, payload: Bytes) -> Result<(), PumpError> {
            if self.fail_writes {
                return Err(PumpError::Write("broken pipe".to_string()));
            }
            if self.block_writes {
                std::future::pending::<()>().await;
            }
            self.sent.lock().unwrap().push(payload);
            Ok(())
        }

        async fn close(&mut self) {
            *self.closed.lock().unwrap() = true;
        }
    }

    struct ChannelSource(mpsc::UnboundedReceiver<Result<Bytes, PumpError>>);

    impl InboundSource for ChannelSource {
        async fn next_frame(&mut self) -> Option<Result<Bytes, PumpError>> {
            self.0.recv().await
        }
    }

    #[tokio::test]
    async fn test_peer_close_unregisters() {
        let hub = BroadcastHub::spawn(HubConfig::default());
        let sink = RecordingSink::default();
        let (frames, rx) = mpsc::unbounded_channel();
        frames.send(Ok(Bytes::from_static(b"ignored"))).unwrap();
        drop(frames);

        let exit = run_pump(&hub, hub.subscribe(), sink.clone(), ChannelSource(rx)).await;
        assert_eq!(exit, PumpExit::PeerClosed);
        assert!(*sink.closed.lock().unwrap());
        assert_eq!(hub.stats().await.unwrap().connections, 0);
    }

    #[tokio::test]
    async fn test_write_failure_unregisters() {
        let hub = BroadcastHub::spawn(HubConfig::default());
        let sink = RecordingSink { fail_writes: true, ..Default::default() };
        let (_frames, rx) = mpsc::unbounded_channel();

        let exit = run_pump(&hub, hub.subscribe(), sink, ChannelSource(rx)).await;
        assert_eq!(exit, PumpExit::WriteFailed);
        assert_eq!(hub.stats().await.unwrap().connections, 0);
    }

    #[tokio::test]
    async fn test_queue_closed_by_hub_drains_first() {
        let hub = BroadcastHub::spawn(HubConfig::default());
        let subscription = hub.subscribe();
        hub.unregister(subscription.id);
        let sink = RecordingSink::default();
        let (_frames, rx) = mpsc::unbounded_channel();

        let exit = run_pump(&hub, subscription, sink.clone(), ChannelSource(rx)).await;
        assert_eq!(exit, PumpExit::QueueClosed);
        let sent = sink.sent.lock().unwrap().clone();
        assert_eq!(sent, vec![Bytes::from_static(br#"{"id":"AdcpList","serialNumbers":[]}"#)]);
    }

    #[tokio::test]
    async fn test_read_error_unregisters() {
        let hub = BroadcastHub::spawn(HubConfig::default());
        let (frames, rx) = mpsc::unbounded_channel();
        frames.send(Err(PumpError::Read("reset by peer".to_string()))).unwrap();

        let exit = run_pump(&hub, hub.subscribe(), RecordingSink::default(), ChannelSource(rx)).await;
        assert_eq!(exit, PumpExit::ReadFailed);
        assert_eq!(hub.stats().await.unwrap().connections, 0);
    }

    #[tokio::test]
    async fn test_eviction_ends_a_blocked_write() {
        let hub = BroadcastHub::spawn(HubConfig { outbound_capacity: 1, ..Default::default() });
        let sink = RecordingSink { block_writes: true, ..Default::default() };
        let (_frames, rx) = mpsc::unbounded_channel();
        let subscription = hub.subscribe();
        let evicted = subscription.evicted.clone();

        let pump = tokio::spawn({
            let hub = hub.clone();
            let sink = sink.clone();
            async move { run_pump(&hub, subscription, sink, ChannelSource(rx)).await }
        });

        // Two more registrations overflow the one-slot queue behind the stuck write.
        hub.subscribe();
        hub.subscribe();

        let exit = tokio::time::timeout(Duration::from_secs(2), pump).await.unwrap().unwrap();
        assert_eq!(exit, PumpExit::Evicted);
        assert!(evicted.is_cancelled());
        assert!(*sink.closed.lock().unwrap());
    }
}
