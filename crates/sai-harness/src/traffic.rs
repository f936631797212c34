//! Packet injection and capture.

use async_trait::async_trait;
use bytes::Bytes;
use sai_api::PortOid;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrafficError {
    #[error("port {0} cannot transmit")]
    PortUnavailable(PortOid),

    #[error("transport closed")]
    Closed,

    #[error("transport error: {0}")]
    Io(String),
}

/// A frame seen leaving the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObservedFrame {
    pub port: PortOid,
    pub data: Bytes,
}

/// Raw packet access to the device under test.
#[async_trait]
pub trait PacketTransport: Send + Sync {
    /// Injects `data` as received on `port`.
    async fn send(&self, port: PortOid, data: Bytes) -> Result<(), TrafficError>;

    /// Subscribes to every frame the device emits, CPU port included.
    fn subscribe(&self) -> broadcast::Receiver<ObservedFrame>;

    /// Port on which redirected frames arrive.
    fn cpu_port(&self) -> PortOid;
}

/// Sends probe frames and collects what comes out.
#[derive(Clone)]
pub struct TrafficDriver {
    transport: Arc<dyn PacketTransport>,
}

impl std::fmt::Debug for TrafficDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrafficDriver")
            .field("cpu_port", &self.transport.cpu_port())
            .finish()
    }
}

impl TrafficDriver {
    pub fn new(transport: Arc<dyn PacketTransport>) -> Self {
        Self { transport }
    }

    pub fn cpu_port(&self) -> PortOid {
        self.transport.cpu_port()
    }

    /// Starts listening on `ports`. An empty set listens everywhere.
    pub fn arm(&self, ports: impl IntoIterator<Item = PortOid>) -> Capture {
        Capture {
            rx: self.transport.subscribe(),
            ports: ports.into_iter().collect(),
        }
    }

    /// Fire and forget.
    pub async fn send(&self, port: PortOid, data: Bytes) -> Result<(), TrafficError> {
        debug!("TrafficDriver: send {} bytes on {}", data.len(), port);
        self.transport.send(port, data).await
    }

    /// Arms a capture on every port, sends, and collects.
    pub async fn send_and_capture(
        &self,
        port: PortOid,
        data: Bytes,
        timeout: Duration,
        settle: Duration,
    ) -> Result<Vec<ObservedFrame>, TrafficError> {
        let capture = self.arm([]);
        self.send(port, data).await?;
        capture.collect(timeout, settle).await
    }
}

/// Listener registered before a send.
pub struct Capture {
    rx: broadcast::Receiver<ObservedFrame>,
    ports: BTreeSet<PortOid>,
}

impl Capture {
    /// Collects frames until `timeout` passes without a first frame, or
    /// `settle` passes without another one. Arrival order is kept. An
    /// empty result is not an error.
    pub async fn collect(
        mut self,
        timeout: Duration,
        settle: Duration,
    ) -> Result<Vec<ObservedFrame>, TrafficError> {
        let mut frames = Vec::new();
        let mut deadline = Instant::now() + timeout;

        loop {
            match timeout_at(deadline, self.rx.recv()).await {
                Err(_) => break,
                Ok(Ok(frame)) => {
                    if self.ports.is_empty() || self.ports.contains(&frame.port) {
                        frames.push(frame);
                        deadline = Instant::now() + settle;
                    }
                }
                Ok(Err(broadcast::error::RecvError::Lagged(n))) => {
                    warn!("Capture: lagged, {} frames lost", n);
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => {
                    if frames.is_empty() {
                        return Err(TrafficError::Closed);
                    }
                    break;
                }
            }
        }
        Ok(frames)
    }
}
