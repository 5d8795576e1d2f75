//! Trait definitions for the central role, covering exactly what the bridge
//! needs from a platform radio. `btle` implements them over btleplug;
//! `simulated` implements them in-process for the test suite.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use uuid::Uuid;

use crate::error::DeviceError;

pub type CentralEvents = Pin<Box<dyn Stream<Item = CentralEvent> + Send>>;
pub type Notifications = Pin<Box<dyn Stream<Item = Notification> + Send>>;

/// Radio events surfaced by a central.
pub enum CentralEvent {
    /// The radio became usable. Also reported once when an event stream is
    /// opened on an already-powered radio.
    PoweredOn,
    /// An advertisement was received for a peer, new or already known.
    Discovered {
        peer: Arc<dyn Peer>,
        local_name: Option<String>,
    },
}

/// A value notification from a subscribed characteristic.
#[derive(Debug, Clone)]
pub struct Notification {
    pub characteristic: Uuid,
    pub value: Vec<u8>,
}

/// BLE central role: radio events and scanning.
#[async_trait]
pub trait Central: Send + Sync {
    /// Open the stream of radio events.
    async fn events(&self) -> Result<CentralEvents, DeviceError>;

    /// Start scanning for peripherals advertising the given service.
    /// Scanning continues until the central is dropped.
    async fn start_scan(&self, service: Uuid) -> Result<(), DeviceError>;
}

/// A remote peripheral as seen by the central.
#[async_trait]
pub trait Peer: Send + Sync {
    /// Short identifier for logging.
    fn id(&self) -> String;

    /// Establish the link.
    async fn connect(&self) -> Result<(), DeviceError>;

    /// Discover the peripheral's GATT tree and return the characteristic
    /// UUIDs found under the given service.
    async fn discover_characteristics(&self, service: Uuid) -> Result<Vec<Uuid>, DeviceError>;

    /// Write a payload to a characteristic, waiting for the peripheral to
    /// acknowledge the write.
    async fn write(&self, characteristic: Uuid, payload: &[u8]) -> Result<(), DeviceError>;

    /// Enable notifications for a characteristic.
    async fn subscribe(&self, characteristic: Uuid) -> Result<(), DeviceError>;

    /// Open the stream of value notifications for subscribed characteristics.
    async fn notifications(&self) -> Result<Notifications, DeviceError>;

    /// Whether the link is still up.
    async fn is_connected(&self) -> Result<bool, DeviceError>;

    /// Drop the link.
    async fn disconnect(&self) -> Result<(), DeviceError>;
}
