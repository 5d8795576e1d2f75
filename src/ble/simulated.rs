//! In-process implementation of the central seam for the test suite.
//!
//! A scripted radio: tests power it on, deliver advertisements, push
//! notifications and injected failures, and read back the exact order of
//! operations the bridge performed against each peer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::ble::transport::{Central, CentralEvent, CentralEvents, Notification, Notifications, Peer};
use crate::error::DeviceError;

/// One operation performed against a simulated peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerOp {
    Connect,
    Discover,
    Subscribe(Uuid),
    Write(Uuid, Vec<u8>),
    Disconnect,
}

pub struct SimCentral {
    events_tx: mpsc::UnboundedSender<CentralEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<CentralEvent>>>,
    scanning: Mutex<Option<Uuid>>,
    journal: Arc<Mutex<Vec<(String, PeerOp)>>>,
}

impl SimCentral {
    pub fn new() -> SimCentral {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        SimCentral {
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            scanning: Mutex::new(None),
            journal: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a peer reachable through this radio. The name doubles as the
    /// advertised local name and as the key in the journal.
    pub fn add_peer(&self, name: &str, characteristics: &[Uuid]) -> Arc<SimPeer> {
        // The initial notification pipe has no reader; notifications pushed
        // before the bridge opens the stream are dropped, like a radio would.
        let (notify_tx, _) = mpsc::unbounded_channel();

        Arc::new(SimPeer {
            name: name.to_string(),
            characteristics: characteristics.to_vec(),
            connected: AtomicBool::new(false),
            fail_connect: AtomicBool::new(false),
            fail_subscribe: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            notify_tx: Mutex::new(notify_tx),
            journal: Arc::clone(&self.journal),
        })
    }

    /// Report the radio as powered on.
    pub fn power_on(&self) {
        let _ = self.events_tx.send(CentralEvent::PoweredOn);
    }

    /// Deliver an advertisement for the given peer under its own name.
    pub fn advertise(&self, peer: &Arc<SimPeer>) {
        self.advertise_as(peer, Some(peer.name.as_str()));
    }

    /// Deliver an advertisement with an explicit (or absent) local name.
    pub fn advertise_as(&self, peer: &Arc<SimPeer>, local_name: Option<&str>) {
        let _ = self.events_tx.send(CentralEvent::Discovered {
            peer: Arc::clone(peer) as Arc<dyn Peer>,
            local_name: local_name.map(String::from),
        });
    }

    /// The service filter of the running scan, if scanning was started.
    pub fn scan_filter(&self) -> Option<Uuid> {
        *self.scanning.lock().unwrap()
    }

    /// Everything the bridge did to this radio's peers, oldest first.
    pub fn journal(&self) -> Vec<(String, PeerOp)> {
        self.journal.lock().unwrap().clone()
    }
}

#[async_trait]
impl Central for SimCentral {
    async fn events(&self) -> Result<CentralEvents, DeviceError> {
        match self.events_rx.lock().unwrap().take() {
            Some(rx) => Ok(Box::pin(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|event| (event, rx))
            }))),
            // The stream was already taken once; a second observer sees
            // nothing.
            None => Ok(Box::pin(stream::empty())),
        }
    }

    async fn start_scan(&self, service: Uuid) -> Result<(), DeviceError> {
        *self.scanning.lock().unwrap() = Some(service);
        Ok(())
    }
}

pub struct SimPeer {
    name: String,
    characteristics: Vec<Uuid>,
    connected: AtomicBool,
    fail_connect: AtomicBool,
    fail_subscribe: AtomicBool,
    fail_writes: AtomicBool,
    notify_tx: Mutex<mpsc::UnboundedSender<Notification>>,
    journal: Arc<Mutex<Vec<(String, PeerOp)>>>,
}

impl SimPeer {
    /// Push a value notification from the device.
    pub fn notify(&self, characteristic: Uuid, value: &[u8]) {
        let notification = Notification {
            characteristic,
            value: value.to_vec(),
        };
        let _ = self.notify_tx.lock().unwrap().send(notification);
    }

    pub fn set_connect_failure(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn set_subscribe_failure(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    pub fn set_write_failure(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Drop the link from the device side, without telling the bridge.
    pub fn drop_link(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn linked(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Operations the bridge performed against this peer, oldest first.
    pub fn ops(&self) -> Vec<PeerOp> {
        self.journal
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name == &self.name)
            .map(|(_, op)| op.clone())
            .collect()
    }

    /// Payloads the bridge wrote to this peer, oldest first.
    pub fn written(&self) -> Vec<(Uuid, Vec<u8>)> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                PeerOp::Write(characteristic, value) => Some((characteristic, value)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, op: PeerOp) {
        self.journal.lock().unwrap().push((self.name.clone(), op));
    }
}

#[async_trait]
impl Peer for SimPeer {
    fn id(&self) -> String {
        self.name.clone()
    }

    async fn connect(&self) -> Result<(), DeviceError> {
        self.record(PeerOp::Connect);
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(DeviceError::NotConnected);
        }

        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn discover_characteristics(&self, _service: Uuid) -> Result<Vec<Uuid>, DeviceError> {
        self.record(PeerOp::Discover);
        if !self.connected.load(Ordering::SeqCst) {
            return Err(DeviceError::NotConnected);
        }

        Ok(self.characteristics.clone())
    }

    async fn write(&self, characteristic: Uuid, payload: &[u8]) -> Result<(), DeviceError> {
        self.record(PeerOp::Write(characteristic, payload.to_vec()));
        if !self.connected.load(Ordering::SeqCst) || self.fail_writes.load(Ordering::SeqCst) {
            return Err(DeviceError::NotConnected);
        }
        if !self.characteristics.contains(&characteristic) {
            return Err(DeviceError::MissingCharacteristic);
        }

        Ok(())
    }

    async fn subscribe(&self, characteristic: Uuid) -> Result<(), DeviceError> {
        self.record(PeerOp::Subscribe(characteristic));
        if !self.connected.load(Ordering::SeqCst) || self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(DeviceError::NotConnected);
        }
        if !self.characteristics.contains(&characteristic) {
            return Err(DeviceError::MissingCharacteristic);
        }

        Ok(())
    }

    async fn notifications(&self) -> Result<Notifications, DeviceError> {
        // Each call installs a fresh pipe, like re-subscribing after a
        // reconnect does on a real stack.
        let (tx, rx) = mpsc::unbounded_channel();
        *self.notify_tx.lock().unwrap() = tx;

        Ok(Box::pin(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|notification| (notification, rx))
        })))
    }

    async fn is_connected(&self) -> Result<bool, DeviceError> {
        Ok(self.connected.load(Ordering::SeqCst))
    }

    async fn disconnect(&self) -> Result<(), DeviceError> {
        self.record(PeerOp::Disconnect);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;

    fn characteristic(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    #[tokio::test]
    async fn events_replay_power_on_and_advertisements() {
        let central = SimCentral::new();
        let peer = central.add_peer("ROBOT", &[]);

        central.power_on();
        central.advertise(&peer);

        let mut events = central.events().await.unwrap();
        assert!(matches!(events.next().await, Some(CentralEvent::PoweredOn)));
        match events.next().await {
            Some(CentralEvent::Discovered { local_name, .. }) => {
                assert_eq!(local_name.as_deref(), Some("ROBOT"));
            },
            _ => panic!("expected a discovery event"),
        }
    }

    #[tokio::test]
    async fn journal_preserves_operation_order_across_peers() {
        let central = SimCentral::new();
        let ffb1 = characteristic(0xffb1);
        let first = central.add_peer("A", &[ffb1]);
        let second = central.add_peer("B", &[ffb1]);

        first.connect().await.unwrap();
        first.write(ffb1, &[0x01]).await.unwrap();
        first.disconnect().await.unwrap();
        second.connect().await.unwrap();

        let journal = central.journal();
        assert_eq!(journal[0], ("A".to_string(), PeerOp::Connect));
        assert_eq!(journal[1], ("A".to_string(), PeerOp::Write(ffb1, vec![0x01])));
        assert_eq!(journal[2], ("A".to_string(), PeerOp::Disconnect));
        assert_eq!(journal[3], ("B".to_string(), PeerOp::Connect));
    }

    #[tokio::test]
    async fn notifications_flow_through_the_open_pipe() {
        let central = SimCentral::new();
        let ffb2 = characteristic(0xffb2);
        let peer = central.add_peer("ROBOT", &[ffb2]);
        peer.connect().await.unwrap();

        let mut stream = peer.notifications().await.unwrap();
        peer.notify(ffb2, &[0x46, 0x48, 0x05, 0x93]);

        let notification = stream.next().await.unwrap();
        assert_eq!(notification.characteristic, ffb2);
        assert_eq!(notification.value, vec![0x46, 0x48, 0x05, 0x93]);
    }

    #[tokio::test]
    async fn injected_write_failure_is_reported() {
        let central = SimCentral::new();
        let ffb1 = characteristic(0xffb1);
        let peer = central.add_peer("ROBOT", &[ffb1]);
        peer.connect().await.unwrap();
        peer.set_write_failure(true);

        assert!(peer.write(ffb1, &[0x00]).await.is_err());
    }
}
