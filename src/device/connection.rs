use std::sync::Arc;

use futures::StreamExt;
use log::{debug, info, warn};
use tokio::spawn;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::ble::transport::{Central, CentralEvent, Peer};
use crate::device::constants::{
    make_vacuum_notify_uuid, make_vacuum_service_uuid, make_vacuum_write_uuid, DEVICE_NAME,
    IS_CONNECTED_DEADLINE,
};
use crate::device::protocol::{handle_notification, Vacuum};
use crate::device::types::{DeviceEvent, DeviceStatus, LinkState};
use crate::error::DeviceError;

/// The live connection to the vacuum: the peer plus the two resolved
/// protocol characteristics. Published through a watch channel so protocol
/// users always read the latest session instead of holding handles across a
/// reconnect. Either characteristic can be missing on a misbehaving
/// peripheral; the session is still published and dispatch fails soft.
#[derive(Clone)]
pub struct Session {
    pub peer: Arc<dyn Peer>,
    pub write_char: Option<Uuid>,
    pub notify_char: Option<Uuid>,
}

/// Owns the connection lifecycle: scan forever, connect to the first
/// advertisement carrying the vacuum's name, keep exactly one session live.
///
/// The vacuum is not discoverable while it is connected, so a fresh
/// matching advertisement means the previous session is gone and the
/// manager reconnects unconditionally.
pub struct Link {
    central: Arc<dyn Central>,
    senders: Vec<mpsc::Sender<DeviceEvent>>,
    session_tx: watch::Sender<Option<Session>>,
    status_tx: watch::Sender<Option<DeviceStatus>>,
    state: LinkState,
    pump_cancel: CancellationToken,
    pump_handle: Option<JoinHandle<Result<(), DeviceError>>>,
}

impl Link {
    pub fn new(central: Arc<dyn Central>, senders: Vec<mpsc::Sender<DeviceEvent>>) -> (Link, Vacuum) {
        let (session_tx, session_rx) = watch::channel(None);
        let (status_tx, status_rx) = watch::channel(None);

        let link = Link {
            central,
            senders,
            session_tx,
            status_tx,
            state: LinkState::Idle,
            pump_cancel: CancellationToken::new(),
            pump_handle: None,
        };

        (link, Vacuum::new(session_rx, status_rx))
    }

    /// Start the scan-forever loop. The task never finishes on its own;
    /// cancelling the token disposes of it, disconnecting the live session
    /// on the way out without touching the scanning state.
    pub fn begin(self, cancel: CancellationToken) -> JoinHandle<()> {
        spawn(self.run(cancel))
    }

    async fn run(mut self, cancel: CancellationToken) {
        let mut events = match self.central.events().await {
            Ok(events) => events,
            Err(err) => {
                warn!("Failed to open the central event stream: {:?}", err);
                return;
            },
        };

        'mainloop: loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    break 'mainloop;
                },
                event = events.next() => match event {
                    None => {
                        warn!("Central event stream ended");
                        break 'mainloop;
                    },
                    Some(CentralEvent::PoweredOn) => {
                        match self.central.start_scan(make_vacuum_service_uuid()).await {
                            Ok(()) => {
                                info!("Scanning for {}...", DEVICE_NAME);
                                self.set_state(LinkState::Scanning).await;
                            },
                            Err(err) => warn!("Scanning failed: {:?}", err),
                        }
                    },
                    Some(CentralEvent::Discovered { peer, local_name }) => {
                        if local_name.as_deref() != Some(DEVICE_NAME) {
                            continue;
                        }

                        self.establish(peer).await;
                    },
                },
            }
        }

        self.dispose().await;
    }

    async fn establish(&mut self, peer: Arc<dyn Peer>) {
        let current = self.session_tx.borrow().clone();
        if let Some(current) = current {
            // Some platforms re-surface a known peripheral on every property
            // update, including ones caused by our own connect.
            if current.peer.id() == peer.id() && self.probe_connected(&current).await {
                debug!("Ignoring advertisement for the connected peripheral");
                return;
            }

            info!("Found {}; connecting...", peer.id());
            self.set_state(LinkState::Disconnecting).await;
            self.teardown().await;
        } else {
            info!("Found {}; connecting...", peer.id());
        }

        self.set_state(LinkState::Connecting).await;

        if let Err(err) = peer.connect().await {
            warn!("Connecting to peripheral failed: {:?}", err);
            self.abandon(&peer).await;
            return;
        }

        info!("Connected; Discovering services...");
        let characteristics = match peer.discover_characteristics(make_vacuum_service_uuid()).await {
            Ok(characteristics) => characteristics,
            Err(err) => {
                warn!("Discovering services failed: {:?}", err);
                self.abandon(&peer).await;
                return;
            },
        };

        let write_char = characteristics.iter().copied().find(|uuid| uuid.eq(&make_vacuum_write_uuid()));
        let notify_char = characteristics.iter().copied().find(|uuid| uuid.eq(&make_vacuum_notify_uuid()));
        if write_char.is_none() || notify_char.is_none() {
            warn!("Peripheral does not have the required characteristics");
        }

        if let Some(notify_char) = notify_char {
            info!("Subscribing to characteristic {:?}", notify_char);
            if let Err(err) = peer.subscribe(notify_char).await {
                warn!("Subscribing to notifications failed: {:?}", err);
                self.abandon(&peer).await;
                return;
            }

            self.pump_handle = Some(notifications_task(
                self.pump_cancel.clone(),
                Arc::clone(&peer),
                notify_char,
                self.status_tx.clone(),
                self.senders.clone(),
            ));
        }

        self.session_tx.send_replace(Some(Session {
            peer,
            write_char,
            notify_char,
        }));

        info!("Peripheral ready");
        self.set_state(LinkState::Ready).await;
    }

    /// `is_connected` can hang on some platforms; a slow answer counts as a
    /// dead link.
    async fn probe_connected(&self, session: &Session) -> bool {
        tokio::select! {
            _ = sleep(Duration::from_millis(IS_CONNECTED_DEADLINE)) => {
                warn!("Checking for connection status took too long");
                false
            },
            result = session.peer.is_connected() => match result {
                Ok(connected) => connected,
                Err(err) => {
                    warn!("Error checking for connection state: {:?}", err);
                    false
                },
            },
        }
    }

    /// Stop the pump, withdraw the published session, then disconnect the
    /// old peripheral. Publishing the withdrawal first keeps a dispatch
    /// racing the reconnect away from the dying handle.
    async fn teardown(&mut self) {
        self.pump_cancel.cancel();
        self.pump_cancel = CancellationToken::new();

        if let Some(handle) = self.pump_handle.take() {
            info!("Waiting for the notifications task to stop");
            match handle.await {
                Ok(Ok(())) => info!("Notifications task stopped"),
                Ok(Err(err)) => warn!("Notifications task failed: {}", err),
                Err(err) => warn!("Failed to join the notifications task: {}", err),
            }
        }

        if let Some(old) = self.session_tx.send_replace(None) {
            match old.peer.disconnect().await {
                Ok(()) => info!("Disconnected from {}", old.peer.id()),
                Err(err) => warn!("Failed to disconnect from the old peripheral: {:?}", err),
            }
        }
    }

    /// A failed establish releases the peripheral so it can advertise again
    /// and falls back to the running scan.
    async fn abandon(&mut self, peer: &Arc<dyn Peer>) {
        if let Err(err) = peer.disconnect().await {
            debug!("Failed to release the peripheral: {:?}", err);
        }

        self.set_state(LinkState::Scanning).await;
    }

    async fn dispose(&mut self) {
        info!("Disposing of the device connection");
        self.teardown().await;
    }

    async fn set_state(&mut self, state: LinkState) {
        if self.state == state {
            return;
        }

        self.state = state;
        for sender in &self.senders {
            let _ = sender.send(DeviceEvent::Link(state)).await;
        }
    }
}

fn notifications_task(
    cancel: CancellationToken,
    peer: Arc<dyn Peer>,
    notify_char: Uuid,
    status_tx: watch::Sender<Option<DeviceStatus>>,
    senders: Vec<mpsc::Sender<DeviceEvent>>,
) -> JoinHandle<Result<(), DeviceError>> {
    spawn(async move {
        let mut notification_stream = peer.notifications().await?;

        'mainloop: loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    break 'mainloop;
                },
                Some(data) = notification_stream.next() => {
                    if data.characteristic.eq(&notify_char) {
                        handle_notification(&status_tx, &senders, &data.value).await;
                    }
                },
            }
        }

        Ok(())
    })
}
