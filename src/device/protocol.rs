use std::time::SystemTime;

use log::{debug, info, warn};
use tokio::sync::{mpsc, watch};
use tokio::time::{timeout, Duration};

use crate::device::connection::Session;
use crate::device::constants::CONFIRM_DEADLINE;
use crate::device::types::{Action, DeviceEvent, DeviceStatus, Outcome, Status};

/// Client half of the bridge. Cheap to clone; every call reads the latest
/// published session, so a handle created before a reconnect keeps working
/// after it.
#[derive(Clone)]
pub struct Vacuum {
    session_rx: watch::Receiver<Option<Session>>,
    status_rx: watch::Receiver<Option<DeviceStatus>>,
}

impl Vacuum {
    pub(crate) fn new(
        session_rx: watch::Receiver<Option<Session>>,
        status_rx: watch::Receiver<Option<DeviceStatus>>,
    ) -> Vacuum {
        Vacuum {
            session_rx,
            status_rx,
        }
    }

    /// The most recently reported device state, if any was ever observed.
    pub fn status(&self) -> Option<DeviceStatus> {
        *self.status_rx.borrow()
    }

    /// Write an action to the vacuum and wait for the next valid state
    /// notification as its implicit acknowledgement.
    ///
    /// The device offers nothing to correlate a notification with a
    /// command, so any valid state report confirms, not just the state the
    /// action should produce. Concurrent dispatches each arm their own
    /// waiter and a single report may confirm all of them.
    pub async fn dispatch(&self, action: Action) -> Outcome {
        let session = self.session_rx.borrow().clone();
        let session = match session {
            Some(session) => session,
            None => {
                warn!("Cannot dispatch {:?}: no active session", action);
                return Outcome::Unconfirmed;
            },
        };

        let write_char = match session.write_char {
            Some(write_char) => write_char,
            None => {
                warn!("Cannot dispatch {:?}: no write characteristic", action);
                return Outcome::Unconfirmed;
            },
        };

        info!("Dispatching {:?} ({})", action, hex::encode(action.code()));
        if let Err(err) = session.peer.write(write_char, &action.code()).await {
            // A write that never reached the device cannot be confirmed;
            // resolve now instead of arming a waiter doomed to time out.
            warn!("Failed to write action {:?}: {:?}", action, err);
            return Outcome::Unconfirmed;
        }

        // The deadline starts at the successful write. Mark the current
        // value as seen so only a notification arriving from here on can
        // confirm; dropping the receiver afterwards deregisters the waiter.
        let mut confirmation = self.status_rx.clone();
        confirmation.mark_unchanged();

        match timeout(Duration::from_millis(CONFIRM_DEADLINE), confirmation.changed()).await {
            Ok(Ok(())) => {
                debug!("Action {:?} confirmed", action);
                Outcome::Confirmed
            },
            Ok(Err(_)) => {
                debug!("Action {:?} unconfirmed: the session publisher is gone", action);
                Outcome::Unconfirmed
            },
            Err(_) => {
                info!("Action {:?} was not confirmed within the deadline", action);
                Outcome::Unconfirmed
            },
        }
    }
}

/// Validate a raw notification payload and apply it to the device state.
///
/// Payloads that are not exactly 4 bytes, or whose code is outside the
/// known set, are logged and dropped; the last valid state persists. A
/// valid payload replaces the state wholesale and emits exactly one event,
/// repeats included.
pub(crate) async fn handle_notification(
    status_tx: &watch::Sender<Option<DeviceStatus>>,
    senders: &[mpsc::Sender<DeviceEvent>],
    value: &[u8],
) {
    let code: [u8; 4] = match value.try_into() {
        Ok(code) => code,
        Err(_) => {
            warn!("Malformed state notification: {}", hex::encode(value));
            return;
        },
    };

    let status = match Status::from_code(code) {
        Some(status) => status,
        None => {
            warn!("Unexpected state: {}", hex::encode(code));
            return;
        },
    };

    let update = DeviceStatus {
        status,
        observed_at: SystemTime::now(),
    };

    debug!("Device state: {:?}", status);
    status_tx.send_replace(Some(update));

    for sender in senders {
        let _ = sender.send(DeviceEvent::Status(update)).await;
    }
}
