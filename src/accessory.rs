use async_trait::async_trait;
use log::{debug, info};
use uuid::Uuid;

use crate::config::Config;
use crate::device::types::{Action, Outcome};
use crate::device::protocol::Vacuum;
use crate::error::AccessoryError;

/**
 * Display name of the published accessory.
 */
pub const ACCESSORY_NAME: &str = "Veavon Robot Vacuum";

/**
 * Stable identifier the accessory is published under.
 */
pub const ACCESSORY_ID: &str = "13121337-0815-42e5-8d00-2104973c3ccf";

/**
 * Device id (username) presented by the accessory server.
 */
pub const ACCESSORY_DEVICE_ID: &str = "13:12:13:37:DE:AD";

pub fn make_accessory_uuid() -> Uuid {
    Uuid::parse_str(ACCESSORY_ID).unwrap()
}

/// Identity and pairing parameters of the published accessory.
#[derive(Debug, Clone)]
pub struct AccessoryInfo {
    pub display_name: String,
    pub accessory_id: Uuid,
    pub device_id: String,
    pub port: u16,
    pub pin: String,
}

impl AccessoryInfo {
    pub fn from_config(config: &Config) -> AccessoryInfo {
        AccessoryInfo {
            display_name: ACCESSORY_NAME.to_string(),
            accessory_id: make_accessory_uuid(),
            device_id: ACCESSORY_DEVICE_ID.to_string(),
            port: config.port,
            pin: config.pin.clone(),
        }
    }
}

/// Boolean on/off view of the vacuum, the shape a binary power-switch
/// accessory consumes.
#[derive(Clone)]
pub struct Outlet {
    vacuum: Vacuum,
}

impl Outlet {
    pub fn new(vacuum: Vacuum) -> Outlet {
        Outlet { vacuum }
    }

    /// Accessory read: "on" means actively cleaning. Until the first state
    /// report arrives there is nothing truthful to answer.
    pub fn is_active(&self) -> Result<bool, AccessoryError> {
        match self.vacuum.status() {
            Some(observed) => Ok(observed.status.is_cleaning()),
            None => Err(AccessoryError::StateUnavailable),
        }
    }

    /// Accessory write: "on" starts an automatic clean, "off" sends the
    /// vacuum back to its dock.
    pub async fn set_active(&self, active: bool) -> Result<(), AccessoryError> {
        let action = if active { Action::Auto } else { Action::Dock };

        match self.vacuum.dispatch(action).await {
            Outcome::Confirmed => Ok(()),
            Outcome::Unconfirmed => Err(AccessoryError::OperationTimedOut),
        }
    }
}

/// The smart-home side of the bridge.
#[async_trait]
pub trait Accessory: Send {
    /// Make the accessory reachable. Called when the device link reaches
    /// ready, and again after every reconnect; must tolerate repeats.
    async fn advertise(&mut self);

    /// Withdraw the accessory on shutdown.
    async fn dispose(&mut self);
}

/// Accessory backend that publishes nothing itself: it announces the setup
/// parameters to the log so an operator can wire up whatever accessory
/// frontend they run, and answers state queries through the outlet.
pub struct ConsoleAccessory {
    info: AccessoryInfo,
    outlet: Outlet,
    published: bool,
}

impl ConsoleAccessory {
    pub fn new(info: AccessoryInfo, outlet: Outlet) -> ConsoleAccessory {
        ConsoleAccessory {
            info,
            outlet,
            published: false,
        }
    }
}

#[async_trait]
impl Accessory for ConsoleAccessory {
    async fn advertise(&mut self) {
        if self.published {
            debug!("Accessory is already advertised");
            return;
        }

        self.published = true;
        info!(
            "Accessory \"{}\" ({}) available on port {}, pin {}",
            self.info.display_name, self.info.device_id, self.info.port, self.info.pin,
        );
        debug!("Accessory setup id: {}", self.info.accessory_id);

        match self.outlet.is_active() {
            Ok(active) => info!("Switch position: {}", if active { "on" } else { "off" }),
            Err(_) => info!("Switch position: not yet observed"),
        }
    }

    async fn dispose(&mut self) {
        if self.published {
            self.published = false;
            info!("Accessory withdrawn");
        }
    }
}
