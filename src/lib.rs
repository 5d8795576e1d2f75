use std::env;
use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::accessory::{Accessory, AccessoryInfo, ConsoleAccessory, Outlet};
use crate::ble::btle::BtleCentral;
use crate::config::Config;
use crate::device::connection::Link;
use crate::device::types::{DeviceEvent, LinkState};
use crate::error::AppRunError;

pub mod accessory;
pub mod ble;
pub mod config;
pub mod device;
pub mod error;

pub fn init_logging() {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339(std::time::SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(log::LevelFilter::Info)
        .chain(std::io::stderr());

    if let Ok(log_file) = env::var("LOG_FILE") {
        dispatch = dispatch.chain(
            fern::log_file(log_file).expect("Failed to open LOG_FILE")
        );
    }

    dispatch.apply().expect("Failed to initialize logger");
}

/// Run the bridge until the token is cancelled: the device link on one
/// side, the accessory on the other, readiness wired to advertisement.
pub async fn run(config: Config, cancel: CancellationToken) -> Result<(), AppRunError> {
    let central = BtleCentral::new().await?;

    let (events_tx, mut events_rx) = mpsc::channel(64);
    let (link, vacuum) = Link::new(Arc::new(central), vec![events_tx]);
    let link_task = link.begin(cancel.child_token());

    let outlet = Outlet::new(vacuum);
    let mut accessory = ConsoleAccessory::new(AccessoryInfo::from_config(&config), outlet);

    'mainloop: loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                break 'mainloop;
            },
            event = events_rx.recv() => match event {
                None => {
                    break 'mainloop;
                },
                Some(DeviceEvent::Link(LinkState::Ready)) => {
                    accessory.advertise().await;
                },
                Some(DeviceEvent::Link(state)) => {
                    debug!("Link state: {:?}", state);
                },
                Some(DeviceEvent::Status(_)) => {},
            },
        }
    }

    accessory.dispose().await;
    if let Err(err) = link_task.await {
        warn!("Failed to join the connection task: {}", err);
    }

    Ok(())
}
