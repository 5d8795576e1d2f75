//! Production implementation of the central seam over btleplug.

use std::sync::Arc;

use async_trait::async_trait;
use btleplug::api::CentralEvent as AdapterEvent;
use btleplug::api::{
    Central as _, CentralState, Characteristic, Manager as _, Peripheral as _, ScanFilter,
    WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::{stream, StreamExt};
use log::{info, warn};
use uuid::Uuid;

use crate::ble::transport::{Central, CentralEvent, CentralEvents, Notification, Notifications, Peer};
use crate::error::DeviceError;

pub struct BtleCentral {
    adapter: Adapter,
}

impl BtleCentral {
    /// Bring up the first available adapter.
    pub async fn new() -> Result<BtleCentral, DeviceError> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;
        let adapter = adapters.into_iter().next().ok_or(DeviceError::NoAdapter)?;

        info!(
            "Using adapter {}",
            adapter.adapter_info().await.unwrap_or("UNKNOWN".to_string())
        );
        Ok(BtleCentral { adapter })
    }
}

#[async_trait]
impl Central for BtleCentral {
    async fn events(&self) -> Result<CentralEvents, DeviceError> {
        let events = self.adapter.events().await?;
        let adapter = self.adapter.clone();

        // btleplug only streams changes; report the current state up front so
        // an already-powered radio still triggers the initial scan. Refreshed
        // advertisements for a known peripheral arrive as DeviceUpdated.
        let initial = stream::iter([CentralEvent::PoweredOn]);
        let mapped = events.filter_map(move |event| {
            let adapter = adapter.clone();

            async move {
                match event {
                    AdapterEvent::StateUpdate(CentralState::PoweredOn) => {
                        Some(CentralEvent::PoweredOn)
                    },
                    AdapterEvent::DeviceDiscovered(id) | AdapterEvent::DeviceUpdated(id) => {
                        let peripheral = adapter.peripheral(&id).await.ok()?;
                        let local_name = match peripheral.properties().await {
                            Ok(Some(properties)) => properties.local_name,
                            Ok(None) => None,
                            Err(err) => {
                                warn!("Could not query peripheral for properties: {:?}", err);
                                None
                            },
                        };

                        Some(CentralEvent::Discovered {
                            peer: Arc::new(BtlePeer { peripheral }),
                            local_name,
                        })
                    },
                    _ => None,
                }
            }
        });

        Ok(Box::pin(initial.chain(mapped)))
    }

    async fn start_scan(&self, service: Uuid) -> Result<(), DeviceError> {
        let filter = ScanFilter {
            services: vec![service],
        };

        info!(
            "Scanning using adapter {}...",
            self.adapter.adapter_info().await.unwrap_or("UNKNOWN".to_string())
        );
        self.adapter.start_scan(filter).await?;
        Ok(())
    }
}

pub struct BtlePeer {
    peripheral: Peripheral,
}

impl BtlePeer {
    fn find_characteristic(&self, characteristic: Uuid) -> Result<Characteristic, DeviceError> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|candidate| candidate.uuid.eq(&characteristic))
            .ok_or(DeviceError::MissingCharacteristic)
    }
}

#[async_trait]
impl Peer for BtlePeer {
    fn id(&self) -> String {
        format!("{:?}", self.peripheral.id())
    }

    async fn connect(&self) -> Result<(), DeviceError> {
        self.peripheral.connect().await?;
        Ok(())
    }

    async fn discover_characteristics(&self, service: Uuid) -> Result<Vec<Uuid>, DeviceError> {
        self.peripheral.discover_services().await?;

        let mut found = Vec::new();
        for candidate in self.peripheral.services() {
            if !candidate.uuid.eq(&service) {
                continue;
            }

            for characteristic in &candidate.characteristics {
                found.push(characteristic.uuid);
            }
        }

        Ok(found)
    }

    async fn write(&self, characteristic: Uuid, payload: &[u8]) -> Result<(), DeviceError> {
        let characteristic = self.find_characteristic(characteristic)?;
        self.peripheral
            .write(&characteristic, payload, WriteType::WithResponse)
            .await?;
        Ok(())
    }

    async fn subscribe(&self, characteristic: Uuid) -> Result<(), DeviceError> {
        let characteristic = self.find_characteristic(characteristic)?;
        self.peripheral.subscribe(&characteristic).await?;
        Ok(())
    }

    async fn notifications(&self) -> Result<Notifications, DeviceError> {
        let stream = self.peripheral.notifications().await?;
        Ok(Box::pin(stream.map(|data| Notification {
            characteristic: data.uuid,
            value: data.value,
        })))
    }

    async fn is_connected(&self) -> Result<bool, DeviceError> {
        Ok(self.peripheral.is_connected().await?)
    }

    async fn disconnect(&self) -> Result<(), DeviceError> {
        self.peripheral.disconnect().await?;
        Ok(())
    }
}
