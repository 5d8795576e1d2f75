use std::num::ParseIntError;
use thiserror::Error;
use btleplug;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {name}")]
    MissingEnv { name: &'static str },

    #[error("Failed to parse environment variable {name}: {source}")]
    InvalidEnv { name: &'static str, source: ParseIntError },
}

#[derive(Error, Debug)]
pub enum AppRunError {
    #[error("Failed to start application (config): {source}")]
    ConfigError { #[from] source: ConfigError },

    #[error("Failed to start application (device): {source}")]
    DeviceError { #[from] source: DeviceError },
}

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Error communicating with device (btleplug): {source}")]
    Btle { #[from] source: btleplug::Error },

    #[error("No bluetooth adapter is available")]
    NoAdapter,

    #[error("A required bluetooth characteristic is not available")]
    MissingCharacteristic,

    #[error("The device is not connected")]
    NotConnected,
}

/// Status conditions reported to the smart-home layer by the accessory
/// getter/setter, mirroring the protocol's own status codes.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessoryError {
    #[error("The device state has not been observed yet")]
    StateUnavailable,

    #[error("The device did not confirm the command in time")]
    OperationTimedOut,
}
