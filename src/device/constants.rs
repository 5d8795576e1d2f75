use uuid::Uuid;

/**
 * The advertised local name of the vacuum. Discovery matches on this name
 * only; the device carries no other usable identity.
 */
pub const DEVICE_NAME: &str = "VEAVON";

/**
 * How long (milliseconds) to wait for a state notification after a
 * successful action write before giving up on confirmation.
 */
pub const CONFIRM_DEADLINE: u64 = 3000;

/**
 * How long (milliseconds) checking if the peripheral is still connected may take
 */
pub const IS_CONNECTED_DEADLINE: u64 = 2000;

/**
 * The UUID of the vacuum's proprietary Bluetooth BLE service
 * (16-bit id ffb0 on the Bluetooth base UUID).
 */
pub const VACUUM_SERVICE: &str = "0000ffb0-0000-1000-8000-00805f9b34fb";

/**
 * The UUID of the remote GATT characteristic action commands are written to.
 */
pub const VACUUM_WRITE_CHARACTERISTIC: &str = "0000ffb1-0000-1000-8000-00805f9b34fb";

/**
 * The UUID of the remote GATT characteristic that notifies state payloads.
 */
pub const VACUUM_NOTIFY_CHARACTERISTIC: &str = "0000ffb2-0000-1000-8000-00805f9b34fb";

pub fn make_vacuum_service_uuid() -> Uuid {
    Uuid::parse_str(VACUUM_SERVICE).unwrap()
}

pub fn make_vacuum_write_uuid() -> Uuid {
    Uuid::parse_str(VACUUM_WRITE_CHARACTERISTIC).unwrap()
}

pub fn make_vacuum_notify_uuid() -> Uuid {
    Uuid::parse_str(VACUUM_NOTIFY_CHARACTERISTIC).unwrap()
}
