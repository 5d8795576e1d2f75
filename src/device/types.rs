use std::time::SystemTime;

/// Commands the vacuum accepts on its write characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Auto,
    Edge,
    Spot,
    Dock,
}

impl Action {
    pub fn code(self) -> [u8; 4] {
        match self {
            Action::Auto => [0x46, 0x48, 0x00, 0x8e], // 4648008e
            Action::Edge => [0x46, 0x48, 0x02, 0x90], // 46480290
            Action::Spot => [0x46, 0x48, 0x01, 0x8f], // 4648018f
            Action::Dock => [0x46, 0x48, 0x03, 0x91], // 46480391
        }
    }
}

/// States the vacuum reports on its notify characteristic. The running
/// states reuse the action codes; the rest are reported spontaneously.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Standby,
    Done,
    Charging,
    Error,
    Auto,
    Edge,
    Spot,
    Dock,
}

impl Status {
    pub fn from_code(code: [u8; 4]) -> Option<Status> {
        match code {
            [0x46, 0x48, 0x05, 0x93] => Some(Status::Standby),  // 46480593
            [0x46, 0x48, 0x08, 0x96] => Some(Status::Done),     // 46480896
            [0x46, 0x48, 0x06, 0x94] => Some(Status::Charging), // 46480694
            [0x46, 0x48, 0x07, 0x95] => Some(Status::Error),    // 46480795
            [0x46, 0x48, 0x00, 0x8e] => Some(Status::Auto),
            [0x46, 0x48, 0x02, 0x90] => Some(Status::Edge),
            [0x46, 0x48, 0x01, 0x8f] => Some(Status::Spot),
            [0x46, 0x48, 0x03, 0x91] => Some(Status::Dock),
            _ => None,
        }
    }

    /// True while the vacuum is actively cleaning. This is what the
    /// accessory reports as "on".
    pub fn is_cleaning(self) -> bool {
        matches!(self, Status::Auto | Status::Edge | Status::Spot)
    }
}

/// The most recently reported device state, replaced wholesale on every
/// valid notification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceStatus {
    pub status: Status,
    pub observed_at: SystemTime,
}

/// Result of a dispatched action: whether any valid state notification
/// arrived before the confirmation deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Confirmed,
    Unconfirmed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Idle,
    Scanning,
    Connecting,
    Disconnecting,
    Ready,
}

#[derive(Debug, Clone)]
pub enum DeviceEvent {
    Link(LinkState),
    Status(DeviceStatus),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_cover_the_action_codes() {
        for action in [Action::Auto, Action::Edge, Action::Spot, Action::Dock] {
            assert!(Status::from_code(action.code()).is_some(), "{:?}", action);
        }
    }

    #[test]
    fn unknown_codes_are_rejected() {
        assert_eq!(Status::from_code([0x46, 0x48, 0x04, 0x92]), None);
        assert_eq!(Status::from_code([0x00, 0x00, 0x00, 0x00]), None);
    }

    #[test]
    fn cleaning_states_are_the_three_cleaning_programs() {
        assert!(Status::Auto.is_cleaning());
        assert!(Status::Edge.is_cleaning());
        assert!(Status::Spot.is_cleaning());
        assert!(!Status::Dock.is_cleaning());
        assert!(!Status::Standby.is_cleaning());
        assert!(!Status::Charging.is_cleaning());
        assert!(!Status::Done.is_cleaning());
        assert!(!Status::Error.is_cleaning());
    }
}
