pub mod connection;
pub mod constants;
pub mod protocol;
pub mod types;
