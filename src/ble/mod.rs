pub mod btle;
pub mod simulated;
pub mod transport;
