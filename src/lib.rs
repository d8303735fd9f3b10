//! LoRa packet time-on-air calculator.

pub mod airtime;
pub mod config;

pub use airtime::{compute_airtime, AirtimeBreakdown, AirtimeConfig, AirtimeError, TimeUnit};
