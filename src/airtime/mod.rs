//! LoRa time-on-air calculation.
//!
//! Airtime of one packet is the preamble plus the payload symbols, each
//! lasting `2^SF / BW` seconds:
//!
//!   T_preamble = (N_preamble + 4.25) * T_sym
//!   N_payload  = 8 + max(ceil((8PL - 4SF + 28 + 16CRC - 20IH) / (4(SF - 2DE))) * (CR + 4), 0)
//!
//! where IH is 1 in implicit (fixed-length) header mode and DE is 1 when low
//! data rate optimization is on, which here is always exactly SF11/SF12.
//!
//! All durations are in seconds, since the bandwidth is given in Hz.
//!
//! # Example
//!
//! ```
//! use lora_airtime::airtime::AirtimeConfig;
//!
//! let airtime = AirtimeConfig::new(13, 7).compute_airtime().unwrap();
//! assert!((airtime - 0.046336).abs() < 1e-9);
//! ```

pub mod error;

pub use error::AirtimeError;

use crate::config::RadioDefaults;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

pub const MIN_SPREADING_FACTOR: u8 = 7;
pub const MAX_SPREADING_FACTOR: u8 = 12;

/// Lowest spreading factor that requires low data rate optimization.
pub const LDRO_SPREADING_FACTOR: u8 = 11;

pub const MIN_CODING_RATE: u8 = 1;
pub const MAX_CODING_RATE: u8 = 4;

/// 125 kHz, the common LoRaWAN uplink channel width.
pub const DEFAULT_BANDWIDTH_HZ: u32 = 125_000;

/// Coding rate 4/5.
pub const DEFAULT_CODING_RATE: u8 = 1;

/// LoRaWAN preamble length in symbols.
pub const DEFAULT_PREAMBLE_SYMBOLS: u16 = 8;

/// Symbols always sent with the payload (sync word, header, ...), on top of the
/// coded payload blocks.
const PAYLOAD_BASE_SYMBOLS: f64 = 8.0;

/// Fractional symbols the radio adds after the programmed preamble.
const PREAMBLE_EXTRA_SYMBOLS: f64 = 4.25;

/// Modulation and packet parameters of a single LoRa transmission.
///
/// Only payload length and spreading factor are mandatory; everything else
/// starts at the usual LoRaWAN values and can be overridden with the `with_*`
/// methods. Nothing is validated until [`AirtimeConfig::compute_airtime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AirtimeConfig {
    /// Payload size in bytes
    pub payload_length: usize,
    /// Spreading factor (7-12)
    pub spreading_factor: u8,
    /// Bandwidth in Hz
    pub bandwidth_hz: u32,
    /// Coding rate index, 1-4 for 4/5 to 4/8
    pub coding_rate: u8,
    /// Preamble length in symbols
    pub preamble_symbols: u16,
    /// Explicit header mode. `false` means implicit (fixed-length) header.
    pub explicit_header: bool,
    /// Whether the payload CRC is sent
    pub crc_enabled: bool,
}

impl AirtimeConfig {
    pub fn new(payload_length: usize, spreading_factor: u8) -> Self {
        Self::from_defaults(payload_length, spreading_factor, &RadioDefaults::default())
    }

    /// Build a config whose optional fields come from loaded radio defaults.
    pub fn from_defaults(
        payload_length: usize,
        spreading_factor: u8,
        defaults: &RadioDefaults,
    ) -> Self {
        Self {
            payload_length,
            spreading_factor,
            bandwidth_hz: defaults.bandwidth_hz,
            coding_rate: defaults.coding_rate,
            preamble_symbols: defaults.preamble_symbols,
            explicit_header: defaults.explicit_header,
            crc_enabled: defaults.crc_enabled,
        }
    }

    pub fn with_bandwidth_hz(mut self, bandwidth_hz: u32) -> Self {
        self.bandwidth_hz = bandwidth_hz;
        self
    }

    pub fn with_coding_rate(mut self, coding_rate: u8) -> Self {
        self.coding_rate = coding_rate;
        self
    }

    pub fn with_preamble_symbols(mut self, preamble_symbols: u16) -> Self {
        self.preamble_symbols = preamble_symbols;
        self
    }

    pub fn with_explicit_header(mut self, explicit_header: bool) -> Self {
        self.explicit_header = explicit_header;
        self
    }

    pub fn with_crc_enabled(mut self, crc_enabled: bool) -> Self {
        self.crc_enabled = crc_enabled;
        self
    }

    /// Low data rate optimization, mandatory for SF11 and SF12.
    ///
    /// Derived from the spreading factor only and cannot be overridden.
    pub fn low_data_rate_optimization(&self) -> bool {
        self.spreading_factor >= LDRO_SPREADING_FACTOR
    }

    /// Total airtime in seconds.
    pub fn compute_airtime(&self) -> Result<f64, AirtimeError> {
        compute_airtime(self)
    }

    pub fn breakdown(&self) -> Result<AirtimeBreakdown, AirtimeError> {
        breakdown(self)
    }

    fn validate(&self) -> Result<(), AirtimeError> {
        if !(MIN_SPREADING_FACTOR..=MAX_SPREADING_FACTOR).contains(&self.spreading_factor) {
            return Err(AirtimeError::InvalidSpreadingFactor(self.spreading_factor));
        }
        if !(MIN_CODING_RATE..=MAX_CODING_RATE).contains(&self.coding_rate) {
            return Err(AirtimeError::InvalidCodingRate(self.coding_rate));
        }
        if self.bandwidth_hz == 0 {
            return Err(AirtimeError::ZeroBandwidth);
        }
        Ok(())
    }
}

/// Intermediate terms of an airtime computation. Durations are in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AirtimeBreakdown {
    pub symbol_duration: f64,
    /// Payload symbols including the fixed 8-symbol base
    pub payload_symbols: f64,
    pub preamble_duration: f64,
    pub payload_duration: f64,
    pub total: f64,
}

impl AirtimeBreakdown {
    pub fn as_duration(&self) -> Duration {
        Duration::from_secs_f64(self.total)
    }
}

/// Calculate the airtime of a packet in seconds.
///
/// An out-of-range spreading factor, coding rate or a zero bandwidth is
/// reported as an error and logged; it never panics.
pub fn compute_airtime(config: &AirtimeConfig) -> Result<f64, AirtimeError> {
    breakdown(config).map(|b| b.total)
}

/// Same as [`compute_airtime`] but keeps every intermediate term.
pub fn breakdown(config: &AirtimeConfig) -> Result<AirtimeBreakdown, AirtimeError> {
    if let Err(e) = config.validate() {
        warn!("{}", e);
        return Err(e);
    }

    let sf = config.spreading_factor as f64;
    let pl = config.payload_length as f64;
    let de = if config.low_data_rate_optimization() { 1.0 } else { 0.0 };
    let crc = if config.crc_enabled { 1.0 } else { 0.0 };
    let fixed_len = if config.explicit_header { 0.0 } else { 1.0 };

    let symbol_duration =
        2.0_f64.powi(config.spreading_factor as i32) / config.bandwidth_hz as f64;

    let numerator = 8.0 * pl - 4.0 * sf + 28.0 + 16.0 * crc - 20.0 * fixed_len;
    let denominator = 4.0 * (sf - 2.0 * de);

    let mut payload_symbols =
        (numerator / denominator).ceil() * (config.coding_rate as f64 + 4.0);
    if payload_symbols < 0.0 {
        payload_symbols = 0.0;
    }
    payload_symbols += PAYLOAD_BASE_SYMBOLS;

    let preamble_duration =
        (config.preamble_symbols as f64 + PREAMBLE_EXTRA_SYMBOLS) * symbol_duration;
    let payload_duration = payload_symbols * symbol_duration;
    let total = preamble_duration + payload_duration;

    debug!(
        "PL={} SF={} BW={} CR=4/{} T_sym={}s N_payload={} airtime={}s",
        config.payload_length,
        config.spreading_factor,
        config.bandwidth_hz,
        config.coding_rate + 4,
        symbol_duration,
        payload_symbols,
        total
    );

    Ok(AirtimeBreakdown {
        symbol_duration,
        payload_symbols,
        preamble_duration,
        payload_duration,
        total,
    })
}

/// Unit used when presenting an airtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TimeUnit {
    #[default]
    #[value(name = "s")]
    Seconds,
    #[value(name = "ms")]
    Milliseconds,
    #[value(name = "us")]
    Microseconds,
}

impl TimeUnit {
    /// Convert a value in seconds into this unit.
    pub fn scale(self, seconds: f64) -> f64 {
        match self {
            TimeUnit::Seconds => seconds,
            TimeUnit::Milliseconds => seconds * 1_000.0,
            TimeUnit::Microseconds => seconds * 1_000_000.0,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            TimeUnit::Seconds => "s",
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Microseconds => "us",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.suffix())
    }
}
