use clap::Parser;
use lora_airtime::config::Config;
use lora_airtime::{AirtimeBreakdown, AirtimeConfig, TimeUnit};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "lora-airtime")]
#[command(about = "LoRaWAN AirTime Calculator")]
#[command(version)]
struct Cli {
    /// Frame payload length in bytes
    #[arg(short = 'p', long = "pd-len")]
    pd_len: usize,

    /// Frame spreading factor (7-12)
    #[arg(short = 's', long = "sf")]
    sf: u8,

    /// Channel bandwidth in Hz
    #[arg(long)]
    bandwidth: Option<u32>,

    /// Coding rate index, 1-4 for 4/5 to 4/8
    #[arg(long)]
    coding_rate: Option<u8>,

    /// Preamble length in symbols
    #[arg(long)]
    preamble: Option<u16>,

    /// Disable the payload CRC
    #[arg(long)]
    no_crc: bool,

    /// Use implicit (fixed-length) header mode
    #[arg(long)]
    implicit_header: bool,

    /// Unit of the printed airtime
    #[arg(short, long, value_enum, default_value_t = TimeUnit::Seconds)]
    unit: TimeUnit,

    /// Print the full breakdown as JSON
    #[arg(long)]
    json: bool,

    /// Optional TOML file with radio defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level, overrides the config file
    #[arg(long)]
    log_level: Option<String>,
}

/// JSON form of one calculation
#[derive(Debug, Serialize)]
struct Report {
    #[serde(flatten)]
    params: AirtimeConfig,
    low_data_rate_optimization: bool,
    unit: &'static str,
    airtime: Option<f64>,
    breakdown: Option<AirtimeBreakdown>,
    error: Option<String>,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // --help and --version come through here as well
            if !e.use_stderr() {
                return ExitCode::SUCCESS;
            }
            eprintln!("Execution failed. Exit");
            return ExitCode::FAILURE;
        }
    };

    match run(&cli) {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Execution failed. Exit");
            eprintln!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<String> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let level = cli
        .log_level
        .as_deref()
        .unwrap_or(config.logging.level.as_str());
    let filter = EnvFilter::try_new(level)
        .map_err(|e| anyhow::anyhow!("Invalid log level '{}': {}", level, e))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("lora-airtime v{}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &cli.config {
        debug!("Radio defaults from {:?}: {:?}", path, config.radio);
    }

    render(cli, &config)
}

/// Compute the airtime described by `cli` and format it for stdout.
///
/// An airtime error is not fatal: it has already been logged and the
/// output reports a zero airtime.
fn render(cli: &Cli, config: &Config) -> anyhow::Result<String> {
    let params = airtime_config(cli, config);
    let result = params.breakdown();

    if cli.json {
        let report = Report {
            params,
            low_data_rate_optimization: params.low_data_rate_optimization(),
            unit: cli.unit.suffix(),
            airtime: result.as_ref().ok().map(|b| cli.unit.scale(b.total)),
            breakdown: result.as_ref().ok().copied(),
            error: result.as_ref().err().map(|e| e.to_string()),
        };
        return serde_json::to_string_pretty(&report)
            .map_err(|e| anyhow::anyhow!("Failed to serialize report: {}", e));
    }

    let airtime = match result {
        Ok(b) => cli.unit.scale(b.total).to_string(),
        Err(_) => "0".to_string(),
    };
    Ok(format!(
        "Payload Length={} SF={} AirTime={}",
        cli.pd_len, cli.sf, airtime
    ))
}

fn airtime_config(cli: &Cli, config: &Config) -> AirtimeConfig {
    let mut params = AirtimeConfig::from_defaults(cli.pd_len, cli.sf, &config.radio);
    if let Some(bandwidth) = cli.bandwidth {
        params = params.with_bandwidth_hz(bandwidth);
    }
    if let Some(coding_rate) = cli.coding_rate {
        params = params.with_coding_rate(coding_rate);
    }
    if let Some(preamble) = cli.preamble {
        params = params.with_preamble_symbols(preamble);
    }
    if cli.no_crc {
        params = params.with_crc_enabled(false);
    }
    if cli.implicit_header {
        params = params.with_explicit_header(false);
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("lora-airtime").chain(args.iter().copied()))
    }

    fn airtime_field(line: &str) -> f64 {
        line.rsplit("AirTime=").next().unwrap().parse().unwrap()
    }

    #[test]
    fn test_parse_required_args() {
        let cli = parse(&["-p", "13", "-s", "7"]).unwrap();
        assert_eq!(cli.pd_len, 13);
        assert_eq!(cli.sf, 7);
        assert_eq!(cli.unit, TimeUnit::Seconds);
        assert!(!cli.json);

        let cli = parse(&["--pd-len", "20", "--sf", "12"]).unwrap();
        assert_eq!(cli.pd_len, 20);
        assert_eq!(cli.sf, 12);
    }

    #[test]
    fn test_missing_args_fail() {
        let err = parse(&["-p", "13"]).unwrap_err();
        assert!(err.use_stderr());
        let err = parse(&["-s", "7"]).unwrap_err();
        assert!(err.use_stderr());
    }

    #[test]
    fn test_non_numeric_args_fail() {
        assert!(parse(&["-p", "thirteen", "-s", "7"]).unwrap_err().use_stderr());
        assert!(parse(&["-p", "13", "-s", "SF7"]).unwrap_err().use_stderr());
        assert!(parse(&["-p", "-1", "-s", "7"]).is_err());
    }

    #[test]
    fn test_help_is_not_a_failure() {
        let err = parse(&["--help"]).unwrap_err();
        assert!(!err.use_stderr());
    }

    #[test]
    fn test_render_text() {
        let cli = parse(&["-p", "13", "-s", "7"]).unwrap();
        let line = render(&cli, &Config::default()).unwrap();
        assert!(line.starts_with("Payload Length=13 SF=7 AirTime="));
        assert!((airtime_field(&line) - 0.046336).abs() < 1e-9);
    }

    #[test]
    fn test_render_units() {
        let cli = parse(&["-p", "13", "-s", "7", "--unit", "ms"]).unwrap();
        let line = render(&cli, &Config::default()).unwrap();
        assert!((airtime_field(&line) - 46.336).abs() < 1e-6);

        let cli = parse(&["-p", "13", "-s", "7", "-u", "us"]).unwrap();
        let line = render(&cli, &Config::default()).unwrap();
        assert!((airtime_field(&line) - 46_336.0).abs() < 1e-3);
    }

    #[test]
    fn test_render_invalid_sf_reports_zero() {
        let cli = parse(&["-p", "13", "-s", "13"]).unwrap();
        let line = render(&cli, &Config::default()).unwrap();
        assert_eq!(line, "Payload Length=13 SF=13 AirTime=0");
    }

    #[test]
    fn test_render_json() {
        let cli = parse(&["-p", "13", "-s", "7", "--json"]).unwrap();
        let output = render(&cli, &Config::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["payload_length"], 13);
        assert_eq!(value["spreading_factor"], 7);
        assert_eq!(value["low_data_rate_optimization"], false);
        assert_eq!(value["unit"], "s");
        assert_eq!(value["breakdown"]["payload_symbols"], 33.0);
        assert!(value["error"].is_null());
    }

    #[test]
    fn test_render_json_invalid_sf() {
        let cli = parse(&["-p", "13", "-s", "6", "--json"]).unwrap();
        let output = render(&cli, &Config::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert!(value["airtime"].is_null());
        assert_eq!(value["error"], "Wrong spreading factor 6 (expected 7..=12)");
    }

    #[test]
    fn test_overrides_beat_config_defaults() {
        let config = Config::parse("[radio]\nbandwidth_hz = 500000\ncoding_rate = 2\n").unwrap();

        let cli = parse(&["-p", "13", "-s", "7"]).unwrap();
        let params = airtime_config(&cli, &config);
        assert_eq!(params.bandwidth_hz, 500_000);
        assert_eq!(params.coding_rate, 2);

        let cli = parse(&[
            "-p",
            "13",
            "-s",
            "7",
            "--bandwidth",
            "250000",
            "--coding-rate",
            "4",
            "--preamble",
            "12",
            "--no-crc",
            "--implicit-header",
        ])
        .unwrap();
        let params = airtime_config(&cli, &config);
        assert_eq!(params.bandwidth_hz, 250_000);
        assert_eq!(params.coding_rate, 4);
        assert_eq!(params.preamble_symbols, 12);
        assert!(!params.crc_enabled);
        assert!(!params.explicit_header);
    }
}
