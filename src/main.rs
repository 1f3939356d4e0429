//! Fixlink - GNSS/INS sensor driver
//!
//! Connects to a positioning sensor over TCP or a serial line, decodes its
//! output stream and prints one record per line on stdout. Logs go to
//! stderr and, optionally, to a daily rotated file.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use fixlink_core::cli::{print_exit_codes, CliResult, ExitCodes, RecordFormat, WriterSink};
use fixlink_core::core::derive::Presenter;
use fixlink_core::core::transport::list_ports;
use fixlink_core::{
    DriverConfig, Driver, LoggingConfig, OutputFormat, RecordKind, RunOutcome, SerialConfig, TcpConfig,
    TransportConfig,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Upper bound on reads per tick so a busy link cannot starve the signal handler
const MAX_READS_PER_TICK: usize = 16;

/// Fixlink CLI
#[derive(Parser, Debug)]
#[command(
    name = "fixlink",
    version,
    about = "Driver for GNSS/INS positioning sensors over serial or TCP",
    long_about = None
)]
struct Cli {
    /// Settings file (defaults to the platform config directory)
    #[arg(short, long, env = "FIXLINK_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode (warnings and errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Also write daily rotated log files to this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Connection overrides shared by the subcommands that talk to a sensor
#[derive(Args, Debug, Default)]
struct ConnectionArgs {
    /// Connect over TCP to `ip:port`
    #[arg(long, value_name = "IP:PORT", conflicts_with = "serial")]
    tcp: Option<String>,

    /// Connect to a serial device
    #[arg(long, value_name = "DEVICE")]
    serial: Option<String>,

    /// Serial baud rate
    #[arg(short, long, requires = "serial")]
    baudrate: Option<u32>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Connect and print decoded records until interrupted
    Run {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Message families to decode (e.g. ODOMETRY,LLH,TF)
        #[arg(short = 'F', long, value_delimiter = ',')]
        formats: Vec<String>,

        /// Only print these record kinds (e.g. odometry,navsatfix)
        #[arg(short, long, value_delimiter = ',')]
        kinds: Vec<String>,

        /// Polling rate [Hz]
        #[arg(long)]
        rate: Option<f64>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = RecordFormat::Json)]
        output: RecordFormat,

        /// Exit on connection loss instead of reconnecting
        #[arg(long)]
        no_reconnect: bool,
    },

    /// List available serial ports
    ListPorts {
        /// Show detailed info
        #[arg(short, long)]
        detailed: bool,
    },

    /// Send one wheel-speed measurement to the sensor
    SendSpeed {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// GPS week number
        #[arg(long, default_value_t = 0)]
        week: u16,

        /// GPS time of week [ms]
        #[arg(long, default_value_t = 0)]
        tow_ms: u32,

        /// Speeds in mm/s: 1 (vehicle), 2 (rear axle) or 4 (per wheel)
        #[arg(required = true, allow_negative_numbers = true)]
        speeds: Vec<i32>,
    },

    /// Print the effective configuration
    Config {
        /// Write it to the settings file
        #[arg(long)]
        save: bool,
    },

    /// Show the exit code table
    ExitCodes,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match load_config(&cli) {
        Ok(config) => config,
        Err(result) => return finish(&result),
    };
    apply_log_overrides(&cli, &mut config.logging);
    let _guard = init_logging(&config.logging);

    tracing::debug!("fixlink v{}", fixlink_core::VERSION);

    let result = match cli.command {
        Commands::Run {
            ref connection,
            ref formats,
            ref kinds,
            rate,
            output,
            no_reconnect,
        } => {
            let run = RunOptions {
                kinds: kinds.clone(),
                output,
                no_reconnect,
            };
            match apply_overrides(&mut config, connection, formats, rate) {
                Ok(()) => run_driver(config, &run),
                Err(result) => result,
            }
        }
        Commands::ListPorts { detailed } => list(detailed),
        Commands::SendSpeed {
            ref connection,
            week,
            tow_ms,
            ref speeds,
        } => match apply_overrides(&mut config, connection, &[], None) {
            Ok(()) => send_speed(config, week, tow_ms, speeds),
            Err(result) => result,
        },
        Commands::Config { save } => show_config(&cli, &config, save),
        Commands::ExitCodes => {
            print_exit_codes();
            CliResult::success()
        }
    };

    finish(&result)
}

fn finish(result: &CliResult) -> ExitCode {
    if let Some(msg) = result.message() {
        if result.is_success() {
            eprintln!("{msg}");
        } else {
            eprintln!("error: {msg}");
        }
    }
    result.to_exit_code()
}

// ============ Configuration ============

fn load_config(cli: &Cli) -> Result<DriverConfig, CliResult> {
    let config = match &cli.config {
        Some(path) => DriverConfig::load_from(path)?,
        None => DriverConfig::load()?,
    };
    Ok(config)
}

fn apply_log_overrides(cli: &Cli, logging: &mut LoggingConfig) {
    if cli.verbose {
        logging.level = "debug".to_string();
    } else if cli.quiet {
        logging.level = "warn".to_string();
    }
    if cli.log_json {
        logging.json = true;
    }
    if let Some(dir) = &cli.log_dir {
        logging.directory = Some(dir.clone());
    }
}

fn apply_overrides(
    config: &mut DriverConfig,
    connection: &ConnectionArgs,
    formats: &[String],
    rate: Option<f64>,
) -> Result<(), CliResult> {
    if let Some(target) = &connection.tcp {
        let (ip, port) = target
            .rsplit_once(':')
            .and_then(|(ip, port)| Some((ip, port.parse::<u16>().ok()?)))
            .ok_or_else(|| CliResult::invalid_args(format!("expected IP:PORT, got '{target}'")))?;
        config.connection = TransportConfig::Tcp(TcpConfig::new(ip, port));
    }

    if let Some(device) = &connection.serial {
        let baud_rate = match (&config.connection, connection.baudrate) {
            (_, Some(rate)) => rate,
            (TransportConfig::Serial(current), None) => current.baud_rate,
            (TransportConfig::Tcp(_), None) => SerialConfig::default().baud_rate,
        };
        config.connection = TransportConfig::Serial(SerialConfig::new(device, baud_rate));
    }

    if !formats.is_empty() {
        config.formats = formats.to_vec();
    }
    if let Some(rate) = rate {
        config.rate_hz = rate;
    }
    config.validate()?;
    Ok(())
}

fn show_config(cli: &Cli, config: &DriverConfig, save: bool) -> CliResult {
    if save {
        let saved = match &cli.config {
            Some(path) => config.save_to(path).map(|()| path.clone()),
            None => config.save(),
        };
        return match saved {
            Ok(path) => CliResult::success_with_message(format!("Saved to {}", path.display())),
            Err(e) => e.into(),
        };
    }

    match toml::to_string_pretty(config) {
        Ok(text) => {
            print!("{text}");
            CliResult::success()
        }
        Err(e) => CliResult::error(ExitCodes::INTERNAL_ERROR, e.to_string()),
    }
}

// ============ Logging ============

fn init_logging(logging: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let text_layer = (!logging.json).then(|| fmt::layer().with_writer(std::io::stderr));
    let json_layer = logging.json.then(|| fmt::layer().json().with_writer(std::io::stderr));

    let (file_layer, guard) = match &logging.directory {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "fixlink.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(text_layer)
        .with(json_layer)
        .with(file_layer)
        .init();

    guard
}

// ============ Commands ============

struct RunOptions {
    kinds: Vec<String>,
    output: RecordFormat,
    no_reconnect: bool,
}

fn parse_kinds(names: &[String]) -> Result<Vec<RecordKind>, CliResult> {
    names
        .iter()
        .map(|name| name.parse::<RecordKind>().map_err(CliResult::invalid_args))
        .collect()
}

fn run_driver(config: DriverConfig, options: &RunOptions) -> CliResult {
    let kinds = match parse_kinds(&options.kinds) {
        Ok(kinds) => kinds,
        Err(result) => return result,
    };

    let runtime = match build_runtime() {
        Ok(runtime) => runtime,
        Err(e) => return CliResult::error(ExitCodes::INTERNAL_ERROR, format!("{e:#}")),
    };

    let mut sink = WriterSink::stdout(options.output);
    if !kinds.is_empty() {
        sink = sink.only(kinds);
    }
    let driver = Driver::new(config, Presenter::new(sink));
    if let Some(e) = driver.init_error() {
        let known: Vec<&str> = OutputFormat::ALL.iter().map(OutputFormat::name).collect();
        return CliResult::error(
            ExitCodes::CONFIG_ERROR,
            format!("{e}; known formats: {}", known.join(", ")),
        );
    }

    runtime.block_on(drive(driver, options.no_reconnect))
}

fn build_runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")
}

async fn drive(mut driver: Driver<Presenter<WriterSink<std::io::Stdout>>>, no_reconnect: bool) -> CliResult {
    let period = Duration::from_secs_f64(1.0 / driver.config().rate_hz);
    let reconnect_delay = Duration::from_secs_f64(driver.config().reconnect_delay_secs);

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let result = loop {
        if !driver.is_connected() {
            if let Err(e) = driver.connect() {
                if no_reconnect {
                    break CliResult::from(e);
                }
                tracing::warn!(error = %e, delay = ?reconnect_delay, "connect failed, retrying");
                tokio::select! {
                    _ = &mut shutdown => break CliResult::success(),
                    () = tokio::time::sleep(reconnect_delay) => continue,
                }
            }
        }

        tokio::select! {
            _ = &mut shutdown => break CliResult::success(),
            _ = interval.tick() => {}
        }

        let mut lost = None;
        for _ in 0..MAX_READS_PER_TICK {
            match driver.run_once() {
                Ok(RunOutcome::Idle) => break,
                Ok(RunOutcome::Processed { .. }) => {}
                Err(e) => {
                    lost = Some(e);
                    break;
                }
            }
        }

        if driver.sink().inner().has_failed() {
            break CliResult::error(ExitCodes::ERROR, "output closed");
        }
        if let Some(e) = lost {
            if no_reconnect {
                break CliResult::from(e);
            }
            tracing::warn!(error = %e, "connection lost");
        }
    };

    let stats = driver.stats();
    tracing::info!(
        bytes = stats.bytes_read,
        frames = stats.frames,
        sentences = stats.sentences,
        records = stats.records_published,
        skipped = stats.skipped_bytes,
        checksum_failures = stats.checksum_failures,
        decode_failures = stats.decode_failures,
        "driver stopped"
    );
    driver.disconnect();
    if let Err(e) = driver.sink_mut().inner_mut().flush() {
        tracing::debug!("flush failed: {e}");
    }
    result
}

fn list(detailed: bool) -> CliResult {
    let ports = match list_ports() {
        Ok(ports) => ports,
        Err(e) => return e.into(),
    };

    if ports.is_empty() {
        return CliResult::success_with_message("No serial ports found.");
    }

    for port in &ports {
        if detailed {
            println!("  {} [{:?}]", port.port_name, port.port_type);
        } else {
            println!("{}", port.port_name);
        }
    }
    CliResult::success()
}

fn send_speed(config: DriverConfig, week: u16, tow_ms: u32, speeds: &[i32]) -> CliResult {
    let mut driver = Driver::new(config, fixlink_core::CollectingSink::default());
    if let Err(e) = driver.connect() {
        return e.into();
    }
    driver.set_wheelspeed_time(week, tow_ms);

    let result = match driver.send_wheelspeed(speeds) {
        Ok(Some(written)) => CliResult::success_with_message(format!("Sent {written} bytes")),
        Ok(None) => CliResult::invalid_args(format!(
            "expected 1, 2 or 4 speeds, got {}",
            speeds.len()
        )),
        Err(e) => e.into(),
    };
    driver.disconnect();
    result
}
