//! Radiocaching tracker: command-line entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                     │
//! │  NmeaLocationSource  FixedDoseRate  SystemClock              │
//! │  TlsConnector / TcpConnector   LogEventSink   StatusBoard    │
//! │                                                              │
//! │  ──────────────── Port Trait Boundary ───────────────────    │
//! │                                                              │
//! │  ┌──────────────────────────────────────────────────────┐    │
//! │  │   TrackerService (payload builder + PublishChannel)  │    │
//! │  └──────────────────────────────────────────────────────┘    │
//! │                                                              │
//! │  location-pump thread: NMEA   publish-worker thread: service │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reads NMEA sentences from `--nmea <path>` (or stdin), publishes one
//! message per throttled fix and prints the status board on exit.  Ctrl-C
//! (or SIGTERM) and the end of the input both stop the tracker with an
//! orderly disconnect.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{info, warn};

use radiocaching::adapters::dose_rate::FixedDoseRate;
use radiocaching::adapters::log_sink::LogEventSink;
use radiocaching::adapters::nmea::NmeaLocationSource;
use radiocaching::adapters::status::StatusBoard;
use radiocaching::adapters::time::SystemClock;
use radiocaching::adapters::tls_transport::{TcpConnector, TlsConnector};
use radiocaching::app::ports::LocationSource;
use radiocaching::app::service::TrackerService;
use radiocaching::config::{ConfigError, TrackerConfig};
use radiocaching::mqtt::Connector;
use radiocaching::pipeline::{self, FixMailbox, Shutdown};

/// Plain MQTT port used when `--plaintext` is given without `--port`.
const PLAINTEXT_PORT: u16 = 1883;

#[derive(Parser, Debug)]
#[command(
    name = "radiocaching",
    version,
    about = "Publish search-team positions and dose rate over MQTT"
)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Search team number (overrides config)
    #[arg(short, long)]
    team: Option<u16>,

    /// NMEA 0183 input (serial device or replay file); stdin when omitted
    #[arg(long)]
    nmea: Option<PathBuf>,

    /// Broker host name (overrides config)
    #[arg(long)]
    broker: Option<String>,

    /// Broker port (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// Connect without TLS
    #[arg(long)]
    plaintext: bool,
}

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {} - {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

fn load_config(args: &Args) -> Result<TrackerConfig> {
    let mut config = match &args.config {
        Some(path) => match TrackerConfig::load(path) {
            Ok(cfg) => {
                info!("Config loaded from {}", path.display());
                cfg
            }
            Err(ConfigError::NotFound) => {
                warn!("Config {} not found, using defaults", path.display());
                TrackerConfig::default()
            }
            Err(e) => return Err(e).with_context(|| format!("loading {}", path.display())),
        },
        None => TrackerConfig::default(),
    };

    if let Some(team) = args.team {
        config.team_number = team;
    }
    if let Some(host) = &args.broker {
        config.broker.host.clone_from(host);
    }
    if args.plaintext {
        config.broker.tls = false;
        if args.port.is_none() && config.broker.port == 8883 {
            config.broker.port = PLAINTEXT_PORT;
        }
    }
    if let Some(port) = args.port {
        config.broker.port = port;
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn run<C>(config: &TrackerConfig, connector: C, input: Box<dyn BufRead + Send>) -> Result<()>
where
    C: Connector + Send + 'static,
    C::Transport: Send + 'static,
{
    let service = TrackerService::new(
        config,
        connector,
        FixedDoseRate::new(config.dose_rate_usv_h),
        SystemClock::new(),
    );
    info!(
        "Team {} publishing to '{}' on {}:{} as {}",
        config.team_number,
        service.topic(),
        config.broker.host,
        config.broker.port,
        service.client_id()
    );

    let board = StatusBoard::new(config.team_number, config.dose_rate_usv_h);
    let status = board.handle();
    let mailbox = Arc::new(FixMailbox::new(config.delivery.backpressure));
    let shutdown = Arc::new(Shutdown::new());

    let s = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        s.request();
    })
    .context("installing signal handler")?;

    let worker = pipeline::spawn(
        service,
        Arc::clone(&mailbox),
        Arc::clone(&shutdown),
        (LogEventSink::new(), board),
    )
    .context("spawning publish worker")?;

    let source = NmeaLocationSource::new(input);
    let pump = match source.subscribe(config.location_interval_ms) {
        Ok(fixes) => Some(
            pipeline::spawn_pump(fixes, Arc::clone(&mailbox), Arc::clone(&shutdown))
                .context("spawning location pump")?,
        ),
        Err(e) => {
            warn!("NMEA: {}", e);
            shutdown.request();
            None
        }
    };

    let report = worker
        .join()
        .map_err(|_| anyhow!("publish worker panicked"))?;
    info!(
        "Delivered {} of {} handled fix(es)",
        report.delivered, report.handled
    );
    // A pump still blocked on input is left behind; the process exits anyway.
    if let Some(pump) = pump.filter(JoinHandle::is_finished) {
        if let Ok(posted) = pump.join() {
            info!("NMEA: {} fix(es) posted", posted);
        }
    }

    println!("{}", status.render());
    Ok(())
}

fn main() -> Result<()> {
    init_logging();
    info!("Radiocaching tracker v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let config = load_config(&args)?;

    let input: Box<dyn BufRead + Send> = match &args.nmea {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("opening {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };

    if config.broker.tls {
        let connector = TlsConnector::new().context("building TLS client configuration")?;
        run(&config, connector, input)
    } else {
        warn!("TLS disabled, telemetry is sent in clear text");
        run(&config, TcpConnector, input)
    }
}
