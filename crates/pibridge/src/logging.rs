use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

/// Crates whose events follow `--log-level`. Everything else stays at warn.
const BRIDGE_TARGETS: [&str; 4] = [
    "pibridge",
    "pibridge_comm",
    "pibridge_frame",
    "pibridge_transport",
];

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Filter directives scoping `level` to the bridge crates.
///
/// At trace this includes every transaction state change.
pub fn filter_directives(level: LogLevel) -> String {
    let level = level.directive();
    let mut directives = String::from("warn");
    for target in BRIDGE_TARGETS {
        directives.push_str(&format!(",{target}={level}"));
    }
    directives
}

/// Log to stderr so stdout carries only command output.
///
/// `RUST_LOG` takes precedence over `level` when it is set and valid.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(level)));
    let verbose = matches!(level, LogLevel::Debug | LogLevel::Trace);

    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(verbose);

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}
