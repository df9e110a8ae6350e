//! medichat - terminal client for the MediBot medical assistant.

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::env;
use std::path::PathBuf;

use medichat::AppConfig;

struct CliArgs {
    server: Option<String>,
    config: Option<PathBuf>,
    precache: bool,
    origin: Option<String>,
}

fn print_usage() {
    eprintln!("Usage: medichat [OPTIONS]");
    eprintln!();
    eprintln!("Modes:");
    eprintln!("  (default)           Interactive chat; type /quit to exit");
    eprintln!("  --precache          Download the offline asset cache and exit");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --server <URL>      Chat server base URL (default: http://127.0.0.1:8080)");
    eprintln!("  --config <PATH>     Config file (default: {})", AppConfig::default_path().display());
    eprintln!("  --origin <URL>      Origin for relative cache assets (default: server URL)");
    eprintln!("  -h, --help          Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  {}     Overrides the configured server URL", medichat::config::SERVER_ENV);
    eprintln!("  RUST_LOG            Log filter, e.g. medichat=debug");
}

fn require_value(args: &[String], i: usize, flag: &str) -> String {
    args.get(i).cloned().unwrap_or_else(|| {
        eprintln!("Error: {flag} requires a value");
        std::process::exit(1);
    })
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut cli = CliArgs {
        server: None,
        config: None,
        precache: false,
        origin: None,
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--server" => {
                i += 1;
                cli.server = Some(require_value(&args, i, "--server"));
            }
            "--config" => {
                i += 1;
                cli.config = Some(PathBuf::from(require_value(&args, i, "--config")));
            }
            "--origin" => {
                i += 1;
                cli.origin = Some(require_value(&args, i, "--origin"));
            }
            "--precache" => cli.precache = true,
            "-h" | "--help" => {
                print_usage();
                std::process::exit(0);
            }
            other => {
                eprintln!("Error: unknown argument '{other}'");
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }
    cli
}

#[tokio::main]
async fn main() -> medichat::Result<()> {
    env_logger::init();
    let args = parse_args();

    let mut config = match &args.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    if let Some(server) = args.server {
        config.chat.server_url = server;
    }
    if let Some(origin) = args.origin {
        config.cache.origin = Some(origin);
    }

    #[cfg(feature = "cli")]
    {
        if args.precache {
            medichat::cli::precache(&config).await
        } else {
            medichat::cli::run(config).await
        }
    }
    #[cfg(not(feature = "cli"))]
    {
        let _ = (config, args.precache);
        eprintln!("CLI support not compiled in");
        std::process::exit(1);
    }
}
