//! zoneauth: country-zone auth subrequest service.

use clap::{Parser, Subcommand};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use zoneauth::server::{self, Reply};
use zoneauth::{Config, DecisionEngine, Refresher, Scheduler, ZoneStore};

#[derive(Parser)]
#[command(name = "zoneauth")]
#[command(author = "Kaitu.io")]
#[command(version)]
#[command(about = "Allow or deny client IPs by country zone", long_about = None)]
struct Cli {
    /// Configuration file (JSON or YAML). Searched in . and /etc when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log file, or "-" for stderr
    #[arg(long, global = true, default_value = "./logs/zoneauth.log")]
    log_file: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh zones, then serve auth subrequests (default)
    Serve,

    /// Run one refresh cycle and print the report
    Refresh,

    /// Refresh zones, then print the verdict for one query
    Check {
        /// Country code, e.g. us
        country: String,

        /// Client IP address
        ip: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_file);

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let code = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(&config),
        Commands::Refresh => refresh(&config),
        Commands::Check { country, ip } => check(&config, &country, &ip),
    };
    std::process::exit(code);
}

fn init_logging(log_file: &Path) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    if log_file == Path::new("-") {
        builder.init();
        return;
    }

    let opened = log_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|_| OpenOptions::new().create(true).append(true).open(log_file));

    match opened {
        Ok(file) => {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
            builder.init();
        }
        Err(e) => {
            builder.init();
            log::warn!(
                "Failed to log to file {:?} ({}), using default stderr",
                log_file,
                e
            );
        }
    }
}

fn load_config(path: Option<&Path>) -> zoneauth::Result<Config> {
    if let Some(path) = path {
        let config = Config::load(path)?;
        log::info!("Loaded configuration from {:?}", path);
        return Ok(config);
    }

    match Config::discover()? {
        Some((config, path)) => {
            log::info!("Loaded configuration from {:?}", path);
            Ok(config)
        }
        None => {
            log::error!("No configuration file found, using defaults");
            Ok(Config::default())
        }
    }
}

fn startup(config: &Config) -> (Arc<ZoneStore>, Arc<Refresher>) {
    let store = Arc::new(ZoneStore::new());
    let refresher = Arc::new(Refresher::from_config(config, Arc::clone(&store)));
    refresher.refresh_all(&config.allowed_countries, config.block_anonymizers);
    (store, refresher)
}

fn serve(config: &Config) -> i32 {
    let (store, refresher) = startup(config);

    let _scheduler = match config.refresh_interval() {
        Some(interval) => match Scheduler::spawn(
            refresher,
            config.allowed_countries.clone(),
            config.block_anonymizers,
            interval,
        ) {
            Ok(scheduler) => Some(scheduler),
            Err(e) => {
                log::error!("Failed to start periodic refresh: {}", e);
                None
            }
        },
        None => None,
    };

    let engine = Arc::new(DecisionEngine::new(store, config.block_anonymizers));

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {}", e);
            return 1;
        }
    };

    match runtime.block_on(server::serve(&config.listen_addr(), engine)) {
        Ok(()) => 0,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn refresh(config: &Config) -> i32 {
    let store = Arc::new(ZoneStore::new());
    let refresher = Refresher::from_config(config, store);
    let report = refresher.refresh_all(&config.allowed_countries, config.block_anonymizers);

    for outcome in &report.outcomes {
        println!("{}", outcome);
    }
    println!("{}", report);

    if report.is_success() {
        0
    } else {
        1
    }
}

fn check(config: &Config, country: &str, ip: &str) -> i32 {
    let (store, _) = startup(config);
    let engine = DecisionEngine::new(store, config.block_anonymizers);
    let verdict = engine.evaluate(country, ip);

    let reply = Reply {
        code: if verdict.allowed() { 200 } else { 403 },
        text: verdict.text(),
    };
    match serde_json::to_string(&reply) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error: {}", e),
    }
    println!("reason: {}", verdict.reason);

    if verdict.allowed() {
        0
    } else {
        1
    }
}
