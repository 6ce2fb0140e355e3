use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use quorum_router::config::{Config, ConfigError};
use quorum_router::core::{HostRole, RequestFlags, Strategy};
use quorum_router::pool::TransactionOptions;
use quorum_router::topology::monitor::RTT_BUCKETS;
use quorum_router::utils::{format_duration, format_histogram, generate_id};
use quorum_router::QuorumRouter;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quorum-router")]
#[command(about = "Topology tracker and host router for quorum-commit replicated SQL clusters")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Quorum Router Team")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the topology monitor and report the cluster until interrupted
    Run {
        /// Path to configuration file
        #[arg(short, long, default_value = "config/dev.toml")]
        config: PathBuf,
    },
    /// Probe the cluster once and route a single request
    Route {
        /// Path to configuration file
        #[arg(short, long, default_value = "config/dev.toml")]
        config: PathBuf,
        /// Requested roles (repeat for several)
        #[arg(short, long, value_enum)]
        role: Vec<RoleArg>,
        /// Selection strategy
        #[arg(short, long, value_enum)]
        strategy: Option<StrategyArg>,
        /// Route as a read-write transaction
        #[arg(short, long)]
        write: bool,
    },
    /// Generate an example configuration file
    Config {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Validate configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show version information
    Version,
}

#[derive(Clone, Copy, ValueEnum)]
enum RoleArg {
    Master,
    SyncSlave,
    Slave,
}

impl From<RoleArg> for HostRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Master => HostRole::Master,
            RoleArg::SyncSlave => HostRole::SyncSlave,
            RoleArg::Slave => HostRole::Slave,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    RoundRobin,
    Nearest,
}

impl From<StrategyArg> for Strategy {
    fn from(strategy: StrategyArg) -> Self {
        match strategy {
            StrategyArg::RoundRobin => Strategy::RoundRobin,
            StrategyArg::Nearest => Strategy::Nearest,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => {
            run_router(config).await?;
        }
        Commands::Route {
            config,
            role,
            strategy,
            write,
        } => {
            route_once(config, role, strategy, write).await?;
        }
        Commands::Config { output } => {
            generate_config(output)?;
        }
        Commands::Validate { config } => {
            validate_config(config)?;
        }
        Commands::Version => {
            show_version();
        }
    }

    Ok(())
}

async fn run_router(config_path: PathBuf) -> anyhow::Result<()> {
    let config = Config::load_from_file(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    init_logging(&config)?;

    let run_id = generate_id("router");
    info!(
        "Starting quorum-router v{} ({})",
        env!("CARGO_PKG_VERSION"),
        run_id
    );
    info!("Configuration loaded from: {:?}", config_path);

    let router = QuorumRouter::new(&config).context("Failed to create router")?;
    let settings = router.settings().clone();
    info!(
        "Monitoring {} endpoints every {}",
        settings.endpoints.len(),
        format_duration(settings.probe_interval())
    );

    router.start().await;
    let started = Instant::now();

    let mut report = tokio::time::interval(settings.probe_interval());
    loop {
        tokio::select! {
            _ = report.tick() => {
                log_statistics(&router, started);
            }
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                info!("Shutting down after {}", format_duration(started.elapsed()));
                router.shutdown();
                break;
            }
        }
    }

    Ok(())
}

fn log_statistics(router: &QuorumRouter, started: Instant) {
    let state = router.cluster().monitor().current();
    let stats = router.cluster().statistics();

    info!(
        "Topology generation {} after {}: {} of {} endpoints alive",
        state.generation,
        format_duration(started.elapsed()),
        state.alive.count(),
        state.endpoint_count()
    );
    for (role, descriptor) in stats.iter() {
        info!(
            "  {} #{} {} {} rtt[{}]",
            role,
            descriptor.index,
            descriptor.host_port,
            if descriptor.alive { "alive" } else { "dead" },
            format_histogram::<RTT_BUCKETS>(&descriptor.probe_rtt_ms)
        );
    }
}

async fn route_once(
    config_path: PathBuf,
    roles: Vec<RoleArg>,
    strategy: Option<StrategyArg>,
    write: bool,
) -> anyhow::Result<()> {
    let config = Config::load_from_file(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    init_logging(&config)?;

    let router = QuorumRouter::new(&config).context("Failed to create router")?;
    let monitor = router.cluster().monitor();
    monitor.check_once(router.settings().probe_timeout()).await;

    let mut flags = roles
        .into_iter()
        .fold(RequestFlags::new(), |flags, role| flags.with_role(role.into()));
    if let Some(strategy) = strategy {
        flags = flags.with_strategy(strategy.into());
    }

    let options = if write {
        TransactionOptions::read_write()
    } else {
        TransactionOptions::read_only()
    };

    let transaction = router
        .cluster()
        .begin(flags, options, None)
        .await
        .with_context(|| format!("Failed to route request ({})", flags))?;

    let endpoint = &router.cluster().registry()[transaction.endpoint_index()];
    println!(
        "{} -> {} ({})",
        flags,
        endpoint,
        monitor.current().roles.role_of(endpoint.index)
    );

    print!("{}", router.cluster().statistics());
    Ok(())
}

fn generate_config(output: PathBuf) -> anyhow::Result<()> {
    println!("Generating configuration file: {:?}", output);

    Config::create_example_config(&output).context("Failed to generate config")?;

    println!("Configuration file generated successfully!");
    println!("Edit the file to match your environment and run:");
    println!("  quorum-router run --config {:?}", output);

    Ok(())
}

fn validate_config(config_path: PathBuf) -> anyhow::Result<()> {
    println!("Validating configuration file: {:?}", config_path);

    match Config::load_from_file(&config_path) {
        Ok(config) => {
            println!("✓ Configuration file is valid");
            println!(
                "  Probe interval: {}ms, timeout: {}ms",
                config.topology.probe_interval_ms, config.topology.probe_timeout_ms
            );
            println!("  Pool max size: {}", config.pool.max_size);
            println!("  Endpoints: {} instances", config.cluster.endpoints.len());
            for (i, endpoint) in config.cluster.endpoints.iter().enumerate() {
                let role = endpoint
                    .role
                    .map(|role| role.to_string())
                    .unwrap_or_else(|| "undeclared".to_string());
                println!("    #{}: {} ({})", i, endpoint.dsn, role);
            }
        }
        Err(e) => {
            eprintln!("✗ Configuration file validation failed:");
            match &e {
                ConfigError::IoError(msg) => eprintln!("  File error: {}", msg),
                ConfigError::ParseError(msg) => eprintln!("  Parse error: {}", msg),
                ConfigError::ValidationError(msg) => eprintln!("  Validation error: {}", msg),
                ConfigError::SerializeError(msg) => eprintln!("  Serialization error: {}", msg),
            }
            bail!(e);
        }
    }

    Ok(())
}

fn show_version() {
    println!("quorum-router v{}", env!("CARGO_PKG_VERSION"));
    println!("Topology tracker and host router for quorum-commit replicated SQL clusters");
    println!();
    println!(
        "Built with Rust {}",
        option_env!("CARGO_PKG_RUST_VERSION").unwrap_or("unknown")
    );
    println!("Target: {}", std::env::consts::ARCH);
    println!();
    println!("Features:");
    println!("  • Periodic endpoint probing with lock-free topology snapshots");
    println!("  • Role-aware routing with fallback to the master");
    println!("  • Round-robin and nearest host selection");
    println!("  • Role-partitioned cluster statistics");
}

fn init_logging(config: &Config) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = match config.logging.format.as_str() {
        "json" => builder.json().try_init(),
        _ => builder.try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized at level: {}", config.logging.level);
    Ok(())
}
