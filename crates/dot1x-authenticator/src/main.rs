use clap::Parser;
use dot1x_authenticator::{
    AuditEntry, AuditEventType, AuditLogger, AuthenticatorService, Config, LoggingEventHandler,
};
use std::process;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 802.1X port authenticator relaying EAP to RADIUS
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "dot1x-authenticator")]
struct Cli {
    /// Path to configuration file
    #[arg(value_name = "CONFIG", default_value = "dot1x.json")]
    config_path: String,

    /// Validate configuration and exit
    #[arg(short, long)]
    validate: bool,

    /// Print version information and exit
    #[arg(short = 'V', long)]
    version: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.version {
        println!("dot1x-authenticator v{}", env!("CARGO_PKG_VERSION"));
        println!("IEEE 802.1X authenticator with RADIUS pass-through");
        println!();
        println!("Repository: {}", env!("CARGO_PKG_REPOSITORY"));
        println!("License: {}", env!("CARGO_PKG_LICENSE"));
        process::exit(0);
    }

    let config = match Config::from_file(&cli.config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing_subscriber::registry()
                .with(EnvFilter::new("info"))
                .with(tracing_subscriber::fmt::layer())
                .init();

            if cli.validate {
                eprintln!("Configuration validation failed!");
                eprintln!("   Error: {}", e);
                process::exit(1);
            }

            warn!("Could not load config file from {}: {}", cli.config_path, e);
            info!("Creating example configuration at: {}", cli.config_path);

            if let Err(e) = Config::example().to_file(&cli.config_path) {
                error!("Error creating example config: {}", e);
                process::exit(1);
            }

            info!("Please edit {} and restart the authenticator", cli.config_path);
            process::exit(0);
        }
    };

    if cli.validate {
        println!("Configuration validated successfully!");
        println!();
        println!("Configuration summary:");
        println!("  Interface: {}", config.interface);
        println!("  RADIUS server: {}:{}", config.radius_server, config.radius_port);
        println!("  Called-Station-Id: {}", config.called_station_id);
        println!(
            "  Retries: {} x {}s, held period {}s",
            config.retries, config.timeout_secs, config.held_period_secs
        );
        println!("  Log level: {}", config.log_level.as_deref().unwrap_or("info"));
        println!(
            "  Strict Message-Authenticator: {}",
            config.strict_message_authenticator
        );
        if let Some(ref path) = config.audit_log_path {
            println!("  Audit log: {}", path);
        }
        if !config.ports.is_empty() {
            println!();
            println!("Ports:");
            for port in &config.ports {
                let status = if port.enabled { "enabled" } else { "disabled" };
                let name = port.name.as_deref().unwrap_or("(unnamed)");
                println!("  {} {} - {}", port.port_id, status, name);
            }
        }
        process::exit(0);
    }

    let log_level = config.log_level.as_deref().unwrap_or("info");
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("dot1x-authenticator v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded configuration from: {}", cli.config_path);

    let audit = match AuditLogger::new(config.audit_log_path.clone()) {
        Ok(audit) => audit,
        Err(e) => {
            error!("Failed to open audit log: {}", e);
            process::exit(1);
        }
    };
    if let Some(path) = audit.file_path() {
        info!("Audit logging enabled: {}", path);
    }

    let handler = Arc::new(LoggingEventHandler::new(audit.clone()));
    let service = match AuthenticatorService::bind(&config, handler, audit.clone()).await {
        Ok(service) => service,
        Err(e) => {
            error!("Failed to start authenticator on {}: {}", config.interface, e);
            process::exit(1);
        }
    };

    let handle = service.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down");
            let _ = handle.shutdown().await;
        }
    });

    audit.log(AuditEntry::new(AuditEventType::ServiceStart).with_details(config.interface.clone()));
    info!(interface = %config.interface, "Listening for EAPOL");
    info!("Press Ctrl+C to stop");

    let result = service.run().await;
    audit.log(AuditEntry::new(AuditEventType::ServiceStop));

    if let Err(e) = result {
        error!("Authenticator error: {}", e);
        process::exit(1);
    }
}
