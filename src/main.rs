use certbridge::{
    cli::{Cli, Commands},
    observability::{init_observability, log_config_info},
    ApiTlsConfig, AppConfig, Result, Server, APP_NAME, VERSION,
};
use clap::Parser;
use tracing::{error, info};

fn install_rustls_provider() {
    use rustls::crypto::{ring, CryptoProvider};

    if CryptoProvider::get_default().is_none() {
        // Err means another thread installed one first.
        let _ = ring::default_provider().install_default();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    install_rustls_provider();

    // Must happen before any config is read from the environment
    if let Err(e) = dotenvy::dotenv() {
        if !e.to_string().contains("not found") {
            eprintln!("Warning: Error loading .env file: {}", e);
        }
    }

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;
    init_observability(&config.observability)?;

    info!(app_name = APP_NAME, version = VERSION, "Loaded configuration");
    log_config_info(&config);

    let tls = ApiTlsConfig::from_env()?;
    let server = Server::new(config, tls);

    match cli.command() {
        Commands::CheckConfig => {
            server.build_state()?;
            info!("Configuration and CA material are valid");
            Ok(())
        }
        Commands::Serve => {
            if let Err(e) = server.run().await {
                error!(error = %e, "certbridge stopped with an error");
                return Err(e);
            }
            Ok(())
        }
    }
}
