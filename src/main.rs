//! wa-sender binary entry point.

use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};
use wa_sender::api::{serve_with_state, AppState};
use wa_sender::cli::{self, Args};
use wa_sender::config::Config;
use wa_sender::driver::BridgeDriverFactory;
use wa_sender::{logging, SessionManager};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("Try 'wa-sender --help' for more information.");
            return ExitCode::FAILURE;
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }

    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(&args)?;
    logging::init(Some(config.log_filter()));

    info!("wa-sender v{}", env!("CARGO_PKG_VERSION"));

    let server_config = config.to_server_config()?;
    let factory = Arc::new(BridgeDriverFactory::new(config.to_bridge_settings()?));
    let session = SessionManager::new(config.to_session_settings(), factory);

    info!(
        session_dir = %config.whatsapp.session_dir.display(),
        client_id = %config.whatsapp.client_id,
        "WhatsApp session configured"
    );

    if config.whatsapp.autostart {
        session.start();
    }

    let state = AppState::new(session.clone()).with_template(config.to_template());
    let served = serve_with_state(server_config, state).await;

    session.shutdown().await;
    served?;

    info!("wa-sender stopped");
    Ok(())
}
