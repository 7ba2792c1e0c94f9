use std::sync::Arc;

use tracing::{info, warn};

use cbot_att::{AttAccessExchanger, AttConsoleConnector};

use cbot_core::{config::Config, console::ConsoleSupervisor, dispatch::Dispatcher};

#[tokio::main]
async fn main() -> Result<(), cbot_core::Error> {
    cbot_core::logging::init("cbot")?;

    let cfg = Arc::new(Config::load()?);

    let exchanger = Arc::new(AttAccessExchanger::from_config(&cfg)?);
    let connector = Arc::new(AttConsoleConnector::from_config(&cfg));
    let mut supervisor = ConsoleSupervisor::new(cfg.server_id, exchanger, connector);
    let console_events = supervisor.subscribe();
    let supervisor = Arc::new(supervisor);

    // An offline server is not fatal; the first `cmd` retries the connection.
    let server_id = supervisor.server_id();
    match supervisor.connect().await {
        Ok(session) => info!(
            %server_id,
            session_id = session.id(),
            endpoint = session.endpoint(),
            "console connected"
        ),
        Err(e) => warn!(%server_id, error = %e, "initial console connection failed"),
    }

    let dispatcher = Arc::new(Dispatcher::new(cfg.command_prefix, supervisor.clone()));

    let polled = cbot_telegram::router::run_polling(cfg, dispatcher, Some(console_events)).await;

    supervisor.shutdown().await;
    info!("console disconnected");

    polled.map_err(|e| cbot_core::Error::External(format!("telegram bot failed: {e}")))?;
    Ok(())
}
