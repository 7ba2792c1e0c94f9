use std::sync::Arc;

use teloxide::{dispatching::Dispatcher as UpdateDispatcher, dptree, prelude::*};

use tokio::sync::mpsc;
use tracing::{info, warn};

use cbot_core::{
    config::Config,
    console::ConsoleEvent,
    dispatch::Dispatcher,
    messaging::MessagingPort,
    relay::{EventRelay, LifecycleEvent, RelayTargets},
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub dispatcher: Arc<Dispatcher>,
    pub relay: Arc<EventRelay>,
    pub messenger: Arc<dyn MessagingPort>,
}

/// Long-poll Telegram until Ctrl-C. Console events (if any) are relayed to the
/// configured console log chat for as long as the stream stays open.
pub async fn run_polling(
    cfg: Arc<Config>,
    dispatcher: Arc<Dispatcher>,
    console_events: Option<mpsc::UnboundedReceiver<ConsoleEvent>>,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    match bot.get_me().await {
        Ok(me) => info!(username = %me.username(), "cbot started"),
        Err(e) => warn!(error = %e, "get_me failed"),
    }
    info!(
        server_id = %cfg.server_id,
        prefix = %cfg.command_prefix,
        operators = cfg.console_operators.len(),
        "console commands enabled"
    );

    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let relay = Arc::new(EventRelay::new(
        RelayTargets::from_config(&cfg),
        messenger.clone(),
    ));

    if let Some(rx) = console_events {
        tokio::spawn(relay_console_events(rx, relay.clone()));
    }

    let state = Arc::new(AppState {
        cfg,
        dispatcher,
        relay,
        messenger,
    });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    let mut updates = UpdateDispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build();

    let shutdown = updates.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            match shutdown.shutdown() {
                Ok(done) => done.await,
                Err(e) => warn!(error = ?e, "dispatcher was not running"),
            }
        }
    });

    updates.dispatch().await;
    Ok(())
}

async fn relay_console_events(
    mut rx: mpsc::UnboundedReceiver<ConsoleEvent>,
    relay: Arc<EventRelay>,
) {
    while let Some(ev) = rx.recv().await {
        relay.relay_logged(&LifecycleEvent::Console(ev)).await;
    }
}
