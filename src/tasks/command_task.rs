use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use crate::error::TrackerError;
use crate::handlers::bot::{CommandHandler, Reply};
use crate::services::telegram::{Inbound, NotificationChannel, TelegramService};

const RETRY_DELAY: Duration = Duration::from_secs(3);

/// Runs the handler for one inbound event and sends its reply, if any.
pub async fn dispatch(
    handler: &CommandHandler,
    channel: &dyn NotificationChannel,
    inbound: Inbound,
) -> Result<(), TrackerError> {
    let (user_id, reply) = match inbound {
        Inbound::Text { user_id, text } => (user_id, handler.handle_text(user_id, &text).await),
        Inbound::Callback { user_id, data, .. } => {
            (user_id, handler.handle_callback(user_id, &data).await)
        }
    };

    match reply {
        Some(Reply { text, actions }) => channel.notify(user_id, &text, &actions).await,
        None => Ok(()),
    }
}

/// Long-polls the bot API and answers every command. Errors are logged and
/// polling resumes after a short pause.
pub async fn start_command_task(telegram: Arc<TelegramService>, handler: Arc<CommandHandler>) {
    log::info!("💬 Listening for bot commands");
    let mut offset: Option<i64> = None;

    loop {
        let updates = match telegram.get_updates(offset).await {
            Ok(updates) => updates,
            Err(e) => {
                log::error!("❌ Failed to fetch updates: {}", e);
                sleep(RETRY_DELAY).await;
                continue;
            }
        };

        for update in updates {
            offset = Some(update.update_id + 1);
            let Some(inbound) = update.into_inbound() else {
                continue;
            };

            if let Inbound::Callback { query_id, .. } = &inbound {
                if let Err(e) = telegram.answer_callback(query_id).await {
                    log::warn!("Failed to answer callback {}: {}", query_id, e);
                }
            }

            if let Err(e) = dispatch(&handler, &*telegram, inbound).await {
                log::error!("❌ Failed to send reply: {}", e);
            }
        }
    }
}
