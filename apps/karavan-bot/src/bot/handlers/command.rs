use teloxide::prelude::*;
use teloxide::types::{ChatId, ParseMode};
use tracing::{error, info, warn};

use crate::bot::keyboards::{cancel_keyboard, inbound_select_keyboard, main_menu, payment_review_keyboard};
use crate::bot::utils::{escape_html, inbound_catalog, prompt_for};
use crate::state::AppState;
use crate::wizard::{Feed, Wizard};

pub async fn message_handler(
    bot: Bot,
    msg: Message,
    state: AppState,
) -> Result<(), teloxide::RequestError> {
    let tg_id = msg.chat.id.0;

    if msg.photo().is_some() {
        handle_receipt_photo(&bot, &msg, &state).await;
        return Ok(());
    }

    let text = match msg.text() {
        Some(t) => t,
        None => return Ok(()),
    };

    if text.starts_with("/start") {
        let first_name = msg.from.as_ref().map(|u| u.first_name.clone());
        let username = msg.from.as_ref().and_then(|u| u.username.clone());
        let is_admin = state.config.is_admin(tg_id);

        if let Err(e) = state
            .users
            .upsert(tg_id, first_name.as_deref(), username.as_deref(), is_admin)
            .await
        {
            error!("failed to upsert user {}: {:?}", tg_id, e);
        }

        let _ = bot
            .send_message(
                msg.chat.id,
                "👋 Welcome!\n\nPick an option from the menu below:",
            )
            .reply_markup(main_menu(is_admin))
            .await;
        return Ok(());
    }

    if text.starts_with("/cancel") {
        // Always safe, even with no wizard active.
        let had_wizard = state.wizards.clear(tg_id);
        let reply = if had_wizard {
            "❌ Operation cancelled."
        } else {
            "Nothing to cancel."
        };
        let _ = bot.send_message(msg.chat.id, reply).await;
        return Ok(());
    }

    if text.starts_with("/admin") {
        if state.config.is_admin(tg_id) {
            let _ = bot
                .send_message(msg.chat.id, "🛠 Admin panel")
                .reply_markup(crate::bot::keyboards::admin_menu())
                .await;
        }
        return Ok(());
    }

    // Free text only matters while a wizard is collecting fields.
    let wizard = match state.wizards.take(tg_id) {
        Some(w) => w,
        None => return Ok(()),
    };

    match wizard.feed(text) {
        Feed::Continue { wizard, invalid } => {
            let prompt = prompt_for(&wizard, invalid);
            state.wizards.set(tg_id, wizard);
            let _ = bot
                .send_message(msg.chat.id, prompt)
                .reply_markup(cancel_keyboard())
                .await;
        }
        Feed::ServerReady(draft) => {
            match state
                .servers
                .create(
                    &draft.name,
                    &draft.panel_url,
                    &draft.username,
                    &draft.password,
                    &draft.subscription_url,
                    draft.config_template.as_deref(),
                )
                .await
            {
                Ok(server) => {
                    info!("server {} registered", server.name);
                    let _ = bot
                        .send_message(
                            msg.chat.id,
                            format!(
                                "✅ Server {} saved. Run \"Sync inbounds\" before selling on it.",
                                server.name
                            ),
                        )
                        .await;
                }
                Err(e) => {
                    error!("failed to save server: {:?}", e);
                    let _ = bot
                        .send_message(msg.chat.id, "❌ Could not save the server.")
                        .await;
                }
            }
        }
        Feed::PlanFieldsDone(draft) => {
            let catalog = match inbound_catalog(&state).await {
                Ok(c) => c,
                Err(e) => {
                    error!("failed to load inbounds: {:?}", e);
                    let _ = bot
                        .send_message(msg.chat.id, "❌ Could not load inbounds.")
                        .await;
                    return Ok(());
                }
            };
            if catalog.is_empty() {
                let _ = bot
                    .send_message(
                        msg.chat.id,
                        "⚠️ No inbounds synced yet. Sync a server first, then create the plan.",
                    )
                    .await;
                return Ok(());
            }

            let keyboard = inbound_select_keyboard(&catalog, &draft.inbound_ids);
            state.wizards.set(tg_id, Wizard::SelectPlanInbounds { draft });
            let _ = bot
                .send_message(
                    msg.chat.id,
                    "🔌 Pick the inbounds this plan provisions on, then save:",
                )
                .reply_markup(keyboard)
                .await;
        }
        Feed::NotConsumed(wizard) => {
            let reminder = prompt_for(&wizard, false);
            state.wizards.set(tg_id, wizard);
            let _ = bot.send_message(msg.chat.id, reminder).await;
        }
    }

    Ok(())
}

/// Receipt intake: only meaningful while an AwaitReceipt wizard is active.
/// Creates the pending payment and fans the review request out to admins;
/// one admin failing to receive it must not block the others.
async fn handle_receipt_photo(bot: &Bot, msg: &Message, state: &AppState) {
    let tg_id = msg.chat.id.0;

    let plan_id = match state.wizards.get(tg_id) {
        Some(Wizard::AwaitReceipt { plan_id }) => plan_id,
        _ => return,
    };

    // Largest size carries the most legible copy of the receipt.
    let file_id = msg
        .photo()
        .and_then(|sizes| sizes.last())
        .map(|p| p.file.id.0.clone())
        .unwrap_or_default();

    let first_name = msg.from.as_ref().map(|u| u.first_name.clone());
    let username = msg.from.as_ref().and_then(|u| u.username.clone());
    let user = match state
        .users
        .upsert(
            tg_id,
            first_name.as_deref(),
            username.as_deref(),
            state.config.is_admin(tg_id),
        )
        .await
    {
        Ok(u) => u,
        Err(e) => {
            error!("failed to resolve user {}: {:?}", tg_id, e);
            let _ = bot
                .send_message(msg.chat.id, "❌ Something went wrong, try again.")
                .await;
            return;
        }
    };

    let (payment, plan) = match state
        .payment_service
        .submit_receipt(user.id, plan_id, &file_id)
        .await
    {
        Ok(res) => res,
        Err(e) => {
            error!("failed to record payment for user {}: {}", user.id, e);
            let _ = bot
                .send_message(msg.chat.id, "❌ Could not record your payment, try again.")
                .await;
            return;
        }
    };
    state.wizards.clear(tg_id);

    let _ = bot
        .send_message(
            msg.chat.id,
            "✅ Receipt received and queued for review.\nYour service is delivered as soon as an admin approves it.",
        )
        .await;

    let caption = format!(
        "🔔 New card payment #{}\n👤 {} (@{})\n📦 {} for {}",
        payment.id,
        escape_html(user.first_name.as_deref().unwrap_or("?")),
        escape_html(user.username.as_deref().unwrap_or("-")),
        escape_html(&plan.name),
        plan.price,
    );

    for admin_id in &state.config.admin_ids {
        let admin_chat = ChatId(*admin_id);
        if let Err(e) = bot.forward_message(admin_chat, msg.chat.id, msg.id).await {
            warn!("could not forward receipt to admin {}: {}", admin_id, e);
        }
        if let Err(e) = bot
            .send_message(admin_chat, caption.clone())
            .parse_mode(ParseMode::Html)
            .reply_markup(payment_review_keyboard(payment.id))
            .await
        {
            warn!("could not notify admin {}: {}", admin_id, e);
        }
    }
}
