use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardMarkup, MaybeInaccessibleMessage, ParseMode};
use tracing::{error, warn};

use crate::bot::keyboards::{
    admin_menu, inbound_select_keyboard, invoice_keyboard, main_menu, plans_admin_keyboard,
    plans_keyboard, servers_keyboard, server_actions, single_config_keyboard,
};
use crate::bot::utils::{escape_html, inbound_catalog, prompt_for};
use crate::error::Error;
use crate::panel::PanelClient;
use crate::services::payment_service::{Decision, DecisionOutcome};
use crate::state::AppState;
use crate::wizard::Wizard;

fn id_suffix(data: &str) -> Option<i64> {
    data.rsplit('_').next().and_then(|s| s.parse().ok())
}

async fn edit(
    bot: &Bot,
    msg: &MaybeInaccessibleMessage,
    text: String,
    keyboard: Option<InlineKeyboardMarkup>,
) {
    let req = bot
        .edit_message_text(msg.chat().id, msg.id(), text)
        .parse_mode(ParseMode::Html);
    let res = match keyboard {
        Some(kb) => req.reply_markup(kb).await,
        None => req.await,
    };
    if let Err(e) = res {
        warn!("failed to edit message: {}", e);
    }
}

pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    state: AppState,
) -> Result<(), teloxide::RequestError> {
    let callback_id = q.id.clone();
    let tg_id = q.from.id.0 as i64;
    let is_admin = state.config.is_admin(tg_id);

    let data = match q.data {
        Some(d) => d,
        None => return Ok(()),
    };
    let message = match q.message {
        Some(m) => m,
        None => return Ok(()),
    };
    let chat_id = message.chat().id;

    let _ = bot.answer_callback_query(callback_id).await;

    match data.as_str() {
        "menu_home" => {
            edit(
                &bot,
                &message,
                "👋 Pick an option from the menu below:".to_string(),
                Some(main_menu(is_admin)),
            )
            .await;
        }

        "menu_buy" => {
            let plans = state.plans.get_active().await.unwrap_or_default();
            if plans.is_empty() {
                edit(&bot, &message, "❌ No plans on sale right now.".to_string(), None).await;
            } else {
                edit(
                    &bot,
                    &message,
                    "📋 Pick a tariff:".to_string(),
                    Some(plans_keyboard(&plans)),
                )
                .await;
            }
        }

        "menu_services" => {
            let user = state.users.get_by_tg_id(tg_id).await.ok().flatten();
            let purchases = match &user {
                Some(u) => state.purchases.get_by_user(u.id).await.unwrap_or_default(),
                None => Vec::new(),
            };

            if purchases.is_empty() {
                edit(
                    &bot,
                    &message,
                    "You have no services yet.".to_string(),
                    Some(main_menu(is_admin)),
                )
                .await;
            } else {
                let mut text = "🔐 Your services:\n".to_string();
                for p in &purchases {
                    let expiry = match p.expires_at {
                        Some(at) => at.format("%Y-%m-%d").to_string(),
                        None => "never expires".to_string(),
                    };
                    let status = if p.is_active { "🟢" } else { "🔴" };
                    text.push_str(&format!(
                        "\n{} {} | until {}\n<code>{}</code>\n",
                        status,
                        escape_html(&p.plan_name),
                        expiry,
                        escape_html(&p.sub_link)
                    ));
                }
                edit(&bot, &message, text, Some(main_menu(is_admin))).await;
            }
        }

        // ==================== BUY FLOW ====================

        d if d.starts_with("buy_plan_") => {
            let Some(plan_id) = id_suffix(d) else { return Ok(()) };
            match state.plans.get_by_id(plan_id).await {
                Ok(Some(plan)) => {
                    let volume = if plan.volume_gb > 0.0 {
                        format!("{} GB", plan.volume_gb)
                    } else {
                        "unlimited".to_string()
                    };
                    let duration = if plan.duration_days > 0 {
                        format!("{} days", plan.duration_days)
                    } else {
                        "lifetime".to_string()
                    };
                    let text = format!(
                        "🧾 Invoice\n\n📦 Plan: {}\n📊 Volume: {}\n⏳ Duration: {}\n💰 Price: {}\n\nPay to receive your service:",
                        escape_html(&plan.name),
                        volume,
                        duration,
                        plan.price
                    );
                    edit(&bot, &message, text, Some(invoice_keyboard(plan.id))).await;
                }
                _ => edit(&bot, &message, "❌ Plan not found.".to_string(), None).await,
            }
        }

        d if d.starts_with("pay_card_") => {
            let Some(plan_id) = id_suffix(d) else { return Ok(()) };
            let text = format!(
                "💳 Card-to-card payment\n\nCard number:\n<code>{}</code>\nHolder: {}\n\n\
                 ⚠️ Fake receipts lead to a permanent ban. The screenshot must be \
                 legible and show the tracking number.\n\n\
                 📎 After the transfer, send a photo of the receipt here.",
                escape_html(&state.config.card_number),
                escape_html(&state.config.card_holder)
            );
            // Any previous wizard is replaced, not merged.
            state.wizards.set(tg_id, Wizard::AwaitReceipt { plan_id });
            edit(&bot, &message, text, None).await;
        }

        d if d.starts_with("purchase_cfg_") => {
            let Some(purchase_id) = id_suffix(d) else { return Ok(()) };
            let purchase = match state.purchases.get_by_id(purchase_id).await {
                Ok(Some(p)) => p,
                _ => {
                    let _ = bot.send_message(chat_id, "❌ Service not found.").await;
                    return Ok(());
                }
            };

            let owner = state.users.get_by_tg_id(tg_id).await.ok().flatten();
            let allowed =
                is_admin || owner.map(|u| u.id == purchase.user_id).unwrap_or(false);
            if !allowed {
                return Ok(());
            }

            match state.provision_service.single_config(&purchase).await {
                Ok(Some(config)) => {
                    let _ = bot
                        .send_message(
                            chat_id,
                            format!("⚙️ Your single config:\n\n<code>{}</code>", escape_html(&config)),
                        )
                        .parse_mode(ParseMode::Html)
                        .await;
                }
                Ok(None) => {
                    let _ = bot
                        .send_message(
                            chat_id,
                            "⚠️ No config template is set for this server.\nUse your subscription link instead.",
                        )
                        .await;
                }
                Err(e) => {
                    let _ = bot
                        .send_message(chat_id, format!("❌ Could not build the config: {e}"))
                        .await;
                }
            }
        }

        // ==================== PAYMENT DECISIONS ====================

        d if d.starts_with("pay_approve_") || d.starts_with("pay_reject_") => {
            if !is_admin {
                return Ok(());
            }
            let Some(payment_id) = id_suffix(d) else { return Ok(()) };
            let decision = if d.starts_with("pay_approve_") {
                Decision::Approve
            } else {
                Decision::Reject
            };

            match state.payment_service.decide(payment_id, decision, None).await {
                Ok(DecisionOutcome::Approved { payment, provisioned }) => {
                    edit(
                        &bot,
                        &message,
                        format!(
                            "✅ Approved, service delivered ({}/{} inbounds).\nUUID: <code>{}</code>",
                            provisioned.created, provisioned.attempted, provisioned.purchase.uuid
                        ),
                        None,
                    )
                    .await;

                    let plan_name = state
                        .plans
                        .get_by_id(payment.plan_id)
                        .await
                        .ok()
                        .flatten()
                        .map(|p| p.name)
                        .unwrap_or_default();
                    if let Ok(Some(buyer)) = state.users.get_by_id(payment.user_id).await {
                        let _ = bot
                            .send_message(
                                ChatId(buyer.tg_id),
                                format!(
                                    "🎉 Your payment was approved!\n\n✅ Service: {}\n🔗 Subscription link:\n<code>{}</code>",
                                    escape_html(&plan_name),
                                    escape_html(&provisioned.link)
                                ),
                            )
                            .parse_mode(ParseMode::Html)
                            .reply_markup(single_config_keyboard(provisioned.purchase.id))
                            .await;
                    }
                }
                Ok(DecisionOutcome::Rejected(payment)) => {
                    edit(&bot, &message, "❌ Payment rejected.".to_string(), None).await;
                    if let Ok(Some(buyer)) = state.users.get_by_id(payment.user_id).await {
                        let _ = bot
                            .send_message(
                                ChatId(buyer.tg_id),
                                "❌ Unfortunately your payment was not approved.\nContact support to follow up.",
                            )
                            .await;
                    }
                }
                Err(Error::AlreadyDecided) => {
                    edit(
                        &bot,
                        &message,
                        "⚠️ This payment was already decided.".to_string(),
                        None,
                    )
                    .await;
                }
                Err(Error::NotFound(what)) => {
                    edit(&bot, &message, format!("❌ {what} not found."), None).await;
                }
                Err(e) => {
                    error!("payment {} decision failed: {}", payment_id, e);
                    edit(
                        &bot,
                        &message,
                        format!("❌ Payment approved but the service could not be built:\n{e}"),
                        None,
                    )
                    .await;
                }
            }
        }

        // ==================== ADMIN: SERVERS ====================

        "admin_menu" if is_admin => {
            edit(&bot, &message, "🛠 Admin panel".to_string(), Some(admin_menu())).await;
        }

        "admin_servers" if is_admin => {
            let servers = state.servers.get_all().await.unwrap_or_default();
            edit(
                &bot,
                &message,
                "🖥 Servers:".to_string(),
                Some(servers_keyboard(&servers)),
            )
            .await;
        }

        "admin_add_server" if is_admin => {
            let wizard = Wizard::add_server();
            let prompt = prompt_for(&wizard, false);
            state.wizards.set(tg_id, wizard);
            edit(
                &bot,
                &message,
                prompt,
                Some(crate::bot::keyboards::cancel_keyboard()),
            )
            .await;
        }

        d if d.starts_with("server_info_") && is_admin => {
            let Some(server_id) = id_suffix(d) else { return Ok(()) };
            match state.servers.get_by_id(server_id).await {
                Ok(Some(server)) => {
                    let inbound_count =
                        state.servers.count_inbounds(server.id).await.unwrap_or(0);
                    let status = if server.is_active { "✅" } else { "❌" };
                    let text = format!(
                        "🖥 Server: {}\n🔗 Panel: <code>{}</code>\n📡 Inbounds: {}\nStatus: {}\n\nSync inbounds before selling on this server.",
                        escape_html(&server.name),
                        escape_html(&server.panel_url),
                        inbound_count,
                        status
                    );
                    edit(&bot, &message, text, Some(server_actions(server.id))).await;
                }
                _ => edit(&bot, &message, "❌ Server not found.".to_string(), None).await,
            }
        }

        d if d.starts_with("server_sync_") && is_admin => {
            let Some(server_id) = id_suffix(d) else { return Ok(()) };
            let server = match state.servers.get_by_id(server_id).await {
                Ok(Some(s)) => s,
                _ => return Ok(()),
            };
            match state.sync_service.sync_server(&server).await {
                Ok(report) => {
                    let _ = bot
                        .send_message(
                            chat_id,
                            format!(
                                "✅ Sync done.\n➕ Added: {}\n🔄 Updated: {}",
                                report.added, report.updated
                            ),
                        )
                        .await;
                }
                Err(Error::AuthFailed) => {
                    let _ = bot
                        .send_message(chat_id, "❌ Panel refused the credentials, nothing synced.")
                        .await;
                }
                Err(e) => {
                    let _ = bot
                        .send_message(chat_id, format!("❌ Sync failed: {e}"))
                        .await;
                }
            }
        }

        d if d.starts_with("server_test_") && is_admin => {
            let Some(server_id) = id_suffix(d) else { return Ok(()) };
            let server = match state.servers.get_by_id(server_id).await {
                Ok(Some(s)) => s,
                _ => return Ok(()),
            };
            let report = async {
                let panel = PanelClient::for_server(&server)?;
                if !panel.login().await? {
                    return Ok::<_, Error>(format!(
                        "❌ Login refused by {}, check the credentials.",
                        server.name
                    ));
                }
                let online = panel.online_clients().await.unwrap_or(0);
                Ok(format!(
                    "✅ Connection OK!\nServer: {}\nOnline clients: {}",
                    server.name, online
                ))
            }
            .await;
            let text = match report {
                Ok(t) => t,
                Err(e) => format!("❌ Connection failed: {e}"),
            };
            let _ = bot.send_message(chat_id, text).await;
        }

        d if d.starts_with("server_del_") && is_admin => {
            let Some(server_id) = id_suffix(d) else { return Ok(()) };
            if let Err(e) = state.servers.delete(server_id).await {
                error!("failed to delete server {}: {:?}", server_id, e);
            }
            let servers = state.servers.get_all().await.unwrap_or_default();
            edit(
                &bot,
                &message,
                "🖥 Servers:".to_string(),
                Some(servers_keyboard(&servers)),
            )
            .await;
        }

        // ==================== ADMIN: PLANS ====================

        "admin_plans" if is_admin => {
            let plans = state.plans.get_active().await.unwrap_or_default();
            edit(
                &bot,
                &message,
                "💰 Plans:".to_string(),
                Some(plans_admin_keyboard(&plans)),
            )
            .await;
        }

        "admin_add_plan" if is_admin => {
            let wizard = Wizard::add_plan();
            let prompt = prompt_for(&wizard, false);
            state.wizards.set(tg_id, wizard);
            edit(
                &bot,
                &message,
                prompt,
                Some(crate::bot::keyboards::cancel_keyboard()),
            )
            .await;
        }

        d if d.starts_with("plan_del_") && is_admin => {
            let Some(plan_id) = id_suffix(d) else { return Ok(()) };
            if let Err(e) = state.plans.delete(plan_id).await {
                error!("failed to delete plan {}: {:?}", plan_id, e);
            }
            let plans = state.plans.get_active().await.unwrap_or_default();
            edit(
                &bot,
                &message,
                "💰 Plans:".to_string(),
                Some(plans_admin_keyboard(&plans)),
            )
            .await;
        }

        d if d.starts_with("plan_inb_") && is_admin => {
            let Some(inbound_id) = id_suffix(d) else { return Ok(()) };
            let mut draft = match state.wizards.get(tg_id) {
                Some(Wizard::SelectPlanInbounds { draft }) => draft,
                _ => {
                    let _ = bot
                        .send_message(chat_id, "⚠️ This wizard has expired, start over.")
                        .await;
                    return Ok(());
                }
            };

            if let Some(pos) = draft.inbound_ids.iter().position(|id| *id == inbound_id) {
                draft.inbound_ids.remove(pos);
            } else {
                draft.inbound_ids.push(inbound_id);
            }

            let catalog = inbound_catalog(&state).await.unwrap_or_default();
            let keyboard = inbound_select_keyboard(&catalog, &draft.inbound_ids);
            state.wizards.set(tg_id, Wizard::SelectPlanInbounds { draft });
            edit(
                &bot,
                &message,
                "🔌 Pick the inbounds this plan provisions on, then save:".to_string(),
                Some(keyboard),
            )
            .await;
        }

        "plan_save" if is_admin => {
            let draft = match state.wizards.take(tg_id) {
                Some(Wizard::SelectPlanInbounds { draft }) => draft,
                other => {
                    if let Some(w) = other {
                        state.wizards.set(tg_id, w);
                    }
                    return Ok(());
                }
            };

            // A plan with no inbounds can never be purchased; refuse to save.
            if draft.inbound_ids.is_empty() {
                let keyboard_draft = draft.clone();
                state
                    .wizards
                    .set(tg_id, Wizard::SelectPlanInbounds { draft });
                let catalog = inbound_catalog(&state).await.unwrap_or_default();
                edit(
                    &bot,
                    &message,
                    "⚠️ Pick at least one inbound before saving:".to_string(),
                    Some(inbound_select_keyboard(&catalog, &keyboard_draft.inbound_ids)),
                )
                .await;
                return Ok(());
            }

            let new_plan = karavan_db::models::plan::NewPlan {
                name: draft.name.clone(),
                price: draft.price,
                volume_gb: draft.volume_gb,
                duration_days: draft.duration_days,
                limit_ip: draft.limit_ip,
            };
            match state.plans.create(&new_plan, &draft.inbound_ids).await {
                Ok(plan) => {
                    edit(
                        &bot,
                        &message,
                        format!(
                            "✅ Plan {} created, linked to {} inbound(s).",
                            escape_html(&plan.name),
                            draft.inbound_ids.len()
                        ),
                        None,
                    )
                    .await;
                }
                Err(e) => {
                    error!("failed to create plan: {:?}", e);
                    edit(&bot, &message, "❌ Could not save the plan.".to_string(), None).await;
                }
            }
        }

        "wizard_cancel" => {
            state.wizards.clear(tg_id);
            edit(&bot, &message, "❌ Operation cancelled.".to_string(), None).await;
        }

        _ => {}
    }

    Ok(())
}
