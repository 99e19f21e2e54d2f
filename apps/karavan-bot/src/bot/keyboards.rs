use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use karavan_db::models::plan::Plan;
use karavan_db::models::server::{Inbound, Server};

pub fn main_menu(is_admin: bool) -> InlineKeyboardMarkup {
    let mut rows = vec![
        vec![
            InlineKeyboardButton::callback("🛒 Buy service", "menu_buy"),
            InlineKeyboardButton::callback("👤 My services", "menu_services"),
        ],
    ];
    if is_admin {
        rows.push(vec![InlineKeyboardButton::callback(
            "⚙️ Admin panel",
            "admin_menu",
        )]);
    }
    InlineKeyboardMarkup::new(rows)
}

pub fn plans_keyboard(plans: &[Plan]) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();
    for plan in plans {
        let volume = if plan.volume_gb > 0.0 {
            format!("{} GB", plan.volume_gb)
        } else {
            "∞".to_string()
        };
        let duration = if plan.duration_days > 0 {
            format!("{}d", plan.duration_days)
        } else {
            "lifetime".to_string()
        };
        rows.push(vec![InlineKeyboardButton::callback(
            format!("💎 {} | {} | {} | {}", plan.name, volume, duration, plan.price),
            format!("buy_plan_{}", plan.id),
        )]);
    }
    rows.push(vec![InlineKeyboardButton::callback("🔙 Back", "menu_home")]);
    InlineKeyboardMarkup::new(rows)
}

pub fn invoice_keyboard(plan_id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            "💳 Pay card-to-card",
            format!("pay_card_{plan_id}"),
        )],
        vec![InlineKeyboardButton::callback("🔙 Back", "menu_buy")],
    ])
}

pub fn cancel_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "❌ Cancel",
        "wizard_cancel",
    )]])
}

pub fn payment_review_keyboard(payment_id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            "✅ Approve & deliver",
            format!("pay_approve_{payment_id}"),
        )],
        vec![InlineKeyboardButton::callback(
            "❌ Reject",
            format!("pay_reject_{payment_id}"),
        )],
    ])
}

pub fn single_config_keyboard(purchase_id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "⚙️ Single configs",
        format!("purchase_cfg_{purchase_id}"),
    )]])
}

// ==================== ADMIN ====================

pub fn admin_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("🖥 Servers", "admin_servers"),
            InlineKeyboardButton::callback("💰 Plans", "admin_plans"),
        ],
        vec![InlineKeyboardButton::callback("🔙 Back", "menu_home")],
    ])
}

pub fn servers_keyboard(servers: &[Server]) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();
    for server in servers {
        rows.push(vec![InlineKeyboardButton::callback(
            format!("🖥 {}", server.name),
            format!("server_info_{}", server.id),
        )]);
    }
    rows.push(vec![InlineKeyboardButton::callback(
        "➕ Add server",
        "admin_add_server",
    )]);
    rows.push(vec![InlineKeyboardButton::callback("🔙 Back", "admin_menu")]);
    InlineKeyboardMarkup::new(rows)
}

pub fn server_actions(server_id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("📡 Test connection", format!("server_test_{server_id}")),
            InlineKeyboardButton::callback("🔄 Sync inbounds", format!("server_sync_{server_id}")),
        ],
        vec![InlineKeyboardButton::callback(
            "🗑 Delete server",
            format!("server_del_{server_id}"),
        )],
        vec![InlineKeyboardButton::callback("🔙 Back", "admin_servers")],
    ])
}

pub fn plans_admin_keyboard(plans: &[Plan]) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();
    for plan in plans {
        rows.push(vec![InlineKeyboardButton::callback(
            format!("🗑 {} ({})", plan.name, plan.price),
            format!("plan_del_{}", plan.id),
        )]);
    }
    rows.push(vec![InlineKeyboardButton::callback(
        "➕ Add plan",
        "admin_add_plan",
    )]);
    rows.push(vec![InlineKeyboardButton::callback("🔙 Back", "admin_menu")]);
    InlineKeyboardMarkup::new(rows)
}

/// Toggle keyboard for binding a new plan to inbounds. `selected` carries the
/// inbound ids already picked.
pub fn inbound_select_keyboard(
    inbounds: &[(String, Inbound)],
    selected: &[i64],
) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();
    for (server_name, inbound) in inbounds {
        let mark = if selected.contains(&inbound.id) {
            "✅"
        } else {
            "⬜️"
        };
        rows.push(vec![InlineKeyboardButton::callback(
            format!(
                "{} {} | {} | {} ({})",
                mark, server_name, inbound.remark, inbound.protocol, inbound.port
            ),
            format!("plan_inb_{}", inbound.id),
        )]);
    }
    rows.push(vec![InlineKeyboardButton::callback(
        format!("💾 Save plan ({} selected)", selected.len()),
        "plan_save",
    )]);
    rows.push(vec![InlineKeyboardButton::callback(
        "❌ Cancel",
        "wizard_cancel",
    )]);
    InlineKeyboardMarkup::new(rows)
}
