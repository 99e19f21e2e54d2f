use anyhow::{Context, Result};
use std::env;

/// Runtime configuration, all from the environment (`.env` supported).
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub bot_token: String,
    pub database_url: String,
    pub admin_ids: Vec<i64>,
    pub card_number: String,
    pub card_holder: String,
}

impl BotConfig {
    pub fn from_env() -> Result<Self> {
        let bot_token = env::var("BOT_TOKEN").context("BOT_TOKEN is not set")?;
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let admin_ids = parse_admin_ids(&env::var("ADMIN_IDS").unwrap_or_default());
        let card_number =
            env::var("CARD_NUMBER").unwrap_or_else(|_| "0000-0000-0000-0000".to_string());
        let card_holder = env::var("CARD_HOLDER").unwrap_or_else(|_| "Account holder".to_string());

        Ok(Self {
            bot_token,
            database_url,
            admin_ids,
            card_number,
            card_holder,
        })
    }

    pub fn is_admin(&self, tg_id: i64) -> bool {
        self.admin_ids.contains(&tg_id)
    }
}

fn parse_admin_ids(raw: &str) -> Vec<i64> {
    raw.split(',')
        .filter_map(|part| part.trim().parse::<i64>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_ids_parse_with_whitespace_and_junk() {
        assert_eq!(parse_admin_ids("1, 22 ,333"), vec![1, 22, 333]);
        assert_eq!(parse_admin_ids(""), Vec::<i64>::new());
        assert_eq!(parse_admin_ids("abc,42,"), vec![42]);
    }
}
