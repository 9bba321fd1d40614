use crate::domain::Money;
use crate::engine::FeeSchedule;
use chrono::Duration;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub gateway_url: String,
    /// Tag of the single ledger currency; informational only.
    pub ledger_currency: String,
    pub holding_period_days: i64,
    pub default_commission_pct: Money,
    pub min_payout_amount: Money,
    pub payout_rate_limit_hours: i64,
    /// Whether job-created payouts jump straight to approved when safety
    /// checks pass.
    pub auto_withdraw_auto_approve: bool,
    pub platform_fee_pct: Money,
    pub bank_flat_fee: Money,
    pub mobile_pct: Money,
    pub mobile_fee_cap: Money,
    pub card_pct: Money,
    pub card_flat_fee: Money,
    pub summary_cache_ttl_secs: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

fn parse_money(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<Money, ConfigError> {
    let raw = env_map.get(key).map(|s| s.as_str()).unwrap_or(default);
    Money::from_str_canonical(raw).map_err(|_| {
        ConfigError::InvalidValue(key.to_string(), "must be a decimal number".to_string())
    })
}

fn parse_i64(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<i64, ConfigError> {
    env_map
        .get(key)
        .map(|s| s.as_str())
        .unwrap_or(default)
        .parse::<i64>()
        .map_err(|_| ConfigError::InvalidValue(key.to_string(), "must be a valid i64".to_string()))
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let gateway_url = env_map
            .get("DISBURSEMENT_GATEWAY_URL")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DISBURSEMENT_GATEWAY_URL".to_string()))?;

        let ledger_currency = env_map
            .get("LEDGER_CURRENCY")
            .cloned()
            .unwrap_or_else(|| "USD".to_string());

        let holding_period_days = parse_i64(&env_map, "HOLDING_PERIOD_DAYS", "7")?;
        if holding_period_days < 0 {
            return Err(ConfigError::InvalidValue(
                "HOLDING_PERIOD_DAYS".to_string(),
                "must be non-negative".to_string(),
            ));
        }

        let payout_rate_limit_hours = parse_i64(&env_map, "PAYOUT_RATE_LIMIT_HOURS", "24")?;

        let auto_withdraw_auto_approve = match env_map
            .get("AUTO_WITHDRAW_AUTO_APPROVE")
            .map(|s| s.as_str())
            .unwrap_or("false")
        {
            "true" | "1" => true,
            "false" | "0" => false,
            other => {
                return Err(ConfigError::InvalidValue(
                    "AUTO_WITHDRAW_AUTO_APPROVE".to_string(),
                    format!("must be true or false, got {}", other),
                ))
            }
        };

        let summary_cache_ttl_secs = env_map
            .get("SUMMARY_CACHE_TTL_SECS")
            .map(|s| s.as_str())
            .unwrap_or("60")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "SUMMARY_CACHE_TTL_SECS".to_string(),
                    "must be a valid u64".to_string(),
                )
            })?;

        Ok(Config {
            port,
            database_path,
            gateway_url,
            ledger_currency,
            holding_period_days,
            default_commission_pct: parse_money(&env_map, "DEFAULT_COMMISSION_PCT", "10")?,
            min_payout_amount: parse_money(&env_map, "MIN_PAYOUT_AMOUNT", "50")?,
            payout_rate_limit_hours,
            auto_withdraw_auto_approve,
            platform_fee_pct: parse_money(&env_map, "PLATFORM_FEE_PCT", "0")?,
            bank_flat_fee: parse_money(&env_map, "BANK_FLAT_FEE", "15")?,
            mobile_pct: parse_money(&env_map, "MOBILE_FEE_PCT", "2")?,
            mobile_fee_cap: parse_money(&env_map, "MOBILE_FEE_CAP", "500")?,
            card_pct: parse_money(&env_map, "CARD_FEE_PCT", "2.9")?,
            card_flat_fee: parse_money(&env_map, "CARD_FLAT_FEE", "0.30")?,
            summary_cache_ttl_secs,
        })
    }

    pub fn holding_period(&self) -> Duration {
        Duration::days(self.holding_period_days)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::hours(self.payout_rate_limit_hours)
    }

    pub fn fee_schedule(&self) -> FeeSchedule {
        FeeSchedule {
            platform_fee_pct: self.platform_fee_pct,
            bank_flat_fee: self.bank_flat_fee,
            mobile_pct: self.mobile_pct,
            mobile_fee_cap: self.mobile_fee_cap,
            card_pct: self.card_pct,
            card_flat_fee: self.card_flat_fee,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DATABASE_PATH".to_string(), "/tmp/test.db".to_string());
        map.insert(
            "DISBURSEMENT_GATEWAY_URL".to_string(),
            "https://rail.example.com".to_string(),
        );
        map
    }

    #[test]
    fn test_missing_database_path() {
        let mut env_map = setup_required_env();
        env_map.remove("DATABASE_PATH");
        match Config::from_env_map(env_map) {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "DATABASE_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_missing_gateway_url() {
        let mut env_map = setup_required_env();
        env_map.remove("DISBURSEMENT_GATEWAY_URL");
        match Config::from_env_map(env_map) {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "DISBURSEMENT_GATEWAY_URL"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.holding_period_days, 7);
        assert_eq!(
            config.default_commission_pct,
            Money::from_str_canonical("10").unwrap()
        );
        assert_eq!(config.payout_rate_limit_hours, 24);
        assert!(!config.auto_withdraw_auto_approve);
        assert_eq!(config.ledger_currency, "USD");
    }

    #[test]
    fn test_invalid_port() {
        let mut env_map = setup_required_env();
        env_map.insert("PORT".to_string(), "not_a_number".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PORT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_commission_pct() {
        let mut env_map = setup_required_env();
        env_map.insert("DEFAULT_COMMISSION_PCT".to_string(), "ten".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "DEFAULT_COMMISSION_PCT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_negative_holding_period_rejected() {
        let mut env_map = setup_required_env();
        env_map.insert("HOLDING_PERIOD_DAYS".to_string(), "-1".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "HOLDING_PERIOD_DAYS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_auto_approve_flag() {
        let mut env_map = setup_required_env();
        env_map.insert("AUTO_WITHDRAW_AUTO_APPROVE".to_string(), "maybe".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "AUTO_WITHDRAW_AUTO_APPROVE"),
            _ => panic!("Expected InvalidValue error"),
        }
    }
}
