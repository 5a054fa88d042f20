use std::env;
use tracing::warn;

pub const DEFAULT_TIMEZONE: &str = "Europe/Paris";
pub const DEFAULT_SLOT_STEP_MINUTES: i32 = 30;
pub const DEFAULT_DEPOSIT_PERCENT: u32 = 30;
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub default_timezone: String,
    pub slot_step_minutes: i32,
    pub deposit_percent: u32,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            default_timezone: DEFAULT_TIMEZONE.to_string(),
            slot_step_minutes: DEFAULT_SLOT_STEP_MINUTES,
            deposit_percent: DEFAULT_DEPOSIT_PERCENT,
            port: DEFAULT_PORT,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            default_timezone: env::var("SALON_DEFAULT_TIMEZONE")
                .unwrap_or_else(|_| DEFAULT_TIMEZONE.to_string()),
            slot_step_minutes: parse_or("SLOT_STEP_MINUTES", DEFAULT_SLOT_STEP_MINUTES),
            deposit_percent: parse_or("DEPOSIT_PERCENT", DEFAULT_DEPOSIT_PERCENT),
            port: parse_or("PORT", DEFAULT_PORT),
        };

        if !config.is_configured() {
            warn!("Supabase not configured - falling back to in-memory collaborators");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty()
    }
}

fn parse_or<T: std::str::FromStr + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_not_configured() {
        let config = AppConfig::default();
        assert!(!config.is_configured());
        assert_eq!(config.default_timezone, "Europe/Paris");
        assert_eq!(config.slot_step_minutes, 30);
    }

    #[test]
    fn configured_when_supabase_values_present() {
        let config = AppConfig {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "anon".to_string(),
            ..AppConfig::default()
        };
        assert!(config.is_configured());
    }
}
