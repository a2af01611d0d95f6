use anyhow::anyhow;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::env;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// PostgreSQL URL. When unset the server keeps documents in memory.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub server_port: u16,
    pub cors_allow_origins: Vec<String>,
    pub time_zone: Tz,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_api_base: String,
    pub chat_timeout_seconds: u64,
    pub lost_found_retention_hours: i64,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = non_empty_var("DATABASE_URL");

        let jwt_secret = env::var("JWT_SECRET")
            .unwrap_or_else(|_| "your-secret-key-change-this-in-production".to_string());

        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .unwrap_or(3000);

        let cors_allow_origins = parse_origins(
            &env::var("CORS_ALLOW_ORIGINS").unwrap_or_else(|_| "http://localhost:8081".into()),
        );

        let time_zone_name = env::var("APP_TIMEZONE").unwrap_or_else(|_| "UTC".to_string());
        let time_zone: Tz = time_zone_name
            .parse()
            .map_err(|_| anyhow!("Invalid APP_TIMEZONE value: {}", time_zone_name))?;

        let gemini_api_key = non_empty_var("GEMINI_API_KEY");
        let gemini_model =
            non_empty_var("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());
        let gemini_api_base = non_empty_var("GEMINI_API_BASE")
            .unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.to_string());

        let chat_timeout_seconds = env::var("CHAT_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap_or(30);

        let lost_found_retention_hours = env::var("LOST_FOUND_RETENTION_HOURS")
            .unwrap_or_else(|_| "168".to_string())
            .parse()
            .unwrap_or(168);
        if lost_found_retention_hours < 0 {
            return Err(anyhow!(
                "LOST_FOUND_RETENTION_HOURS must not be negative: {}",
                lost_found_retention_hours
            ));
        }

        Ok(Config {
            database_url,
            jwt_secret,
            server_port,
            cors_allow_origins,
            time_zone,
            gemini_api_key,
            gemini_model,
            gemini_api_base,
            chat_timeout_seconds,
            lost_found_retention_hours,
        })
    }

    pub fn has_gemini_key(&self) -> bool {
        self.gemini_api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }

    pub fn lost_found_retention_ms(&self) -> i64 {
        self.lost_found_retention_hours * 60 * 60 * 1000
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}
