use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Public origin used for preview links and email tracking URLs
    pub public_base_url: String,
    pub anthropic_api_key: String,
    pub anthropic_model: String,
    pub resend_api_key: String,
    pub email_from: String,
    /// Bearer token required on /admin routes
    pub admin_api_token: String,
    pub allowed_origins: Vec<String>,
    /// Run the worker manager inside the API process
    pub run_workers: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string())
                .trim_end_matches('/')
                .to_string(),
            anthropic_api_key: env::var("ANTHROPIC_API_KEY")
                .context("ANTHROPIC_API_KEY must be set")?,
            anthropic_model: env::var("ANTHROPIC_MODEL")
                .unwrap_or_else(|_| anthropic_client::DEFAULT_MODEL.to_string()),
            resend_api_key: env::var("RESEND_API_KEY").context("RESEND_API_KEY must be set")?,
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "LeadForge <hello@leadforge.dev>".to_string()),
            admin_api_token: env::var("ADMIN_API_TOKEN")
                .context("ADMIN_API_TOKEN must be set")?,
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            run_workers: env::var("RUN_WORKERS")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        })
    }
}
