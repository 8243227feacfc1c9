//! Runtime configuration for the analytics service.
//!
//! Everything comes from the environment (a `.env` file is honored by the
//! server binary). Defaults match the local development setup of the rest of
//! the sales platform.

#[derive(Debug, Clone)]
pub struct Config {
    /// MySQL connection string for the sales database.
    pub database_url: String,

    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_base_url: String,

    /// Address the HTTP server binds to.
    pub bind_addr: String,
}

impl Config {
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| {
            let host = env_or("DB_HOST", "localhost");
            let user = env_or("DB_USER", "root");
            let password = env_or("DB_PASSWORD", "");
            let name = env_or("DB_NAME", "affiliate_sales_db");
            if password.is_empty() {
                format!("mysql://{}@{}/{}", user, host, name)
            } else {
                format!("mysql://{}:{}@{}/{}", user, password, host, name)
            }
        });

        Self {
            database_url,
            openai_api_key: env_or("OPENAI_API_KEY", "dummy-api-key"),
            openai_model: env_or("OPENAI_MODEL", "gpt-4o-mini"),
            openai_base_url: env_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:8000"),
        }
    }

    /// True when no real API key was configured; the server logs a warning
    /// at startup so misconfiguration is visible before the first request.
    pub fn has_api_key(&self) -> bool {
        self.openai_api_key != "dummy-api-key" && !self.openai_api_key.is_empty()
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
