use std::path::PathBuf;

use clap::Args;

pub const DEFAULT_CORS_ORIGINS: [&str; 4] = [
    "http://localhost:3000",
    "http://127.0.0.1:3000",
    "http://localhost:5173",
    "http://127.0.0.1:5173",
];

#[derive(Args, Debug, Clone)]
pub struct DatabaseArgs {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,
    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,
}

#[derive(Args, Debug, Clone)]
pub struct ResponderArgs {
    /// Keyword table (.json object or .csv with keyword,response columns)
    #[arg(long, env = "HELPDESK_RESPONSES")]
    pub responses: Option<PathBuf>,
    #[arg(long, env = "HELPDESK_MATCH_CONFIDENCE", default_value_t = 0.9)]
    pub match_confidence: f64,
    #[arg(long, env = "HELPDESK_FALLBACK_CONFIDENCE", default_value_t = 0.3)]
    pub fallback_confidence: f64,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long, env = "HELPDESK_HOST", default_value = "0.0.0.0")]
    pub host: String,
    #[arg(long, env = "HELPDESK_PORT", default_value_t = 8000)]
    pub port: u16,
    /// Comma separated list of allowed browser origins
    #[arg(long, env = "CORS_ORIGINS", default_value = "")]
    pub cors_origins: String,
    /// Base URL of the auth gateway project
    #[arg(long, env = "SUPABASE_URL")]
    pub auth_url: Option<String>,
    #[arg(long, env = "SUPABASE_KEY", hide_env_values = true)]
    pub auth_key: Option<String>,
    /// Mark the session cookie Secure (serve behind HTTPS)
    #[arg(long, env = "HELPDESK_SECURE_COOKIES")]
    pub secure_cookies: bool,
    /// Registrations on this email domain are confirmed immediately (development only)
    #[arg(long, env = "HELPDESK_AUTO_CONFIRM_DOMAIN")]
    pub auto_confirm_domain: Option<String>,
    /// Keep queries, feedback and accounts in process instead of Postgres and the gateway
    #[arg(long)]
    pub in_memory: bool,
}

impl ServeArgs {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn cors_origins(&self) -> Vec<String> {
        parse_origins(&self.cors_origins)
    }
}

/// Splits a comma separated origin list, falling back to local dev servers.
pub fn parse_origins(raw: &str) -> Vec<String> {
    let origins: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect();

    if origins.is_empty() {
        return DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect();
    }
    origins
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_origins_use_local_defaults() {
        assert_eq!(parse_origins(""), DEFAULT_CORS_ORIGINS.to_vec());
        assert_eq!(parse_origins(" , "), DEFAULT_CORS_ORIGINS.to_vec());
    }

    #[test]
    fn origins_are_trimmed() {
        assert_eq!(
            parse_origins("https://helpdesk.example.edu, https://staff.example.edu "),
            vec!["https://helpdesk.example.edu", "https://staff.example.edu"]
        );
    }
}
