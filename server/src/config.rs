use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Taskhub task-management and messaging server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "taskhub-server", version, about = "Taskhub task management server")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "TASKHUB_PORT", default_value = "5000")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "TASKHUB_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./taskhub.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "TASKHUB_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Data directory for persistent state (DB, keys, uploads)
    #[arg(long, env = "TASKHUB_DATA_DIR", default_value = "./data")]
    pub data_dir: String,

    /// Registration with this token grants the admin role.
    /// Unset means no self-service admin registration.
    #[arg(long, env = "TASKHUB_ADMIN_INVITE_TOKEN")]
    pub admin_invite_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            bind_address: "0.0.0.0".to_string(),
            config: "./taskhub.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            admin_invite_token: None,
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (TASKHUB_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("TASKHUB_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Taskhub Server Configuration
# Place this file at ./taskhub.toml or specify with --config <path>
# All settings can be overridden via environment variables (TASKHUB_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 5000)
# port = 5000

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for the SQLite database, key files, and uploads
# data_dir = "./data"

# Registering with this token grants the admin role.
# Leave unset to disable self-service admin registration.
# admin_invite_token = ""
"#
    .to_string()
}
