use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub konnect: KonnectConfig,
    pub urls: UrlsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expires_in: i64,  // seconds
    pub refresh_token_expires_in: i64, // seconds
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KonnectConfig {
    pub base_url: String,
    pub api_key: String,
    pub receiver_wallet_id: String,
    #[serde(default = "default_gateway_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_lifespan_minutes")]
    pub lifespan_minutes: u32,
    /// "live" talks to the real gateway, "sandbox" uses the in-process fake.
    #[serde(default = "default_gateway_mode")]
    pub mode: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlsConfig {
    /// Base URL of the SPA, used for the success/fail redirect pages.
    pub frontend_base_url: String,
    /// Base URL of this server, used for the gateway webhook callback.
    pub backend_base_url: String,
}

fn default_gateway_timeout() -> u64 {
    30
}

fn default_lifespan_minutes() -> u32 {
    30
}

fn default_gateway_mode() -> String {
    "live".to_string()
}

impl KonnectConfig {
    pub fn is_sandbox(&self) -> bool {
        self.mode.eq_ignore_ascii_case("sandbox")
    }
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        let config_result = std::fs::read_to_string(&config_path);

        let mut config: Config = match config_result {
            Ok(config_str) => {
                toml::from_str(&config_str)
                    .map_err(|e| format!("Failed to parse config file: {e}"))?
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // No config file: build from environment variables and defaults.
                fn get_env(name: &str) -> Option<String> {
                    env::var(name).ok()
                }
                fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
                    env::var(name)
                        .ok()
                        .and_then(|v| v.parse::<T>().ok())
                        .unwrap_or(default)
                }

                let database_url = get_env("DATABASE_URL")
                    .ok_or("DATABASE_URL is not set and no config.toml was found")?;

                Config {
                    server: ServerConfig {
                        host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                        port: get_env_parse("SERVER_PORT", 8080u16),
                    },
                    database: DatabaseConfig {
                        url: database_url,
                        max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
                    },
                    jwt: JwtConfig {
                        secret: get_env("JWT_SECRET")
                            .unwrap_or_else(|| "change-me-in-production".to_string()),
                        access_token_expires_in: get_env_parse("JWT_ACCESS_EXPIRES_IN", 7200i64),
                        refresh_token_expires_in: get_env_parse(
                            "JWT_REFRESH_EXPIRES_IN",
                            2_592_000i64,
                        ),
                    },
                    konnect: KonnectConfig {
                        base_url: get_env("KONNECT_BASE_URL")
                            .unwrap_or_else(|| "https://api.konnect.network/api/v2".to_string()),
                        api_key: get_env("KONNECT_API_KEY").unwrap_or_default(),
                        receiver_wallet_id: get_env("KONNECT_RECEIVER_WALLET_ID")
                            .unwrap_or_default(),
                        timeout_secs: get_env_parse("KONNECT_TIMEOUT_SECS", 30u64),
                        lifespan_minutes: get_env_parse("KONNECT_LIFESPAN_MINUTES", 30u32),
                        mode: get_env("KONNECT_MODE").unwrap_or_else(default_gateway_mode),
                    },
                    urls: UrlsConfig {
                        frontend_base_url: get_env("FRONTEND_BASE_URL")
                            .unwrap_or_else(|| "http://localhost:3000".to_string()),
                        backend_base_url: get_env("BACKEND_BASE_URL")
                            .unwrap_or_else(|| "http://localhost:8080".to_string()),
                    },
                }
            }
            Err(e) => {
                return Err(format!("Failed to read config file {config_path}: {e}").into());
            }
        };

        // Environment variables override the file when both are present.
        if let Ok(v) = env::var("SERVER_HOST") {
            config.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            config.server.port = p;
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            config.database.url = v;
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            config.database.max_connections = mc;
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            config.jwt.secret = v;
        }
        if let Ok(v) = env::var("JWT_ACCESS_EXPIRES_IN")
            && let Ok(n) = v.parse()
        {
            config.jwt.access_token_expires_in = n;
        }
        if let Ok(v) = env::var("JWT_REFRESH_EXPIRES_IN")
            && let Ok(n) = v.parse()
        {
            config.jwt.refresh_token_expires_in = n;
        }
        if let Ok(v) = env::var("KONNECT_BASE_URL") {
            config.konnect.base_url = v;
        }
        if let Ok(v) = env::var("KONNECT_API_KEY") {
            config.konnect.api_key = v;
        }
        if let Ok(v) = env::var("KONNECT_RECEIVER_WALLET_ID") {
            config.konnect.receiver_wallet_id = v;
        }
        if let Ok(v) = env::var("KONNECT_TIMEOUT_SECS")
            && let Ok(n) = v.parse()
        {
            config.konnect.timeout_secs = n;
        }
        if let Ok(v) = env::var("KONNECT_LIFESPAN_MINUTES")
            && let Ok(n) = v.parse()
        {
            config.konnect.lifespan_minutes = n;
        }
        if let Ok(v) = env::var("KONNECT_MODE") {
            config.konnect.mode = v;
        }
        if let Ok(v) = env::var("FRONTEND_BASE_URL") {
            config.urls.frontend_base_url = v;
        }
        if let Ok(v) = env::var("BACKEND_BASE_URL") {
            config.urls.backend_base_url = v;
        }

        Ok(config)
    }
}
