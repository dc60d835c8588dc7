use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VaultConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub minter: MinterConfig,
    pub economy: EconomyConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub data_dir: String,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthConfig {
    pub token_secret: String,
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
    #[serde(default = "default_token_ttl")]
    pub session_ttl_secs: u64,
}

fn default_token_ttl() -> u64 {
    7 * 24 * 60 * 60
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RateLimitConfig {
    pub window_secs: u64,
    pub ceiling: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MinterConfig {
    pub endpoint: String,
    #[serde(default = "default_mint_timeout")]
    pub timeout_secs: u64,
}

fn default_mint_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EconomyConfig {
    pub starting_balance: u64,
    #[serde(default)]
    pub case_insensitive_email: bool,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                port: 8080,
                data_dir: "./data/ledger".to_string(),
                log_level: "info".to_string(),
            },
            auth: AuthConfig {
                token_secret: "change-me".to_string(),
                token_ttl_secs: default_token_ttl(),
                session_ttl_secs: default_token_ttl(),
            },
            rate_limit: RateLimitConfig {
                window_secs: 15 * 60,
                ceiling: 100,
            },
            minter: MinterConfig {
                endpoint: "http://127.0.0.1:9090".to_string(),
                timeout_secs: default_mint_timeout(),
            },
            economy: EconomyConfig {
                starting_balance: 100,
                case_insensitive_email: false,
            },
        }
    }
}

impl VaultConfig {
    pub fn load_or_default(path: &str) -> Self {
        if std::path::Path::new(path).exists() {
            match std::fs::read_to_string(path) {
                Ok(s) => match toml::from_str(&s) {
                    Ok(c) => {
                        println!("Config loaded from {}", path);
                        c
                    }
                    Err(e) => {
                        eprintln!("Error parsing config: {}. Using Defaults.", e);
                        Self::default()
                    }
                },
                Err(e) => {
                    eprintln!("Error reading config: {}. Using Defaults.", e);
                    Self::default()
                }
            }
        } else {
            println!("Config file not found at '{}'. Creating default.", path);
            let config = Self::default();
            if let Ok(s) = toml::to_string_pretty(&config) {
                let _ = std::fs::write(path, s);
            }
            config
        }
    }
}
