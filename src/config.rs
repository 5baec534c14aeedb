// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variables read once at startup into [`AppConfig`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//! | `BLOCKCHAIN_RPC_URL` | JSON-RPC endpoint of the voting chain | Required |
//! | `VOTING_CONTRACT_ADDRESS` | Address of the voting contract | Required |
//! | `FUNDER_PRIVATE_KEY` | Hex key of the funder identity | Required |
//! | `CUSTODY_KEY` | 64 hex chars, AES-256 key for key envelopes | Required |
//! | `SESSION_SECRET` | HS256 secret for session tokens (>= 32 bytes) | Required |
//! | `SESSION_TTL_SECS` | Session token lifetime | `86400` |
//! | `OTP_LENGTH` | Digits per enrollment code | `6` |
//! | `OTP_TTL_SECS` | Enrollment code lifetime | `600` |
//! | `OTP_MAX_ATTEMPTS` | Failed verifications before a code is burned | `5` |
//! | `PENDING_TTL_SECS` | Pending enrollment lifetime | `600` |
//! | `PENDING_CAPACITY` | In-memory pending store capacity | `10000` |
//! | `PENDING_DB_PATH` | redb file for pending enrollments | in-memory |
//! | `SWEEP_INTERVAL_SECS` | Expiry sweep interval | `300` |
//! | `WALLET_FUNDING_AMOUNT` | Initial funding per wallet (ether) | `0.1` |
//! | `MIN_WALLET_BALANCE` | Top-up threshold (ether) | `0.01` |
//! | `WALLET_TOPUP_AMOUNT` | Top-up transfer (ether) | `0.05` |
//! | `ALLOWED_EMAIL_DOMAINS` | Comma separated email domains | any |
//! | `NOTIFY_WEBHOOK_URL` | Mail/SMS relay endpoint | log only |
//! | `NOTIFY_WEBHOOK_TOKEN` | Bearer token for the relay | Optional |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use alloy::primitives::U256;
use chrono::TimeDelta;

use crate::blockchain::{parse_amount, NATIVE_DECIMALS};
use crate::enrollment::{OtpConfig, ProfilePolicy};

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";
pub const RPC_URL_ENV: &str = "BLOCKCHAIN_RPC_URL";
pub const CONTRACT_ADDRESS_ENV: &str = "VOTING_CONTRACT_ADDRESS";
pub const FUNDER_KEY_ENV: &str = "FUNDER_PRIVATE_KEY";
/// Key for the custody envelope cipher.
///
/// Rotating it makes every envelope held by voters undecryptable.
pub const CUSTODY_KEY_ENV: &str = "CUSTODY_KEY";
pub const SESSION_SECRET_ENV: &str = "SESSION_SECRET";
pub const SESSION_TTL_ENV: &str = "SESSION_TTL_SECS";
pub const OTP_LENGTH_ENV: &str = "OTP_LENGTH";
pub const OTP_TTL_ENV: &str = "OTP_TTL_SECS";
pub const OTP_MAX_ATTEMPTS_ENV: &str = "OTP_MAX_ATTEMPTS";
pub const PENDING_TTL_ENV: &str = "PENDING_TTL_SECS";
pub const PENDING_CAPACITY_ENV: &str = "PENDING_CAPACITY";
pub const PENDING_DB_PATH_ENV: &str = "PENDING_DB_PATH";
pub const SWEEP_INTERVAL_ENV: &str = "SWEEP_INTERVAL_SECS";
pub const FUNDING_AMOUNT_ENV: &str = "WALLET_FUNDING_AMOUNT";
pub const MIN_BALANCE_ENV: &str = "MIN_WALLET_BALANCE";
pub const TOPUP_AMOUNT_ENV: &str = "WALLET_TOPUP_AMOUNT";
pub const ALLOWED_DOMAINS_ENV: &str = "ALLOWED_EMAIL_DOMAINS";
pub const WEBHOOK_URL_ENV: &str = "NOTIFY_WEBHOOK_URL";
pub const WEBHOOK_TOKEN_ENV: &str = "NOTIFY_WEBHOOK_TOKEN";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Ledger connection settings.
#[derive(Clone)]
pub struct LedgerConfig {
    pub rpc_url: String,
    pub contract_address: String,
    pub funder_private_key: String,
}

impl std::fmt::Debug for LedgerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerConfig")
            .field("rpc_url", &self.rpc_url)
            .field("contract_address", &self.contract_address)
            .field("funder_private_key", &"<redacted>")
            .finish()
    }
}

/// Funding amounts in wei.
#[derive(Debug, Clone, Copy)]
pub struct FundingConfig {
    pub initial: U256,
    pub min_balance: U256,
    pub top_up: U256,
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub log_format: LogFormat,
    pub ledger: LedgerConfig,
    pub custody_key_hex: String,
    pub session_secret: String,
    pub session_ttl: TimeDelta,
    pub otp: OtpConfig,
    pub pending_ttl: TimeDelta,
    pub pending_capacity: usize,
    pub pending_db_path: Option<PathBuf>,
    pub sweep_interval: Duration,
    pub funding: FundingConfig,
    pub policy: ProfilePolicy,
    pub webhook_url: Option<String>,
    pub webhook_token: Option<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("log_format", &self.log_format)
            .field("ledger", &self.ledger)
            .field("custody_key_hex", &"<redacted>")
            .field("session_secret", &"<redacted>")
            .field("session_ttl", &self.session_ttl)
            .field("otp", &self.otp)
            .field("pending_ttl", &self.pending_ttl)
            .field("pending_capacity", &self.pending_capacity)
            .field("pending_db_path", &self.pending_db_path)
            .field("sweep_interval", &self.sweep_interval)
            .field("funding", &self.funding)
            .field("policy", &self.policy)
            .field("webhook_url", &self.webhook_url)
            .field("webhook_token", &self.webhook_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let host = env.or_default(HOST_ENV, "0.0.0.0");
        let port: u16 = env.parsed(PORT_ENV, 8080)?;
        let bind_addr = format!("{host}:{port}")
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                name: HOST_ENV,
                reason: e.to_string(),
            })?;

        let log_format = match env.or_default(LOG_FORMAT_ENV, "pretty").as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            other => {
                return Err(ConfigError::Invalid {
                    name: LOG_FORMAT_ENV,
                    reason: format!("expected `json` or `pretty`, got `{other}`"),
                })
            }
        };

        let custody_key_hex = env.required(CUSTODY_KEY_ENV)?;
        let key_hex = custody_key_hex.trim_start_matches("0x");
        if key_hex.len() != 64 || !key_hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ConfigError::Invalid {
                name: CUSTODY_KEY_ENV,
                reason: "expected 64 hex characters".to_string(),
            });
        }

        let session_secret = env.required(SESSION_SECRET_ENV)?;
        if session_secret.len() < 32 {
            return Err(ConfigError::Invalid {
                name: SESSION_SECRET_ENV,
                reason: "must be at least 32 bytes".to_string(),
            });
        }

        let otp = OtpConfig {
            length: env.parsed(OTP_LENGTH_ENV, 6)?,
            ttl: TimeDelta::seconds(env.parsed(OTP_TTL_ENV, 600)?),
            max_attempts: env.parsed(OTP_MAX_ATTEMPTS_ENV, 5)?,
        };
        if !(4..=18).contains(&otp.length) {
            return Err(ConfigError::Invalid {
                name: OTP_LENGTH_ENV,
                reason: "expected 4 to 18 digits".to_string(),
            });
        }
        if otp.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                name: OTP_MAX_ATTEMPTS_ENV,
                reason: "must be at least 1".to_string(),
            });
        }

        let funding = FundingConfig {
            initial: env.amount(FUNDING_AMOUNT_ENV, "0.1")?,
            min_balance: env.amount(MIN_BALANCE_ENV, "0.01")?,
            top_up: env.amount(TOPUP_AMOUNT_ENV, "0.05")?,
        };

        let policy = ProfilePolicy {
            allowed_email_domains: env
                .optional(ALLOWED_DOMAINS_ENV)
                .map(|raw| {
                    raw.split(',')
                        .map(|d| d.trim().trim_start_matches('@').to_lowercase())
                        .filter(|d| !d.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        };

        Ok(Self {
            bind_addr,
            log_format,
            ledger: LedgerConfig {
                rpc_url: env.required(RPC_URL_ENV)?,
                contract_address: env.required(CONTRACT_ADDRESS_ENV)?,
                funder_private_key: env.required(FUNDER_KEY_ENV)?,
            },
            custody_key_hex,
            session_secret,
            session_ttl: TimeDelta::seconds(env.parsed(SESSION_TTL_ENV, 86_400)?),
            otp,
            pending_ttl: TimeDelta::seconds(env.parsed(PENDING_TTL_ENV, 600)?),
            pending_capacity: env.parsed(PENDING_CAPACITY_ENV, 10_000)?,
            pending_db_path: env.optional(PENDING_DB_PATH_ENV).map(PathBuf::from),
            sweep_interval: Duration::from_secs(env.parsed(SWEEP_INTERVAL_ENV, 300)?),
            funding,
            policy,
            webhook_url: env.optional(WEBHOOK_URL_ENV),
            webhook_token: env.optional(WEBHOOK_TOKEN_ENV),
        })
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.optional(name).ok_or(ConfigError::Missing(name))
    }

    fn or_default(&self, name: &str, default: &str) -> String {
        self.optional(name).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(name) {
            Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
                name,
                reason: e.to_string(),
            }),
            None => Ok(default),
        }
    }

    fn amount(&self, name: &'static str, default: &str) -> Result<U256, ConfigError> {
        parse_amount(&self.or_default(name, default), NATIVE_DECIMALS).map_err(|e| {
            ConfigError::Invalid {
                name,
                reason: e.to_string(),
            }
        })
    }
}
