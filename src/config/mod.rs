//! Configuration module for the department site backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::auth::Role;
use crate::errors::AppError;

/// An admin console account listed in `CMS_ADMIN_USERS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminUser {
    pub email: String,
    pub password: String,
    pub role: Role,
    pub name: String,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file backing the row store
    pub db_path: PathBuf,
    /// Directory holding blob store buckets
    pub storage_dir: PathBuf,
    /// Externally visible base URL, used to build public blob references
    pub public_url: String,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Accounts allowed into the admin console
    pub admin_users: Vec<AdminUser>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let db_path = env::var("CMS_DB_PATH")
            .unwrap_or_else(|_| "./data/site.sqlite".to_string())
            .into();

        let storage_dir = env::var("CMS_STORAGE_DIR")
            .unwrap_or_else(|_| "./data/storage".to_string())
            .into();

        let bind_addr: SocketAddr = env::var("CMS_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid CMS_BIND_ADDR format: {}", e)))?;

        let public_url = env::var("CMS_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://{}", bind_addr))
            .trim_end_matches('/')
            .to_string();

        let log_level = env::var("CMS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let admin_users = match env::var("CMS_ADMIN_USERS") {
            Ok(raw) => parse_admin_users(&raw)?,
            Err(_) => Vec::new(),
        };

        Ok(Self {
            db_path,
            storage_dir,
            public_url,
            bind_addr,
            log_level,
            admin_users,
        })
    }
}

/// Parse `email:password:role:name` entries separated by `;`.
pub fn parse_admin_users(raw: &str) -> Result<Vec<AdminUser>, AppError> {
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let parts: Vec<&str> = entry.splitn(4, ':').collect();
            let &[email, password, role, name] = parts.as_slice() else {
                return Err(AppError::Config(format!(
                    "Invalid CMS_ADMIN_USERS entry '{}': expected email:password:role:name",
                    entry
                )));
            };
            let role = Role::from_str(role).ok_or_else(|| {
                AppError::Config(format!("Unknown role '{}' for {}", role, email))
            })?;
            Ok(AdminUser {
                email: email.to_string(),
                password: password.to_string(),
                role,
                name: name.to_string(),
            })
        })
        .collect()
}
