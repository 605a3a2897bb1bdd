use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

pub const DEFAULT_SECRET_KEY: &str = "you-will-never-guess";
pub const DEFAULT_DATABASE_URL: &str = "sqlite:app.db";
pub const DEFAULT_MAIL_PORT: u16 = 25;
pub const DEFAULT_ADMIN: &str = "admin@example.com";
pub const DEFAULT_POSTS_PER_PAGE: u32 = 5;
pub const DEFAULT_LANGUAGES: [&str; 2] = ["en", "zh"];
pub const DEFAULT_TRANSLATOR_ENDPOINT: &str = "http://api.fanyi.baidu.com/api/trans/vip/translate";
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379/";
pub const DEFAULT_SENDER_ADDRESS: &str = "no-reply@localhost";

pub const LOG_FILE_PATH: &str = "logs/microblog.log";
pub const LOG_FILE_MAX_BYTES: u64 = 10240;
pub const LOG_FILE_BACKUPS: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub secret_key: String,
    pub mode: RunMode,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub mail: MailConfig,
    pub admins: Vec<String>,
    pub posts_per_page: u32,
    pub languages: Vec<String>,
    pub translator: TranslatorConfig,
    pub elasticsearch_url: Option<String>,
    pub redis_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Production,
    Debug,
    Testing,
}

impl RunMode {
    fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "debug" | "development" => RunMode::Debug,
            "testing" | "test" => RunMode::Testing,
            _ => RunMode::Production,
        }
    }
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
pub struct MailConfig {
    pub server: Option<String>,
    pub port: u16,
    pub use_tls: bool,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl MailConfig {
    /// Basic-auth credentials are used when either half is present.
    pub fn credentials(&self) -> Option<(String, String)> {
        if self.username.is_none() && self.password.is_none() {
            return None;
        }
        Some((
            self.username.clone().unwrap_or_default(),
            self.password.clone().unwrap_or_default(),
        ))
    }

    /// `Microblog <username>` when the login is an address; SMTP logins
    /// such as API-key users fall back to a local no-reply sender.
    pub fn sender(&self) -> String {
        let address = self
            .username
            .as_deref()
            .filter(|username| username.parse::<lettre::Address>().is_ok())
            .unwrap_or(DEFAULT_SENDER_ADDRESS);
        format!("Microblog <{}>", address)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    pub app_id: Option<String>,
    pub app_key: Option<String>,
    pub endpoint: String,
}

/// A side-effect handler attached to the application's log stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ObserverSink {
    MailOnError {
        server: String,
        port: u16,
        use_tls: bool,
        credentials: Option<(String, String)>,
        from: String,
        to: Vec<String>,
        subject: String,
    },
    RotatingFile {
        path: PathBuf,
        max_bytes: u64,
        backups: usize,
    },
}

impl Settings {
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let list = |key: &str| {
            get(key).map(|raw| {
                raw.split(',')
                    .map(|item| item.trim().to_string())
                    .filter(|item| !item.is_empty())
                    .collect::<Vec<_>>()
            })
        };

        let languages = list("LANGUAGES")
            .filter(|langs| !langs.is_empty())
            .unwrap_or_else(|| DEFAULT_LANGUAGES.iter().map(|l| l.to_string()).collect());
        let admins = list("ADMINS")
            .filter(|admins| !admins.is_empty())
            .unwrap_or_else(|| vec![DEFAULT_ADMIN.to_string()]);

        Settings {
            secret_key: get("SECRET_KEY").unwrap_or_else(|| DEFAULT_SECRET_KEY.to_string()),
            mode: get("APP_MODE")
                .map(|mode| RunMode::parse(&mode))
                .unwrap_or(RunMode::Production),
            server: ServerConfig {
                host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: get("PORT").and_then(|p| p.parse().ok()).unwrap_or(5000),
            },
            database: DatabaseConfig {
                url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
                max_connections: get("DATABASE_MAX_CONNECTIONS")
                    .and_then(|n| n.parse().ok())
                    .unwrap_or(5),
            },
            mail: MailConfig {
                server: get("MAIL_SERVER"),
                port: get("MAIL_PORT")
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(DEFAULT_MAIL_PORT),
                // presence alone enables TLS
                use_tls: lookup("MAIL_USE_TLS").is_some(),
                username: get("MAIL_USERNAME"),
                password: get("MAIL_PASSWORD"),
            },
            admins,
            posts_per_page: get("POSTS_PER_PAGE")
                .and_then(|n| n.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_POSTS_PER_PAGE),
            languages,
            translator: TranslatorConfig {
                app_id: get("BAIDU_TRANSLATOR_ID"),
                app_key: get("BAIDU_TRANSLATOR_KEY"),
                endpoint: get("BAIDU_TRANSLATOR_URL")
                    .unwrap_or_else(|| DEFAULT_TRANSLATOR_ENDPOINT.to_string()),
            },
            elasticsearch_url: get("ELASTICSEARCH_URL"),
            redis_url: get("REDIS_URL").unwrap_or_else(|| DEFAULT_REDIS_URL.to_string()),
        }
    }

    pub fn is_production(&self) -> bool {
        self.mode == RunMode::Production
    }

    /// Sinks to attach to the log stream. Only production runs get any.
    pub fn observer_sinks(&self) -> Vec<ObserverSink> {
        if !self.is_production() {
            return Vec::new();
        }

        let mut sinks = Vec::new();
        if let Some(server) = &self.mail.server {
            sinks.push(ObserverSink::MailOnError {
                server: server.clone(),
                port: self.mail.port,
                use_tls: self.mail.use_tls,
                credentials: self.mail.credentials(),
                from: self.mail.sender(),
                to: self.admins.clone(),
                subject: "Microblog Failure".to_string(),
            });
        }
        sinks.push(ObserverSink::RotatingFile {
            path: PathBuf::from(LOG_FILE_PATH),
            max_bytes: LOG_FILE_MAX_BYTES,
            backups: LOG_FILE_BACKUPS,
        });
        sinks
    }
}
