use anyhow::Result;
use rand::Rng;
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::config::TranslatorConfig;
use crate::i18n::{Localizer, Message};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const SALT_MIN: u32 = 32768;
const SALT_MAX: u32 = 65536;

#[derive(Error, Debug)]
pub enum TranslateError {
    #[error("translation service is not configured")]
    NotConfigured,

    #[error("translation service returned status {0}")]
    Upstream(u16),

    #[error("translation request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("translation response carried no result")]
    Malformed,
}

#[derive(Debug, Deserialize)]
struct TranslateBody {
    trans_result: Option<Vec<TransResult>>,
}

#[derive(Debug, Deserialize)]
struct TransResult {
    dst: String,
}

/// Hex MD5 over `app_id + text + salt + app_key`.
pub fn sign(app_id: &str, text: &str, salt: u32, app_key: &str) -> String {
    format!(
        "{:x}",
        md5::compute(format!("{}{}{}{}", app_id, text, salt, app_key))
    )
}

pub fn new_salt() -> u32 {
    rand::thread_rng().gen_range(SALT_MIN..=SALT_MAX)
}

pub struct Translator {
    http: reqwest::Client,
    config: TranslatorConfig,
    localizer: Arc<Localizer>,
}

impl Translator {
    pub fn new(config: &TranslatorConfig, localizer: Arc<Localizer>) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            config: config.clone(),
            localizer,
        })
    }

    fn credentials(&self) -> Option<(&str, &str)> {
        match (self.config.app_id.as_deref(), self.config.app_key.as_deref()) {
            (Some(id), Some(key)) if !id.is_empty() && !key.is_empty() => Some((id, key)),
            _ => None,
        }
    }

    /// Translates `text`, reporting why it could not.
    pub async fn try_translate(
        &self,
        text: &str,
        source_language: &str,
        dest_language: &str,
    ) -> Result<String, TranslateError> {
        let (app_id, app_key) = self.credentials().ok_or(TranslateError::NotConfigured)?;

        let salt = new_salt();
        let signature = sign(app_id, text, salt, app_key);
        let salt = salt.to_string();

        debug!("Requesting translation {} -> {}", source_language, dest_language);
        let response = self
            .http
            .get(&self.config.endpoint)
            .query(&[
                ("q", text),
                ("from", source_language),
                ("to", dest_language),
                ("appid", app_id),
                ("salt", salt.as_str()),
                ("sign", signature.as_str()),
            ])
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(TranslateError::Upstream(response.status().as_u16()));
        }

        let body: TranslateBody = response.json().await?;
        body.trans_result
            .and_then(|results| results.into_iter().next())
            .map(|result| result.dst)
            .ok_or(TranslateError::Malformed)
    }

    /// Never fails: an unconfigured service yields the localized notice and
    /// any upstream failure yields `text` unchanged.
    pub async fn translate(
        &self,
        text: &str,
        source_language: &str,
        dest_language: &str,
        locale: &str,
    ) -> String {
        match self.try_translate(text, source_language, dest_language).await {
            Ok(translated) => translated,
            Err(TranslateError::NotConfigured) => {
                self.localizer.gettext(locale, Message::TranslationNotConfigured)
            }
            Err(e) => {
                warn!("Translation failed, returning original text: {}", e);
                text.to_string()
            }
        }
    }
}
