//! Translation collaborator
//!
//! Used to expand CJK keywords with an English rendering. Translation is
//! best effort: every failure degrades to the original text.

use crate::config::TranslationConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// True when `text` contains at least one CJK unified ideograph
pub fn contains_cjk(text: &str) -> bool {
    text.chars().any(|c| ('\u{4e00}'..='\u{9fa5}').contains(&c))
}

#[async_trait]
pub trait Translator: Send + Sync {
    /// Whether `text` needs translating at all
    fn contains_non_latin(&self, text: &str) -> bool {
        contains_cjk(text)
    }

    /// Translated text, or `text` unchanged on any failure
    async fn translate(&self, text: &str) -> String;
}

/// MyMemory `get?q=..&langpair=..` client
pub struct MyMemoryTranslator {
    client: reqwest::Client,
    endpoint: String,
    langpair: String,
}

#[derive(Deserialize)]
struct MyMemoryResponse {
    #[serde(rename = "responseData")]
    response_data: Option<MyMemoryData>,
}

#[derive(Deserialize)]
struct MyMemoryData {
    #[serde(rename = "translatedText")]
    translated_text: Option<String>,
}

impl MyMemoryTranslator {
    pub fn new(config: &TranslationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            langpair: config.langpair.clone(),
        })
    }

    async fn request(&self, text: &str) -> Result<String> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", text), ("langpair", self.langpair.as_str())])
            .send()
            .await
            .map_err(|e| AppError::Translation {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            return Err(AppError::Translation {
                message: format!("API error {}", response.status()),
            });
        }

        let body: MyMemoryResponse = response.json().await.map_err(|e| AppError::Translation {
            message: format!("Failed to parse response: {}", e),
        })?;

        body.response_data
            .and_then(|d| d.translated_text)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Translation {
                message: "Empty translation".to_string(),
            })
    }
}

#[async_trait]
impl Translator for MyMemoryTranslator {
    async fn translate(&self, text: &str) -> String {
        if !self.contains_non_latin(text) {
            return text.to_string();
        }

        match self.request(text).await {
            Ok(translated) => {
                debug!(original = text, translated = %translated, "Translated keyword");
                translated
            }
            Err(e) => {
                warn!(text, error = %e, "Translation failed, using original text");
                text.to_string()
            }
        }
    }
}

/// Returns every input unchanged
pub struct IdentityTranslator;

#[async_trait]
impl Translator for IdentityTranslator {
    async fn translate(&self, text: &str) -> String {
        text.to_string()
    }
}

/// Fixed dictionary translator for tests and offline runs
#[derive(Default)]
pub struct StaticTranslator {
    entries: std::collections::HashMap<String, String>,
}

impl StaticTranslator {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

#[async_trait]
impl Translator for StaticTranslator {
    async fn translate(&self, text: &str) -> String {
        self.entries.get(text).cloned().unwrap_or_else(|| text.to_string())
    }
}

/// Create a translator based on configuration
pub fn create_translator(config: &TranslationConfig) -> Arc<dyn Translator> {
    if !config.enabled {
        return Arc::new(IdentityTranslator);
    }

    match MyMemoryTranslator::new(config) {
        Ok(translator) => Arc::new(translator),
        Err(e) => {
            warn!(error = %e, "Translation client unavailable, keywords will not be expanded");
            Arc::new(IdentityTranslator)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_cjk() {
        assert!(contains_cjk("机器学习"));
        assert!(contains_cjk("deep 学习"));
        assert!(!contains_cjk("machine learning"));
        assert!(!contains_cjk("Ångström"));
    }

    #[tokio::test]
    async fn test_latin_text_is_not_sent() {
        let config = TranslationConfig {
            endpoint: "http://127.0.0.1:1/get".to_string(),
            ..TranslationConfig::default()
        };
        let translator = MyMemoryTranslator::new(&config).unwrap();
        assert_eq!(translator.translate("graphene").await, "graphene");
    }

    #[tokio::test]
    async fn test_unreachable_service_degrades_to_identity() {
        let config = TranslationConfig {
            endpoint: "http://127.0.0.1:1/get".to_string(),
            timeout_secs: 1,
            ..TranslationConfig::default()
        };
        let translator = MyMemoryTranslator::new(&config).unwrap();
        assert_eq!(translator.translate("机器学习").await, "机器学习");
    }

    #[tokio::test]
    async fn test_disabled_config_uses_identity() {
        let config = TranslationConfig {
            enabled: false,
            ..TranslationConfig::default()
        };
        let translator = create_translator(&config);
        assert_eq!(translator.translate("机器学习").await, "机器学习");
    }
}
