//! Spanish → English translation of tariff text fields
//!
//! Uses the public Google Translate `translate_a/single` endpoint. Portal text
//! repeats heavily (the same region, concept and unit names on every table), so
//! results are memoized per input string for the lifetime of the translator.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::models::TariffRecord;

const USER_AGENT: &str = concat!("cfe-scraper/", env!("CARGO_PKG_VERSION"));
const RATE_LIMIT_MS: u64 = 100;

/// Translation client errors
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Best-effort text translation.
///
/// Never fails: on error the input comes back unchanged.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str) -> String;
}

/// Pass-through used when translation is switched off
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTranslator;

#[async_trait]
impl Translator for IdentityTranslator {
    async fn translate(&self, text: &str) -> String {
        text.to_string()
    }
}

/// Minimum spacing between outbound requests
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// Google Translate client
pub struct GoogleTranslator {
    http_client: reqwest::Client,
    base_url: String,
    target: String,
    rate_limiter: Arc<RateLimiter>,
    cache: Mutex<HashMap<String, String>>,
}

impl GoogleTranslator {
    pub fn new(base_url: impl Into<String>, target: impl Into<String>) -> Result<Self, TranslateError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TranslateError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
            target: target.into(),
            rate_limiter: Arc::new(RateLimiter::new(RATE_LIMIT_MS)),
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// One uncached round trip
    async fn request(&self, text: &str) -> Result<String, TranslateError> {
        self.rate_limiter.wait().await;

        let response = self
            .http_client
            .get(&self.base_url)
            .query(&[
                ("client", "gtx"),
                ("sl", "auto"),
                ("tl", self.target.as_str()),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await
            .map_err(|e| TranslateError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(TranslateError::ApiError(status.as_u16(), error_text));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| TranslateError::ParseError(e.to_string()))?;

        parse_response(&body)
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return text.to_string();
        }

        if let Some(hit) = self.cache.lock().await.get(text) {
            return hit.clone();
        }

        match self.request(text).await {
            Ok(translated) => {
                tracing::debug!(source = %text, translated = %translated, "Translated");
                self.cache
                    .lock()
                    .await
                    .insert(text.to_string(), translated.clone());
                translated
            }
            Err(e) => {
                tracing::warn!(text = %text, "Translation failed, keeping original: {}", e);
                text.to_string()
            }
        }
    }
}

/// Join the translated chunk of every segment in `body[0]`.
///
/// Response shape: `[[["translated", "source", ...], ...], null, "es", ...]`.
pub fn parse_response(body: &Value) -> Result<String, TranslateError> {
    let segments = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| TranslateError::ParseError("missing segment list".to_string()))?;

    let translated: String = segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(Value::as_str))
        .collect();

    if translated.is_empty() {
        return Err(TranslateError::ParseError("empty translation".to_string()));
    }
    Ok(translated)
}

/// English copy of a record.
///
/// Free-text fields are translated when non-empty; `id`, `fare`, `year`,
/// `month`, `extracted_at` and `tariff_value` are kept verbatim.
pub async fn translate_record(translator: &dyn Translator, record: &TariffRecord) -> TariffRecord {
    let mut english = record.clone();

    for field in [
        &mut english.region,
        &mut english.municipality,
        &mut english.division,
        &mut english.post,
        &mut english.units,
        &mut english.month_name,
    ] {
        if !field.is_empty() {
            let translated = translator.translate(field.as_str()).await;
            *field = translated;
        }
    }

    english
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Prefix;

    #[async_trait]
    impl Translator for Prefix {
        async fn translate(&self, text: &str) -> String {
            format!("EN:{}", text)
        }
    }

    #[test]
    fn test_parse_response_joins_segments() {
        let body = json!([
            [["Fixed charge. ", "Cargo fijo. ", null], ["Per month", "Por mes", null]],
            null,
            "es"
        ]);
        assert_eq!(parse_response(&body).unwrap(), "Fixed charge. Per month");
    }

    #[test]
    fn test_parse_response_rejects_bad_shapes() {
        assert!(parse_response(&json!({})).is_err());
        assert!(parse_response(&json!([null])).is_err());
        assert!(parse_response(&json!([[]])).is_err());
    }

    #[tokio::test]
    async fn test_identity_translator() {
        assert_eq!(IdentityTranslator.translate("Mérida").await, "Mérida");
    }

    #[tokio::test]
    async fn test_translate_record_fields() {
        let record = TariffRecord {
            id: "YUCATÁN_MÉRIDA_PENINSULAR_2025_1_1".to_string(),
            region: "YUCATÁN".to_string(),
            municipality: "MÉRIDA".to_string(),
            division: "PENINSULAR".to_string(),
            year: "2025".to_string(),
            month: 1,
            month_name: "ENERO".to_string(),
            extracted_at: "2025-01-15 10:00:00".to_string(),
            fare: "GDMTO".to_string(),
            post: "Fijo".to_string(),
            units: String::new(),
            tariff_value: "1234.56".to_string(),
        };

        let english = translate_record(&Prefix, &record).await;
        assert_eq!(english.id, record.id);
        assert_eq!(english.fare, "GDMTO");
        assert_eq!(english.region, "EN:YUCATÁN");
        assert_eq!(english.month_name, "EN:ENERO");
        assert_eq!(english.post, "EN:Fijo");
        assert_eq!(english.units, "", "empty fields are not translated");
        assert_eq!(english.tariff_value, "1234.56");
    }

    #[tokio::test]
    async fn test_blank_text_skips_network() {
        // Unroutable base URL: any request would fail and return the input anyway,
        // but blank input must return before the rate limiter is touched.
        let translator = GoogleTranslator::new("http://127.0.0.1:1/none", "en").unwrap();
        assert_eq!(translator.translate("   ").await, "   ");
        assert!(translator.rate_limiter.last_request.lock().await.is_none());
    }
}
