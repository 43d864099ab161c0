//! JSON-over-HTTP price source
//!
//! Polls a REST ticker endpoint and reads price and volume through JSON
//! pointers, so one implementation covers most exchange ticker APIs.

use async_trait::async_trait;
use common::{now_millis, PriceQuote};
use serde_json::Value;
use tracing::debug;

use super::{PriceSource, SourceReading};
use crate::error::SourceError;

const USER_AGENT: &str = concat!("pricechain/", env!("CARGO_PKG_VERSION"));

/// REST ticker source
///
/// `url_template` may contain `{quote}`, replaced with the quote currency on
/// every fetch. Exchanges often send numbers as strings; both are accepted.
pub struct HttpJsonSource {
    name: String,
    url_template: String,
    price_pointer: String,
    volume_pointer: Option<String>,
    client: reqwest::Client,
}

impl HttpJsonSource {
    pub fn new(
        name: impl Into<String>,
        url_template: impl Into<String>,
        price_pointer: impl Into<String>,
        volume_pointer: Option<String>,
    ) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SourceError::Request(e.to_string()))?;

        Ok(Self {
            name: name.into(),
            url_template: url_template.into(),
            price_pointer: price_pointer.into(),
            volume_pointer,
            client,
        })
    }

    fn url(&self, quote: &str) -> String {
        self.url_template.replace("{quote}", quote)
    }

    /// Extract the quote from a decoded response body
    pub fn parse_body(&self, body: &Value) -> Result<PriceQuote, SourceError> {
        let price = read_number(body, &self.price_pointer)?;
        let volume = match &self.volume_pointer {
            Some(pointer) => read_number(body, pointer)?,
            None => 0.0,
        };

        let quote = PriceQuote::new(price, volume);
        if !quote.is_valid() {
            return Err(SourceError::Decode(format!(
                "unusable quote: price={} volume={}",
                price, volume
            )));
        }
        Ok(quote)
    }
}

fn read_number(body: &Value, pointer: &str) -> Result<f64, SourceError> {
    let value = body
        .pointer(pointer)
        .ok_or_else(|| SourceError::Decode(format!("no value at {}", pointer)))?;

    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| SourceError::Decode(format!("{} is not a float", pointer))),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| SourceError::Decode(format!("{} = {:?}: {}", pointer, s, e))),
        other => Err(SourceError::Decode(format!(
            "{} holds {}, expected a number",
            pointer, other
        ))),
    }
}

#[async_trait]
impl PriceSource for HttpJsonSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, quote: &str) -> Result<SourceReading, SourceError> {
        let url = self.url(quote);
        debug!(source = %self.name, %url, "Fetching quote");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))?;

        let quote = self.parse_body(&body)?;
        SourceReading::from_quote(quote, now_millis())
    }
}
