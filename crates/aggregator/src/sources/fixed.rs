//! Static price source for the static environment and local runs

use async_trait::async_trait;
use common::{now_millis, PriceQuote};

use super::{PriceSource, SourceReading};
use crate::error::SourceError;

/// Always reports the same quote, stamped with the current time
#[derive(Debug, Clone)]
pub struct FixedSource {
    name: String,
    quote: PriceQuote,
}

impl FixedSource {
    pub fn new(name: impl Into<String>, quote: PriceQuote) -> Self {
        Self {
            name: name.into(),
            quote,
        }
    }
}

#[async_trait]
impl PriceSource for FixedSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, _quote: &str) -> Result<SourceReading, SourceError> {
        SourceReading::from_quote(self.quote, now_millis())
    }
}
