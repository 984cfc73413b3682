pub mod guardian;
pub mod mediastack;
pub mod news_api;
pub mod nytimes;

pub use guardian::GuardianSource;
pub use mediastack::MediaStackSource;
pub use news_api::NewsApiSource;
pub use nytimes::NyTimesSource;

use crate::fetcher::HttpTransport;
use crate::traits::NewsProvider;
use crate::types::ProviderKeys;
use interfaces::{Labelled, Source};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, warn};

/// Query parameters as sent on the wire.
pub(crate) type Params = Vec<(String, String)>;

pub(crate) fn param(key: &str, value: impl ToString) -> (String, String) {
    (key.to_string(), value.to_string())
}

/// Issues the request and decodes the JSON body. Every failure is logged and
/// reported as `None`, which callers turn into an empty result.
pub(crate) async fn request_json(
    transport: &dyn HttpTransport,
    source: Source,
    url: &str,
    params: &[(String, String)],
) -> Option<Value> {
    let response = match transport.get(url, params).await {
        Ok(response) => response,
        Err(e) => {
            error!(source = %source, error = %e, "{} request failed", source.display_name());
            return None;
        }
    };

    if !response.is_success() {
        error!(
            source = %source,
            status = response.status,
            body = %truncate(&response.body, 500),
            "{} API request failed",
            source.display_name()
        );
        return None;
    }

    match serde_json::from_str(&response.body) {
        Ok(body) => Some(body),
        Err(e) => {
            error!(source = %source, error = %e, "{} returned a malformed payload", source.display_name());
            None
        }
    }
}

fn truncate(body: &str, max_chars: usize) -> &str {
    match body.char_indices().nth(max_chars) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

/// Builds one adapter per configured source, in declaration order. Sources
/// without an API key are skipped.
pub fn build_providers(
    keys: &ProviderKeys,
    transport: Arc<dyn HttpTransport>,
) -> Vec<Arc<dyn NewsProvider>> {
    let mut providers: Vec<Arc<dyn NewsProvider>> = Vec::new();

    for source in Source::ALL {
        let Some(key) = keys.key_for(source) else {
            warn!("No API key configured for {}, skipping provider", source);
            continue;
        };
        let key = key.to_string();
        let transport = transport.clone();

        let provider: Arc<dyn NewsProvider> = match source {
            Source::NewsApi => Arc::new(NewsApiSource::new(transport, key)),
            Source::TheGuardian => Arc::new(GuardianSource::new(transport, key)),
            Source::NewYorkTimes => Arc::new(NyTimesSource::new(transport, key)),
            Source::MediaStack => Arc::new(MediaStackSource::new(transport, key)),
        };
        providers.push(provider);
    }

    providers
}
