use reqwest::Client;
use tracing::{info, instrument};
use url::Url;

use super::read_text;
use crate::config::Config;
use crate::error::Result;

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:86.0) Gecko/20100101 Firefox/86.0";
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.5";

/// Property pages on the listing site.
#[derive(Debug, Clone)]
pub struct ListingSite {
    client: Client,
    base: String,
}

impl ListingSite {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            base: config.listing_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn page_url(&self, address: &str) -> Result<Url> {
        Ok(Url::parse(&format!("{}/{}", self.base, address_slug(address)))?)
    }

    /// Raw HTML of the property page for `address`.
    #[instrument(level = "info", skip(self))]
    pub async fn page(&self, address: &str) -> Result<String> {
        let url = self.page_url(address)?;
        let req = self
            .client
            .get(url.clone())
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT_LANGUAGE, ACCEPT_LANGUAGE);
        let html = read_text(req, &url).await?;
        info!(bytes = html.len(), "listing page fetched");
        Ok(html)
    }
}

/// `"37 O'Donnell Avenue"` -> `"37-odonnell-avenue"`
pub fn address_slug(address: &str) -> String {
    address
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_ascii_punctuation())
        .map(|c| if c == ' ' { '-' } else { c })
        .collect()
}
