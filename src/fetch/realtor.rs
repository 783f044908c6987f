use reqwest::Client;
use tracing::{info, instrument};
use url::Url;

use super::{read_text, Coordinates};
use crate::config::Config;
use crate::error::{HubError, Result};
use crate::stats::RawStatsPayload;

/// Neighbourhood statistics from the realtor API on RapidAPI.
#[derive(Debug, Clone)]
pub struct RealtorStats {
    client: Client,
    host: String,
    api_key: String,
}

impl RealtorStats {
    pub fn new(client: Client, config: &Config) -> Result<Self> {
        Ok(Self {
            client,
            host: config.rapid_api_realtor_host.clone(),
            api_key: config.rapid_api_key()?.to_string(),
        })
    }

    fn url(&self, at: Coordinates) -> Result<Url> {
        let url = Url::parse_with_params(
            &format!("https://{}/properties/get-statistics", self.host),
            &[
                // english
                ("CultureId", "1".to_string()),
                ("Latitude", at.latitude.to_string()),
                ("Longitude", at.longitude.to_string()),
            ],
        )?;
        Ok(url)
    }

    /// Raw statistics payload for the area around `at`.
    #[instrument(level = "info", skip(self))]
    pub async fn statistics(&self, at: Coordinates) -> Result<RawStatsPayload> {
        let url = self.url(at)?;
        let req = self
            .client
            .get(url.clone())
            .header("x-rapidapi-host", &self.host)
            .header("x-rapidapi-key", &self.api_key);
        let body = read_text(req, &url).await?;
        let payload = decode_payload(&body, at)?;
        info!(blocks = payload.data.len(), "statistics fetched");
        Ok(payload)
    }
}

/// An empty body or JSON `null` means upstream had nothing for the area.
fn decode_payload(body: &str, at: Coordinates) -> Result<RawStatsPayload> {
    let value: serde_json::Value = if body.trim().is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_str(body)?
    };
    match value {
        serde_json::Value::Null => Err(HubError::NoStatistics(at.as_param())),
        serde_json::Value::Object(ref m) if m.is_empty() => {
            Err(HubError::NoStatistics(at.as_param()))
        }
        v => Ok(serde_json::from_value(v)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AT: Coordinates = Coordinates {
        latitude: 43.678985,
        longitude: -79.34491,
    };

    #[test]
    fn test_url_params() {
        let mut cfg = Config::default();
        cfg.rapid_api_key = Some("k".into());
        let api = RealtorStats::new(Client::new(), &cfg).unwrap();
        let url = api.url(AT).unwrap();
        assert_eq!(url.host_str(), Some("realty-in-ca1.p.rapidapi.com"));
        assert_eq!(url.path(), "/properties/get-statistics");
        let q: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(q[0], ("CultureId".into(), "1".into()));
        assert_eq!(q[1], ("Latitude".into(), "43.678985".into()));
        assert_eq!(q[2], ("Longitude".into(), "-79.34491".into()));
    }

    #[test]
    fn test_decode_payload() {
        let body = r#"{
            "ErrorCode": {"Id": 200, "ProductName": "Stats [Friday, January 7, 2022 3:52:11 PM]"},
            "Data": [{"key": "General", "value": [{"key": "Population", "value": "1,000"}]}],
            "Paging": {"Total": 1}
        }"#;
        let p = decode_payload(body, AT).unwrap();
        assert_eq!(p.data.len(), 1);
        assert_eq!(p.data[0].records().unwrap()[0].value_text(), "1,000");
        assert!(p.extra.contains_key("Paging"));
        assert!(p.error_code.unwrap().extra.contains_key("Id"));
    }

    #[test]
    fn test_empty_body_is_no_statistics() {
        for body in ["", "null", "{}"] {
            assert!(matches!(
                decode_payload(body, AT),
                Err(HubError::NoStatistics(_))
            ));
        }
        assert!(matches!(decode_payload("<html>", AT), Err(HubError::Json(_))));
    }
}
