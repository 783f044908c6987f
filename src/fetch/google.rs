// src/fetch/google.rs

use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, instrument, warn};
use url::Url;

use super::read_text;
use crate::config::Config;
use crate::error::{HubError, Result};

/// Google asks for a short pause before a `next_page_token` becomes valid.
const PAGE_TOKEN_DELAY: Duration = Duration::from_millis(1500);
/// Nearby search never returns more than three pages.
const MAX_PLACE_PAGES: usize = 3;

/// Place types kept from nearby search results.
static SUPPORTED_PLACE_TYPES: &[&str] = &[
    "airport",
    "amusement_park",
    "aquarium",
    "art_gallery",
    "bakery",
    "bank",
    "bar",
    "beauty_salon",
    "book_store",
    "bowling_alley",
    "bus_station",
    "cafe",
    "campground",
    "car_repair",
    "casino",
    "cemetery",
    "church",
    "city_hall",
    "clothing_store",
    "convenience_store",
    "courthouse",
    "dentist",
    "department_store",
    "doctor",
    "drugstore",
    "electrician",
    "electronics_store",
    "fire_station",
    "funeral_home",
    "gas_station",
    "gym",
    "hair_care",
    "hardware_store",
    "health",
    "hindu_temple",
    "home_goods_store",
    "hospital",
    "laundry",
    "library",
    "liquor_store",
    "local_government_office",
    "locksmith",
    "mosque",
    "movie_theater",
    "museum",
    "night_club",
    "park",
    "pet_store",
    "pharmacy",
    "physiotherapist",
    "plumber",
    "police",
    "post_office",
    "primary_school",
    "restaurant",
    "school",
    "secondary_school",
    "shopping_mall",
    "spa",
    "stadium",
    "storage",
    "store",
    "subway_station",
    "supermarket",
    "synagogue",
    "tourist_attraction",
    "train_station",
    "transit_station",
    "university",
    "veterinary_care",
    "zoo",
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// `lat,lng` as the Maps APIs expect it.
    pub fn as_param(&self) -> String {
        format!("{},{}", self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommuteMode {
    Driving,
    Transit,
}

impl CommuteMode {
    pub fn as_str(self) -> &'static str {
        match self {
            CommuteMode::Driving => "driving",
            CommuteMode::Transit => "transit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NearbyPlace {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Name")]
    pub name: String,
}

// ----- wire types -----

/// `status` and `error_message`, common to every Maps response.
#[derive(Debug, Default, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    status: String,
    error_message: Option<String>,
}

impl ApiStatus {
    /// `Ok(false)` when the status is one of `empty` (nothing found),
    /// an error for any other status but `OK`.
    fn check(&self, endpoint: &str, empty: &[&str]) -> Result<bool> {
        match self.status.as_str() {
            "" | "OK" => Ok(true),
            s if empty.contains(&s) => Ok(false),
            s => Err(HubError::Api {
                endpoint: endpoint.to_string(),
                status: s.to_string(),
                message: self.error_message.clone().unwrap_or_default(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(flatten)]
    api: ApiStatus,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    #[serde(flatten)]
    api: ApiStatus,
    #[serde(default)]
    routes: Vec<Route>,
}

#[derive(Debug, Deserialize)]
struct Route {
    #[serde(default)]
    legs: Vec<Leg>,
}

#[derive(Debug, Deserialize)]
struct Leg {
    duration: Option<TextValue>,
}

#[derive(Debug, Deserialize)]
struct TextValue {
    text: String,
}

#[derive(Debug, Deserialize)]
struct PlacesPage {
    #[serde(flatten)]
    api: ApiStatus,
    #[serde(default)]
    results: Vec<PlaceResult>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaceResult {
    #[serde(default)]
    name: String,
    #[serde(default)]
    types: Vec<String>,
}

/// Google Maps web services client.
#[derive(Debug, Clone)]
pub struct GoogleMaps {
    client: Client,
    base: String,
    api_key: String,
    components: String,
    destination: String,
}

impl GoogleMaps {
    pub fn new(client: Client, config: &Config) -> Result<Self> {
        Ok(Self {
            client,
            base: config.google_maps_api_url.trim_end_matches('/').to_string(),
            api_key: config.google_api_key()?.to_string(),
            components: config.geo_filtering_components.clone(),
            destination: config.commute_destination.clone(),
        })
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    async fn request<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let mut url = Url::parse(&format!("{}/{}/json", self.base, endpoint))?;
        url.query_pairs_mut()
            .extend_pairs(params)
            .append_pair("key", &self.api_key);
        let body = read_text(self.client.get(url.clone()), &url).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Latitude and longitude of a free-text location.
    #[instrument(level = "info", skip(self))]
    pub async fn geocode(&self, location: &str) -> Result<Coordinates> {
        let resp: GeocodeResponse = self
            .request(
                "geocode",
                &[("address", location), ("components", self.components.as_str())],
            )
            .await?;
        let coords = geocoded(location, resp)?;
        info!(lat = coords.latitude, lng = coords.longitude, "geocoded");
        Ok(coords)
    }

    /// Human-readable travel time from `origin` to the commute destination.
    #[instrument(level = "info", skip(self))]
    pub async fn commute_time(
        &self,
        origin: Coordinates,
        mode: CommuteMode,
    ) -> Result<Option<String>> {
        let origin = origin.as_param();
        let resp: DirectionsResponse = self
            .request(
                "directions",
                &[
                    ("origin", origin.as_str()),
                    ("destination", self.destination.as_str()),
                    ("departure_time", "now"),
                    ("mode", mode.as_str()),
                    ("avoid", "tolls|ferries|indoor"),
                ],
            )
            .await?;
        let text = route_duration(resp)?;
        if text.is_none() {
            warn!(mode = mode.as_str(), "no route to commute destination");
        }
        Ok(text)
    }

    /// Notable places near `at`, closest first.
    #[instrument(level = "info", skip(self))]
    pub async fn nearby_places(&self, at: Coordinates) -> Result<Vec<NearbyPlace>> {
        let location = at.as_param();
        let mut pages = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let mut page: PlacesPage = match &token {
                None => {
                    self.request(
                        "place/nearbysearch",
                        &[("location", location.as_str()), ("rankby", "distance")],
                    )
                    .await?
                }
                Some(t) => {
                    self.request("place/nearbysearch", &[("pagetoken", t.as_str())])
                        .await?
                }
            };
            page.api.check("place/nearbysearch", &["ZERO_RESULTS"])?;
            token = page.next_page_token.take();
            pages.push(page);
            if token.is_none() || pages.len() >= MAX_PLACE_PAGES {
                break;
            }
            sleep(PAGE_TOKEN_DELAY).await;
        }

        let places = filter_places(&pages);
        info!(pages = pages.len(), places = places.len(), "nearby places");
        Ok(places)
    }
}

fn geocoded(location: &str, resp: GeocodeResponse) -> Result<Coordinates> {
    if !resp.api.check("geocode", &["ZERO_RESULTS"])? {
        return Err(HubError::AddressNotFound(location.to_string()));
    }
    first_location(resp).ok_or_else(|| HubError::AddressNotFound(location.to_string()))
}

/// `NOT_FOUND` means an endpoint could not be geocoded; both it and
/// `ZERO_RESULTS` mean there is no route.
fn route_duration(resp: DirectionsResponse) -> Result<Option<String>> {
    if !resp.api.check("directions", &["ZERO_RESULTS", "NOT_FOUND"])? {
        return Ok(None);
    }
    Ok(first_duration(resp))
}

fn first_location(resp: GeocodeResponse) -> Option<Coordinates> {
    resp.results.into_iter().next().map(|r| Coordinates {
        latitude: r.geometry.location.lat,
        longitude: r.geometry.location.lng,
    })
}

fn first_duration(resp: DirectionsResponse) -> Option<String> {
    resp.routes
        .into_iter()
        .next()?
        .legs
        .into_iter()
        .next()?
        .duration
        .map(|d| d.text)
}

/// Keep each place under its first supported type.
fn filter_places(pages: &[PlacesPage]) -> Vec<NearbyPlace> {
    pages
        .iter()
        .flat_map(|p| p.results.iter())
        .filter_map(|r| {
            r.types
                .iter()
                .find(|t| SUPPORTED_PLACE_TYPES.contains(&t.as_str()))
                .map(|t| NearbyPlace {
                    kind: title_case(t),
                    name: r.name.clone(),
                })
        })
        .collect()
}

/// `bus_station` -> `Bus Station`
fn title_case(place_type: &str) -> String {
    place_type
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geocode_first_result() {
        let resp: GeocodeResponse = serde_json::from_str(
            r#"{"status":"OK","results":[
                {"geometry":{"location":{"lat":43.678985,"lng":-79.3449101}}},
                {"geometry":{"location":{"lat":1.0,"lng":2.0}}}]}"#,
        )
        .unwrap();
        let c = first_location(resp).unwrap();
        assert_eq!(c.latitude, 43.678985);
        assert_eq!(c.as_param(), "43.678985,-79.3449101");
    }

    #[test]
    fn test_geocode_no_results() {
        let resp: GeocodeResponse =
            serde_json::from_str(r#"{"status":"ZERO_RESULTS","results":[]}"#).unwrap();
        assert!(first_location(resp).is_none());
    }

    #[test]
    fn test_geocode_request_denied_is_not_address_not_found() {
        let resp: GeocodeResponse = serde_json::from_str(
            r#"{"status":"REQUEST_DENIED","error_message":"The provided API key is invalid.","results":[]}"#,
        )
        .unwrap();
        match geocoded("Riverdale", resp) {
            Err(HubError::Api {
                endpoint,
                status,
                message,
            }) => {
                assert_eq!(endpoint, "geocode");
                assert_eq!(status, "REQUEST_DENIED");
                assert!(message.contains("API key"));
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[test]
    fn test_geocode_zero_results_is_address_not_found() {
        let resp: GeocodeResponse =
            serde_json::from_str(r#"{"status":"ZERO_RESULTS","results":[]}"#).unwrap();
        assert!(matches!(
            geocoded("nowhere", resp),
            Err(HubError::AddressNotFound(l)) if l == "nowhere"
        ));
    }

    #[test]
    fn test_directions_status() {
        let over: DirectionsResponse =
            serde_json::from_str(r#"{"status":"OVER_QUERY_LIMIT","routes":[]}"#).unwrap();
        assert!(matches!(route_duration(over), Err(HubError::Api { .. })));
        let none: DirectionsResponse =
            serde_json::from_str(r#"{"status":"NOT_FOUND","routes":[]}"#).unwrap();
        assert_eq!(route_duration(none).unwrap(), None);
    }

    #[test]
    fn test_places_status() {
        let denied: PlacesPage =
            serde_json::from_str(r#"{"status":"REQUEST_DENIED","results":[]}"#).unwrap();
        assert!(denied.api.check("place/nearbysearch", &["ZERO_RESULTS"]).is_err());
        let empty: PlacesPage =
            serde_json::from_str(r#"{"status":"ZERO_RESULTS","results":[]}"#).unwrap();
        assert!(!empty.api.check("place/nearbysearch", &["ZERO_RESULTS"]).unwrap());
    }

    #[test]
    fn test_commute_duration_text() {
        let resp: DirectionsResponse = serde_json::from_str(
            r#"{"routes":[{"legs":[{"duration":{"text":"24 mins","value":1440}}]}]}"#,
        )
        .unwrap();
        assert_eq!(first_duration(resp).as_deref(), Some("24 mins"));
        let empty: DirectionsResponse = serde_json::from_str(r#"{"routes":[]}"#).unwrap();
        assert!(first_duration(empty).is_none());
    }

    #[test]
    fn test_filter_places() {
        let page: PlacesPage = serde_json::from_str(
            r#"{"results":[
                {"name":"Union","types":["point_of_interest","bus_station","transit_station"]},
                {"name":"Nowhere","types":["route"]},
                {"name":"Cafe X","types":["cafe","food"]}],
               "next_page_token":"abc"}"#,
        )
        .unwrap();
        let places = filter_places(&[page]);
        assert_eq!(
            places,
            vec![
                NearbyPlace {
                    kind: "Bus Station".into(),
                    name: "Union".into()
                },
                NearbyPlace {
                    kind: "Cafe".into(),
                    name: "Cafe X".into()
                },
            ]
        );
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("local_government_office"), "Local Government Office");
        assert_eq!(title_case("zoo"), "Zoo");
    }

    #[test]
    fn test_new_requires_key() {
        let cfg = Config::default();
        assert!(matches!(
            GoogleMaps::new(Client::new(), &cfg),
            Err(HubError::Config(_))
        ));
    }
}
