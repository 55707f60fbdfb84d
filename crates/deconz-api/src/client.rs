// Hub REST client
//
// Wraps `reqwest::Client` with deCONZ URL construction (`{base}/api/{key}/`)
// and response handling. Endpoint methods live in `resources.rs` as
// inherent methods to keep this module focused on transport mechanics.

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{HubErrorBody, HubResponseEntry};
use crate::transport::TransportConfig;

/// Raw HTTP client for the hub's REST API.
///
/// All paths are resolved against the API root `{base}/api/{key}/`, so
/// callers pass relative paths like `"lights/3"`.
#[derive(Clone)]
pub struct HubClient {
    http: reqwest::Client,
    api_url: Url,
    timeout: Duration,
}

impl HubClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the hub root (e.g. `http://192.168.1.20:80`).
    pub fn new(base_url: &Url, api_key: &str, transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            api_url: api_root(base_url, api_key)?,
            timeout: transport.timeout,
        })
    }

    /// The API root, `{base}/api/{key}/`.
    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Resolve a relative path against the API root.
    pub(crate) fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.api_url.join(path.trim_start_matches('/'))?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET request and decode the JSON body.
    pub(crate) async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let body = checked_body(resp).await?;

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }

    /// Send a PUT request with a JSON body.
    ///
    /// The hub answers with an array of `success` / `error` entries; the
    /// first `error` entry is turned into [`Error::Hub`].
    pub(crate) async fn put(
        &self,
        url: Url,
        body: &impl Serialize,
    ) -> Result<Vec<serde_json::Value>, Error> {
        debug!("PUT {}", url);

        let resp = self
            .http
            .put(url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = resp.status().as_u16();
        let body = checked_body(resp).await?;

        let entries: Vec<HubResponseEntry> =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: body.clone(),
            })?;

        let mut successes = Vec::with_capacity(entries.len());
        for entry in entries {
            match entry {
                HubResponseEntry::Success(value) => successes.push(value),
                HubResponseEntry::Error(err) => return Err(hub_error(status, err)),
            }
        }
        Ok(successes)
    }

    fn map_send_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                timeout: self.timeout,
            }
        } else {
            Error::Transport(err)
        }
    }
}

/// Build `{base}/api/{key}/` without losing any path prefix on `base`.
fn api_root(base_url: &Url, api_key: &str) -> Result<Url, Error> {
    let full = format!(
        "{}/api/{}/",
        base_url.as_str().trim_end_matches('/'),
        api_key.trim_matches('/')
    );
    Ok(Url::parse(&full)?)
}

/// Return the body of a successful response, or the hub's error.
async fn checked_body(resp: reqwest::Response) -> Result<String, Error> {
    let status = resp.status();
    let body = resp.text().await.map_err(Error::Transport)?;

    if status.is_success() {
        return Ok(body);
    }

    let parsed = serde_json::from_str::<Vec<HubResponseEntry>>(&body)
        .ok()
        .and_then(|entries| {
            entries.into_iter().find_map(|e| match e {
                HubResponseEntry::Error(err) => Some(err),
                HubResponseEntry::Success(_) => None,
            })
        });

    Err(match parsed {
        Some(err) => hub_error(status.as_u16(), err),
        None => Error::Hub {
            status: status.as_u16(),
            error_type: None,
            address: None,
            description: if body.is_empty() {
                status.to_string()
            } else {
                body
            },
        },
    })
}

fn hub_error(status: u16, err: HubErrorBody) -> Error {
    Error::Hub {
        status,
        error_type: err.error_type,
        address: err.address,
        description: err.description,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn api_root_appends_key() {
        let base = Url::parse("http://10.0.0.5:8080").unwrap();
        let root = api_root(&base, "ABCDEF").unwrap();
        assert_eq!(root.as_str(), "http://10.0.0.5:8080/api/ABCDEF/");
    }

    #[test]
    fn api_root_keeps_path_prefix() {
        let base = Url::parse("http://hub.local/deconz/").unwrap();
        let root = api_root(&base, "KEY").unwrap();
        assert_eq!(root.as_str(), "http://hub.local/deconz/api/KEY/");
    }

    #[test]
    fn relative_paths_resolve_under_root() {
        let client = HubClient::new(
            &Url::parse("http://hub.local").unwrap(),
            "KEY",
            &TransportConfig::default(),
        )
        .unwrap();
        assert_eq!(
            client.url("/lights/3").unwrap().as_str(),
            "http://hub.local/api/KEY/lights/3"
        );
    }
}
