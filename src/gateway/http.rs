//! Blocking HTTP gateway to the remote REST API.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::LINK;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::{debug, info};

use super::{reports_missing, Entries, Gateway};
use crate::config::Config;
use crate::error::{Error, Result};

/// Entries requested per page when listing.
const PAGE_SIZE: &str = "100";

/// Gateway backed by `reqwest`'s blocking client.
pub struct HttpGateway {
    client: Client,
    config: Config,
}

impl HttpGateway {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("easel/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Send one request and decode the body.
    ///
    /// Returns the body and the `rel="next"` link, if any. A 404 whose body
    /// says the item does not exist is returned as `Ok` so callers can
    /// branch on it.
    fn send(
        &self,
        method: Method,
        url: &str,
        params: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<(Value, Option<String>)> {
        info!(%method, url, "request");
        if !params.is_empty() {
            debug!(?params, "query");
        }

        let mut request = self
            .client
            .request(method.clone(), url)
            .bearer_auth(&self.config.token)
            .query(params);
        if let Some(body) = body {
            debug!(body = %body, "payload");
            request = request.json(body);
        }

        let response = request.send()?;
        let status = response.status();
        let next = response
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_next_link);
        let text = response.text()?;
        debug!(status = status.as_u16(), body = %text, "response");

        let value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or_else(|_| Value::String(text.clone()))
        };

        if status.is_success() || (status == StatusCode::NOT_FOUND && reports_missing(&value)) {
            Ok((value, next))
        } else {
            Err(Error::Remote {
                method: method.to_string(),
                path: url.to_string(),
                status: status.as_u16(),
                body: text,
            })
        }
    }
}

impl Gateway for HttpGateway {
    fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<Value> {
        self.send(Method::GET, &self.config.url(path), params, None)
            .map(|(value, _)| value)
    }

    fn list<'a>(&'a self, path: &str, params: &[(&str, &str)]) -> Entries<'a> {
        Box::new(Pages::new(self, &self.config.url(path), params))
    }

    fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.send(Method::POST, &self.config.url(path), &[], Some(body))
            .map(|(value, _)| value)
    }

    fn put(&self, path: &str, body: &Value) -> Result<Value> {
        self.send(Method::PUT, &self.config.url(path), &[], Some(body))
            .map(|(value, _)| value)
    }

    fn delete(&self, path: &str) -> Result<Value> {
        self.send(Method::DELETE, &self.config.url(path), &[], None)
            .map(|(value, _)| value)
    }
}

/// Lazily walks a paginated collection.
///
/// The first request carries the caller's query parameters; later pages use
/// the `next` link verbatim, which already encodes them. A failed page is
/// yielded once as an error and ends the iteration.
pub struct Pages<'a> {
    gateway: &'a HttpGateway,
    next: Option<String>,
    params: Vec<(String, String)>,
    buffered: std::vec::IntoIter<Value>,
}

impl<'a> Pages<'a> {
    fn new(gateway: &'a HttpGateway, url: &str, params: &[(&str, &str)]) -> Self {
        let mut params: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        if !params.iter().any(|(k, _)| k == "per_page") {
            params.push(("per_page".to_string(), PAGE_SIZE.to_string()));
        }

        Self {
            gateway,
            next: Some(url.to_string()),
            params,
            buffered: Vec::new().into_iter(),
        }
    }
}

impl Iterator for Pages<'_> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.buffered.next() {
                return Some(Ok(entry));
            }

            let url = self.next.take()?;
            let params = std::mem::take(&mut self.params);
            let borrowed: Vec<(&str, &str)> = params
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();

            match self.gateway.send(Method::GET, &url, &borrowed, None) {
                Ok((Value::Array(entries), next)) => {
                    self.buffered = entries.into_iter();
                    self.next = next;
                }
                Ok((Value::Null, _)) => {}
                Ok((other, _)) => return Some(Ok(other)),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Extract the `rel="next"` URL from a `Link` header.
#[must_use]
pub fn parse_next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let url = pieces.next()?.trim();
        let is_next = pieces.any(|p| {
            let p = p.trim();
            p == "rel=\"next\"" || p == "rel=next"
        });
        is_next.then(|| url.trim_start_matches('<').trim_end_matches('>').to_string())
    })
}
