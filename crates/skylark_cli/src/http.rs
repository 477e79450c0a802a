//! Blocking reqwest binding of the session `HttpClient` trait.

use std::time::Duration;

use serde_json::Value as Json;
use skylark_session::{HttpClient, HttpError};

/// A blocking HTTP client for the RPC facade.
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Builds the client with the CLI's defaults.
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("skylark/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    fn execute(&self, request: reqwest::blocking::RequestBuilder) -> Result<Json, HttpError> {
        let response = request.send().map_err(|err| HttpError {
            status: err.status().map(|status| status.as_u16()),
            message: err.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .ok()
                .filter(|body| !body.is_empty())
                .unwrap_or_else(|| status.to_string());
            return Err(HttpError {
                status: Some(status.as_u16()),
                message,
            });
        }

        response.json().map_err(|err| HttpError {
            status: Some(status.as_u16()),
            message: format!("malformed response body: {err}"),
        })
    }
}

impl HttpClient for ReqwestClient {
    fn post_json(&self, url: &str, auth: Option<&str>, body: &Json) -> Result<Json, HttpError> {
        let mut request = self.client.post(url).json(body);
        if let Some(auth) = auth {
            request = request.header(reqwest::header::AUTHORIZATION, auth);
        }
        self.execute(request)
    }

    fn get_json(
        &self,
        url: &str,
        auth: Option<&str>,
        query: &[(&str, &str)],
    ) -> Result<Json, HttpError> {
        let mut request = self.client.get(url).query(query);
        if let Some(auth) = auth {
            request = request.header(reqwest::header::AUTHORIZATION, auth);
        }
        self.execute(request)
    }
}
