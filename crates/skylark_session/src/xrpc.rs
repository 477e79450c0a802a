//! HTTP/JSON binding of the RPC facade.
//!
//! The actual HTTP client is abstracted via a trait so the facade can
//! run over different implementations (reqwest in the CLI, an in-memory
//! client in tests).

use serde_json::{json, Value as Json};
use skylark_codec::{ContentHash, Value};
use skylark_proto::{Record, RecordRef};

use crate::credential::Credential;
use crate::error::{SessionError, SessionResult};
use crate::rpc::{Profile, RpcFacade};

/// A failed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    /// HTTP status, when the exchange got far enough to have one.
    pub status: Option<u16>,
    /// Error message.
    pub message: String,
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual transport. Both methods
/// are synchronous; remote calls on the stream path happen inside sinks,
/// which are expected to return promptly or hand off to a worker.
pub trait HttpClient: Send + Sync {
    /// Sends a POST with a JSON body and returns the JSON response.
    fn post_json(
        &self,
        url: &str,
        auth: Option<&str>,
        body: &Json,
    ) -> Result<Json, HttpError>;

    /// Sends a GET with query parameters and returns the JSON response.
    fn get_json(
        &self,
        url: &str,
        auth: Option<&str>,
        query: &[(&str, &str)],
    ) -> Result<Json, HttpError>;
}

/// The HTTP/JSON RPC facade.
pub struct XrpcFacade<C: HttpClient> {
    base_url: String,
    client: C,
}

impl<C: HttpClient> XrpcFacade<C> {
    /// Creates a facade against the given service base URL.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url, client }
    }

    /// Returns the service base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/xrpc/{}", self.base_url, method)
    }

    fn credential_from_json(json: &Json) -> SessionResult<Credential> {
        Ok(Credential::new(
            str_field(json, "account")?,
            str_field(json, "handle")?,
            str_field(json, "accessToken")?,
            str_field(json, "refreshToken")?,
        ))
    }

    fn ref_from_json(json: &Json) -> SessionResult<RecordRef> {
        let uri = str_field(json, "uri")?;
        let hash = ContentHash::from_hex(&str_field(json, "ref")?)
            .map_err(|err| SessionError::Protocol(err.to_string()))?;
        Ok(RecordRef::new(uri, hash))
    }
}

impl<C: HttpClient> RpcFacade for XrpcFacade<C> {
    fn create_session(&self, identifier: &str, secret: &str) -> SessionResult<Credential> {
        let body = json!({ "identifier": identifier, "secret": secret });
        let response = self
            .client
            .post_json(&self.endpoint("session.create"), None, &body)
            .map_err(|err| match err.status {
                // The host rejected the identifier/secret pair.
                Some(400 | 401) => SessionError::Authentication(err.message),
                _ => SessionError::transport_retryable(err.message),
            })?;
        Self::credential_from_json(&response)
    }

    fn refresh_session(&self, credential: &Credential) -> SessionResult<Credential> {
        let response = self
            .client
            .post_json(
                &self.endpoint("session.refresh"),
                Some(&credential.refresh_header()),
                &json!({}),
            )
            .map_err(|err| match err.status {
                Some(400 | 401) => SessionError::Authentication(err.message),
                _ => SessionError::transport_retryable(err.message),
            })?;
        Self::credential_from_json(&response)
    }

    fn create_record(
        &self,
        credential: &Credential,
        collection: &str,
        record: &Record,
    ) -> SessionResult<RecordRef> {
        let body = json!({
            "collection": collection,
            "record": value_to_json(&record.to_value()),
        });
        let response = self
            .client
            .post_json(
                &self.endpoint("repo.createRecord"),
                Some(&credential.auth_header()),
                &body,
            )
            .map_err(authed_error)?;
        Self::ref_from_json(&response)
    }

    fn get_record(&self, credential: &Credential, uri: &str) -> SessionResult<(RecordRef, Record)> {
        let (_, collection, _) =
            RecordRef::parse_uri(uri).map_err(|err| SessionError::Protocol(err.to_string()))?;

        let response = self
            .client
            .get_json(
                &self.endpoint("repo.getRecord"),
                Some(&credential.auth_header()),
                &[("uri", uri)],
            )
            .map_err(authed_error)?;

        let reference = Self::ref_from_json(&response)?;
        let record_json = response
            .get("record")
            .ok_or_else(|| SessionError::Protocol("response missing record".into()))?;
        let record = Record::classify(&collection, json_to_value(record_json)?);
        Ok((reference, record))
    }

    fn delete_record(&self, credential: &Credential, uri: &str) -> SessionResult<()> {
        self.client
            .post_json(
                &self.endpoint("repo.deleteRecord"),
                Some(&credential.auth_header()),
                &json!({ "uri": uri }),
            )
            .map_err(authed_error)?;
        Ok(())
    }

    fn get_profile(&self, credential: &Credential, actor: &str) -> SessionResult<Profile> {
        let response = self
            .client
            .get_json(
                &self.endpoint("actor.getProfile"),
                Some(&credential.auth_header()),
                &[("actor", actor)],
            )
            .map_err(authed_error)?;

        Ok(Profile {
            account: str_field(&response, "account")?,
            handle: str_field(&response, "handle")?,
            display_name: opt_str_field(&response, "displayName"),
            description: opt_str_field(&response, "description"),
            followers: u64_field(&response, "followers"),
            follows: u64_field(&response, "follows"),
        })
    }
}

fn authed_error(err: HttpError) -> SessionError {
    match err.status {
        Some(401) => SessionError::Authentication(err.message),
        _ => SessionError::transport_retryable(err.message),
    }
}

fn str_field(json: &Json, name: &str) -> SessionResult<String> {
    json.get(name)
        .and_then(Json::as_str)
        .map(str::to_string)
        .ok_or_else(|| SessionError::Protocol(format!("response missing {name}")))
}

fn opt_str_field(json: &Json, name: &str) -> Option<String> {
    json.get(name).and_then(Json::as_str).map(str::to_string)
}

fn u64_field(json: &Json, name: &str) -> u64 {
    json.get(name).and_then(Json::as_u64).unwrap_or(0)
}

/// Renders a CBOR value as the JSON the host expects.
///
/// Links and byte strings have no native JSON form; they travel as
/// single-key objects `{"$link": hex}` / `{"$bytes": hex}`.
pub fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Integer(n) => Json::from(*n),
        Value::Text(s) => Json::String(s.clone()),
        Value::Bytes(b) => json!({ "$bytes": hex_encode(b) }),
        Value::Link(hash) => json!({ "$link": hash.to_hex() }),
        Value::Array(items) => Json::Array(items.iter().map(value_to_json).collect()),
        Value::Map(pairs) => {
            let mut object = serde_json::Map::new();
            for (key, val) in pairs {
                if let Some(key) = key.as_text() {
                    object.insert(key.to_string(), value_to_json(val));
                }
            }
            Json::Object(object)
        }
    }
}

/// Reads a JSON record back into a CBOR value.
pub fn json_to_value(json: &Json) -> SessionResult<Value> {
    match json {
        Json::Null => Ok(Value::Null),
        Json::Bool(b) => Ok(Value::Bool(*b)),
        Json::Number(n) => n
            .as_i64()
            .map(Value::Integer)
            .ok_or_else(|| SessionError::Protocol(format!("non-integer number {n}"))),
        Json::String(s) => Ok(Value::Text(s.clone())),
        Json::Array(items) => Ok(Value::Array(
            items.iter().map(json_to_value).collect::<SessionResult<_>>()?,
        )),
        Json::Object(object) => {
            if object.len() == 1 {
                if let Some(Json::String(hex)) = object.get("$link") {
                    let hash = ContentHash::from_hex(hex)
                        .map_err(|err| SessionError::Protocol(err.to_string()))?;
                    return Ok(Value::Link(hash));
                }
                if let Some(Json::String(hex)) = object.get("$bytes") {
                    return Ok(Value::Bytes(hex_decode(hex)?));
                }
            }
            Ok(Value::map(
                object
                    .iter()
                    .map(|(key, val)| Ok((Value::Text(key.clone()), json_to_value(val)?)))
                    .collect::<SessionResult<_>>()?,
            ))
        }
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode(hex: &str) -> SessionResult<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return Err(SessionError::Protocol("odd-length hex".into()));
    }
    hex.as_bytes()
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .ok_or_else(|| SessionError::Protocol("invalid hex".into()))
        })
        .collect()
}
