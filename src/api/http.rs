//! Purpose: Rate-limit-aware HTTP/JSON client shared by both backing stores.
//! Exports: `HttpClient`.
//! Role: Owns the ureq agent, auth header, and the 429 retry contract.
//! Invariants: Retry is scoped strictly to HTTP 429; other failures fail fast.
//! Invariants: A request is retried verbatim; the descriptor never changes.

use crate::core::error::{Error, ErrorKind};
use crate::core::retry::{RetryPolicy, run_with_retry};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

type ApiResult<T> = Result<T, Error>;

#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<HttpClientInner>,
}

struct HttpClientInner {
    base_url: Url,
    token: Option<String>,
    agent: ureq::Agent,
    policy: RetryPolicy,
}

impl HttpClient {
    pub fn new(base_url: impl Into<String>) -> ApiResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let agent = ureq::AgentBuilder::new().build();
        Ok(Self {
            inner: Arc::new(HttpClientInner {
                base_url,
                token: None,
                agent,
                policy: RetryPolicy::default(),
            }),
        })
    }

    pub fn with_token(self, token: impl Into<String>) -> Self {
        self.map_inner(|inner| inner.token = Some(token.into()))
    }

    pub fn with_retry_policy(self, policy: RetryPolicy) -> Self {
        self.map_inner(|inner| inner.policy = policy)
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.inner.policy
    }

    pub fn url(&self, segments: &[&str], query: &[(&str, String)]) -> ApiResult<Url> {
        let mut url = self.inner.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                Error::new(ErrorKind::Usage).with_message("base url cannot be a base")
            })?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    pub fn get_json<R>(&self, url: &Url) -> ApiResult<R>
    where
        R: DeserializeOwned,
    {
        self.request_json::<(), R>("GET", url, None)
    }

    pub fn send_json<T, R>(&self, method: &str, url: &Url, body: &T) -> ApiResult<R>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        self.request_json(method, url, Some(body))
    }

    /// Issue a request whose response body is irrelevant (update/delete
    /// acknowledgements). Success is any 2xx regardless of payload shape.
    pub fn send_ok<T>(&self, method: &str, url: &Url, body: Option<&T>) -> ApiResult<()>
    where
        T: Serialize,
    {
        let mut sleep = |delay: Duration| std::thread::sleep(delay);
        run_with_retry(&self.inner.policy, &mut sleep, || {
            self.send_once(method, url, body).map(|_| ())
        })
    }

    fn request_json<T, R>(&self, method: &str, url: &Url, body: Option<&T>) -> ApiResult<R>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let mut sleep = |delay: Duration| std::thread::sleep(delay);
        let response = run_with_retry(&self.inner.policy, &mut sleep, || {
            self.send_once(method, url, body)
        })?;
        read_json_response(response)
    }

    fn send_once<T>(&self, method: &str, url: &Url, body: Option<&T>) -> ApiResult<ureq::Response>
    where
        T: Serialize,
    {
        tracing::debug!(method, url = url.as_str(), "request");
        let mut request = self
            .inner
            .agent
            .request(method, url.as_str())
            .set("Accept", "application/json");
        if let Some(token) = &self.inner.token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }

        let response = match body {
            None => request.call(),
            Some(body) => {
                let payload = serde_json::to_string(body).map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to encode request json")
                        .with_source(err)
                })?;
                request
                    .set("Content-Type", "application/json")
                    .send_string(&payload)
            }
        };

        match response {
            Ok(resp) => Ok(resp),
            Err(ureq::Error::Status(code, resp)) => Err(parse_error_response(code, resp)),
            Err(ureq::Error::Transport(err)) => Err(Error::new(ErrorKind::Io)
                .with_message("request failed")
                .with_source(err)),
        }
    }

    fn map_inner(mut self, apply: impl FnOnce(&mut HttpClientInner)) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => apply(inner),
            None => {
                let mut inner = HttpClientInner {
                    base_url: self.inner.base_url.clone(),
                    token: self.inner.token.clone(),
                    agent: self.inner.agent.clone(),
                    policy: self.inner.policy,
                };
                apply(&mut inner);
                self.inner = Arc::new(inner);
            }
        }
        self
    }
}

fn normalize_base_url(raw: String) -> ApiResult<Url> {
    let mut url = Url::parse(&raw).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid base url")
            .with_source(err)
    })?;
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(Error::new(ErrorKind::Usage).with_message("base url must use http or https"));
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

fn read_json_response<R>(response: ureq::Response) -> ApiResult<R>
where
    R: DeserializeOwned,
{
    let body = response.into_string().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read response body")
            .with_source(err)
    })?;
    serde_json::from_str(&body).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("invalid response json")
            .with_source(err)
    })
}

#[derive(serde::Deserialize)]
struct ErrorEnvelope {
    error: RemoteError,
}

#[derive(serde::Deserialize)]
struct RemoteError {
    kind: String,
    message: Option<String>,
    hint: Option<String>,
    id: Option<String>,
}

fn parse_error_response(status: u16, response: ureq::Response) -> Error {
    let body = response.into_string().unwrap_or_default();
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(&body) {
        return error_from_remote(envelope.error).with_status(status);
    }
    Error::new(error_kind_from_status(status))
        .with_message(format!("remote error status {status}"))
        .with_status(status)
}

fn error_from_remote(remote: RemoteError) -> Error {
    let mut err = Error::new(parse_error_kind(&remote.kind));
    if let Some(message) = remote.message {
        err = err.with_message(message);
    }
    if let Some(hint) = remote.hint {
        err = err.with_hint(hint);
    }
    if let Some(id) = remote.id {
        err = err.with_id(id);
    }
    err
}

fn parse_error_kind(kind: &str) -> ErrorKind {
    match kind {
        "Internal" => ErrorKind::Internal,
        "Usage" => ErrorKind::Usage,
        "Validation" => ErrorKind::Validation,
        "NotFound" => ErrorKind::NotFound,
        "AlreadyExists" => ErrorKind::AlreadyExists,
        "RateLimited" => ErrorKind::RateLimited,
        "Inconsistent" => ErrorKind::Inconsistent,
        "Permission" => ErrorKind::Permission,
        "Io" => ErrorKind::Io,
        _ => ErrorKind::Internal,
    }
}

fn error_kind_from_status(status: u16) -> ErrorKind {
    match status {
        400 | 413 => ErrorKind::Usage,
        401 | 403 => ErrorKind::Permission,
        404 => ErrorKind::NotFound,
        409 => ErrorKind::AlreadyExists,
        422 => ErrorKind::Validation,
        429 => ErrorKind::RateLimited,
        500..=599 => ErrorKind::Internal,
        _ => ErrorKind::Io,
    }
}

#[cfg(test)]
mod tests {
    use super::{HttpClient, error_kind_from_status, normalize_base_url, parse_error_kind};
    use crate::core::error::ErrorKind;

    #[test]
    fn normalize_base_url_keeps_path() {
        let url = normalize_base_url("https://api.example.com/api:WVrFdUAc?x=1".to_string())
            .expect("url");
        assert_eq!(url.as_str(), "https://api.example.com/api:WVrFdUAc");
    }

    #[test]
    fn normalize_base_url_rejects_other_schemes() {
        let err = normalize_base_url("ftp://example.com".to_string()).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn url_joins_segments_and_query() {
        let client = HttpClient::new("http://localhost:9800").expect("client");
        let url = client
            .url(
                &["records"],
                &[("page_number", "2".to_string()), ("offset", "10".to_string())],
            )
            .expect("url");
        assert_eq!(
            url.as_str(),
            "http://localhost:9800/records?page_number=2&offset=10"
        );
    }

    #[test]
    fn url_extends_existing_base_path() {
        let client = HttpClient::new("https://api.example.com/api:WVrFdUAc").expect("client");
        let url = client.url(&["records", "abc123"], &[]).expect("url");
        assert_eq!(
            url.as_str(),
            "https://api.example.com/api:WVrFdUAc/records/abc123"
        );
    }

    #[test]
    fn status_mapping_covers_rate_limit() {
        assert_eq!(error_kind_from_status(429), ErrorKind::RateLimited);
        assert_eq!(error_kind_from_status(404), ErrorKind::NotFound);
        assert_eq!(error_kind_from_status(422), ErrorKind::Validation);
        assert_eq!(error_kind_from_status(503), ErrorKind::Internal);
    }

    #[test]
    fn parse_error_kind_maps_known_values() {
        assert_eq!(parse_error_kind("RateLimited"), ErrorKind::RateLimited);
        assert_eq!(parse_error_kind("Inconsistent"), ErrorKind::Inconsistent);
        assert_eq!(parse_error_kind("bogus"), ErrorKind::Internal);
    }
}
