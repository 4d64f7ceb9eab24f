use anyhow::{Context, anyhow, bail};
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const USER_AGENT: &str = concat!("gugo/", env!("CARGO_PKG_VERSION"));
const MAX_ATTEMPTS: u32 = 3;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum TokenStyle {
    Bearer,
    PrivateToken,
}

/// Authenticated client bound to one API base URL.
#[derive(Debug)]
pub(crate) struct ApiClient {
    http: Client,
    base: Url,
    token: String,
    style: TokenStyle,
}

impl ApiClient {
    pub(crate) fn new(base: &str, token: String, style: TokenStyle) -> anyhow::Result<Self> {
        let base = Url::parse(base).with_context(|| format!("parsing API url '{base}'"))?;
        if base.cannot_be_a_base() {
            bail!("API url '{base}' cannot be used as a base");
        }
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("creating client")?;
        Ok(Self {
            http,
            base,
            token,
            style,
        })
    }

    /// Base URL with `segments` appended, each percent-encoded as a single
    /// path segment.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> anyhow::Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("API url '{}' cannot be used as a base", self.base))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub(crate) async fn get(&self, mut url: Url, query: &[(&str, String)]) -> anyhow::Result<Response> {
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(key, value)| (*key, value.as_str())));
        }
        let builder = self.authorize(self.http.get(url));
        send_with_retry(|| builder.try_clone().context("clone request")).await
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.style {
            TokenStyle::Bearer => builder.bearer_auth(&self.token),
            TokenStyle::PrivateToken => builder.header("PRIVATE-TOKEN", &self.token),
        }
    }
}

pub(crate) async fn send_with_retry<F>(mut build: F) -> anyhow::Result<Response>
where
    F: FnMut() -> anyhow::Result<RequestBuilder>,
{
    for attempt in 1..=MAX_ATTEMPTS {
        let response = build()?.send().await.context("send request")?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if is_retryable(status) && attempt < MAX_ATTEMPTS {
            let delay = retry_delay_from_headers(response.headers()).unwrap_or(Duration::from_secs(1));
            let _ = response.bytes().await;
            tokio::time::sleep(delay).await;
            continue;
        }
        return response.error_for_status().map_err(Into::into);
    }
    bail!("request failed after retries");
}

pub(crate) fn next_page_from_link_header(headers: &HeaderMap) -> Option<u32> {
    let link = headers.get("link")?.to_str().ok()?;
    for part in link.split(',') {
        let part = part.trim();
        if !part.contains("rel=\"next\"") {
            continue;
        }
        let start = part.find('<')? + 1;
        let end = part.find('>')?;
        let url = Url::parse(part.get(start..end)?).ok()?;
        return url
            .query_pairs()
            .find(|(key, _)| key == "page")
            .and_then(|(_, value)| value.parse::<u32>().ok());
    }
    None
}

pub(crate) fn next_page_from_header(headers: &HeaderMap, name: &str) -> Option<u32> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u32>().ok())
}

fn is_retryable(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE
    )
}

fn retry_delay_from_headers(headers: &HeaderMap) -> Option<Duration> {
    retry_after_seconds(headers)
        .or_else(|| ratelimit_reset_seconds(headers))
        .map(Duration::from_secs)
}

fn retry_after_seconds(headers: &HeaderMap) -> Option<u64> {
    headers
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
}

fn ratelimit_reset_seconds(headers: &HeaderMap) -> Option<u64> {
    let reset = headers
        .get("x-ratelimit-reset")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())?;
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    reset.checked_sub(now).filter(|delay| *delay > 0)
}
