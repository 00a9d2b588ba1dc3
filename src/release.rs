// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Upstream release feed.
//!
//! A __release__ is one published version of the watched upstream project.
//! Releases are identified by their numeric id, never by their tag, because
//! upstream is free to move or reuse a tag.

use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT},
    Client, StatusCode,
};
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    future::Future,
    time::Duration,
};
use tracing::{debug, info, instrument};

/// Default location of the GitHub REST API.
pub const GITHUB_API: &str = "https://api.github.com";

/// Opaque, stable identity of a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ReleaseId(pub u64);

impl Display for ReleaseId {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{}", self.0)
    }
}

/// One published release with its attached files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    /// Stable identity of release.
    pub id: ReleaseId,

    /// Human readable tag name.
    pub tag: String,

    /// Attached files in upstream order.
    pub assets: Vec<Asset>,
}

/// Single file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Name of attached file.
    pub filename: String,

    /// Direct download reference of attached file.
    pub download_url: String,
}

impl Asset {
    /// Construct new asset.
    pub fn new(filename: impl Into<String>, download_url: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            download_url: download_url.into(),
        }
    }
}

/// Layer of indirection for querying the newest release.
pub trait ReleaseSource {
    /// Fetch newest release of watched project.
    ///
    /// Performs exactly one attempt.
    fn latest_release(&self) -> impl Future<Output = Result<Release>> + Send;
}

impl<T> ReleaseSource for &T
where
    T: ReleaseSource + ?Sized,
{
    fn latest_release(&self) -> impl Future<Output = Result<Release>> + Send {
        (**self).latest_release()
    }
}

/// Release source backed by the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GithubReleases {
    client: Client,
    api_base: String,
    repository: String,
}

impl GithubReleases {
    /// Construct new GitHub release source for `owner/name` repository.
    ///
    /// Authenticates with a bearer token when `GITHUB_TOKEN` is set, which
    /// lifts the anonymous rate limit.
    ///
    /// # Errors
    ///
    /// - Return [`FetchError::Client`] if HTTP client cannot be built.
    pub fn new(repository: impl Into<String>, api_base: impl Into<String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("dbiwatch/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        if let Ok(token) = std::env::var("GITHUB_TOKEN") {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| FetchError::Client("GITHUB_TOKEN is not a valid header".into()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .default_headers(headers)
            .build()
            .map_err(|error| FetchError::Client(error.to_string()))?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            repository: repository.into(),
        })
    }

    /// Endpoint queried for the newest release.
    pub fn latest_url(&self) -> String {
        format!(
            "{}/repos/{}/releases/latest",
            self.api_base, self.repository
        )
    }
}

impl ReleaseSource for GithubReleases {
    #[instrument(skip(self), level = "debug")]
    async fn latest_release(&self) -> Result<Release> {
        let url = self.latest_url();
        info!("query latest release of {}", self.repository);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|error| FetchError::Unreachable {
                url: url.clone(),
                source: error,
            })?;

        let status = response.status();
        if !status.is_success() {
            let exhausted = response
                .headers()
                .get("x-ratelimit-remaining")
                .is_some_and(|value| value.as_bytes() == b"0");
            if status == StatusCode::TOO_MANY_REQUESTS
                || (status == StatusCode::FORBIDDEN && exhausted)
            {
                return Err(FetchError::RateLimited { url });
            }

            return Err(FetchError::Status { url, status });
        }

        let body = response
            .text()
            .await
            .map_err(|error| FetchError::Unreachable {
                url: url.clone(),
                source: error,
            })?;
        debug!("received {} bytes of release payload", body.len());

        parse_release(&body)
    }
}

/// Parse GitHub release payload.
///
/// # Errors
///
/// - Return [`FetchError::Malformed`] if payload lacks an id, tag, or
///   well-formed asset listing.
pub fn parse_release(payload: &str) -> Result<Release> {
    let raw: GithubRelease = serde_json::from_str(payload).map_err(FetchError::Malformed)?;

    Ok(Release {
        id: raw.id,
        tag: raw.tag_name,
        assets: raw
            .assets
            .into_iter()
            .map(|asset| Asset::new(asset.name, asset.browser_download_url))
            .collect(),
    })
}

#[derive(Debug, Deserialize)]
struct GithubRelease {
    id: ReleaseId,
    tag_name: String,
    #[serde(default)]
    assets: Vec<GithubAsset>,
}

#[derive(Debug, Deserialize)]
struct GithubAsset {
    name: String,
    browser_download_url: String,
}

/// Release fetching error types.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// HTTP client cannot be configured.
    #[error("failed to set up HTTP client: {0}")]
    Client(String),

    /// Upstream cannot be reached, or connection broke mid-response.
    #[error("failed to reach {url}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Upstream refused request because rate limit was exhausted.
    #[error("rate limited by {url}, try again later or set GITHUB_TOKEN")]
    RateLimited { url: String },

    /// Upstream answered with non-success status.
    #[error("{url} answered with status {status}")]
    Status { url: String, status: StatusCode },

    /// Upstream payload is not a valid release.
    #[error("malformed release payload")]
    Malformed(#[source] serde_json::Error),
}

/// Friendly result alias :3
pub type Result<T, E = FetchError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_release_payload() -> anyhow::Result<()> {
        let payload = indoc! {r#"
            {
                "id": 123456,
                "tag_name": "v8.10",
                "name": "DBI 810",
                "draft": false,
                "assets": [
                    {
                        "name": "DBI.810.en.nro",
                        "size": 1024,
                        "browser_download_url": "https://example.org/DBI.810.en.nro"
                    },
                    {
                        "name": "checksums.txt",
                        "browser_download_url": "https://example.org/checksums.txt"
                    }
                ]
            }
        "#};

        let result = parse_release(payload)?;
        let expect = Release {
            id: ReleaseId(123456),
            tag: "v8.10".into(),
            assets: vec![
                Asset::new("DBI.810.en.nro", "https://example.org/DBI.810.en.nro"),
                Asset::new("checksums.txt", "https://example.org/checksums.txt"),
            ],
        };
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn parse_release_without_assets() -> anyhow::Result<()> {
        let result = parse_release(r#"{"id": 1, "tag_name": "v1", "assets": []}"#)?;
        assert!(result.assets.is_empty());

        let result = parse_release(r#"{"id": 2, "tag_name": "v2"}"#)?;
        assert!(result.assets.is_empty());

        Ok(())
    }

    #[test]
    fn parse_release_rejects_malformed_payload() {
        for payload in [
            "",
            "not json",
            r#"{"tag_name": "v1", "assets": []}"#,
            r#"{"id": "abc", "tag_name": "v1"}"#,
            r#"{"id": 1, "tag_name": "v1", "assets": [{"name": "x"}]}"#,
            r#"{"message": "Not Found"}"#,
        ] {
            let result = parse_release(payload);
            assert!(
                matches!(result, Err(FetchError::Malformed(_))),
                "accepted {payload:?}"
            );
        }
    }

    #[test]
    fn latest_url_trims_trailing_slash() -> anyhow::Result<()> {
        let source = GithubReleases::new("rashevskyv/DBIPatcher", "https://api.github.com/")?;
        assert_eq!(
            source.latest_url(),
            "https://api.github.com/repos/rashevskyv/DBIPatcher/releases/latest"
        );

        Ok(())
    }
}
