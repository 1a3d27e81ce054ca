//! Minimal GitHub REST client (blocking)
//!
//! Covers exactly what the pipeline needs: the latest commit on a branch,
//! release lookup/creation, and asset upload/replacement. Every call is a
//! single blocking request; retries are left to the operator re-running.

use crate::core::error::{HttpError, NightlyError, NightlyResult};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Deserialize;
use serde::de::DeserializeOwned;

const USER_AGENT: &str = concat!("nightly-release/", env!("CARGO_PKG_VERSION"));

pub struct GithubClient {
  http: Client,
  api_url: String,
  repository: String,
  token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommitResponse {
  pub sha: String,
  pub commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
pub struct CommitDetail {
  pub committer: CommitPerson,
}

#[derive(Debug, Deserialize)]
pub struct CommitPerson {
  /// RFC 3339
  pub date: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseResponse {
  /// URI template, e.g. `https://uploads.github.com/repos/o/r/releases/1/assets{?name,label}`
  pub upload_url: String,
  #[serde(default)]
  pub assets: Vec<AssetResponse>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetResponse {
  pub id: u64,
  pub name: String,
}

impl GithubClient {
  /// Build a client; `token` may be `None` for read-only access to public repos
  pub fn new(api_url: &str, repository: &str, token: Option<String>) -> NightlyResult<Self> {
    let http = Client::builder().user_agent(USER_AGENT).build()?;
    Ok(Self::with_http(http, api_url, repository, token))
  }

  /// Client for a local test server, ignoring any proxy from the environment
  #[cfg(test)]
  pub(crate) fn local(api_url: &str, repository: &str) -> Self {
    let http = Client::builder().user_agent(USER_AGENT).no_proxy().build().unwrap();
    Self::with_http(http, api_url, repository, Some("test-token".to_string()))
  }

  fn with_http(http: Client, api_url: &str, repository: &str, token: Option<String>) -> Self {
    Self {
      http,
      api_url: api_url.trim_end_matches('/').to_string(),
      repository: repository.to_string(),
      token,
    }
  }

  /// Read the token from `env_var`, failing if it is unset
  pub fn token_from_env(env_var: &str) -> NightlyResult<String> {
    std::env::var(env_var).map_err(|_| {
      NightlyError::Http(HttpError::MissingToken {
        env: env_var.to_string(),
      })
    })
  }

  pub fn repository(&self) -> &str {
    &self.repository
  }

  /// `GET /repos/{repo}/commits/{branch}`
  pub fn latest_commit(&self, branch: &str) -> NightlyResult<CommitResponse> {
    let url = format!("{}/repos/{}/commits/{}", self.api_url, self.repository, branch);
    let resp = self.send(self.http.get(&url))?;
    read_json(resp, &url)
  }

  /// `GET /repos/{repo}/releases/tags/{tag}`; `None` on 404
  pub fn release_by_tag(&self, tag: &str) -> NightlyResult<Option<ReleaseResponse>> {
    let url = format!("{}/repos/{}/releases/tags/{}", self.api_url, self.repository, tag);
    let resp = self.send(self.http.get(&url))?;
    if resp.status() == reqwest::StatusCode::NOT_FOUND {
      return Ok(None);
    }
    read_json(resp, &url).map(Some)
  }

  /// `POST /repos/{repo}/releases`
  pub fn create_release(&self, tag: &str, title: &str, prerelease: bool) -> NightlyResult<ReleaseResponse> {
    let url = format!("{}/repos/{}/releases", self.api_url, self.repository);
    let body = serde_json::json!({
      "tag_name": tag,
      "name": title,
      "prerelease": prerelease,
      "draft": false,
    });
    let resp = self.send(self.http.post(&url).json(&body))?;
    read_json(resp, &url)
  }

  /// `DELETE /repos/{repo}/releases/assets/{id}`
  pub fn delete_asset(&self, asset_id: u64) -> NightlyResult<()> {
    let url = format!("{}/repos/{}/releases/assets/{}", self.api_url, self.repository, asset_id);
    let resp = self.send(self.http.delete(&url))?;
    check_status(resp, &url).map(|_| ())
  }

  /// Upload raw bytes to a release's upload URL
  pub fn upload_asset(&self, upload_url: &str, name: &str, content_type: &str, bytes: Vec<u8>) -> NightlyResult<()> {
    let url = expand_upload_url(upload_url, name);
    let req = self
      .http
      .post(&url)
      .header(CONTENT_TYPE, content_type)
      .body(bytes);
    let resp = self.send(req)?;
    check_status(resp, &url).map(|_| ())
  }

  fn send(&self, req: RequestBuilder) -> NightlyResult<Response> {
    let mut req = req
      .header(ACCEPT, "application/vnd.github+json")
      .header("X-GitHub-Api-Version", "2022-11-28");
    if let Some(token) = &self.token {
      req = req.bearer_auth(token);
    }
    Ok(req.send()?)
  }
}

/// Strip the `{?name,label}` template suffix and append the asset name
pub fn expand_upload_url(template: &str, name: &str) -> String {
  let base = template.split('{').next().unwrap_or(template);
  format!("{}?name={}", base, name)
}

fn check_status(resp: Response, url: &str) -> NightlyResult<Response> {
  let status = resp.status();
  if status.is_success() {
    return Ok(resp);
  }
  let body = resp.text().unwrap_or_default();
  Err(NightlyError::Http(HttpError::Status {
    url: url.to_string(),
    status: status.as_u16(),
    body,
  }))
}

fn read_json<T: DeserializeOwned>(resp: Response, url: &str) -> NightlyResult<T> {
  let resp = check_status(resp, url)?;
  Ok(resp.json::<T>()?)
}
