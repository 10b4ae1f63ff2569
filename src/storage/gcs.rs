use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::config::GcsConfig;
use crate::storage::BlobStore;

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
enum TokenSource {
    /// GCE/Cloud Run metadata server.
    Metadata,
    /// `authorized_user` credentials as written by `gcloud auth application-default login`.
    AuthorizedUser(AuthorizedUser),
}

#[derive(Debug, Clone, Deserialize)]
struct AuthorizedUser {
    client_id: String,
    client_secret: String,
    refresh_token: String,
    #[serde(default)]
    token_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    refresh_at: Instant,
}

#[derive(Debug)]
pub struct GcsBlobStore {
    bucket: String,
    endpoint: String,
    client: reqwest::Client,
    source: TokenSource,
    token: Mutex<Option<CachedToken>>,
}

impl GcsBlobStore {
    pub fn new(config: GcsConfig) -> anyhow::Result<Self> {
        let source = match config.credentials_path.as_deref() {
            Some(path) => load_credentials(path)?,
            None => TokenSource::Metadata,
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("build gcs http client")?;

        Ok(Self {
            bucket: config.bucket_name,
            endpoint: config.endpoint.trim_end_matches('/').to_owned(),
            client,
            source,
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> anyhow::Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.access_token.clone());
            }
        }

        let response = match &self.source {
            TokenSource::Metadata => self
                .client
                .get(METADATA_TOKEN_URL)
                .header("Metadata-Flavor", "Google")
                .send()
                .await
                .context("request metadata access token")?,
            TokenSource::AuthorizedUser(user) => self
                .client
                .post(user.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI))
                .header(
                    reqwest::header::CONTENT_TYPE,
                    "application/x-www-form-urlencoded",
                )
                .body(refresh_grant_body(user))
                .send()
                .await
                .context("request oauth access token")?,
        };
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("access token request failed ({status}): {body}");
        }
        let token: TokenResponse = response.json().await.context("parse token json")?;

        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(300));
        let refresh_at = Instant::now() + lifetime.saturating_sub(TOKEN_REFRESH_MARGIN);
        *cached = Some(CachedToken {
            access_token: token.access_token.clone(),
            refresh_at,
        });
        Ok(token.access_token)
    }
}

#[async_trait]
impl BlobStore for GcsBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> anyhow::Result<()> {
        let access_token = self.access_token().await.context("get access token")?;
        let url = format!(
            "{endpoint}/upload/storage/v1/b/{bucket}/o?uploadType=media&name={name}",
            endpoint = self.endpoint,
            bucket = self.bucket,
            name = percent_encode_rfc3986(key),
        );
        let resp = self
            .client
            .post(url)
            .bearer_auth(access_token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .with_context(|| format!("upload {}", self.uri(key)))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("gcs upload of {key} failed ({status}): {body}");
        }
        tracing::debug!(uri = %self.uri(key), "uploaded object");
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let access_token = self.access_token().await.context("get access token")?;
        let url = format!(
            "{endpoint}/storage/v1/b/{bucket}/o/{name}?alt=media",
            endpoint = self.endpoint,
            bucket = self.bucket,
            name = percent_encode_rfc3986(key),
        );
        let resp = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .with_context(|| format!("download {}", self.uri(key)))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("gcs download of {key} failed ({status}): {body}");
        }
        let bytes = resp.bytes().await.context("read gcs object body")?;
        Ok(Some(bytes.to_vec()))
    }

    fn uri(&self, key: &str) -> String {
        format!("gs://{}/{key}", self.bucket)
    }
}

fn load_credentials(path: &Path) -> anyhow::Result<TokenSource> {
    #[derive(Deserialize)]
    struct CredentialType {
        #[serde(rename = "type")]
        kind: String,
    }

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read credentials: {}", path.display()))?;
    let kind: CredentialType = serde_json::from_str(&raw)
        .with_context(|| format!("parse credentials: {}", path.display()))?;
    match kind.kind.as_str() {
        "authorized_user" => {
            let user: AuthorizedUser =
                serde_json::from_str(&raw).context("parse authorized_user credentials")?;
            Ok(TokenSource::AuthorizedUser(user))
        }
        other => anyhow::bail!(
            "unsupported credentials type `{other}` in {} (expected `authorized_user`; omit --credentials to use the metadata server)",
            path.display()
        ),
    }
}

fn refresh_grant_body(user: &AuthorizedUser) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .append_pair("grant_type", "refresh_token")
        .append_pair("client_id", &user.client_id)
        .append_pair("client_secret", &user.client_secret)
        .append_pair("refresh_token", &user.refresh_token)
        .finish()
}

fn percent_encode_rfc3986(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for &b in input.as_bytes() {
        let is_unreserved = matches!(
            b,
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~'
        );
        if is_unreserved {
            out.push(b as char);
        } else {
            out.push('%');
            out.push_str(&format!("{b:02X}"));
        }
    }
    out
}
