//! Speech clip download from a remote synthesis endpoint.

use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::error::{Error, Result};

/// Source of synthesized speech clips.
///
/// One call per fragment; the clip is stored at a path keyed by the fragment index.
pub trait ClipSource: Send + Sync + 'static {
    fn fetch(&self, index: usize, text: &str, language: &str) -> impl Future<Output = Result<PathBuf>> + Send;
}

/// Downloads MP3 clips with a GET request per fragment.
pub struct HttpFetcher {
    http: reqwest::Client, // Shared connection pool
    endpoint: String,      // Synthesis endpoint, without query
    audio_dir: PathBuf,    // Created on first fetch
}

impl HttpFetcher {
    /// Create a fetcher.
    ///
    /// # Arguments
    /// * `endpoint` - Synthesis URL; `ie`, `client`, `q` and `tl` query parameters are appended
    /// * `audio_dir` - Directory the clips are written to
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>, audio_dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().build().context("Failed to create HTTP client")?;
        Ok(Self { http, endpoint: endpoint.into(), audio_dir: audio_dir.into() })
    }

    /// Local path of the clip for a fragment.
    pub fn clip_path(&self, index: usize) -> PathBuf {
        clip_path(&self.audio_dir, index)
    }

    fn request_url(&self, text: &str, language: &str) -> String {
        let separator = if self.endpoint.contains('?') { '&' } else { '?' };
        format!("{}{}ie=UTF-8&client=tw-ob&q={}&tl={}", self.endpoint, separator, urlencoding::encode(text), urlencoding::encode(language))
    }
}

fn clip_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("{}.mp3", index))
}

impl ClipSource for HttpFetcher {
    fn fetch(&self, index: usize, text: &str, language: &str) -> impl Future<Output = Result<PathBuf>> + Send {
        let url = self.request_url(text, language);
        let path = self.clip_path(index);
        async move {
            tokio::fs::create_dir_all(&self.audio_dir)
                .await
                .map_err(|e| Error::Network(format!("cannot create {}: {}", self.audio_dir.display(), e)))?;

            let bytes = self.http.get(&url).send().await?.error_for_status()?.bytes().await?;

            tokio::fs::write(&path, &bytes).await.map_err(|e| Error::Network(format!("cannot write {}: {}", path.display(), e)))?;
            debug!("Fetched clip {} ({} bytes)", path.display(), bytes.len());
            Ok(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::get;
    use std::collections::HashMap;
    use tokio::net::TcpListener;

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/translate_tts", addr)
    }

    #[tokio::test]
    async fn test_fetch_writes_clip_at_index_path() {
        let router = Router::new().route(
            "/translate_tts",
            get(|Query(params): Query<HashMap<String, String>>| async move { format!("{}|{}|{}", params["q"], params["tl"], params["client"]) }),
        );
        let endpoint = serve(router).await;
        let dir = tempfile::tempdir().unwrap();
        let audio_dir = dir.path().join("audio");
        let fetcher = HttpFetcher::new(endpoint, &audio_dir).unwrap();

        let path = fetcher.fetch(2, "hello world & more", "en-us").await.unwrap();

        assert_eq!(path, audio_dir.join("2.mp3"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello world & more|en-us|tw-ob");
    }

    #[tokio::test]
    async fn test_server_error_is_network_error() {
        let router = Router::new().route("/translate_tts", get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }));
        let endpoint = serve(router).await;
        let dir = tempfile::tempdir().unwrap();
        let fetcher = HttpFetcher::new(endpoint, dir.path()).unwrap();

        let err = fetcher.fetch(0, "hello", "en").await.unwrap_err();

        assert!(matches!(err, Error::Network(_)), "got {err:?}");
        assert!(!fetcher.clip_path(0).exists());
    }

    #[test]
    fn test_request_url_appends_query() {
        let fetcher = HttpFetcher::new("http://example.com/tts?voice=1", "/tmp").unwrap();
        assert_eq!(fetcher.request_url("a b", "fr"), "http://example.com/tts?voice=1&ie=UTF-8&client=tw-ob&q=a%20b&tl=fr");
    }
}
