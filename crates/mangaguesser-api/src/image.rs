//! Fetching image bytes from the image host.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, header::CONTENT_TYPE};
use thiserror::Error;

/// Raw image bytes and the content type the host reported, if any.
#[derive(Debug, Clone)]
pub struct ImageBytes {
  pub bytes:        Bytes,
  pub content_type: Option<String>,
}

#[derive(Debug, Error)]
pub enum FetchError {
  #[error("image request failed: {0}")]
  Request(#[from] reqwest::Error),

  #[error("image host answered {0}")]
  Status(u16),
}

/// Where image bytes come from. Swappable so handlers can be tested without
/// a network.
#[async_trait]
pub trait ImageSource: Send + Sync {
  async fn fetch(&self, url: &str) -> Result<ImageBytes, FetchError>;
}

/// [`ImageSource`] backed by an HTTP client.
///
/// Cheap to clone: the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct HttpImageSource {
  client: Client,
}

impl HttpImageSource {
  pub fn new(timeout: Duration) -> Result<Self, FetchError> {
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self { client })
  }
}

#[async_trait]
impl ImageSource for HttpImageSource {
  async fn fetch(&self, url: &str) -> Result<ImageBytes, FetchError> {
    let resp = self.client.get(url).send().await?;
    if !resp.status().is_success() {
      return Err(FetchError::Status(resp.status().as_u16()));
    }
    let content_type = resp
      .headers()
      .get(CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .map(str::to_owned);
    let bytes = resp.bytes().await?;
    Ok(ImageBytes { bytes, content_type })
  }
}
