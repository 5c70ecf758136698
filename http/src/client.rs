//! Blocking HTTP client abstraction.
//!
//! The backend only needs two verbs; keeping them behind a trait lets
//! tests inject a canned origin and lets embedders bring their own
//! transport. The stock implementation rides `reqwest::blocking` behind
//! the default `reqwest` feature.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("transport failure for {url}: {message}")]
    Transport { url: String, message: String },
    #[error("unexpected status {status} for {url}")]
    Status { status: u16, url: String },
    #[error("missing content length for {0}")]
    MissingLength(String),
}

pub trait HttpClient: std::fmt::Debug + Send + Sync + 'static {
    /// `GET` a body.
    fn get(&self, url: &str) -> Result<Vec<u8>, HttpError>;

    /// `HEAD` for the content length.
    fn head(&self, url: &str) -> Result<u64, HttpError>;
}

#[cfg(feature = "reqwest")]
pub use self::reqwest_client::ReqwestClient;

#[cfg(feature = "reqwest")]
mod reqwest_client {
    use std::time::Duration;

    use super::{HttpClient, HttpError};

    /// `reqwest::blocking` based client.
    #[derive(Debug)]
    pub struct ReqwestClient {
        client: reqwest::blocking::Client,
    }

    impl Default for ReqwestClient {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ReqwestClient {
        pub fn new() -> Self {
            Self {
                client: reqwest::blocking::Client::new(),
            }
        }

        pub fn with_timeout(timeout: Duration) -> Result<Self, HttpError> {
            let client = reqwest::blocking::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|err| HttpError::Transport {
                    url: String::new(),
                    message: err.to_string(),
                })?;
            Ok(Self { client })
        }

        fn check_status(
            url: &str,
            response: reqwest::blocking::Response,
        ) -> Result<reqwest::blocking::Response, HttpError> {
            if response.status().is_success() {
                Ok(response)
            } else {
                Err(HttpError::Status {
                    status: response.status().as_u16(),
                    url: url.to_owned(),
                })
            }
        }
    }

    impl HttpClient for ReqwestClient {
        fn get(&self, url: &str) -> Result<Vec<u8>, HttpError> {
            let response = self
                .client
                .get(url)
                .send()
                .map_err(|err| HttpError::Transport {
                    url: url.to_owned(),
                    message: err.to_string(),
                })?;
            let response = Self::check_status(url, response)?;
            let bytes = response.bytes().map_err(|err| HttpError::Transport {
                url: url.to_owned(),
                message: err.to_string(),
            })?;
            Ok(bytes.to_vec())
        }

        fn head(&self, url: &str) -> Result<u64, HttpError> {
            let response = self
                .client
                .head(url)
                .send()
                .map_err(|err| HttpError::Transport {
                    url: url.to_owned(),
                    message: err.to_string(),
                })?;
            let response = Self::check_status(url, response)?;
            response
                .content_length()
                .ok_or_else(|| HttpError::MissingLength(url.to_owned()))
        }
    }
}
