//! Read-only HTTP-indexed backend for keelfs.
//!
//! Construction fetches a JSON listing of paths and builds an in-memory
//! index; file sizes are learned lazily via `HEAD` and bodies via `GET`,
//! then cached until [`HttpIndexFs::empty`] releases them.

mod client;
mod config;
mod fs;

pub use crate::client::{HttpClient, HttpError};
#[cfg(feature = "reqwest")]
pub use crate::client::ReqwestClient;
pub use crate::config::HttpIndexConfig;
pub use crate::fs::HttpIndexFs;
