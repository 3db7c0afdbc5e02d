//! Filesystem byte retrieval

use thiserror::Error;

use super::FetchService;

/// File retrieval errors
#[derive(Error, Debug)]
pub enum FetchError {
    /// The file couldn't be read at all
    #[error("Invalid audio file {url}: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

/// Fetches audio bytes from local paths
///
/// The default retrieval collaborator: urls are treated as filesystem paths.
#[derive(Debug, Default)]
pub struct FsFetcher;

impl FetchService for FsFetcher {
    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        std::fs::read(url).map_err(|e| FetchError::Unreachable {
            url: url.to_string(),
            source: e,
        })
    }
}
