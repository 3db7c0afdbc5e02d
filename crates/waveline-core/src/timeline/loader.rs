//! Background file loader
//!
//! Moves fetch + decode off the caller's thread. One worker processes
//! requests in order; the aggregator submits a whole batch and then collects
//! every result before touching the timeline, so a batch becomes visible
//! all at once.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use thiserror::Error;

use crate::platform::{AudioDecoder, DecodeError, FetchError, FetchService};
use crate::types::DecodedAudio;

/// Why a single file failed to enter the timeline
#[derive(Error, Debug)]
pub enum LoadError {
    /// The bytes couldn't be retrieved
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The bytes weren't valid audio
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

struct LoadRequest {
    index: usize,
    url: String,
}

pub(crate) struct LoadResult {
    pub index: usize,
    pub url: String,
    pub result: Result<DecodedAudio, LoadError>,
}

/// Handle to the background loader thread
pub(crate) struct FileLoader {
    tx: Sender<LoadRequest>,
    rx: Receiver<LoadResult>,
    _handle: JoinHandle<()>,
}

impl FileLoader {
    /// Spawn the background loader thread
    pub fn spawn(fetcher: Arc<dyn FetchService>, decoder: Arc<dyn AudioDecoder>) -> Self {
        let (request_tx, request_rx) = channel::<LoadRequest>();
        let (result_tx, result_rx) = channel::<LoadResult>();

        let handle = thread::Builder::new()
            .name("file-loader".to_string())
            .spawn(move || loader_thread(request_rx, result_tx, fetcher, decoder))
            .expect("Failed to spawn file loader thread");

        Self {
            tx: request_tx,
            rx: result_rx,
            _handle: handle,
        }
    }

    /// Queue one file of a batch (non-blocking)
    pub fn request(&self, index: usize, url: &str) {
        let _ = self.tx.send(LoadRequest {
            index,
            url: url.to_string(),
        });
    }

    /// Block until `count` results have arrived, returned in request order
    pub fn collect(&self, count: usize) -> Vec<LoadResult> {
        let mut results = Vec::with_capacity(count);
        for _ in 0..count {
            match self.rx.recv() {
                Ok(result) => results.push(result),
                Err(_) => {
                    log::error!("Loader thread disconnected unexpectedly");
                    break;
                }
            }
        }
        results.sort_by_key(|r| r.index);
        results
    }
}

fn loader_thread(
    rx: Receiver<LoadRequest>,
    tx: Sender<LoadResult>,
    fetcher: Arc<dyn FetchService>,
    decoder: Arc<dyn AudioDecoder>,
) {
    log::debug!("File loader thread started");

    while let Ok(request) = rx.recv() {
        let result = fetcher
            .fetch_bytes(&request.url)
            .map_err(LoadError::from)
            .and_then(|bytes| decoder.decode(&bytes).map_err(LoadError::from));

        if let Err(ref e) = result {
            log::error!("Failed to load {}: {}", request.url, e);
        }

        let _ = tx.send(LoadResult {
            index: request.index,
            url: request.url,
            result,
        });
    }

    log::debug!("File loader thread shutting down");
}
