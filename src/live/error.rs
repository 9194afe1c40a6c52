// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::sync::Arc;

/// Error conditions which may occur while lazily extending a [LiveGraph](super::LiveGraph).
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("tile fetch failed with http status {0}")]
    Http(u16),

    #[error("malformed tile data: {0}")]
    Osm(#[from] crate::osm::Error),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(Arc::new(e))
    }
}
