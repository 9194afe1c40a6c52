// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Blocking HTTP fetch of a tile's OSM XML extract, with retry/backoff on
//! transient failures. 404 is treated as "empty tile", per spec.

use std::thread;
use std::time::Duration;

use super::error::Error;

/// Fetches the OSM XML covering `bbox` (left, bottom, right, top) from `base_url`.
///
/// Returns `Ok(None)` on a 404 response (empty tile). Other non-2xx statuses and
/// transient I/O failures are retried up to `max_retries` times with exponential
/// backoff starting at `backoff_base`.
pub(super) fn fetch_bbox(
    base_url: &str,
    bbox: (f64, f64, f64, f64),
    max_retries: u32,
    backoff_base: Duration,
) -> Result<Option<String>, Error> {
    let (left, bottom, right, top) = bbox;
    let url = format!("{base_url}?bbox={left:.7},{bottom:.7},{right:.7},{top:.7}");

    let mut attempt = 0;
    loop {
        match ureq::get(&url).call() {
            Ok(mut response) => {
                let body = response
                    .body_mut()
                    .read_to_string()
                    .map_err(|e| std::io::Error::other(e.to_string()))?;
                return Ok(Some(body));
            }
            Err(ureq::Error::StatusCode(404)) => return Ok(None),
            Err(ureq::Error::StatusCode(code)) => {
                if attempt >= max_retries {
                    return Err(Error::Http(code));
                }
                attempt += 1;
                thread::sleep(backoff_base * 2u32.pow(attempt - 1));
            }
            Err(e) => {
                if attempt >= max_retries {
                    return Err(std::io::Error::other(e.to_string()).into());
                }
                attempt += 1;
                thread::sleep(backoff_base * 2u32.pow(attempt - 1));
            }
        }
    }
}
