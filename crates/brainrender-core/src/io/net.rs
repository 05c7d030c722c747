//! Blocking HTTP helpers.
//!
//! Every failure is reported as [`BrainrenderError::RemoteUnavailable`]; nothing
//! is retried.

use std::io::Read;
use std::path::Path;
use std::time::Duration;

use super::write_atomic;
use crate::error::{BrainrenderError, Result};

/// URL probed when checking for a working internet connection.
pub const DEFAULT_PROBE_URL: &str = "https://www.google.com";

/// Timeout for reachability probes.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Returns true if `url` (or [`DEFAULT_PROBE_URL`]) answers within [`PROBE_TIMEOUT`].
pub fn connected_to_internet(url: Option<&str>) -> bool {
    let agent = ureq::AgentBuilder::new().timeout(PROBE_TIMEOUT).build();
    let url = url.unwrap_or(DEFAULT_PROBE_URL);
    match agent.head(url).call() {
        Ok(_) | Err(ureq::Error::Status(..)) => true,
        Err(err) => {
            log::debug!("reachability probe of {url} failed: {err}");
            false
        }
    }
}

/// Fails with `RemoteUnavailable` unless `url` is reachable.
pub fn fail_on_no_connection(url: Option<&str>) -> Result<()> {
    if connected_to_internet(url) {
        Ok(())
    } else {
        Err(BrainrenderError::RemoteUnavailable(format!(
            "no internet connection (could not reach {})",
            url.unwrap_or(DEFAULT_PROBE_URL)
        )))
    }
}

/// Performs a GET request and returns the response body.
pub fn http_get(url: &str) -> Result<Vec<u8>> {
    let response = ureq::get(url)
        .call()
        .map_err(|err| BrainrenderError::RemoteUnavailable(format!("GET {url}: {err}")))?;
    let mut body = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut body)
        .map_err(|err| BrainrenderError::RemoteUnavailable(format!("GET {url}: {err}")))?;
    Ok(body)
}

/// Downloads `url` into `dest`, replacing it atomically.
pub fn download_file(url: &str, dest: &Path) -> Result<()> {
    log::info!("downloading {url} -> {}", dest.display());
    let body = http_get(url)?;
    write_atomic(dest, &body)
}
