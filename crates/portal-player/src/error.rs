use thiserror::Error;

/// Failures inside the audio subsystem. None of them are fatal to the page:
/// the controller logs them and carries on without the affected feature.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("audio graph unavailable: {0}")]
    Graph(String),
    #[error("playback was rejected: {0}")]
    PlaybackRejected(String),
    #[error("session storage write failed for `{key}`: {reason}")]
    Storage { key: String, reason: String },
}

/// Failures while loading a page in place. Any of these sends the browser on a
/// plain navigation to the same URL.
#[derive(Debug, Error)]
pub enum NavError {
    #[error("fetching {url} failed: {reason}")]
    Fetch { url: String, reason: String },
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("could not parse {url}: {reason}")]
    Parse { url: String, reason: String },
}
