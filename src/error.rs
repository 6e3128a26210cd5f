use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced while loading configuration or parsing authored values.
///
/// The per-frame core never returns these; anything that goes wrong inside a
/// tick is handled in place so the frame loop keeps running.
#[derive(Debug, Error)]
pub enum TilewalkError {
    #[error("unknown movement type '{0}' (expected stationary, player or wander)")]
    UnknownMovementType(String),
    #[error("actor {actor} has an invalid movement type: {source}")]
    UnknownActorMovement {
        actor: u64,
        #[source]
        source: Box<TilewalkError>,
    },
    #[error("failed to read {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
