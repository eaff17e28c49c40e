use thiserror::Error;

/// Failure to turn one row's geometry reference into features. Contained per
/// row: the merger logs it and moves on.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("row has no geometry reference in columns {0:?}")]
    MissingReference(Vec<String>),

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} responded with {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error("no source registered for {0}")]
    Unavailable(String),
}

/// The value handed to the normalizer did not fit any accepted shape.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("bare coordinates must be a non-empty array")]
    EmptyCoordinates,

    #[error("expected a coordinate array, found {0}")]
    NotCoordinates(&'static str),

    #[error("invalid GeoJSON: {0}")]
    GeoJson(#[from] geojson::Error),
}
