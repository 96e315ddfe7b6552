#[non_exhaustive]
#[derive(Debug)]
pub enum Error {
    /// Got an invalid configuration for a query or a spatial index: unknown
    /// index kind, inconsistent query arguments, search radius too large for
    /// the box, *etc.*
    Configuration(String),
    /// Got an invalid geometry: degenerate box, points with a non-zero z
    /// coordinate in a two-dimensional box, non-finite positions, *etc.*
    Geometry(String),
    /// Error while serializing/deserializing parameters
    Json(serde_json::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Configuration(e) => write!(f, "invalid configuration: {}", e),
            Error::Geometry(e) => write!(f, "invalid geometry: {}", e),
            Error::Json(e) => write!(f, "json error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Configuration(_) |
            Error::Geometry(_) => None,
            Error::Json(e) => Some(e),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Error {
        Error::Json(error)
    }
}
