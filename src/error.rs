pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Rejected input: options, time-stats strings, cache overrides.
    #[error("configuration error: {0}")]
    Config(String),

    /// Inputs that cannot be aligned with the polygons or the grid.
    #[error("data error: {0}")]
    Data(String),

    #[error("no features were found in grid extent")]
    NoFeatures,

    #[error("projection error: {0}")]
    Projection(String),

    /// The operation needs a cargo feature that was not compiled in.
    #[error("missing capability: {0}")]
    MissingCapability(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn data(msg: impl Into<String>) -> Self {
        Self::Data(msg.into())
    }

    pub fn projection(msg: impl Into<String>) -> Self {
        Self::Projection(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(Error::config("x").to_string().contains("configuration error:"));
        assert!(Error::data("x").to_string().contains("data error:"));
        assert!(Error::projection("x").to_string().contains("projection error:"));
        assert!(Error::MissingCapability("shapefile").to_string().contains("missing capability:"));
        assert_eq!(Error::NoFeatures.to_string(), "no features were found in grid extent");
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = Error::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
