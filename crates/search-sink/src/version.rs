use semver::Version;

/// Elasticsearch REST API generation a client speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiVersion {
    V7,
    V8,
}

impl ApiVersion {
    pub fn major(&self) -> u64 {
        match self {
            ApiVersion::V7 => 7,
            ApiVersion::V8 => 8,
        }
    }

    /// `Content-Type`/`Accept` for JSON request bodies.
    pub fn json_media_type(&self) -> &'static str {
        match self {
            ApiVersion::V7 => "application/json",
            ApiVersion::V8 => "application/vnd.elasticsearch+json; compatible-with=8",
        }
    }

    /// `Content-Type` for `_bulk` bodies.
    pub fn ndjson_media_type(&self) -> &'static str {
        match self {
            ApiVersion::V7 => "application/x-ndjson",
            ApiVersion::V8 => "application/vnd.elasticsearch+x-ndjson; compatible-with=8",
        }
    }
}

impl std::fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::V7 => write!(f, "es7"),
            Self::V8 => write!(f, "es8"),
        }
    }
}

/// Parse `version.number` from the root endpoint, e.g. `8.11.3` or
/// `7.17.0-SNAPSHOT`.
pub fn parse_server_version(number: &str) -> Result<Version, semver::Error> {
    Version::parse(number.trim())
}
