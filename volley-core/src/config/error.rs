use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse JSON config {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse YAML config {}: {source}", .path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("unsupported config file {} (expected .json, .yml or .yaml)", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("circular extends: {}", .0.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(" -> "))]
    CircularExtends(Vec<PathBuf>),

    #[error("`extends` is only supported in config files")]
    ExtendsNotAllowed,

    #[error("invalid config: {}", .0.join("; "))]
    Invalid(Vec<String>),
}
