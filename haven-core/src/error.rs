use thiserror::Error;

#[derive(Error, Debug)]
pub enum HavenError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data file {path}: {message}")]
    DataFile { path: String, message: String },

    #[error("Safety configuration error: {0}")]
    Safety(String),
}
