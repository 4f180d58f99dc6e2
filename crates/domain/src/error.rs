/// Shared error type used across the auto-tracker crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
