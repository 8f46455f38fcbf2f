#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config key: {0}")]
    InvalidKey(String),

    #[error("config parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("invalid boolean value for {key}: {value}")]
    InvalidBool { key: String, value: String },

    #[error("invalid integer value for {key}: {value}")]
    InvalidInt { key: String, value: String },

    #[error(transparent)]
    Lock(#[from] grove_utils::LockError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
