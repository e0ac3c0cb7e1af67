use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid value for {key}: {value:?} is not an integer")]
    InvalidValue { key: String, value: String },

    #[error("signal delivery failed: {0}")]
    Signal(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
