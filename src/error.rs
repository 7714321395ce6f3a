use std::num::ParseIntError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CueError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parser error: {0}")]
    Parser(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("parse int error: {0}")]
    ParseInt(#[from] ParseIntError),
}

pub type Result<T> = std::result::Result<T, CueError>;
