use magpend_diffeq::DiffeqErrors;
use magpend_params::ParamErrors;
use thiserror::Error;

pub mod config;
pub mod model;
pub mod output;

#[derive(Debug, Error)]
pub enum ConfigErrors {
    #[error("{0}")]
    Csv(#[from] csv::Error),
    #[error("{0}")]
    Diffeq(#[from] DiffeqErrors),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Params(#[from] ParamErrors),
    #[error("could not parse config: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("could not write config: {0}")]
    Serialize(#[from] ron::Error),
}
