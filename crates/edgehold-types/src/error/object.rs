//! Malformed resource object errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a JSON document is not a usable resource object.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum ObjectError {
    #[error("resource object must be a JSON object")]
    NotAnObject,

    #[error("resource object has no metadata.name")]
    MissingName,
}
