use thiserror::Error;

use autofarm_core_types::FarmError;

use crate::settings::SettingsError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("{0} is required")]
    MissingPort(&'static str),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ControllerError> for FarmError {
    fn from(err: ControllerError) -> Self {
        match err {
            ControllerError::Settings(inner) => inner.into(),
            ControllerError::Store(inner) => inner.into(),
            other => FarmError::new(other.to_string()),
        }
    }
}
