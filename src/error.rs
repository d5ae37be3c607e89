use crate::prefs::PrefsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Terminal I/O Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Preferences Error: {0}")]
    Prefs(#[from] PrefsError),

    #[error("No readable keyboard under /dev/input (try --input terminal, or join the input group)")]
    NoInputDevices,
}

pub type Result<T> = std::result::Result<T, Error>;
