//! Error paraguas de la fachada.

pub mod trakt_error;

pub use trakt_error::TraktError;
