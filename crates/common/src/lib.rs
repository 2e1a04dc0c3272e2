//! Types shared across the gym client workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
