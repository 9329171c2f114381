pub mod error;
pub mod provider;
pub mod sample;

pub use error::{MeterError, Result};
pub use provider::ProviderKind;
pub use sample::{Sample, Summary};
