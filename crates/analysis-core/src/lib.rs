//! Shared data model for the detection ensemble: analyzer contract,
//! metric sets, estimates, ensemble results and the error taxonomy.

pub mod error;
pub mod stats;
pub mod traits;
pub mod types;

pub use error::*;
pub use traits::*;
pub use types::*;
