//! Core data types, rollup calculations and storage traits for the
//! weather report service.

pub mod query;
pub mod rollups;
pub mod store;
pub mod types;
pub mod units;

pub use query::*;
pub use rollups::*;
pub use store::*;
pub use types::*;
pub use units::*;
