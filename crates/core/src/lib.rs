//! Core types, CSV contracts and warehouse policy for the MovieFlix pipeline.

pub mod catalog;
pub mod error;
pub mod limits;
pub mod mart;
pub mod memory;
pub mod phase;
pub mod schema;
pub mod staging;
pub mod store;
pub mod transform;
pub mod warehouse;

pub use catalog::*;
pub use error::{Error, Result};
pub use mart::{AvgByAgeRow, RatingsByCountryRow, TopByGenreRow};
pub use memory::MemoryStore;
pub use phase::Phase;
pub use schema::{Layout, RawFile};
pub use staging::*;
pub use store::{CatalogStore, WarehouseStore};
pub use transform::{build_warehouse, Rejection, ViolationKind, ViolationPolicy, WarehouseBuild};
pub use warehouse::*;
