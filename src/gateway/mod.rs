//! Remote data gateway: typed client for the query service HTTP surface.
//!
//! The core treats everything here as fallible I/O; a failed call never
//! corrupts already-loaded state.

mod client;
pub mod types;

pub use client::QueryClient;
pub use types::{
    EntityQuery, NewEntity, NewRelation, RelationQuery, ServiceHealth, TeamInfo, WireEntity,
    WireRelation,
};
