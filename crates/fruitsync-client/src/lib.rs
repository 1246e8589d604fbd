//! fruitsync client - HTTP access to the upstream fruit catalog.
//!
//! - [`fruityvice`] - the Fruityvice public API, implementing
//!   [`fruitsync_core::FruitSource`]

pub mod fruityvice;

pub use fruityvice::{decode_catalog, FruityviceClient};
