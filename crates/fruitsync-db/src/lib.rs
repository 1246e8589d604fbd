//! fruitsync db - PostgreSQL persistence for the fruit catalog and run log.

pub mod repository;

pub use repository::FruitRepository;
