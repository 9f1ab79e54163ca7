pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod integrations;
pub mod middleware;
pub mod router;
pub mod service;
pub mod types;

pub use error::StoreError;
pub use router::{StoreState, store_router};
