//! Photo library query engine: tag terms and conditions compiled to SQL,
//! materialized into positional tables and served through paged views, with
//! change-tracked photos persisted as minimal diffs.

pub mod config;
pub mod db;
pub mod hashing;
pub mod library;
pub mod logging;
pub mod model;
pub mod query;
pub mod session;
pub mod view;

pub use config::Config;
pub use library::Library;
pub use session::Session;
pub use view::{CollectionEvent, PagedView};
