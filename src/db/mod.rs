pub mod import;
pub mod postgres;

pub use import::{run_import, ImportOptions, ImportReport};
pub use postgres::{create_pool, run_migrations};
