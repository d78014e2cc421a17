/// Database layer
///
/// - `pool`: PostgreSQL connection pool with health checks
/// - `migrations`: Embedded migration runner
///
/// The SQL itself lives with the models in [`crate::models`].

pub mod migrations;
pub mod pool;
