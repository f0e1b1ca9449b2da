mod tracing;

pub use self::tracing::start_tracing;
