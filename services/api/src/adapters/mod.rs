pub mod fallback;
pub mod gist;
pub mod holiday;
pub mod local_file;
pub mod mirror;
pub mod postgres;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use fallback::FallbackStore;
pub use gist::GistBackend;
pub use holiday::FileHolidayCalendar;
pub use local_file::LocalFileBackend;
pub use postgres::PostgresBackend;
pub use store::StoreAdapter;
