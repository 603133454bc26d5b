//! Database connection and initialization.

pub use ductline_core::db::DatabaseError;

ductline_core::define_database!(ServerDatabase, "Server database migrations complete");

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_in_memory_works() {
        let db = ServerDatabase::open_in_memory().await;
        assert!(db.is_ok());
    }
}
