//! Database connection and initialization.

pub use dwc_core::db::DatabaseError;

dwc_core::define_database!(StateDatabase, "State database migrations complete");

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_in_memory_works() {
        let db = StateDatabase::open_in_memory().await;
        assert!(db.is_ok());
    }
}
