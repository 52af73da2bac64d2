//! Persistence of finished survey records.

pub mod sheets;

pub use sheets::SheetsGateway;

use async_trait::async_trait;

use crate::error::PersistError;

/// Appends one finished record as a row of fields.
///
/// The caller guarantees at-most-once invocation per completed session;
/// the gateway only has to get the row onto the sheet.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn append_record(&self, fields: &[String]) -> Result<(), PersistError>;
}
