// Service exports
pub mod cache;
pub mod ingest;
pub mod notifier;
pub mod postgres;
pub mod store;
pub mod sweep;

pub use cache::{AreaCodeCache, CacheStats};
pub use ingest::{IngestError, Ingestor, Report};
pub use notifier::{AlertNotification, LogNotifier, Notifier, NotifyError, WebhookNotifier};
pub use postgres::PostgresStore;
pub use store::{DeviceDirectory, MemoryStore, RecordStore, StoreError};
pub use sweep::{AlertSweeper, SweepReport};
