// Service exports
pub mod marketcheck;
pub mod notifier;
pub mod postgres;
pub mod runner;
pub mod sources;
pub mod store;

pub use marketcheck::MarketcheckSource;
pub use notifier::{AlertBatch, LogNotifier, Notifier, NotifyError, SmtpNotifier};
pub use postgres::PostgresStore;
pub use runner::{spawn_scheduler, AgentRunner, RunSummary, RunnerSettings};
pub use sources::{ListingSource, SearchQuery, SourceError};
pub use store::{MemoryStore, Store, StoreError};
