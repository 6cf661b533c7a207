pub mod use_cases;

pub use use_cases::ingestion::{IngestionHandle, IngestionReceipt, IngestionService, UploadedFile};
pub use use_cases::persistence_sink::{PersistenceOutcome, PersistenceSink};
pub use use_cases::preview::Preview;
pub use use_cases::recovery_loader::{RecoveredState, RecoveryLoader};
pub use use_cases::workspace::{Workspace, WorkspaceListing};
