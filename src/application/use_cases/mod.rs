pub mod header_recovery;
pub mod ingestion;
pub mod persistence_sink;
pub mod preview;
pub mod recovery_loader;
pub mod sheet_normalizer;
pub mod workspace;
