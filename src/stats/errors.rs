use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("A snapshot is already open for match {0}")]
    SnapshotAlreadyOpen(String),
}
