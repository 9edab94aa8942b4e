use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("tracker must be started inside a tokio runtime")]
    NoRuntime,
    #[error("no satellites to track")]
    NoSatellites,
}
