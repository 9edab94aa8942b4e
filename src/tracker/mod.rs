mod distributor;
mod entity;
mod error;
mod filter;
mod schedule;
mod scheduler;
mod snapshot;
mod tracking_loop;

pub use distributor::StateDistributor;
pub use entity::{TrailConfig, Visibility};
pub use error::TrackerError;
pub use filter::DisplayFilter;
pub use scheduler::SchedulePolicy;
pub use snapshot::{EntityRecord, StateSnapshot};
pub use tracking_loop::TrackingLoop;
