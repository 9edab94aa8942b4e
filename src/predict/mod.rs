mod error;
mod pass_finder;
mod propagation;
mod provider;
mod sun;
mod tle_loader;
mod types;

#[cfg(test)]
pub mod mock;

pub use error::PredictError;
pub use propagation::Sgp4Provider;
pub use provider::TrajectoryProvider;
pub use tle_loader::TleLoader;
pub use types::*;
