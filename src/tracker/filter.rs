use std::cmp::Ordering;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use utoipa::ToSchema;

use super::entity::{Fix, Visibility};

/// Which entities reach the published snapshot.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    ValueEnum,
    ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DisplayFilter {
    /// Above the elevation mask, any lighting
    Radio,
    /// Above the elevation mask and sunlit against a dark sky
    #[default]
    Optical,
    /// Everything, including below-horizon and unsolved entities
    #[value(name = "show_all")]
    ShowAll,
}

impl DisplayFilter {
    pub fn admits(&self, fix: &Fix, min_elevation_deg: f64) -> bool {
        match self {
            DisplayFilter::ShowAll => true,
            DisplayFilter::Radio => fix.elevation().is_some_and(|el| el >= min_elevation_deg),
            DisplayFilter::Optical => {
                fix.elevation().is_some_and(|el| el >= min_elevation_deg)
                    && fix.visibility() == Some(Visibility::SunlitVisible)
            }
        }
    }
}

/// Highest elevation first; unsolved entities last.
pub fn by_elevation(a: &Fix, b: &Fix) -> Ordering {
    match (a.elevation(), b.elevation()) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
