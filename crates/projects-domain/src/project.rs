//! Project module - the record the registry stores

use serde::{Deserialize, Serialize, Serializer};

/// Accuracy and precision figures reported for a project's model
///
/// No bounds are enforced; values are carried as given by the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectStats {
    /// Model accuracy
    #[serde(serialize_with = "serialize_stat")]
    pub accuracy: f64,

    /// Model precision
    #[serde(serialize_with = "serialize_stat")]
    pub precision: f64,
}

/// A machine-learning project record
///
/// `name` is the identity of the record and is compared case-insensitively
/// (see [`crate::codec::derive_key`]). Every other field is free-form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Project {
    /// Project name, required on create
    pub name: String,

    /// Model label (e.g. "resnet50")
    pub model: String,

    /// Path or URI of the training/artifact data
    pub data_location: String,

    /// Reference link
    pub url: String,

    /// Reported statistics
    #[serde(rename = "statistics")]
    pub stats: ProjectStats,
}

impl Project {
    /// Create a project with zeroed statistics
    pub fn new(
        name: impl Into<String>,
        model: impl Into<String>,
        data_location: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            data_location: data_location.into(),
            url: url.into(),
            stats: ProjectStats::default(),
        }
    }

    /// Storage key of this project
    pub fn key(&self) -> String {
        crate::codec::derive_key(&self.name)
    }

    /// Replace the statistics
    pub fn with_stats(mut self, stats: ProjectStats) -> Self {
        self.stats = stats;
        self
    }
}

/// Whole numbers go out as integers (`0`, not `0.0`)
fn serialize_stat<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0; // 2^53

    if value.is_finite() && value.fract() == 0.0 && value.abs() <= MAX_EXACT {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}
