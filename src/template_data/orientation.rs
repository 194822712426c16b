use serde::{Deserialize, Serialize};
use crate::shared_types::{is_zero, Axis};

/// A single entry of `orientation.json`.
#[derive(Clone, Deserialize, Serialize, Debug, PartialEq)]
pub struct OrientationRule {
    pub name: String,

    pub axis: Axis,

    /// Degrees.
    pub angle: f32,

    /// Degrees added to the bone roll before rotating.
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roll_add: Option<f32>,

    /// How many levels of children receive the same rotation.
    #[serde(default)]
    #[serde(skip_serializing_if = "is_zero")]
    pub recursive: usize,
}
