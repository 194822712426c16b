use serde::{Deserialize, Serialize};
use crate::shared_types::{
    default_layers, default_one, default_one_segment, default_origin, default_true, default_up,
    InheritScale, LAYER_COUNT,
};

#[derive(Clone, Deserialize, Serialize, Debug, PartialEq)]
pub struct RawBone {
    pub name: String,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    #[serde(default = "default_origin")]
    pub head: [f32; 3],

    #[serde(default = "default_up")]
    pub tail: [f32; 3],

    /// Radians.
    #[serde(default)]
    pub roll: f32,

    #[serde(rename = "useConnect")]
    #[serde(default)]
    pub use_connect: bool,

    #[serde(rename = "useDeform")]
    #[serde(default = "default_true")]
    pub use_deform: bool,

    #[serde(default = "default_layers")]
    pub layers: [bool; LAYER_COUNT],

    #[serde(rename = "inheritRotation")]
    #[serde(default = "default_true")]
    pub inherit_rotation: bool,

    #[serde(rename = "useLocalLocation")]
    #[serde(default = "default_true")]
    pub use_local_location: bool,

    #[serde(rename = "inheritScale")]
    #[serde(default)]
    pub inherit_scale: InheritScale,

    #[serde(rename = "bboneSegments")]
    #[serde(default = "default_one_segment")]
    pub bbone_segments: u32,

    #[serde(rename = "bboneEaseIn")]
    #[serde(default = "default_one")]
    pub bbone_ease_in: f32,

    #[serde(rename = "bboneEaseOut")]
    #[serde(default = "default_one")]
    pub bbone_ease_out: f32,
}
