pub mod object;
pub mod bone;

use serde::{Deserialize, Serialize};

/// The scene document: every object the converter can see, armatures included.
#[derive(Clone, Deserialize, Serialize, Debug, Default)]
pub struct RawSceneData {
    #[serde(rename = "object")]
    #[serde(default)]
    pub objects: Vec<crate::armature_data::object::RawObjectData>,
}
