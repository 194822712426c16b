use serde::{Deserialize, Serialize};
use crate::shared_types::default_origin;

#[derive(Clone, Deserialize, Serialize, Debug)]
#[serde(tag = "type")]
pub enum RawObjectData {
    Armature {
        name: String,

        /// Object rotation as XYZ euler angles, radians.
        #[serde(default = "default_origin")]
        rotation: [f32; 3],

        #[serde(rename = "bone")]
        #[serde(default)]
        bones: Vec<super::bone::RawBone>,
    },
    Mesh {
        name: String,

        #[serde(default = "default_origin")]
        rotation: [f32; 3],
    },
    Empty {
        name: String,

        #[serde(default = "default_origin")]
        rotation: [f32; 3],
    },
}

impl RawObjectData {
    pub fn name(&self) -> &str {
        match self {
            RawObjectData::Armature { name, .. }
            | RawObjectData::Mesh { name, .. }
            | RawObjectData::Empty { name, .. } => name,
        }
    }
}
