use serde::{Deserialize, Deserializer, Serialize};

/// One of the three bone-local axes a rotation can be taken around.
#[derive(Copy, Clone, Deserialize, Serialize, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    #[serde(rename = "x")]
    X,
    #[serde(rename = "y")]
    Y,
    #[serde(rename = "z")]
    Z,
}
impl Axis {
    pub fn column(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

#[derive(Copy, Clone, Deserialize, Serialize, Debug, PartialEq, Eq)]
pub enum InheritScale {
    #[serde(rename = "FULL")]
    Full,
    #[serde(rename = "FIX_SHEAR")]
    FixShear,
    #[serde(rename = "ALIGNED")]
    Aligned,
    #[serde(rename = "AVERAGE")]
    Average,
    #[serde(rename = "NONE")]
    None,
    #[serde(rename = "NONE_LEGACY")]
    NoneLegacy,
}
impl Default for InheritScale {
    fn default() -> Self {
        Self::Full
    }
}

pub const LAYER_COUNT: usize = 32;

pub(crate) fn default_true() -> bool { true }
pub(crate) fn default_one() -> f32 { 1.0 }
pub(crate) fn default_one_segment() -> u32 { 1 }
pub(crate) fn default_origin() -> [f32; 3] { [0.0, 0.0, 0.0] }
pub(crate) fn default_up() -> [f32; 3] { [0.0, 1.0, 0.0] }
pub(crate) fn default_layers() -> [bool; LAYER_COUNT] {
    let mut layers = [false; LAYER_COUNT];
    layers[0] = true;
    layers
}

pub(crate) fn is_false(value: &bool) -> bool { !*value }
pub(crate) fn is_zero(value: &usize) -> bool { *value == 0 }

// Presence flag: `"parent_root": 1`, `"parent_root": "yes"` and `true` all enable it,
// only an explicit `false` or `null` leaves it off.
pub(crate) fn deserialize_presence<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(!matches!(value, serde_json::Value::Null | serde_json::Value::Bool(false)))
}

/// "left_hand_ik" -> "Left Hand Ik"
pub fn set_to_title(text: &str) -> String {
    text.to_lowercase()
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
