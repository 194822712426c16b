use serde::{Deserialize, Serialize};
use nalgebra::{Matrix4, Point3};
use crate::shared_types::{deserialize_presence, is_false};

/// A single entry of `creation.json`.
#[derive(Clone, Deserialize, Serialize, Debug, PartialEq)]
pub struct CreationRule {
    pub name: String,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_bone: Option<String>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_bone: Option<String>,

    #[serde(default)]
    #[serde(deserialize_with = "deserialize_presence")]
    #[serde(skip_serializing_if = "is_false")]
    pub parent_root: bool,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<[f32; 3]>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tail: Option<[f32; 3]>,

    /// Rows of the bone matrix, exactly as authored.
    #[serde(rename = "Matrix")]
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matrix: Option<[[f32; 4]; 4]>,
}

impl CreationRule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_bone: None,
            parent_bone: None,
            parent_root: false,
            head: None,
            tail: None,
            matrix: None,
        }
    }

    pub fn head_point(&self) -> Option<Point3<f32>> {
        self.head.map(Point3::from)
    }

    pub fn tail_point(&self) -> Option<Point3<f32>> {
        self.tail.map(Point3::from)
    }

    pub fn bone_matrix(&self) -> Option<Matrix4<f32>> {
        self.matrix.map(|rows| Matrix4::from_fn(|r, c| rows[r][c]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_root_is_a_presence_flag() {
        let rules: Vec<CreationRule> = serde_json::from_str(r#"[
            {"name": "a", "parent_root": 1},
            {"name": "b", "parent_root": true},
            {"name": "c", "parent_root": false},
            {"name": "d"}
        ]"#).unwrap();
        let flags: Vec<bool> = rules.iter().map(|it| it.parent_root).collect();
        assert_eq!(flags, vec![true, true, false, false]);
    }

    #[test]
    fn test_matrix_keeps_authored_rows() {
        let rule: CreationRule = serde_json::from_str(r#"{
            "name": "ik_foot_root",
            "Matrix": [[1, 0, 0, 5], [0, 1, 0, 6], [0, 0, 1, 7], [0, 0, 0, 1]]
        }"#).unwrap();
        let m = rule.bone_matrix().unwrap();
        assert_eq!(m[(0, 3)], 5.0);
        assert_eq!(m[(1, 3)], 6.0);
        assert_eq!(m[(2, 3)], 7.0);
        assert_eq!(m[(3, 0)], 0.0);
    }

    #[test]
    fn test_absent_keys_are_not_written_back() {
        let mut rule = CreationRule::new("ik_hand_gun");
        rule.source_bone = Some("hand_r".into());
        let text = serde_json::to_string(&rule).unwrap();
        assert_eq!(text, r#"{"name":"ik_hand_gun","source_bone":"hand_r"}"#);
    }
}
