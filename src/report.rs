use crate::error::Error;
use crate::runtime::Scene;
use std::fmt;

/// Something off about the source object that does not stop a conversion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValidationWarning {
    NotAnArmature { object: String },
    UnappliedRotation { object: String },
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationWarning::NotAnArmature { object } => write!(f, "`{}` is not a skeleton object", object),
            ValidationWarning::UnappliedRotation { object } => {
                write!(f, "`{}` has a rotation that needs to be applied first", object)
            }
        }
    }
}

/// Checks the object picked as conversion source. A missing object yields no warning;
/// the conversion itself reports it.
pub fn validate_source_skeleton(scene: &Scene, name: &str) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    if let Some(object) = scene.object(name) {
        if !object.is_armature() {
            warnings.push(ValidationWarning::NotAnArmature { object: name.into() });
        } else if object.has_unapplied_rotation() {
            warnings.push(ValidationWarning::UnappliedRotation { object: name.into() });
        }
    }
    warnings
}

/// What happens when the user confirms a dialog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfirmAction {
    RemoveTemplate(String),
    ApplyRotation(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Confirm {
    pub message: String,
    pub action: ConfirmAction,
}

/// A modal message: title, body and an optional confirmable follow-up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dialog {
    pub title: String,
    pub body: String,
    pub confirm: Option<Confirm>,
}

impl Dialog {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            confirm: None,
        }
    }

    pub fn with_confirm(mut self, message: impl Into<String>, action: ConfirmAction) -> Self {
        self.confirm = Some(Confirm { message: message.into(), action });
        self
    }

    pub fn from_error(error: &Error) -> Self {
        Self::new(error.title(), error.to_string())
    }

    pub fn from_warning(warning: &ValidationWarning) -> Self {
        let dialog = Self::new("Source Skeleton", warning.to_string());
        match warning {
            ValidationWarning::UnappliedRotation { object } => dialog.with_confirm(
                "Apply the rotation to the skeleton now?",
                ConfirmAction::ApplyRotation(object.clone()),
            ),
            ValidationWarning::NotAnArmature { .. } => dialog,
        }
    }

    pub fn remove_template(template_name: &str) -> Self {
        Self::new("Delete this template?", format!("The `{}` template folder will be removed.", template_name))
            .with_confirm("Delete", ConfirmAction::RemoveTemplate(template_name.into()))
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.body.lines()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{EditArmature, ObjectData, SceneObject};
    use nalgebra::Vector3;

    fn scene() -> Scene {
        let mut scene = Scene::default();
        scene.add_armature(EditArmature::new("rig"));
        scene.add_object(SceneObject {
            name: "body".into(),
            rotation: Vector3::zeros(),
            data: ObjectData::Mesh,
        });
        scene.add_object(SceneObject {
            name: "tilted".into(),
            rotation: Vector3::new(0.0, 0.0, 0.5),
            data: ObjectData::Armature(EditArmature::new("tilted")),
        });
        scene
    }

    #[test]
    fn test_validation_warnings() {
        let scene = scene();
        assert!(validate_source_skeleton(&scene, "rig").is_empty());
        assert!(validate_source_skeleton(&scene, "nothing").is_empty());
        assert_eq!(
            validate_source_skeleton(&scene, "body"),
            vec![ValidationWarning::NotAnArmature { object: "body".into() }]
        );
        assert_eq!(
            validate_source_skeleton(&scene, "tilted"),
            vec![ValidationWarning::UnappliedRotation { object: "tilted".into() }]
        );
    }

    #[test]
    fn test_error_dialog() {
        let dialog = Dialog::from_error(&Error::SkeletonNotFound("rig".into()));
        assert_eq!(dialog.title, "Not Found");
        assert_eq!(dialog.body, "skeleton `rig` not found");
        assert!(dialog.confirm.is_none());
    }

    #[test]
    fn test_remove_prompt_names_template() {
        let dialog = Dialog::remove_template("mixamo");
        assert_eq!(dialog.lines().collect::<Vec<_>>(), vec!["The `mixamo` template folder will be removed."]);
        assert_eq!(dialog.confirm.unwrap().action, ConfirmAction::RemoveTemplate("mixamo".into()));
    }

    #[test]
    fn test_rotation_warning_offers_fix() {
        let dialog = Dialog::from_warning(&ValidationWarning::UnappliedRotation { object: "tilted".into() });
        assert_eq!(dialog.confirm.unwrap().action, ConfirmAction::ApplyRotation("tilted".into()));
    }
}
