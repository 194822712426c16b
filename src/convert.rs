use crate::error::Result;
use crate::report::validate_source_skeleton;
use crate::runtime::{EditArmature, Scene};
use crate::template_data::{CreationRule, OrientationRule};
use crate::templates::TemplateStore;
use tracing::{info, warn};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversionReport {
    pub skeleton: String,
    pub template: String,
    pub reoriented: usize,
    pub created: Vec<String>,
}

/// Runs a template against the named skeleton: orientation rules first, then bone creation.
///
/// The first failing rule aborts the run and leaves earlier edits in place. Running the
/// same template twice rotates the bones twice.
pub fn convert(
    scene: &mut Scene,
    skeleton_name: &str,
    store: &TemplateStore,
    template_name: &str,
) -> Result<ConversionReport> {
    for warning in validate_source_skeleton(scene, skeleton_name) {
        warn!("{}", warning);
    }
    let armature = scene.armature_mut(skeleton_name)?;
    info!(skeleton = skeleton_name, template = template_name, "converting skeleton");

    let orientation_rules = store.load_orientation_rules(template_name)?;
    let reoriented = apply_orientation_rules(armature, &orientation_rules)?;

    let creation_rules = store.load_creation_rules(template_name)?;
    let created = apply_creation_rules(armature, &creation_rules)?;

    info!(
        skeleton = skeleton_name,
        reoriented,
        created = created.len(),
        "conversion finished"
    );
    Ok(ConversionReport {
        skeleton: skeleton_name.to_string(),
        template: template_name.to_string(),
        reoriented,
        created,
    })
}

pub fn apply_orientation_rules(armature: &mut EditArmature, rules: &[OrientationRule]) -> Result<usize> {
    for rule in rules.iter() {
        armature.edit_bones().apply_orientation(rule)?;
    }
    Ok(rules.len())
}

pub fn apply_creation_rules(armature: &mut EditArmature, rules: &[CreationRule]) -> Result<Vec<String>> {
    let mut created = Vec::with_capacity(rules.len());
    for rule in rules.iter() {
        armature.edit_bones().create_bone(rule)?;
        created.push(rule.name.clone());
    }
    Ok(created)
}
