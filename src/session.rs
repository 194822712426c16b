use crate::config::{Settings, DEFAULT_TEMPLATE};
use crate::convert::{convert, ConversionReport};
use crate::error::{Error, Result};
use crate::report::ConfirmAction;
use crate::runtime::Scene;
use crate::templates::{sanitize_template_name, TemplateStore};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// State shared by the user-facing operations: where templates live, which one is
/// selected and which skeleton gets converted.
#[derive(Clone, Debug)]
pub struct Session {
    store: TemplateStore,
    selected_template: String,
    source_skeleton_name: String,
}

impl Session {
    pub fn new(settings: &Settings) -> Self {
        Self {
            store: TemplateStore::new(settings.templates_root()).with_retry(settings.retry_policy()),
            selected_template: settings.selected_template.clone(),
            source_skeleton_name: String::new(),
        }
    }

    pub fn with_store(store: TemplateStore) -> Self {
        Self {
            store,
            selected_template: DEFAULT_TEMPLATE.to_string(),
            source_skeleton_name: String::new(),
        }
    }

    pub fn store(&self) -> &TemplateStore {
        &self.store
    }

    pub fn list_templates(&self) -> Result<Vec<String>> {
        self.store.list_templates()
    }

    pub fn selected_template(&self) -> &str {
        &self.selected_template
    }

    pub fn select_template(&mut self, template_name: &str) -> Result<()> {
        if !self.store.exists(template_name) {
            return Err(Error::TemplateNotFound(template_name.into()));
        }
        self.selected_template = template_name.to_string();
        Ok(())
    }

    pub fn source_skeleton_name(&self) -> &str {
        &self.source_skeleton_name
    }

    pub fn set_source_skeleton(&mut self, name: impl Into<String>) {
        self.source_skeleton_name = name.into();
    }

    /// Creates the template folder and selects it. Returns the sanitized name.
    pub fn create_template(&mut self, name: &str) -> Result<String> {
        self.store.create_template_folder(name)?;
        self.selected_template = sanitize_template_name(name);
        Ok(self.selected_template.clone())
    }

    /// Removes the selected template and falls back to the default one.
    /// The default template itself is never removed.
    pub fn remove_selected_template(&mut self) -> Result<bool> {
        if self.selected_template == DEFAULT_TEMPLATE {
            warn!("the default template cannot be removed");
            return Ok(false);
        }
        self.store.remove_template_folder(&self.selected_template)?;
        self.selected_template = DEFAULT_TEMPLATE.to_string();
        Ok(true)
    }

    pub fn import_template(&mut self, archive_path: &Path) -> Result<String> {
        let template_name = self.store.import_archive(archive_path)?;
        self.selected_template = template_name.clone();
        Ok(template_name)
    }

    pub fn export_template(&self, destination_path: &Path) -> Result<PathBuf> {
        self.store.export_archive(&self.selected_template, destination_path)
    }

    pub fn convert(&self, scene: &mut Scene) -> Result<ConversionReport> {
        convert(scene, &self.source_skeleton_name, &self.store, &self.selected_template)
    }

    /// Carries out a confirmed dialog action.
    pub fn confirm(&mut self, action: &ConfirmAction, scene: &mut Scene) -> Result<()> {
        match action {
            ConfirmAction::RemoveTemplate(template_name) => {
                if template_name == &self.selected_template {
                    self.remove_selected_template()?;
                } else {
                    self.store.remove_template_folder(template_name)?;
                }
            }
            ConfirmAction::ApplyRotation(object) => scene.apply_rotation(object)?,
        }
        info!(?action, "confirmed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn session() -> (TempDir, Session) {
        let temp = TempDir::new().unwrap();
        let session = Session::with_store(TemplateStore::new(temp.path()));
        session.store().create_template_folder(DEFAULT_TEMPLATE).unwrap();
        (temp, session)
    }

    #[test]
    fn test_new_template_becomes_selected() {
        let (_temp, mut session) = session();
        assert_eq!(session.create_template("Mixamo Rig").unwrap(), "mixamo_rig");
        assert_eq!(session.selected_template(), "mixamo_rig");
        let mut names = session.list_templates().unwrap();
        names.sort();
        assert_eq!(names, vec!["default".to_string(), "mixamo_rig".to_string()]);
    }

    #[test]
    fn test_select_unknown_template() {
        let (_temp, mut session) = session();
        assert!(matches!(session.select_template("ghost"), Err(Error::TemplateNotFound(_))));
        assert_eq!(session.selected_template(), DEFAULT_TEMPLATE);
    }

    #[test]
    fn test_remove_selected_falls_back_to_default() {
        let (_temp, mut session) = session();
        session.create_template("temp rig").unwrap();
        assert!(session.remove_selected_template().unwrap());
        assert_eq!(session.selected_template(), DEFAULT_TEMPLATE);
        assert!(!session.store().exists("temp_rig"));

        assert!(!session.remove_selected_template().unwrap());
        assert!(session.store().exists(DEFAULT_TEMPLATE));
    }

    #[test]
    fn test_parent_folder_cannot_be_selected_or_removed() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("templates");
        fs::write(temp.path().join("precious.txt"), "x").unwrap();
        let mut session = Session::with_store(TemplateStore::new(root.clone()));
        session.create_template("rig").unwrap();

        for name in ["..", "", "."].iter() {
            assert!(matches!(session.select_template(name), Err(Error::TemplateNotFound(_))), "{:?}", name);
        }
        assert_eq!(session.selected_template(), "rig");
        assert!(session.remove_selected_template().unwrap());
        assert!(root.is_dir());
        assert!(temp.path().join("precious.txt").is_file());
    }

    #[test]
    fn test_confirm_remove_through_dialog_action() {
        let (_temp, mut session) = session();
        session.create_template("old").unwrap();
        session.select_template(DEFAULT_TEMPLATE).unwrap();
        let mut scene = Scene::default();
        session.confirm(&ConfirmAction::RemoveTemplate("old".into()), &mut scene).unwrap();
        assert!(!session.store().exists("old"));
    }
}
