use crate::error::{Error, Result};
use crate::shared_types::set_to_title;
use crate::template_data::{CreationRule, OrientationRule, CREATION_FILE, ORIENTATION_FILE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Component, Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const TEMPLATES_DIR_NAME: &str = "skeleton_templates";
pub const ARCHIVE_EXTENSION: &str = "zip";

/// Lowercases, trims and collapses every run of non-alphanumeric characters to `_`.
pub fn sanitize_template_name(name: &str) -> String {
    let mut sanitized = String::with_capacity(name.len());
    let mut in_run = false;
    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            sanitized.push(ch.to_ascii_lowercase());
            in_run = false;
        } else if !in_run {
            sanitized.push('_');
            in_run = true;
        }
    }
    sanitized
}

/// Bounded wait used while the filesystem catches up with a directory we made.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
}
impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_millis(10),
        }
    }
}

pub fn wait_for_dir(path: &Path, policy: RetryPolicy) -> Result<()> {
    let mut delay = policy.initial_delay;
    for attempt in 1..=policy.max_attempts.max(1) {
        if path.is_dir() {
            return Ok(());
        }
        debug!(path = %path.display(), attempt, "directory not visible yet");
        if attempt < policy.max_attempts {
            thread::sleep(delay);
            delay *= 2;
        }
    }
    Err(Error::fs_message(
        path,
        io::ErrorKind::TimedOut,
        format!("directory did not appear after {} attempts", policy.max_attempts.max(1)),
    ))
}

// Clears the process umask while alive, restoring the previous one on drop.
#[cfg(unix)]
struct UmaskGuard {
    previous: libc::mode_t,
}
#[cfg(unix)]
impl UmaskGuard {
    fn clear() -> Self {
        let previous = unsafe { libc::umask(0) };
        Self { previous }
    }
}
#[cfg(unix)]
impl Drop for UmaskGuard {
    fn drop(&mut self) {
        unsafe {
            libc::umask(self.previous);
        }
    }
}

#[cfg(not(unix))]
struct UmaskGuard;
#[cfg(not(unix))]
impl UmaskGuard {
    fn clear() -> Self {
        UmaskGuard
    }
}

#[cfg(unix)]
fn open_permissions(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o777))
}

#[cfg(not(unix))]
fn open_permissions(path: &Path) -> io::Result<()> {
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_readonly(false);
    fs::set_permissions(path, permissions)
}

/// Writes `data` as one-space indented JSON. Only `.json` destinations are accepted.
pub fn save_json<T: Serialize + ?Sized>(data: &T, path: &Path) -> Result<()> {
    let is_json = path
        .file_name()
        .and_then(|it| it.to_str())
        .map_or(false, |it| it.ends_with(".json"));
    if !is_json {
        return Err(Error::fs_message(
            path,
            io::ErrorKind::InvalidInput,
            "refusing to write JSON to a file not ending in .json".into(),
        ));
    }

    let file = {
        let _umask = UmaskGuard::clear();
        if path.exists() {
            open_permissions(path).map_err(|err| Error::io(path, err))?;
        }
        fs::File::create(path).map_err(|err| Error::io(path, err))?
    };

    let mut writer = BufWriter::new(file);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut writer, formatter);
    data.serialize(&mut serializer).map_err(|err| serialize_error(path, err))?;
    writer.flush().map_err(|err| Error::io(path, err))?;
    Ok(())
}

fn serialize_error(path: &Path, err: serde_json::Error) -> Error {
    if err.is_io() {
        Error::io(path, io::Error::from(err))
    } else {
        Error::parse(path, err)
    }
}

/// Template folders on disk, each holding `orientation.json` and `creation.json`.
#[derive(Clone, Debug)]
pub struct TemplateStore {
    root: PathBuf,
    retry: RetryPolicy,
}

impl TemplateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Folder of a template. Only names that are already sanitized resolve, so a
    /// template path is always a direct child of the root.
    pub fn template_path(&self, template_name: &str) -> Result<PathBuf> {
        if !is_template_name(template_name) {
            return Err(Error::TemplateNotFound(template_name.into()));
        }
        Ok(self.root.join(template_name))
    }

    pub fn exists(&self, template_name: &str) -> bool {
        self.template_path(template_name).map_or(false, |path| path.is_dir())
    }

    /// Subfolder names in filesystem order; sort them if order matters.
    pub fn list_templates(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(root = %self.root.display(), "templates root does not exist yet");
                return Ok(Vec::new());
            }
            Err(err) => return Err(Error::io(&self.root, err)),
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| Error::io(&self.root, err))?;
            let is_dir = entry.file_type().map_err(|err| Error::io(entry.path(), err))?.is_dir();
            if !is_dir {
                continue;
            }
            match entry.file_name().to_str() {
                Some(name) if is_template_name(name) => names.push(name.to_string()),
                _ => debug!(folder = %entry.path().display(), "skipping folder that is not a template name"),
            }
        }
        Ok(names)
    }

    /// `(name, title)` pairs for a template picker.
    pub fn template_entries(&self) -> Result<Vec<(String, String)>> {
        Ok(self
            .list_templates()?
            .into_iter()
            .map(|name| {
                let title = set_to_title(&name);
                (name, title)
            })
            .collect())
    }

    pub fn load_orientation_rules(&self, template_name: &str) -> Result<Vec<OrientationRule>> {
        self.load_rules(template_name, ORIENTATION_FILE)
    }

    pub fn load_creation_rules(&self, template_name: &str) -> Result<Vec<CreationRule>> {
        self.load_rules(template_name, CREATION_FILE)
    }

    pub fn save_orientation_rules(&self, template_name: &str, rules: &[OrientationRule]) -> Result<()> {
        save_json(rules, &self.template_path(template_name)?.join(ORIENTATION_FILE))
    }

    pub fn save_creation_rules(&self, template_name: &str, rules: &[CreationRule]) -> Result<()> {
        save_json(rules, &self.template_path(template_name)?.join(CREATION_FILE))
    }

    fn load_rules<T: DeserializeOwned>(&self, template_name: &str, file_name: &str) -> Result<Vec<T>> {
        let path = self.template_path(template_name)?.join(file_name);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no rule file, using no rules");
                return Ok(Vec::new());
            }
            Err(err) => return Err(Error::io(&path, err)),
        };
        serde_json::from_slice(&bytes).map_err(|err| Error::parse(&path, err))
    }

    /// Creates (or reuses) the folder for `name` after sanitizing it.
    pub fn create_template_folder(&self, name: &str) -> Result<PathBuf> {
        let template_name = sanitize_template_name(name);
        let path = self.template_path(&template_name)?;
        if !path.exists() {
            let _umask = UmaskGuard::clear();
            fs::create_dir_all(&path).map_err(|err| Error::io(&path, err))?;
            open_permissions(&path).map_err(|err| Error::io(&path, err))?;
            info!(template = %template_name, "template folder created");
        }
        wait_for_dir(&path, self.retry)?;
        Ok(path)
    }

    /// Deletes the template folder. A folder that is already gone is not an error.
    pub fn remove_template_folder(&self, template_name: &str) -> Result<()> {
        let path = self.template_path(template_name)?;
        let result = {
            let _umask = UmaskGuard::clear();
            open_tree_permissions(&path).and_then(|_| fs::remove_dir_all(&path))
        };
        match result {
            Ok(()) => {
                info!(template = template_name, "template folder removed");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(template = template_name, "template folder already removed");
                Ok(())
            }
            Err(err) => Err(Error::io(&path, err)),
        }
    }

    /// Unpacks a zip archive into a new template named after the archive file.
    pub fn import_archive(&self, archive_path: &Path) -> Result<String> {
        let stem = archive_path
            .file_stem()
            .and_then(|it| it.to_str())
            .ok_or_else(|| {
                Error::fs_message(archive_path, io::ErrorKind::InvalidInput, "archive has no file name".into())
            })?;
        let template_name = sanitize_template_name(stem);

        let file = fs::File::open(archive_path).map_err(|err| Error::io(archive_path, err))?;
        let mut archive = ZipArchive::new(file).map_err(|source| Error::Archive {
            path: archive_path.to_path_buf(),
            source,
        })?;
        let folder = self.create_template_folder(&template_name)?;

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index).map_err(|source| Error::Archive {
                path: archive_path.to_path_buf(),
                source,
            })?;
            let relative = match entry.enclosed_name() {
                Some(relative) => relative.to_path_buf(),
                None => {
                    warn!(entry = entry.name(), "skipping archive entry outside the template folder");
                    continue;
                }
            };
            let target = folder.join(&relative);
            if entry.is_dir() {
                fs::create_dir_all(&target).map_err(|err| Error::io(&target, err))?;
                continue;
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|err| Error::io(parent, err))?;
            }
            let mut out = fs::File::create(&target).map_err(|err| Error::io(&target, err))?;
            io::copy(&mut entry, &mut out).map_err(|err| Error::io(&target, err))?;
        }
        info!(template = %template_name, archive = %archive_path.display(), "template imported");
        Ok(template_name)
    }

    /// Packs a template folder into a zip archive; `.zip` is appended when missing.
    pub fn export_archive(&self, template_name: &str, destination_path: &Path) -> Result<PathBuf> {
        let folder = self.template_path(template_name)?;
        if !folder.is_dir() {
            return Err(Error::TemplateNotFound(template_name.into()));
        }
        let destination = ensure_extension(destination_path, ARCHIVE_EXTENSION);
        let file = fs::File::create(&destination).map_err(|err| Error::io(&destination, err))?;
        let mut zip = ZipWriter::new(file);
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        let archive_err = |source: zip::result::ZipError| Error::Archive { path: destination.clone(), source };

        for entry in WalkDir::new(&folder).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|err| {
                let path = err.path().map(Path::to_path_buf).unwrap_or_else(|| folder.clone());
                Error::io(path, io::Error::from(err))
            })?;
            let relative = match entry.path().strip_prefix(&folder) {
                Ok(relative) => relative,
                Err(_) => continue,
            };
            let entry_name = relative
                .components()
                .map(|it| it.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if entry.file_type().is_dir() {
                zip.add_directory(entry_name, options).map_err(archive_err)?;
            } else {
                zip.start_file(entry_name, options).map_err(archive_err)?;
                let mut source = fs::File::open(entry.path()).map_err(|err| Error::io(entry.path(), err))?;
                io::copy(&mut source, &mut zip).map_err(|err| Error::io(&destination, err))?;
            }
        }
        zip.finish().map_err(archive_err)?;
        info!(template = template_name, archive = %destination.display(), "template exported");
        Ok(destination)
    }
}

fn is_template_name(name: &str) -> bool {
    !name.is_empty()
        && sanitize_template_name(name) == name
        && Path::new(name).components().all(|it| matches!(it, Component::Normal(_)))
}

fn ensure_extension(path: &Path, extension: &str) -> PathBuf {
    let has_extension = path
        .extension()
        .and_then(|it| it.to_str())
        .map_or(false, |it| it.eq_ignore_ascii_case(extension));
    if has_extension {
        return path.to_path_buf();
    }
    let mut file_name = path.file_name().map(|it| it.to_os_string()).unwrap_or_default();
    file_name.push(".");
    file_name.push(extension);
    path.with_file_name(file_name)
}

fn open_tree_permissions(path: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(path)?;
    if metadata.is_dir() {
        open_permissions(path)?;
        for entry in fs::read_dir(path)? {
            open_tree_permissions(&entry?.path())?;
        }
    }
    Ok(())
}
