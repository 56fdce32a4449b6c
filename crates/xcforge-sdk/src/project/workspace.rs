//! `.xcworkspace` bundles.
//!
//! Only the project locations listed in `contents.xcworkspacedata` are read.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use super::Project;
use super::scheme::{self, Scheme};
use crate::builders::common::require_path;
use crate::types::{Result, XcError};

static LOCATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"location\s*=\s*"(group|container|absolute|self):([^"]*)""#).unwrap()
});

pub const CONTENTS_FILE: &str = "contents.xcworkspacedata";

/// A workspace and the projects it references.
#[derive(Debug, Clone)]
pub struct Workspace {
    path: PathBuf,
    projects: Vec<PathBuf>,
    schemes: Vec<Scheme>,
}

impl Workspace {
    /// Reads a workspace bundle.
    ///
    /// `group:` and `container:` locations are resolved against the directory
    /// holding the workspace; `self:` entries (the implicit workspace of a
    /// project) are skipped.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let contents = path.join(CONTENTS_FILE);
        require_path(&contents, "Workspace contents")?;
        let text = fs::read_to_string(&contents)?;

        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let projects = LOCATION_RE
            .captures_iter(&text)
            .filter_map(|capture| {
                let location = &capture[2];
                match &capture[1] {
                    "self" => None,
                    "absolute" => Some(PathBuf::from(location)),
                    _ => Some(base.join(location)),
                }
            })
            .filter(|p| p.extension().is_some_and(|ext| ext == "xcodeproj"))
            .collect();

        let schemes = scheme::discover(&path)?;
        Ok(Self {
            path,
            projects,
            schemes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Referenced project bundles, in file order.
    pub fn projects(&self) -> &[PathBuf] {
        &self.projects
    }

    pub fn schemes(&self) -> &[Scheme] {
        &self.schemes
    }

    /// Opens a referenced project by bundle name, with or without the
    /// `.xcodeproj` extension.
    pub fn open_project(&self, name: &str) -> Result<Project> {
        let wanted = name.trim_end_matches(".xcodeproj");
        let found = self
            .projects
            .iter()
            .find(|p| p.file_stem().is_some_and(|stem| stem == wanted));
        match found {
            Some(path) => Project::open(path),
            None => Err(XcError::not_found(
                "project",
                name,
                self.projects
                    .iter()
                    .filter_map(|p| p.file_stem())
                    .map(|stem| stem.to_string_lossy().into_owned()),
            )),
        }
    }
}
