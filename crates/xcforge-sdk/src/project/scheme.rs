//! Scheme discovery.
//!
//! Schemes are only located and named; the scheme XML itself is not
//! modelled beyond pulling a few attributes out with a regex.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::types::Result;

static BLUEPRINT_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"BlueprintName\s*=\s*"([^"]*)""#).unwrap());

const SCHEME_EXTENSION: &str = "xcscheme";

/// One `.xcscheme` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scheme {
    pub name: String,
    pub path: PathBuf,
    /// Stored under `xcshareddata` rather than a user's `xcuserdata`.
    pub shared: bool,
}

impl Scheme {
    /// Names of the targets the scheme builds, in file order, deduplicated.
    pub fn blueprint_names(&self) -> Result<Vec<String>> {
        let text = fs::read_to_string(&self.path)?;
        let mut names: Vec<String> = Vec::new();
        for capture in BLUEPRINT_NAME_RE.captures_iter(&text) {
            let name = capture[1].to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        Ok(names)
    }
}

/// Finds the schemes of an `.xcodeproj` or `.xcworkspace` bundle.
///
/// Shared schemes come first, then per-user schemes, each group sorted by
/// name. Missing directories simply contribute nothing.
pub fn discover(bundle: &Path) -> Result<Vec<Scheme>> {
    let mut schemes = scan(&bundle.join("xcshareddata").join("xcschemes"), true)?;

    let user_data = bundle.join("xcuserdata");
    if user_data.is_dir() {
        let mut users: Vec<PathBuf> = fs::read_dir(&user_data)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_dir())
            .collect();
        users.sort();
        let mut user_schemes = Vec::new();
        for user in users {
            user_schemes.extend(scan(&user.join("xcschemes"), false)?);
        }
        user_schemes.sort_by(|a, b| a.name.cmp(&b.name));
        schemes.extend(user_schemes);
    }
    Ok(schemes)
}

fn scan(dir: &Path, shared: bool) -> Result<Vec<Scheme>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut schemes = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_none_or(|ext| ext != SCHEME_EXTENSION) {
            continue;
        }
        if let Some(stem) = path.file_stem() {
            schemes.push(Scheme {
                name: stem.to_string_lossy().into_owned(),
                path: path.clone(),
                shared,
            });
        }
    }
    schemes.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(schemes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn finds_shared_and_user_schemes() {
        let dir = TempDir::new().unwrap();
        let bundle = dir.path().join("App.xcodeproj");
        touch(&bundle.join("xcshareddata/xcschemes/Release.xcscheme"), "");
        touch(&bundle.join("xcshareddata/xcschemes/App.xcscheme"), "");
        touch(&bundle.join("xcshareddata/xcschemes/notes.txt"), "");
        touch(&bundle.join("xcuserdata/dev.xcuserdatad/xcschemes/Scratch.xcscheme"), "");

        let schemes = discover(&bundle).unwrap();
        let names: Vec<_> = schemes.iter().map(|s| (s.name.as_str(), s.shared)).collect();
        assert_eq!(names, vec![("App", true), ("Release", true), ("Scratch", false)]);
    }

    #[test]
    fn missing_directories_yield_nothing() {
        let dir = TempDir::new().unwrap();
        assert!(discover(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn extracts_blueprint_names() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("App.xcscheme");
        touch(
            &path,
            r#"<Scheme>
  <BuildableReference BlueprintName = "App" BuildableName = "App.app"/>
  <BuildableReference BlueprintName = "AppTests"/>
  <BuildableReference BlueprintName = "App"/>
</Scheme>"#,
        );
        let scheme = Scheme {
            name: "App".into(),
            path,
            shared: true,
        };
        assert_eq!(scheme.blueprint_names().unwrap(), vec!["App", "AppTests"]);
    }
}
