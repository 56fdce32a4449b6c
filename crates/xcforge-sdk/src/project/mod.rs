//! The Xcode project object model.
//!
//! A [`Project`] owns a [`Registry`] holding every object of a
//! `project.pbxproj` file, keyed by [`Identifier`]. Callers navigate the
//! object graph through [`Resource`] views starting at [`Project::root`],
//! mutate it through the capability operations (groups, targets, build
//! phases, configurations), and write it back with [`Project::save`].
//!
//! ## Ownership
//!
//! Resources hold a weak handle to the registry. Dropping the project makes
//! every outstanding resource fail with [`XcError::ProjectClosed`].
//!
//! ## Round trip
//!
//! Saving and reloading a project yields the same registry. The writer emits
//! the same layout Xcode does, so saved files remain readable by the IDE.
//!
//! ## Example
//!
//! ```no_run
//! use xcforge_sdk::project::Project;
//! use xcforge_sdk::project::capabilities::ProductType;
//!
//! let project = Project::open("App.xcodeproj")?;
//! let mut target = project.target("App")?;
//! let mut release = target.config("Release")?;
//! release.set_product_name("My App")?;
//! project.save()?;
//! # Ok::<(), xcforge_sdk::XcError>(())
//! ```

pub mod capabilities;
pub mod codec;
pub mod identifier;
pub mod pbxproj;
pub mod registry;
pub mod resource;
pub mod scheme;
pub mod value;
pub mod workspace;

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use indexmap::IndexMap;

use crate::builders::common::{CommandExecutor, CommandLine, SystemExecutor};
use crate::types::{Result, XcError};
use capabilities::ProductType;
use identifier::Identifier;
use registry::Registry;
use resource::{Resource, SharedRegistry};
use scheme::Scheme;
use value::{Record, Value, record};

/// File name of the object graph inside an `.xcodeproj` bundle.
pub const PBXPROJ_FILE: &str = "project.pbxproj";

/// An Xcode project: top-level fields, the object registry and its schemes.
pub struct Project {
    name: String,
    path: Option<PathBuf>,
    /// Top-level fields of the file other than `objects`, in file order.
    /// `objects` is kept as an empty placeholder to remember its position.
    document: Record,
    registry: SharedRegistry,
    root: Identifier,
    schemes: Vec<Scheme>,
}

impl Project {
    /// Creates an empty in-memory project with a main group, a products
    /// group and Debug/Release project configurations.
    pub fn new(name: &str) -> Result<Self> {
        let mut registry = Registry::new();

        let products = registry.put(record([
            ("isa", Value::from("PBXGroup")),
            ("children", Value::Array(Vec::new())),
            ("name", Value::from("Products")),
            ("sourceTree", Value::from("<group>")),
        ]))?;
        let main = registry.put(record([
            ("isa", Value::from("PBXGroup")),
            ("children", Value::Array(vec![Value::from(&products)])),
            ("sourceTree", Value::from("<group>")),
        ]))?;

        let mut configs = Vec::new();
        for config_name in ["Debug", "Release"] {
            let id = registry.put(record([
                ("isa", Value::from("XCBuildConfiguration")),
                ("buildSettings", Value::Dict(IndexMap::new())),
                ("name", Value::from(config_name)),
            ]))?;
            configs.push(Value::from(&id));
        }
        let list = registry.put(record([
            ("isa", Value::from("XCConfigurationList")),
            ("buildConfigurations", Value::Array(configs)),
            ("defaultConfigurationIsVisible", Value::from("0")),
            ("defaultConfigurationName", Value::from("Release")),
        ]))?;

        let root = registry.put(record([
            ("isa", Value::from("PBXProject")),
            ("attributes", Value::Dict(IndexMap::new())),
            ("buildConfigurationList", Value::from(&list)),
            ("compatibilityVersion", Value::from("Xcode 14.0")),
            ("developmentRegion", Value::from("en")),
            ("hasScannedForEncodings", Value::from("0")),
            ("knownRegions", Value::Array(vec![Value::from("en"), Value::from("Base")])),
            ("mainGroup", Value::from(&main)),
            ("productRefGroup", Value::from(&products)),
            ("projectDirPath", Value::from("")),
            ("projectRoot", Value::from("")),
            ("targets", Value::Array(Vec::new())),
        ]))?;

        let document = record([
            ("archiveVersion", Value::from("1")),
            ("classes", Value::Dict(IndexMap::new())),
            ("objectVersion", Value::from("56")),
            ("objects", Value::Dict(IndexMap::new())),
            ("rootObject", Value::from(&root)),
        ]);

        Ok(Self {
            name: name.to_string(),
            path: None,
            document,
            registry: Rc::new(RefCell::new(registry)),
            root,
            schemes: Vec::new(),
        })
    }

    /// Loads a project from an `.xcodeproj` bundle or a `project.pbxproj`
    /// file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, &SystemExecutor::new())
    }

    /// Like [`Project::open`], converting XML and binary property lists
    /// through `plutil` run by `executor`.
    pub fn open_with(path: impl AsRef<Path>, executor: &dyn CommandExecutor) -> Result<Self> {
        let path = path.as_ref();
        let (bundle, file) = if path.is_dir() {
            (Some(path.to_path_buf()), path.join(PBXPROJ_FILE))
        } else {
            let bundle = path
                .parent()
                .filter(|p| p.extension().is_some_and(|ext| ext == "xcodeproj"))
                .map(Path::to_path_buf);
            (bundle, path.to_path_buf())
        };
        crate::builders::common::require_path(&file, "Project file")?;

        let bytes = fs::read(&file)?;
        let document = if is_converted_plist(&bytes) {
            tracing::debug!(path = %file.display(), "converting property list with plutil");
            let output = executor.capture(
                &CommandLine::new("plutil")
                    .args(["-convert", "json", "-o", "-"])
                    .path_arg(&file),
            )?;
            let json: serde_json::Value = serde_json::from_str(&output.join("\n"))?;
            match Value::from_json(json) {
                Value::Dict(map) => map,
                _ => {
                    return Err(XcError::Parse {
                        line: 1,
                        message: "plutil output is not a dictionary".to_string(),
                    });
                }
            }
        } else {
            pbxproj::parse(&decode_utf8(bytes)?)?
        };

        let mut project = Self::from_document(document)?;
        let name_source = bundle.as_deref().unwrap_or(&file);
        if let Some(stem) = name_source.file_stem() {
            project.name = stem.to_string_lossy().into_owned();
        }
        if let Some(bundle) = &bundle {
            project.schemes = scheme::discover(bundle)?;
        }
        project.path = Some(bundle.unwrap_or(file));
        tracing::debug!(
            name = %project.name,
            objects = project.registry.borrow().len(),
            schemes = project.schemes.len(),
            "loaded project"
        );
        Ok(project)
    }

    /// Parses `project.pbxproj` text.
    pub fn parse(text: &str) -> Result<Self> {
        Self::from_document(pbxproj::parse(text)?)
    }

    /// Builds a project from a parsed top-level dictionary.
    pub fn from_document(mut document: Record) -> Result<Self> {
        let objects = match document.get_mut("objects") {
            Some(Value::Dict(objects)) => std::mem::take(objects),
            _ => {
                return Err(XcError::Parse {
                    line: 0,
                    message: "project file has no objects dictionary".to_string(),
                });
            }
        };

        let mut registry = Registry::new();
        for (key, value) in objects {
            let id = Identifier::parse(&key).ok_or_else(|| XcError::Parse {
                line: 0,
                message: format!("object key '{key}' is not a 24 character identifier"),
            })?;
            match value {
                Value::Dict(fields) => registry.insert(id, fields),
                _ => {
                    return Err(XcError::Parse {
                        line: 0,
                        message: format!("object {key} is not a dictionary"),
                    });
                }
            }
        }

        let root = document
            .get("rootObject")
            .and_then(Value::as_str)
            .and_then(Identifier::parse)
            .ok_or_else(|| XcError::Parse {
                line: 0,
                message: "project file has no valid rootObject".to_string(),
            })?;
        if !registry.contains(root.as_str()) {
            return Err(XcError::UnresolvedReference(root.to_string()));
        }

        Ok(Self {
            name: String::new(),
            path: None,
            document,
            registry: Rc::new(RefCell::new(registry)),
            root,
            schemes: Vec::new(),
        })
    }

    /// The full top-level dictionary, with `objects` filled from the registry.
    pub fn to_document(&self) -> Record {
        let objects: IndexMap<String, Value> = self
            .registry
            .borrow()
            .iter()
            .map(|(id, fields)| (id.to_string(), Value::Dict(fields.clone())))
            .collect();
        let mut document = self.document.clone();
        document.insert("objects".to_string(), Value::Dict(objects));
        document
    }

    /// Renders the project in `project.pbxproj` text form.
    pub fn to_pbxproj(&self) -> String {
        pbxproj::serialize(&self.to_document())
    }

    /// Writes the project back to the path it was opened from.
    pub fn save(&self) -> Result<()> {
        match &self.path {
            Some(path) => self.save_to(path),
            None => Err(XcError::Build(
                "project was created in memory; use save_to with an .xcodeproj path".to_string(),
            )),
        }
    }

    /// Writes the project to an `.xcodeproj` bundle (created if needed) or to
    /// an explicit `.pbxproj` file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = if path.extension().is_some_and(|ext| ext == "xcodeproj") || path.is_dir() {
            fs::create_dir_all(path)?;
            path.join(PBXPROJ_FILE)
        } else {
            path.to_path_buf()
        };
        fs::write(&file, self.to_pbxproj())?;
        tracing::info!(path = %file.display(), "saved project");
        Ok(())
    }

    /// Project name, taken from the bundle name when loaded from disk.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// The `PBXProject` object named by `rootObject`.
    pub fn root(&self) -> Resource {
        Resource::new(self.root.clone(), &self.registry)
    }

    /// A view over any object by identifier, or `None` if it does not exist.
    pub fn object(&self, id: &str) -> Option<Resource> {
        let id = Identifier::parse(id)?;
        let resource = Resource::new(id, &self.registry);
        resource.exists().then_some(resource)
    }

    pub fn main_group(&self) -> Result<Resource> {
        self.root().main_group()
    }

    pub fn targets(&self) -> Result<Vec<Resource>> {
        self.root().targets()
    }

    /// Target by exact name; the error lists every target name.
    pub fn target(&self, name: &str) -> Result<Resource> {
        self.root().target_named(name)
    }

    pub fn create_target(&self, name: &str, product_type: ProductType) -> Result<Resource> {
        self.root().create_target(name, product_type)
    }

    /// Removes a target without deleting the objects it references.
    pub fn remove_target(&self, name: &str) -> Result<Resource> {
        self.root().remove_target(name)
    }

    /// Schemes discovered when the project was opened.
    pub fn schemes(&self) -> &[Scheme] {
        &self.schemes
    }

    /// Scheme by exact name; the error lists every scheme name.
    pub fn scheme(&self, name: &str) -> Result<&Scheme> {
        self.schemes
            .iter()
            .find(|scheme| scheme.name == name)
            .ok_or_else(|| {
                XcError::not_found("scheme", name, self.schemes.iter().map(|s| s.name.clone()))
            })
    }

    /// Re-reads the scheme directories of the bundle.
    pub fn reload_schemes(&mut self) -> Result<&[Scheme]> {
        self.schemes = match &self.path {
            Some(path) if path.is_dir() => scheme::discover(path)?,
            _ => Vec::new(),
        };
        Ok(&self.schemes)
    }
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("root", &self.root)
            .field("objects", &self.registry.borrow().len())
            .finish()
    }
}

/// Whether the file is an XML or binary property list rather than the
/// ASCII format.
fn is_converted_plist(bytes: &[u8]) -> bool {
    if bytes.starts_with(b"bplist") {
        return true;
    }
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(64)]);
    let head = head.trim_start();
    head.starts_with("<?xml") || head.starts_with("<plist")
}

/// Decodes pbxproj text, rejecting anything that is not UTF-8.
fn decode_utf8(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|err| {
        let valid = err.utf8_error().valid_up_to();
        let line = err.as_bytes()[..valid].iter().filter(|&&b| b == b'\n').count() + 1;
        XcError::Parse {
            line,
            message: format!("invalid UTF-8 at byte {valid}"),
        }
    })
}
