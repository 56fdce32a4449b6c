use crate::project::resource::{Capability, Resource};
use crate::project::value::{Record, Value, record};
use crate::types::{Result, XcError};

/// Kinds of build phase a target can own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhaseKind {
    Sources,
    Resources,
    Frameworks,
    Headers,
    CopyFiles,
    ShellScript,
}

impl BuildPhaseKind {
    pub fn isa(&self) -> &'static str {
        match self {
            BuildPhaseKind::Sources => "PBXSourcesBuildPhase",
            BuildPhaseKind::Resources => "PBXResourcesBuildPhase",
            BuildPhaseKind::Frameworks => "PBXFrameworksBuildPhase",
            BuildPhaseKind::Headers => "PBXHeadersBuildPhase",
            BuildPhaseKind::CopyFiles => "PBXCopyFilesBuildPhase",
            BuildPhaseKind::ShellScript => "PBXShellScriptBuildPhase",
        }
    }

    pub fn from_isa(isa: &str) -> Option<Self> {
        [
            BuildPhaseKind::Sources,
            BuildPhaseKind::Resources,
            BuildPhaseKind::Frameworks,
            BuildPhaseKind::Headers,
            BuildPhaseKind::CopyFiles,
            BuildPhaseKind::ShellScript,
        ]
        .into_iter()
        .find(|kind| kind.isa() == isa)
    }

    /// A new, empty phase record.
    pub(crate) fn default_record(&self) -> Record {
        let mut phase = record([
            ("isa", Value::from(self.isa())),
            ("buildActionMask", Value::from("2147483647")),
            ("files", Value::Array(Vec::new())),
            ("runOnlyForDeploymentPostprocessing", Value::from("0")),
        ]);
        if let BuildPhaseKind::ShellScript = self {
            phase.insert("inputPaths".into(), Value::Array(Vec::new()));
            phase.insert("outputPaths".into(), Value::Array(Vec::new()));
            phase.insert("shellPath".into(), Value::from("/bin/sh"));
            phase.insert("shellScript".into(), Value::from(""));
        }
        phase
    }
}

impl Resource {
    /// Kind of this build phase.
    pub fn phase_kind(&self) -> Result<BuildPhaseKind> {
        self.require(Capability::BuildPhase)?;
        let isa = self.isa()?;
        BuildPhaseKind::from_isa(&isa).ok_or_else(|| XcError::Capability {
            expected: "build phase",
            found: isa,
            id: self.id().to_string(),
        })
    }

    /// Build files in this phase.
    pub fn build_files(&self) -> Result<Vec<Resource>> {
        self.require(Capability::BuildPhase)?;
        self.references("files")
    }

    /// Whether a build file in this phase points at `file_ref`.
    pub fn contains_file(&self, file_ref: &Resource) -> Result<bool> {
        for build_file in self.build_files()? {
            if !build_file.exists() {
                continue;
            }
            if build_file.file_ref()?.as_ref() == Some(file_ref) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Adds a file reference to this phase through a new build file.
    ///
    /// Returns the existing build file when the reference is already present.
    pub fn add_build_file(&mut self, file_ref: &Resource) -> Result<Resource> {
        self.require(Capability::BuildPhase)?;
        file_ref.require(Capability::FileReference)?;
        for build_file in self.build_files()? {
            if build_file.exists() && build_file.file_ref()?.as_ref() == Some(file_ref) {
                return Ok(build_file);
            }
        }
        let build_file = self.create(record([
            ("isa", Value::from("PBXBuildFile")),
            ("fileRef", Value::from(file_ref.id())),
        ]))?;
        self.push("files", build_file.id())?;
        Ok(build_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::Project;
    use crate::project::capabilities::ProductType;

    #[test]
    fn adding_a_file_is_idempotent() {
        let project = Project::new("Demo").unwrap();
        let target = project.create_target("App", ProductType::Application).unwrap();
        let file = project.main_group().unwrap().add_file("main.m").unwrap();

        let mut sources = target.sources_build_phase().unwrap();
        assert_eq!(sources.phase_kind().unwrap(), BuildPhaseKind::Sources);
        let first = sources.add_build_file(&file).unwrap();
        let second = sources.add_build_file(&file).unwrap();
        assert_eq!(first, second);
        assert_eq!(sources.build_files().unwrap().len(), 1);
        assert!(sources.contains_file(&file).unwrap());
        assert_eq!(first.file_ref().unwrap(), Some(file));

        // Other views of the phase see the new file immediately.
        assert_eq!(target.sources_build_phase().unwrap().build_files().unwrap().len(), 1);
    }
}
