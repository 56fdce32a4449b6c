use super::build_phase::BuildPhaseKind;
use crate::project::resource::{Capability, Resource};
use crate::project::value::{Value, record};
use crate::types::{Result, XcError};

/// Well-known product types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductType {
    Application,
    Framework,
    StaticLibrary,
    UnitTests,
    UiTests,
    AppExtension,
}

impl ProductType {
    pub fn identifier(&self) -> &'static str {
        match self {
            ProductType::Application => "com.apple.product-type.application",
            ProductType::Framework => "com.apple.product-type.framework",
            ProductType::StaticLibrary => "com.apple.product-type.library.static",
            ProductType::UnitTests => "com.apple.product-type.bundle.unit-test",
            ProductType::UiTests => "com.apple.product-type.bundle.ui-testing",
            ProductType::AppExtension => "com.apple.product-type.app-extension",
        }
    }

    pub fn from_identifier(identifier: &str) -> Option<Self> {
        [
            ProductType::Application,
            ProductType::Framework,
            ProductType::StaticLibrary,
            ProductType::UnitTests,
            ProductType::UiTests,
            ProductType::AppExtension,
        ]
        .into_iter()
        .find(|t| t.identifier() == identifier)
    }

    /// Extension of the built product, e.g. `app`.
    pub fn extension(&self) -> &'static str {
        match self {
            ProductType::Application => "app",
            ProductType::Framework => "framework",
            ProductType::StaticLibrary => "a",
            ProductType::UnitTests | ProductType::UiTests => "xctest",
            ProductType::AppExtension => "appex",
        }
    }

    /// `explicitFileType` of the product reference.
    pub fn file_type(&self) -> &'static str {
        match self {
            ProductType::Application => "wrapper.application",
            ProductType::Framework => "wrapper.framework",
            ProductType::StaticLibrary => "archive.ar",
            ProductType::UnitTests | ProductType::UiTests => "wrapper.cfbundle",
            ProductType::AppExtension => "wrapper.app-extension",
        }
    }
}

impl Resource {
    /// `productType` of a target, if it is one of the known types.
    pub fn product_type(&self) -> Result<Option<ProductType>> {
        self.require(Capability::Target)?;
        Ok(self.string("productType")?.as_deref().and_then(ProductType::from_identifier))
    }

    /// Build phases in build order.
    pub fn build_phases(&self) -> Result<Vec<Resource>> {
        self.require(Capability::Target)?;
        self.references("buildPhases")
    }

    /// First build phase of the given kind.
    pub fn build_phase(&self, kind: BuildPhaseKind) -> Result<Resource> {
        let phases = self.build_phases()?;
        let mut present = Vec::with_capacity(phases.len());
        for phase in phases {
            let isa = phase.isa()?;
            if isa == kind.isa() {
                return Ok(phase);
            }
            present.push(isa);
        }
        Err(XcError::not_found("build phase", kind.isa(), present))
    }

    pub fn sources_build_phase(&self) -> Result<Resource> {
        self.build_phase(BuildPhaseKind::Sources)
    }

    pub fn resources_build_phase(&self) -> Result<Resource> {
        self.build_phase(BuildPhaseKind::Resources)
    }

    pub fn frameworks_build_phase(&self) -> Result<Resource> {
        self.build_phase(BuildPhaseKind::Frameworks)
    }

    /// Creates an empty build phase and appends it to the target.
    pub fn create_build_phase(&mut self, kind: BuildPhaseKind) -> Result<Resource> {
        self.require(Capability::Target)?;
        let phase = self.create(kind.default_record())?;
        self.push("buildPhases", phase.id())?;
        Ok(phase)
    }

    /// Target dependencies.
    pub fn dependencies(&self) -> Result<Vec<Resource>> {
        self.require(Capability::Target)?;
        self.references("dependencies")
    }

    /// Makes this target depend on `other`, creating the proxy and
    /// dependency records.
    pub fn add_dependency(&mut self, other: &Resource) -> Result<Resource> {
        self.require(Capability::Target)?;
        other.require(Capability::Target)?;
        let registry = self.registry()?;
        let portal = registry
            .borrow()
            .ids_with_isa("PBXProject")
            .into_iter()
            .next()
            .ok_or_else(|| XcError::UnresolvedReference("PBXProject".to_string()))?;

        let proxy = self.create(record([
            ("isa", Value::from("PBXContainerItemProxy")),
            ("containerPortal", Value::from(&portal)),
            ("proxyType", Value::from("1")),
            ("remoteGlobalIDString", Value::from(other.id())),
            ("remoteInfo", Value::from(other.name()?)),
        ]))?;
        let dependency = self.create(record([
            ("isa", Value::from("PBXTargetDependency")),
            ("target", Value::from(other.id())),
            ("targetProxy", Value::from(proxy.id())),
        ]))?;
        self.push("dependencies", dependency.id())?;
        Ok(dependency)
    }
}
