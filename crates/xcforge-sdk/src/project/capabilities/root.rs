use super::build_phase::BuildPhaseKind;
use super::target::ProductType;
use crate::project::resource::{Capability, Resource};
use crate::project::value::{Value, record};
use crate::types::{Result, XcError};

impl Resource {
    /// All targets of the project, in file order.
    pub fn targets(&self) -> Result<Vec<Resource>> {
        self.require(Capability::Project)?;
        self.references("targets")
    }

    /// Target with an exact name.
    ///
    /// # Errors
    ///
    /// [`XcError::NotFound`] listing every target name when none match.
    pub fn target_named(&self, name: &str) -> Result<Resource> {
        let targets = self.targets()?;
        let mut names = Vec::with_capacity(targets.len());
        for target in targets {
            let target_name = target.name()?;
            if target_name == name {
                return Ok(target);
            }
            names.push(target_name);
        }
        Err(XcError::not_found("target", name, names))
    }

    pub fn main_group(&self) -> Result<Resource> {
        self.require(Capability::Project)?;
        self.reference("mainGroup")?
            .ok_or_else(|| XcError::UnresolvedReference(format!("{}.mainGroup", self.id())))
    }

    /// The group holding built products, if the project has one.
    pub fn products_group(&self) -> Result<Option<Resource>> {
        self.require(Capability::Project)?;
        self.reference("productRefGroup")
    }

    /// The project-level configuration list.
    pub fn build_configuration_list(&self) -> Result<Resource> {
        self.require(Capability::Project)?;
        self.configuration_list()
    }

    /// Creates a native target with Debug and Release configurations, the
    /// standard sources, frameworks and resources phases, and a product
    /// reference in the products group.
    pub fn create_target(&mut self, name: &str, product_type: ProductType) -> Result<Resource> {
        self.require(Capability::Project)?;

        let mut configs = Vec::new();
        for config_name in ["Debug", "Release"] {
            let mut settings = indexmap::IndexMap::new();
            settings.insert("PRODUCT_NAME".to_string(), Value::from("$(TARGET_NAME)"));
            let config = self.create(record([
                ("isa", Value::from("XCBuildConfiguration")),
                ("buildSettings", Value::Dict(settings)),
                ("name", Value::from(config_name)),
            ]))?;
            configs.push(Value::from(config.id()));
        }
        let list = self.create(record([
            ("isa", Value::from("XCConfigurationList")),
            ("buildConfigurations", Value::Array(configs)),
            ("defaultConfigurationIsVisible", Value::from("0")),
            ("defaultConfigurationName", Value::from("Release")),
        ]))?;

        let mut phases = Vec::new();
        for kind in [BuildPhaseKind::Sources, BuildPhaseKind::Frameworks, BuildPhaseKind::Resources] {
            let phase = self.create(kind.default_record())?;
            phases.push(Value::from(phase.id()));
        }

        let product = self.create(record([
            ("isa", Value::from("PBXFileReference")),
            ("explicitFileType", Value::from(product_type.file_type())),
            ("includeInIndex", Value::from("0")),
            ("path", Value::from(format!("{name}.{}", product_type.extension()))),
            ("sourceTree", Value::from("BUILT_PRODUCTS_DIR")),
        ]))?;
        match self.products_group()? {
            Some(mut products) if products.exists() => {
                products.push("children", product.id())?;
            }
            _ => tracing::debug!(target_name = name, "project has no products group"),
        }

        let target = self.create(record([
            ("isa", Value::from("PBXNativeTarget")),
            ("buildConfigurationList", Value::from(list.id())),
            ("buildPhases", Value::Array(phases)),
            ("buildRules", Value::Array(Vec::new())),
            ("dependencies", Value::Array(Vec::new())),
            ("name", Value::from(name)),
            ("productName", Value::from(name)),
            ("productReference", Value::from(product.id())),
            ("productType", Value::from(product_type.identifier())),
        ]))?;
        self.push("targets", target.id())?;
        tracing::debug!(target_name = name, id = %target.id(), "created target");
        Ok(target)
    }

    /// Unlinks a target from the project and deletes its record.
    ///
    /// Records the target references (configurations, phases, build files,
    /// dependencies) stay in the registry.
    pub fn remove_target(&mut self, name: &str) -> Result<Resource> {
        let target = self.target_named(name)?;
        let id = target.id().as_str();
        self.update(|record| {
            if let Some(Value::Array(targets)) = record.get_mut("targets") {
                targets.retain(|v| v.as_str() != Some(id));
            }
        })?;
        self.registry()?.borrow_mut().delete(id);
        Ok(target)
    }
}
