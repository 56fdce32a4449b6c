use crate::project::resource::{Capability, Resource};
use crate::project::value::{Value, record};
use crate::types::{Result, XcError};

const CONFIG_OWNERS: &[Capability] = &[
    Capability::ConfigurationList,
    Capability::Target,
    Capability::Project,
];

impl Resource {
    /// The configuration list of a target or of the project object.
    pub fn configuration_list(&self) -> Result<Resource> {
        let found = self.require_any(CONFIG_OWNERS)?;
        if found == Capability::ConfigurationList {
            return Ok(self.clone());
        }
        self.reference("buildConfigurationList")?
            .ok_or_else(|| XcError::UnresolvedReference(format!("{}.buildConfigurationList", self.id())))
    }

    /// Build configurations.
    ///
    /// Configurations reached from a target carry that target as their
    /// owner, see [`Resource::target`].
    pub fn configs(&self) -> Result<Vec<Resource>> {
        let found = self.require_any(CONFIG_OWNERS)?;
        let list = self.configuration_list()?;
        let configs = list.references("buildConfigurations")?;
        Ok(match found {
            Capability::Target => configs
                .into_iter()
                .map(|config| config.with_owner(self.id().clone()))
                .collect(),
            _ => configs,
        })
    }

    /// Build configuration with an exact name.
    ///
    /// # Errors
    ///
    /// [`XcError::NotFound`] listing every configuration name when none match.
    pub fn config(&self, name: &str) -> Result<Resource> {
        let configs = self.configs()?;
        let mut names = Vec::with_capacity(configs.len());
        for config in configs {
            let config_name = config.name()?;
            if config_name == name {
                return Ok(config);
            }
            names.push(config_name);
        }
        Err(XcError::not_found("configuration", name, names))
    }

    /// Creates an empty configuration and registers it in the list.
    pub fn create_config(&mut self, name: &str) -> Result<Resource> {
        self.create_config_with(name, |_| Ok(()))
    }

    /// Creates a configuration, lets `configure` edit it, then registers it
    /// in the list.
    ///
    /// When `configure` fails the new configuration is deleted again and the
    /// list is left untouched.
    pub fn create_config_with<F>(&mut self, name: &str, configure: F) -> Result<Resource>
    where
        F: FnOnce(&mut Resource) -> Result<()>,
    {
        let found = self.require_any(CONFIG_OWNERS)?;
        let mut list = self.configuration_list()?;
        let mut config = self.create(record([
            ("isa", Value::from("XCBuildConfiguration")),
            ("buildSettings", Value::Dict(Default::default())),
            ("name", Value::from(name)),
        ]))?;
        if found == Capability::Target {
            config = config.with_owner(self.id().clone());
        }
        if let Err(err) = configure(&mut config) {
            self.registry()?.borrow_mut().delete(config.id().as_str());
            return Err(err);
        }
        list.push("buildConfigurations", config.id())?;
        Ok(config)
    }

    /// `defaultConfigurationName` of the list.
    pub fn default_configuration_name(&self) -> Result<Option<String>> {
        let list = self.configuration_list()?;
        list.string("defaultConfigurationName")
    }
}

#[cfg(test)]
mod tests {
    use crate::project::Project;
    use crate::project::capabilities::ProductType;
    use crate::types::XcError;

    #[test]
    fn configs_carry_their_target() {
        let project = Project::new("Demo").unwrap();
        let target = project.create_target("App", ProductType::Application).unwrap();
        let configs = target.configs().unwrap();
        let names: Vec<_> = configs.iter().map(|c| c.name().unwrap()).collect();
        assert_eq!(names, vec!["Debug", "Release"]);
        for config in &configs {
            assert_eq!(config.owner(), Some(target.id()));
            assert_eq!(config.target().unwrap(), Some(target.clone()));
        }
        assert_eq!(target.default_configuration_name().unwrap().as_deref(), Some("Release"));
    }

    #[test]
    fn missing_config_lists_valid_names() {
        let project = Project::new("Demo").unwrap();
        let target = project.create_target("App", ProductType::Application).unwrap();
        let err = target.config("Staging").unwrap_err();
        assert!(matches!(err, XcError::NotFound { .. }));
        assert_eq!(
            err.to_string(),
            "configuration 'Staging' not found, available are: Debug, Release"
        );
    }

    #[test]
    fn create_config_with_persists_edits() {
        let project = Project::new("Demo").unwrap();
        let mut target = project.create_target("App", ProductType::Application).unwrap();
        let created = target
            .create_config_with("Staging", |config| {
                config.set_product_name("Staging App")?;
                Ok(())
            })
            .unwrap();

        let staging = target.config("Staging").unwrap();
        assert_eq!(staging, created);
        assert_eq!(staging.product_name().unwrap().as_deref(), Some("Staging App"));
    }

    #[test]
    fn failed_configure_leaves_no_orphan() {
        let project = Project::new("Demo").unwrap();
        let mut target = project.create_target("App", ProductType::Application).unwrap();
        let objects = project.registry().borrow().len();

        let err = target
            .create_config_with("Broken", |config| {
                config.set_product_name("Broken")?;
                Err(XcError::Config("rejected".into()))
            })
            .unwrap_err();
        assert!(matches!(err, XcError::Config(_)));

        assert_eq!(project.registry().borrow().len(), objects);
        let names: Vec<_> = target.configs().unwrap().iter().map(|c| c.name().unwrap()).collect();
        assert_eq!(names, vec!["Debug", "Release"]);
    }
}
