use crate::project::resource::{Capability, Resource};
use crate::types::Result;

impl Resource {
    /// Localizations of a variant group, e.g. `["en", "de"]`.
    ///
    /// Each child of a variant group is a file reference named after its
    /// locale.
    pub fn variants(&self) -> Result<Vec<String>> {
        self.require(Capability::VariantGroup)?;
        let mut names = Vec::new();
        for child in self.children()? {
            if child.exists() {
                names.push(child.name()?);
            }
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use crate::project::Project;
    use crate::project::resource::Capability;
    use crate::project::value::{Value, record};

    #[test]
    fn lists_locales() {
        let project = Project::new("Demo").unwrap();
        let main = project.main_group().unwrap();
        let mut strings = main
            .create(record([
                ("isa", Value::from("PBXVariantGroup")),
                ("children", Value::Array(Vec::new())),
                ("name", Value::from("Localizable.strings")),
                ("sourceTree", Value::from("<group>")),
            ]))
            .unwrap();
        assert_eq!(strings.capability(), Some(Capability::VariantGroup));

        for locale in ["en", "de"] {
            let mut file = strings.add_file(&format!("{locale}.lproj/Localizable.strings")).unwrap();
            file.set("name", locale).unwrap();
        }
        assert_eq!(strings.variants().unwrap(), vec!["en", "de"]);
        assert!(strings.add_group("nope").is_err());
    }
}
