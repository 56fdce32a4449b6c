use super::file_reference::file_type_for_path;
use crate::project::resource::{Capability, Resource};
use crate::project::value::{Value, record};
use crate::types::{Result, XcError};

const GROUPS: &[Capability] = &[Capability::Group, Capability::VariantGroup];

impl Resource {
    /// Children of a group, in file order.
    pub fn children(&self) -> Result<Vec<Resource>> {
        self.require_any(GROUPS)?;
        self.references("children")
    }

    /// Child groups (plain and variant).
    pub fn groups(&self) -> Result<Vec<Resource>> {
        Ok(self
            .children()?
            .into_iter()
            .filter(|child| matches!(child.capability(), Some(Capability::Group | Capability::VariantGroup)))
            .collect())
    }

    /// Child file references.
    pub fn files(&self) -> Result<Vec<Resource>> {
        Ok(self
            .children()?
            .into_iter()
            .filter(|child| child.capability() == Some(Capability::FileReference))
            .collect())
    }

    /// Child group with the given display name.
    pub fn group(&self, name: &str) -> Result<Resource> {
        let groups = self.groups()?;
        let mut names = Vec::with_capacity(groups.len());
        for group in groups {
            let group_name = group.name()?;
            if group_name == name {
                return Ok(group);
            }
            names.push(group_name);
        }
        Err(XcError::not_found("group", name, names))
    }

    /// Creates a subgroup and appends it to this group's children.
    pub fn add_group(&mut self, name: &str) -> Result<Resource> {
        self.require(Capability::Group)?;
        let child = self.create(record([
            ("isa", Value::from("PBXGroup")),
            ("children", Value::Array(Vec::new())),
            ("name", Value::from(name)),
            ("sourceTree", Value::from("<group>")),
        ]))?;
        self.push("children", child.id())?;
        Ok(child)
    }

    /// Creates a file reference and appends it to this group's children.
    ///
    /// The file type is inferred from the extension.
    pub fn add_file(&mut self, path: &str) -> Result<Resource> {
        self.require_any(GROUPS)?;
        let mut fields = record([
            ("isa", Value::from("PBXFileReference")),
            ("lastKnownFileType", Value::from(file_type_for_path(path))),
            ("path", Value::from(path)),
            ("sourceTree", Value::from("<group>")),
        ]);
        if let Some((_, file_name)) = path.rsplit_once('/') {
            fields.insert("name".to_string(), Value::from(file_name));
        }
        let child = self.create(fields)?;
        self.push("children", child.id())?;
        Ok(child)
    }

    /// Looks up a direct child by identifier.
    pub fn find(&self, child_id: &str) -> Result<Option<Resource>> {
        Ok(self
            .children()?
            .into_iter()
            .find(|child| child.id().as_str().eq_ignore_ascii_case(child_id)))
    }

    /// Looks up a direct child by its `path` field.
    pub fn find_by_path(&self, path: &str) -> Result<Option<Resource>> {
        for child in self.children()? {
            if child.exists() && child.string("path")?.as_deref() == Some(path) {
                return Ok(Some(child));
            }
        }
        Ok(None)
    }

    /// Unlinks a child from this group. The child's record is kept.
    pub fn remove_child(&mut self, child_id: &str) -> Result<bool> {
        self.require_any(GROUPS)?;
        self.update(|record| match record.get_mut("children") {
            Some(Value::Array(items)) => {
                let before = items.len();
                items.retain(|v| v.as_str() != Some(child_id));
                items.len() != before
            }
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::project::Project;
    use crate::project::resource::Capability;
    use crate::types::XcError;

    #[test]
    fn add_group_and_file_preserve_order() {
        let project = Project::new("Demo").unwrap();
        let mut main = project.main_group().unwrap();

        let sources = main.add_group("Sources").unwrap();
        let readme = main.add_file("README.md").unwrap();
        let docs = main.add_group("Docs").unwrap();

        let children = main.children().unwrap();
        let ids: Vec<_> = children.iter().map(|c| c.id().clone()).collect();
        assert_eq!(&ids[ids.len() - 3..], &[sources.id().clone(), readme.id().clone(), docs.id().clone()]);

        assert_eq!(readme.capability(), Some(Capability::FileReference));
        assert_eq!(main.group("Docs").unwrap(), docs);
        assert_eq!(main.find(sources.id().as_str()).unwrap(), Some(sources));
    }

    #[test]
    fn nested_paths_get_a_display_name() {
        let project = Project::new("Demo").unwrap();
        let mut main = project.main_group().unwrap();
        let file = main.add_file("Sources/App/main.swift").unwrap();
        assert_eq!(file.name().unwrap(), "main.swift");
        assert_eq!(file.string("lastKnownFileType").unwrap().as_deref(), Some("sourcecode.swift"));
        assert_eq!(main.find_by_path("Sources/App/main.swift").unwrap(), Some(file));
    }

    #[test]
    fn missing_group_lists_alternatives() {
        let project = Project::new("Demo").unwrap();
        let mut main = project.main_group().unwrap();
        main.add_group("Sources").unwrap();
        let err = main.group("Tests").unwrap_err();
        match err {
            XcError::NotFound { available, .. } => assert!(available.contains(&"Sources".to_string())),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn views_of_one_group_share_children() {
        let project = Project::new("Demo").unwrap();
        let mut first = project.main_group().unwrap();
        let mut second = project.main_group().unwrap();
        let before = first.children().unwrap().len();

        let a = first.add_file("A.swift").unwrap();
        let b = second.add_file("B.swift").unwrap();

        let children = project.main_group().unwrap().children().unwrap();
        assert_eq!(children.len(), before + 2);
        assert_eq!(&children[before..], &[a.clone(), b.clone()]);
        assert_eq!(first.children().unwrap(), second.children().unwrap());

        assert!(second.remove_child(a.id().as_str()).unwrap());
        assert!(first.find(a.id().as_str()).unwrap().is_none());
        assert_eq!(first.find(b.id().as_str()).unwrap(), Some(b));
    }

    #[test]
    fn remove_child_keeps_the_record() {
        let project = Project::new("Demo").unwrap();
        let mut main = project.main_group().unwrap();
        let file = main.add_file("notes.txt").unwrap();
        assert!(main.remove_child(file.id().as_str()).unwrap());
        assert!(main.find(file.id().as_str()).unwrap().is_none());
        assert!(project.registry().borrow().contains(file.id().as_str()));
    }

    #[test]
    fn group_operations_reject_other_kinds() {
        let project = Project::new("Demo").unwrap();
        let root = project.root();
        assert!(matches!(root.children(), Err(XcError::Capability { .. })));
    }
}
