//! Live views over registry records.
//!
//! A [`Resource`] is an identifier plus a handle to the registry it came
//! from. It holds no copy of its record: every read looks the record up in
//! the registry and every write goes straight into it, so all views of one
//! object always agree.
//!
//! Fields are resolved lazily. A string that looks like an identifier is
//! returned as a nested [`Resource`]; if nothing is stored under that
//! identifier the nested resource is still created, and only fails once a
//! field is read from it. Partially broken projects can therefore still be
//! inspected up to the broken edge.
//!
//! Behavior specific to one kind of object (groups, targets, build phases,
//! ...) is selected by the record's `isa` through [`Capability`]. Those
//! operations live in [`super::capabilities`] and check the capability
//! before touching the record.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::identifier::Identifier;
use super::registry::Registry;
use super::value::{Record, Value};
use crate::types::{Result, XcError};

/// Shared, single-threaded handle to a registry.
pub type SharedRegistry = Rc<RefCell<Registry>>;

/// Closed set of object kinds that carry extra operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Project,
    Group,
    VariantGroup,
    Target,
    BuildPhase,
    Configuration,
    ConfigurationList,
    FileReference,
    BuildFile,
    TargetDependency,
    ContainerItemProxy,
}

/// `isa` value to capability. Unknown tags simply get no capability.
const CAPABILITY_TABLE: &[(&str, Capability)] = &[
    ("PBXProject", Capability::Project),
    ("PBXGroup", Capability::Group),
    ("PBXVariantGroup", Capability::VariantGroup),
    ("PBXNativeTarget", Capability::Target),
    ("PBXAggregateTarget", Capability::Target),
    ("PBXLegacyTarget", Capability::Target),
    ("PBXSourcesBuildPhase", Capability::BuildPhase),
    ("PBXResourcesBuildPhase", Capability::BuildPhase),
    ("PBXFrameworksBuildPhase", Capability::BuildPhase),
    ("PBXHeadersBuildPhase", Capability::BuildPhase),
    ("PBXCopyFilesBuildPhase", Capability::BuildPhase),
    ("PBXShellScriptBuildPhase", Capability::BuildPhase),
    ("XCBuildConfiguration", Capability::Configuration),
    ("XCConfigurationList", Capability::ConfigurationList),
    ("PBXFileReference", Capability::FileReference),
    ("PBXBuildFile", Capability::BuildFile),
    ("PBXTargetDependency", Capability::TargetDependency),
    ("PBXContainerItemProxy", Capability::ContainerItemProxy),
];

impl Capability {
    /// Looks up the capability for an `isa` tag.
    pub fn for_isa(isa: &str) -> Option<Capability> {
        CAPABILITY_TABLE
            .iter()
            .find(|(tag, _)| *tag == isa)
            .map(|(_, capability)| *capability)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Project => "project",
            Capability::Group => "group",
            Capability::VariantGroup => "variant group",
            Capability::Target => "target",
            Capability::BuildPhase => "build phase",
            Capability::Configuration => "build configuration",
            Capability::ConfigurationList => "configuration list",
            Capability::FileReference => "file reference",
            Capability::BuildFile => "build file",
            Capability::TargetDependency => "target dependency",
            Capability::ContainerItemProxy => "container item proxy",
        }
    }
}

/// A resolved field value.
#[derive(Debug, Clone)]
pub enum Field {
    /// Plain string data.
    Scalar(String),
    /// A value that has the identifier shape.
    Ref(Resource),
    /// An array, each element resolved with the same rule.
    List(Vec<Field>),
    /// A nested dictionary, returned raw (build settings, attributes).
    Dict(IndexMap<String, Value>),
}

impl Field {
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Field::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_resource(self) -> Option<Resource> {
        match self {
            Field::Ref(resource) => Some(resource),
            _ => None,
        }
    }
}

/// A view over one record plus the capability selected by its `isa`.
#[derive(Clone)]
pub struct Resource {
    id: Identifier,
    registry: Weak<RefCell<Registry>>,
    owner: Option<Identifier>,
}

impl Resource {
    /// Builds a view over the record stored under `id`.
    ///
    /// Never fails: a missing record produces a resource that errors on the
    /// first field access.
    pub fn new(id: Identifier, registry: &SharedRegistry) -> Self {
        Self::from_weak(id, Rc::downgrade(registry))
    }

    fn from_weak(id: Identifier, registry: Weak<RefCell<Registry>>) -> Self {
        Self {
            id,
            registry,
            owner: None,
        }
    }

    pub fn id(&self) -> &Identifier {
        &self.id
    }

    /// Whether a record is currently stored under this identifier.
    pub fn exists(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|shared| shared.borrow().contains(self.id.as_str()))
    }

    /// Capability of the current `isa`, if the record exists and is known.
    pub fn capability(&self) -> Option<Capability> {
        self.isa().ok().as_deref().and_then(Capability::for_isa)
    }

    /// Identifier of the object this one was reached through, when the
    /// navigation that produced it records one (configurations reached from a
    /// target carry the target).
    pub fn owner(&self) -> Option<&Identifier> {
        self.owner.as_ref()
    }

    pub(crate) fn with_owner(mut self, owner: Identifier) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Upgrades the registry handle.
    pub fn registry(&self) -> Result<SharedRegistry> {
        self.registry.upgrade().ok_or(XcError::ProjectClosed)
    }

    /// Runs `read` against the stored record.
    fn with_record<T>(&self, read: impl FnOnce(&Record) -> T) -> Result<T> {
        let registry = self.registry()?;
        let registry = registry.borrow();
        let record = registry
            .get(self.id.as_str())
            .ok_or_else(|| XcError::UnresolvedReference(self.id.to_string()))?;
        Ok(read(record))
    }

    /// Runs `write` against the stored record, in place.
    ///
    /// `write` must not touch the registry itself; it is borrowed mutably for
    /// the duration of the call.
    pub(crate) fn update<T>(&mut self, write: impl FnOnce(&mut Record) -> T) -> Result<T> {
        let registry = self.registry()?;
        let mut registry = registry.borrow_mut();
        let record = registry
            .get_mut(self.id.as_str())
            .ok_or_else(|| XcError::UnresolvedReference(self.id.to_string()))?;
        Ok(write(record))
    }

    /// A copy of the whole record.
    pub fn record(&self) -> Result<Record> {
        self.with_record(Record::clone)
    }

    /// The discriminator tag.
    pub fn isa(&self) -> Result<String> {
        self.with_record(|r| r.get("isa").and_then(Value::as_str).unwrap_or("").to_string())
    }

    /// Raw value of a field, bypassing reference resolution.
    pub fn raw(&self, key: &str) -> Result<Option<Value>> {
        self.with_record(|r| r.get(key).cloned())
    }

    /// String value of a field, bypassing reference resolution.
    pub fn string(&self, key: &str) -> Result<Option<String>> {
        self.with_record(|r| r.get(key).and_then(Value::as_str).map(str::to_string))
    }

    /// Resolved value of a field.
    pub fn get(&self, key: &str) -> Result<Option<Field>> {
        Ok(self.raw(key)?.map(|value| self.resolve(&value)))
    }

    fn resolve(&self, value: &Value) -> Field {
        match value {
            Value::String(s) => match Identifier::parse(s) {
                Some(id) => Field::Ref(self.sibling(id)),
                None => Field::Scalar(s.clone()),
            },
            Value::Array(items) => Field::List(items.iter().map(|v| self.resolve(v)).collect()),
            Value::Dict(map) => Field::Dict(map.clone()),
        }
    }

    /// Follows a single identifier-valued field.
    pub fn reference(&self, key: &str) -> Result<Option<Resource>> {
        Ok(self.get(key)?.and_then(Field::into_resource))
    }

    /// Follows every identifier in an array field, skipping plain data.
    pub fn references(&self, key: &str) -> Result<Vec<Resource>> {
        Ok(match self.get(key)? {
            Some(Field::List(items)) => items.into_iter().filter_map(Field::into_resource).collect(),
            Some(Field::Ref(resource)) => vec![resource],
            _ => Vec::new(),
        })
    }

    /// Sets a field in the registry. Nothing is validated.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<&mut Self> {
        let value = value.into();
        self.update(|r| r.insert(key.to_string(), value))?;
        Ok(self)
    }

    /// Removes a field from the registry record.
    pub fn remove(&mut self, key: &str) -> Result<Option<Value>> {
        self.update(|r| r.shift_remove(key))
    }

    /// Appends `value` to an array field, creating the array if needed.
    pub fn push(&mut self, key: &str, value: impl Into<Value>) -> Result<&mut Self> {
        let value = value.into();
        self.update(|record| {
            let slot = record
                .entry(key.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            if slot.as_array_mut().is_none() {
                let previous = std::mem::replace(slot, Value::Array(Vec::new()));
                tracing::warn!(key, ?previous, "replacing non-array field with an array");
            }
            if let Some(items) = slot.as_array_mut() {
                items.push(value);
            }
        })?;
        Ok(self)
    }

    /// Stores the current record again with [`Registry::replace`].
    ///
    /// Every write already lands in the registry, so this only fails once the
    /// record has been deleted or the project dropped.
    pub fn save(&mut self) -> Result<&mut Self> {
        let record = self.record()?;
        self.registry()?.borrow_mut().replace(&self.id, record);
        Ok(self)
    }

    /// Builds a view over another record of the same registry.
    pub fn sibling(&self, id: Identifier) -> Resource {
        Self::from_weak(id, self.registry.clone())
    }

    /// Stores a new record in the registry and returns a view over it.
    pub fn create(&self, record: Record) -> Result<Resource> {
        let registry = self.registry()?;
        let id = registry.borrow_mut().put(record)?;
        Ok(self.sibling(id))
    }

    /// Fails unless this resource carries `capability`.
    pub(crate) fn require(&self, capability: Capability) -> Result<()> {
        self.require_any(&[capability]).map(|_| ())
    }

    pub(crate) fn require_any(&self, accepted: &[Capability]) -> Result<Capability> {
        let isa = self.isa()?;
        match Capability::for_isa(&isa) {
            Some(found) if accepted.contains(&found) => Ok(found),
            _ => Err(XcError::Capability {
                expected: accepted.first().map(Capability::as_str).unwrap_or("known"),
                found: if isa.is_empty() { "untagged".to_string() } else { isa },
                id: self.id.to_string(),
            }),
        }
    }
}

impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Resource {}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("id", &self.id)
            .field("capability", &self.capability())
            .field("exists", &self.exists())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::identifier::IdentifierGenerator;
    use crate::project::value::record;

    fn shared() -> SharedRegistry {
        Rc::new(RefCell::new(Registry::with_generator(IdentifierGenerator::from_seed(5))))
    }

    #[test]
    fn resolves_identifier_fields_to_resources() {
        let registry = shared();
        let child = registry
            .borrow_mut()
            .put(record([("isa", Value::from("PBXFileReference")), ("path", Value::from("main.m"))]))
            .unwrap();
        let parent = registry
            .borrow_mut()
            .put(record([
                ("isa", Value::from("PBXGroup")),
                ("children", Value::Array(vec![Value::from(&child)])),
                ("mainFile", Value::from(&child)),
            ]))
            .unwrap();

        let group = Resource::new(parent, &registry);
        assert_eq!(group.capability(), Some(Capability::Group));

        let main = group.reference("mainFile").unwrap().unwrap();
        assert_eq!(main.id(), &child);
        assert_eq!(main.string("path").unwrap().as_deref(), Some("main.m"));

        let children = group.references("children").unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0], main);
    }

    #[test]
    fn dangling_references_fail_lazily() {
        let registry = shared();
        let parent = registry
            .borrow_mut()
            .put(record([("isa", Value::from("PBXGroup")), ("target", Value::from("AAAAAAAAAAAAAAAAAAAAAAAA"))]))
            .unwrap();
        let group = Resource::new(parent, &registry);

        let broken = group.reference("target").unwrap().unwrap();
        assert!(!broken.exists());
        assert_eq!(broken.id().as_str(), "AAAAAAAAAAAAAAAAAAAAAAAA");
        assert!(matches!(broken.raw("name"), Err(XcError::UnresolvedReference(_))));
        // The parent is still readable.
        assert_eq!(group.isa().unwrap(), "PBXGroup");
    }

    #[test]
    fn unknown_tags_get_no_capability() {
        let registry = shared();
        let id = registry
            .borrow_mut()
            .put(record([("isa", Value::from("PBXReferenceProxy"))]))
            .unwrap();
        let resource = Resource::new(id, &registry);
        assert_eq!(resource.capability(), None);
        assert!(matches!(
            resource.require(Capability::Group),
            Err(XcError::Capability { .. })
        ));
    }

    #[test]
    fn writes_are_visible_through_every_view() {
        let registry = shared();
        let id = registry.borrow_mut().put(record([("isa", Value::from("PBXGroup"))])).unwrap();
        let mut first = Resource::new(id.clone(), &registry);
        let mut second = Resource::new(id.clone(), &registry);

        first.set("name", "Sources").unwrap();
        assert_eq!(
            registry.borrow().get(id.as_str()).unwrap()["name"],
            Value::from("Sources")
        );
        assert_eq!(second.string("name").unwrap().as_deref(), Some("Sources"));

        first.push("children", "A").unwrap();
        second.push("children", "B").unwrap();
        assert_eq!(
            first.raw("children").unwrap(),
            Some(Value::Array(vec![Value::from("A"), Value::from("B")]))
        );
        assert_eq!(first, second);
    }

    #[test]
    fn views_of_a_deleted_record_stop_resolving() {
        let registry = shared();
        let id = registry.borrow_mut().put(record([("isa", Value::from("PBXGroup"))])).unwrap();
        let mut view = Resource::new(id.clone(), &registry);
        assert!(view.exists());
        view.set("name", "Sources").unwrap().save().unwrap();

        registry.borrow_mut().delete(id.as_str());
        assert!(!view.exists());
        assert_eq!(view.capability(), None);
        assert!(matches!(view.set("name", "x"), Err(XcError::UnresolvedReference(_))));
        assert!(matches!(view.save(), Err(XcError::UnresolvedReference(_))));
    }

    #[test]
    fn resources_fail_after_project_is_dropped() {
        let registry = shared();
        let id = registry.borrow_mut().put(record([("isa", Value::from("PBXGroup"))])).unwrap();
        let resource = Resource::new(id, &registry);
        drop(registry);
        assert!(matches!(resource.isa(), Err(XcError::ProjectClosed)));
    }
}
