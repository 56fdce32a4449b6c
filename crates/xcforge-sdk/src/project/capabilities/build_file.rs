use indexmap::IndexMap;

use crate::project::resource::{Capability, Resource};
use crate::project::value::Value;
use crate::types::Result;

impl Resource {
    /// The file reference a build file points at.
    pub fn file_ref(&self) -> Result<Option<Resource>> {
        self.require(Capability::BuildFile)?;
        self.reference("fileRef")
    }

    /// Per-file settings such as `COMPILER_FLAGS` or `ATTRIBUTES`.
    pub fn file_settings(&self) -> Result<IndexMap<String, Value>> {
        self.require(Capability::BuildFile)?;
        Ok(match self.raw("settings")? {
            Some(Value::Dict(settings)) => settings,
            _ => IndexMap::new(),
        })
    }
}
