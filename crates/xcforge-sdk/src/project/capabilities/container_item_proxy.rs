use crate::project::resource::{Capability, Resource};
use crate::types::Result;

impl Resource {
    /// `remoteInfo`, usually the remote target's name.
    pub fn remote_info(&self) -> Result<Option<String>> {
        self.require(Capability::ContainerItemProxy)?;
        self.string("remoteInfo")
    }

    /// `remoteGlobalIDString`, returned raw: it may name an object in
    /// another project file.
    pub fn remote_global_id(&self) -> Result<Option<String>> {
        self.require(Capability::ContainerItemProxy)?;
        self.string("remoteGlobalIDString")
    }

    /// The project (or file reference to another project) holding the remote.
    pub fn container_portal(&self) -> Result<Option<Resource>> {
        self.require(Capability::ContainerItemProxy)?;
        self.reference("containerPortal")
    }
}
