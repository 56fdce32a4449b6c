use crate::project::resource::{Capability, Resource};
use crate::types::Result;

impl Resource {
    /// The target this object belongs to or points at.
    ///
    /// - Target dependencies: the target depended upon.
    /// - Build configurations: the owning target, when the configuration was
    ///   reached through [`Resource::configs`] on a target.
    pub fn target(&self) -> Result<Option<Resource>> {
        match self.require_any(&[Capability::TargetDependency, Capability::Configuration])? {
            Capability::TargetDependency => self.reference("target"),
            _ => Ok(self.owner().map(|owner| self.sibling(owner.clone()))),
        }
    }

    /// The container item proxy of a dependency.
    pub fn target_proxy(&self) -> Result<Option<Resource>> {
        self.require(Capability::TargetDependency)?;
        self.reference("targetProxy")
    }
}
