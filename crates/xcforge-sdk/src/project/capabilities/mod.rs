//! Operations attached to resources by their `isa`.
//!
//! Each submodule adds an `impl Resource` block for one capability. Every
//! operation starts by checking [`Resource::capability`], so calling a group
//! operation on a target fails with [`crate::XcError::Capability`] instead of
//! quietly reading the wrong fields.
//!
//! A few operations are shared by several capabilities and dispatch on the
//! tag: [`Resource::name`], [`Resource::configs`] (targets, configuration
//! lists and the project object) and [`Resource::target`] (dependencies and
//! configurations reached from a target).

mod build_file;
mod build_phase;
mod configuration;
mod configuration_list;
mod container_item_proxy;
mod file_reference;
mod group;
mod root;
mod target;
mod target_dependency;
mod variant_group;

pub use build_phase::BuildPhaseKind;
pub use file_reference::file_type_for_path;
pub use target::ProductType;

use super::resource::Resource;
use crate::types::Result;

impl Resource {
    /// Display name: `name`, falling back to `path`.
    ///
    /// Works on every object; untagged objects without either field return
    /// an empty string.
    pub fn name(&self) -> Result<String> {
        Ok(self
            .string("name")?
            .or(self.string("path")?)
            .unwrap_or_default())
    }
}
