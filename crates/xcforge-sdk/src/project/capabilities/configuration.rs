use indexmap::IndexMap;

use crate::project::codec::{
    BoolCodec, Codec, DeviceFamilyCodec, KeyValueListCodec, ListCodec, StringCodec,
};
use crate::project::resource::{Capability, Resource};
use crate::project::value::Value;
use crate::types::{Result, XcError};

/// Generates a typed getter and setter for one well-known build setting.
macro_rules! typed_setting {
    ($(#[$doc:meta])* $getter:ident, $setter:ident, $key:literal, $codec:ty) => {
        $(#[$doc])*
        pub fn $getter(&self) -> Result<Option<<$codec as Codec>::Value>> {
            self.setting::<$codec>($key)
        }

        #[doc = concat!("Sets `", $key, "`.")]
        pub fn $setter(
            &mut self,
            value: impl Into<<$codec as Codec>::Value>,
        ) -> Result<&mut Self> {
            self.set_setting::<$codec>($key, value.into())
        }
    };
}

impl Resource {
    /// The raw `buildSettings` dictionary.
    pub fn build_settings(&self) -> Result<IndexMap<String, Value>> {
        self.require(Capability::Configuration)?;
        Ok(match self.raw("buildSettings")? {
            Some(Value::Dict(settings)) => settings,
            _ => IndexMap::new(),
        })
    }

    /// Runs `edit` against the stored `buildSettings`, creating it if absent.
    fn edit_build_settings<T>(
        &mut self,
        edit: impl FnOnce(&mut IndexMap<String, Value>) -> T,
    ) -> Result<T> {
        self.require(Capability::Configuration)?;
        let id = self.id().to_string();
        self.update(|record| {
            let slot = record
                .entry("buildSettings".to_string())
                .or_insert_with(|| Value::Dict(IndexMap::new()));
            slot.as_dict_mut().map(edit).ok_or_else(|| XcError::Parse {
                line: 0,
                message: format!("buildSettings of {id} is not a dictionary"),
            })
        })?
    }

    /// Decodes one build setting.
    pub fn setting<C: Codec>(&self, key: &str) -> Result<Option<C::Value>> {
        self.require(Capability::Configuration)?;
        Ok(match self.raw("buildSettings")? {
            Some(Value::Dict(settings)) => settings.get(key).map(C::open),
            _ => None,
        })
    }

    /// Encodes and stores one build setting.
    pub fn set_setting<C: Codec>(&mut self, key: &str, value: C::Value) -> Result<&mut Self> {
        let encoded = C::save(value);
        self.edit_build_settings(|settings| settings.insert(key.to_string(), encoded))?;
        Ok(self)
    }

    /// Appends to one build setting using the codec's append rule.
    pub fn append_setting<C: Codec>(&mut self, key: &str, addition: C::Value) -> Result<&mut Self> {
        self.edit_build_settings(|settings| {
            let merged = C::append(settings.get(key), addition);
            settings.insert(key.to_string(), merged);
        })?;
        Ok(self)
    }

    /// Removes one build setting.
    pub fn remove_setting(&mut self, key: &str) -> Result<Option<Value>> {
        self.edit_build_settings(|settings| settings.shift_remove(key))
    }

    typed_setting!(
        /// `PRODUCT_NAME`.
        product_name, set_product_name, "PRODUCT_NAME", StringCodec
    );
    typed_setting!(
        /// `PRODUCT_BUNDLE_IDENTIFIER`.
        bundle_identifier, set_bundle_identifier, "PRODUCT_BUNDLE_IDENTIFIER", StringCodec
    );
    typed_setting!(
        /// `INFOPLIST_FILE`, relative to the project directory.
        info_plist_file, set_info_plist_file, "INFOPLIST_FILE", StringCodec
    );
    typed_setting!(
        /// `SDKROOT`, e.g. `iphoneos`.
        sdk_root, set_sdk_root, "SDKROOT", StringCodec
    );
    typed_setting!(
        /// `IPHONEOS_DEPLOYMENT_TARGET`.
        deployment_target, set_deployment_target, "IPHONEOS_DEPLOYMENT_TARGET", StringCodec
    );
    typed_setting!(
        /// `ENABLE_BITCODE`.
        enable_bitcode, set_enable_bitcode, "ENABLE_BITCODE", BoolCodec
    );
    typed_setting!(
        /// `TARGETED_DEVICE_FAMILY`.
        targeted_device_family, set_targeted_device_family, "TARGETED_DEVICE_FAMILY", DeviceFamilyCodec
    );
    typed_setting!(
        /// `OTHER_LDFLAGS`.
        other_linker_flags, set_other_linker_flags, "OTHER_LDFLAGS", ListCodec
    );
    typed_setting!(
        /// `GCC_PREPROCESSOR_DEFINITIONS`.
        preprocessor_definitions, set_preprocessor_definitions, "GCC_PREPROCESSOR_DEFINITIONS", KeyValueListCodec
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::Project;
    use crate::project::codec::DeviceFamily;
    use crate::project::capabilities::ProductType;

    #[test]
    fn typed_settings_round_trip_through_the_registry() {
        let project = Project::new("Demo").unwrap();
        let target = project.create_target("App", ProductType::Application).unwrap();
        let mut debug = target.config("Debug").unwrap();

        debug
            .set_enable_bitcode(false)
            .unwrap()
            .set_targeted_device_family(vec![DeviceFamily::Iphone, DeviceFamily::Ipad])
            .unwrap()
            .append_setting::<ListCodec>("OTHER_LDFLAGS", vec!["-ObjC".into()])
            .unwrap();

        let reloaded = target.config("Debug").unwrap();
        assert_eq!(reloaded.enable_bitcode().unwrap(), Some(false));
        assert_eq!(
            reloaded.build_settings().unwrap()["TARGETED_DEVICE_FAMILY"],
            Value::from("1,2")
        );
        assert_eq!(
            reloaded.targeted_device_family().unwrap(),
            Some(vec![DeviceFamily::Iphone, DeviceFamily::Ipad])
        );
        assert_eq!(reloaded.other_linker_flags().unwrap(), Some(vec!["-ObjC".to_string()]));
    }

    #[test]
    fn edits_reach_other_views_of_the_same_config() {
        let project = Project::new("Demo").unwrap();
        let target = project.create_target("App", ProductType::Application).unwrap();
        let mut release = target.config("Release").unwrap();
        let mut other = target.config("Release").unwrap();

        release.set_sdk_root("iphoneos").unwrap();
        other.set_product_name("App").unwrap();
        assert_eq!(other.sdk_root().unwrap().as_deref(), Some("iphoneos"));
        assert_eq!(release.product_name().unwrap().as_deref(), Some("App"));

        assert_eq!(release.remove_setting("SDKROOT").unwrap(), Some(Value::from("iphoneos")));
        assert_eq!(target.config("Release").unwrap().sdk_root().unwrap(), None);
    }

    #[test]
    fn missing_settings_are_none() {
        let project = Project::new("Demo").unwrap();
        let target = project.create_target("App", ProductType::Application).unwrap();
        let debug = target.config("Debug").unwrap();
        assert_eq!(debug.preprocessor_definitions().unwrap(), None);
        assert!(matches!(target.setting::<StringCodec>("X"), Err(XcError::Capability { .. })));
    }
}
