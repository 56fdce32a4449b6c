use crate::project::resource::{Capability, Resource};
use crate::types::Result;

/// Xcode file type for a path, judged by its extension.
pub fn file_type_for_path(path: &str) -> &'static str {
    let extension = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "m" => "sourcecode.c.objc",
        "mm" => "sourcecode.cpp.objcpp",
        "c" => "sourcecode.c.c",
        "cpp" | "cc" => "sourcecode.cpp.cpp",
        "h" => "sourcecode.c.h",
        "swift" => "sourcecode.swift",
        "plist" => "text.plist.xml",
        "strings" => "text.plist.strings",
        "xib" => "file.xib",
        "storyboard" => "file.storyboard",
        "xcassets" => "folder.assetcatalog",
        "framework" => "wrapper.framework",
        "xcframework" => "wrapper.xcframework",
        "a" => "archive.ar",
        "dylib" => "compiled.mach-o.dylib",
        "app" => "wrapper.application",
        "xctest" => "wrapper.cfbundle",
        "png" => "image.png",
        "json" => "text.json",
        _ => "text",
    }
}

impl Resource {
    /// Path of a file reference, relative to its source tree.
    pub fn path(&self) -> Result<Option<String>> {
        self.require(Capability::FileReference)?;
        self.string("path")
    }

    /// Source tree the path is relative to, e.g. `<group>` or `SDKROOT`.
    pub fn source_tree(&self) -> Result<Option<String>> {
        self.require_any(&[
            Capability::FileReference,
            Capability::Group,
            Capability::VariantGroup,
        ])?;
        self.string("sourceTree")
    }

    /// Explicit or last known file type.
    pub fn file_type(&self) -> Result<Option<String>> {
        self.require(Capability::FileReference)?;
        Ok(self
            .string("explicitFileType")?
            .or(self.string("lastKnownFileType")?))
    }
}
