//! Report observers and the registry of named formatters.

use std::path::PathBuf;

use indexmap::IndexMap;

use super::console::ConsoleFormatter;
use super::junit::JunitFormatter;
use super::model::{Suite, Test};
use super::Report;
use crate::types::{Result, XcError};

/// Receives report transitions as they happen.
///
/// Every callback has an empty default, so formatters only implement what
/// they render.
pub trait Formatter {
    /// Name the formatter is registered under.
    fn name(&self) -> &str;

    fn before_run(&mut self, _report: &Report) {}

    fn after_run(&mut self, _report: &Report) {}

    fn before_suite(&mut self, _suite: &Suite) {}

    fn after_suite(&mut self, _suite: &Suite) {}

    fn before_test(&mut self, _test: &Test) {}

    fn after_test(&mut self, _test: &Test) {}
}

/// Settings passed to formatter factories.
#[derive(Debug, Clone, Default)]
pub struct FormatterOptions {
    /// Directory for file-based output such as JUnit XML.
    pub output_dir: Option<PathBuf>,
    pub verbose: bool,
}

type Factory = Box<dyn Fn(&FormatterOptions) -> Result<Box<dyn Formatter>>>;

/// Formatters by name.
///
/// # Example
///
/// ```
/// use xcforge_sdk::report::{FormatterOptions, FormatterRegistry};
///
/// let registry = FormatterRegistry::with_defaults();
/// assert_eq!(registry.names(), vec!["console", "junit"]);
/// assert!(registry.create("html", &FormatterOptions::default()).is_err());
/// ```
pub struct FormatterRegistry {
    factories: IndexMap<String, Factory>,
}

impl FormatterRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            factories: IndexMap::new(),
        }
    }

    /// A registry knowing `console` and `junit`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("console", |options| {
            Ok(Box::new(ConsoleFormatter::stdout().verbose(options.verbose)))
        });
        registry.register("junit", |options| {
            let dir = options.output_dir.clone().unwrap_or_else(|| PathBuf::from("."));
            Ok(Box::new(JunitFormatter::new(dir.join(JunitFormatter::FILE_NAME))))
        });
        registry
    }

    /// Adds or replaces a factory.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&FormatterOptions) -> Result<Box<dyn Formatter>> + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Instantiates a formatter by name.
    ///
    /// # Errors
    ///
    /// [`XcError::NotFound`] listing the registered names.
    pub fn create(&self, name: &str, options: &FormatterOptions) -> Result<Box<dyn Formatter>> {
        match self.factories.get(name) {
            Some(factory) => factory(options),
            None => Err(XcError::not_found("formatter", name, self.names())),
        }
    }

    /// Instantiates several formatters, failing on the first unknown name.
    pub fn create_all<S: AsRef<str>>(
        &self,
        names: &[S],
        options: &FormatterOptions,
    ) -> Result<Vec<Box<dyn Formatter>>> {
        names.iter().map(|name| self.create(name.as_ref(), options)).collect()
    }
}

impl Default for FormatterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
