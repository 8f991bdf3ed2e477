//! Configuration access port trait.

/// Keyed access to a sectioned strategy file.
///
/// Section and key lookups are case-insensitive. Values come back trimmed;
/// an empty value reads as absent.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    /// Human-readable origin of the configuration, used in error messages.
    fn source_name(&self) -> &str;
}
