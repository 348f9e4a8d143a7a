//! Configuration access port trait.

/// Read-only view of a sectioned key/value configuration.
pub trait ConfigPort {
    /// Raw value of `key` in `section`, if present.
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    /// Keys present in `section`; empty when the section is absent.
    fn keys(&self, section: &str) -> Vec<String>;
}
