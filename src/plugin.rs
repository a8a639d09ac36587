use crate::config::ConfigSnapshot;

/// Capabilities shared by every source and sink.
///
/// The section a plugin reads its settings from is its [`name`](Plugin::name).
pub trait Plugin: Send + Sync + 'static {
    /// Plugin name, also its configuration section
    fn name(&self) -> &str;

    /// Whether the plugin takes part in cycles
    fn enabled(&self) -> bool;

    /// Switch the plugin on or off. Only called during startup.
    fn set_enabled(&mut self, enabled: bool);

    /// Read settings from the plugin's section. Missing keys keep their defaults.
    fn configure(&mut self, config: &ConfigSnapshot);
}
