pub mod loader;
pub mod manifest;
pub mod runtime;

pub use loader::PluginLoader;

/// Plugins must be built against this exact version of the mode ABI.
pub const PLUGIN_ABI_VERSION: u32 = 0x0000_0001;
