//! Catalogue of every known mode and the ordered list of enabled ones.
//!
//! Modes are collected once at startup (built-ins first, then plugins, then
//! user scripts) into the catalogue. The configured mode list then picks an
//! ordered subset of the catalogue; that subset is what the user cycles
//! through at runtime. Names are unique: the first registration wins.

use std::path::PathBuf;
use std::rc::Rc;

use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use crate::diagnostics::Diagnostics;
use crate::error::{ConfigError, ModeError};
use crate::mode::script::ScriptProvider;
use crate::mode::{Mode, ModeContext, ModeFactory};
use crate::plugin::PluginLoader;
use crate::plugin::manifest::PluginId;

new_key_type! {
    /// Stable handle to a catalogue entry.
    pub struct ModeKey;
}

/// Where a mode came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeOrigin {
    Builtin,
    Script,
    Plugin { id: PluginId, root_dir: PathBuf },
}

pub struct ModeDescriptor {
    pub name: String,
    pub origin: ModeOrigin,
    mode: Box<dyn Mode>,
    factory: ModeFactory,
    initialized: bool,
}

impl ModeDescriptor {
    pub fn new(
        origin: ModeOrigin,
        mode: Box<dyn Mode>,
        factory: impl Fn() -> Box<dyn Mode> + 'static,
    ) -> Self {
        Self {
            name: mode.name().to_string(),
            origin,
            mode,
            factory: Rc::new(factory),
            initialized: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Release the mode's resources, then the descriptor itself.
    fn teardown(mut self) {
        if self.is_initialized() {
            if let ModeOrigin::Plugin { id, .. } = &self.origin {
                tracing::debug!("closing plugin module {}", id.0);
            }
            self.mode.destroy();
            self.initialized = false;
        }
        drop(self.mode);
    }
}

impl std::fmt::Debug for ModeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModeDescriptor")
            .field("name", &self.name)
            .field("origin", &self.origin)
            .field("initialized", &self.initialized)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Added(ModeKey),
    AlreadyPresent(ModeKey),
}

impl Registration {
    pub fn key(self) -> ModeKey {
        match self {
            Registration::Added(key) | Registration::AlreadyPresent(key) => key,
        }
    }
}

#[derive(Default)]
pub struct ModeRegistry {
    catalogue: SlotMap<ModeKey, ModeDescriptor>,
    order: Vec<ModeKey>,
    active: SmallVec<[ModeKey; 8]>,
}

impl ModeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mode to the catalogue unless one with the same name exists.
    pub fn register(&mut self, descriptor: ModeDescriptor) -> Registration {
        if let Some(existing) = self.lookup_available(&descriptor.name) {
            tracing::debug!("mode {} already registered, keeping the first", descriptor.name);
            return Registration::AlreadyPresent(existing);
        }

        let key = self.catalogue.insert(descriptor);
        self.order.push(key);
        Registration::Added(key)
    }

    pub fn lookup_available(&self, name: &str) -> Option<ModeKey> {
        self.order
            .iter()
            .copied()
            .find(|key| self.catalogue[*key].name == name)
    }

    pub fn descriptor(&self, key: ModeKey) -> Option<&ModeDescriptor> {
        self.catalogue.get(key)
    }

    pub fn mode(&self, key: ModeKey) -> Option<&dyn Mode> {
        self.catalogue.get(key).map(|descriptor| descriptor.mode.as_ref())
    }

    pub fn mode_mut(&mut self, key: ModeKey) -> Option<&mut (dyn Mode + 'static)> {
        self.catalogue
            .get_mut(key)
            .map(|descriptor| descriptor.mode.as_mut())
    }

    pub fn available_len(&self) -> usize {
        self.order.len()
    }

    /// Enable every name of a `,`/`#` separated list, in order.
    ///
    /// Unresolvable names are returned as errors; the remaining names are
    /// still processed.
    pub fn activate(&mut self, list: &str, scripts: &dyn ScriptProvider) -> Vec<ConfigError> {
        if list.trim().is_empty() {
            return Vec::new();
        }

        list.split([',', '#'])
            .enumerate()
            .filter_map(|(position, name)| match name.trim() {
                "" => Some(ConfigError::EmptyModeName { position }),
                name => self.enable(name, scripts).err(),
            })
            .collect()
    }

    /// Append one mode to the active list and return its index there.
    pub fn enable(&mut self, name: &str, scripts: &dyn ScriptProvider) -> Result<usize, ConfigError> {
        let key = match self.lookup_available(name) {
            Some(key) => key,
            None => {
                let descriptor = scripts
                    .is_valid_spec(name)
                    .then(|| scripts.parse_spec(name))
                    .flatten()
                    .ok_or_else(|| ConfigError::UnknownMode {
                        name: name.to_string(),
                    })?;
                // Registered so composite modes can find it later.
                self.register(descriptor).key()
            }
        };

        self.active.push(key);
        Ok(self.active.len() - 1)
    }

    pub fn active(&self) -> &[ModeKey] {
        &self.active
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn active_key(&self, index: usize) -> Option<ModeKey> {
        self.active.get(index).copied()
    }

    /// Index of the named mode in the active list.
    pub fn active_index_of(&self, name: &str) -> Option<usize> {
        self.active
            .iter()
            .position(|key| self.catalogue[*key].name == name)
    }

    pub fn is_active(&self, key: ModeKey) -> bool {
        self.active.contains(&key)
    }

    /// Every catalogue name with whether it is enabled.
    pub fn listing(&self) -> Vec<(&str, bool)> {
        self.order
            .iter()
            .map(|key| (self.catalogue[*key].name.as_str(), self.is_active(*key)))
            .collect()
    }

    pub fn context(&self) -> ModeContext {
        ModeContext::new(
            self.order
                .iter()
                .map(|key| {
                    let descriptor = &self.catalogue[*key];
                    (descriptor.name.clone(), Rc::clone(&descriptor.factory))
                })
                .collect(),
        )
    }

    /// Run a mode's one-time setup if it has not happened yet.
    pub fn ensure_initialized(&mut self, key: ModeKey) -> Result<(), ModeError> {
        let ctx = self.context();
        let descriptor = self
            .catalogue
            .get_mut(key)
            .ok_or_else(|| ModeError::init("<unknown>", "mode is not registered"))?;

        if descriptor.initialized {
            return Ok(());
        }

        descriptor.mode.init(&ctx)?;
        descriptor.initialized = true;
        tracing::debug!("initialized mode {}", descriptor.name);
        Ok(())
    }

    /// Tear down every catalogue entry. Safe to call on an empty registry.
    pub fn deactivate_all(&mut self) {
        self.active.clear();
        for key in self.order.drain(..) {
            if let Some(descriptor) = self.catalogue.remove(key) {
                descriptor.teardown();
            }
        }
        self.catalogue.clear();
    }

    /// Discover built-in, plugin and user-script modes, in that order.
    pub fn collect(
        &mut self,
        builtins: Vec<ModeDescriptor>,
        plugin_dirs: &[PathBuf],
        loader: &PluginLoader,
        user_scripts: Vec<ModeDescriptor>,
        diagnostics: &mut Diagnostics,
    ) {
        for descriptor in builtins {
            self.register(descriptor);
        }

        for dir in plugin_dirs {
            for loaded in loader.scan_dir(dir) {
                match loaded {
                    Ok(descriptor) => {
                        if let Registration::AlreadyPresent(_) = self.register(descriptor) {
                            tracing::info!("plugin in {} shadowed by an earlier mode", dir.display());
                        }
                    }
                    Err(err) => diagnostics.warning(err.to_string()),
                }
            }
        }

        for descriptor in user_scripts {
            self.register(descriptor);
        }

        tracing::info!("collected {} modes", self.available_len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{StubMode, StubScripts};

    fn registry_with(names: &[&str]) -> ModeRegistry {
        let mut registry = ModeRegistry::new();
        for name in names {
            registry.register(StubMode::new(name).into_descriptor());
        }
        registry
    }

    #[test]
    fn duplicate_registration_keeps_the_first() {
        let mut registry = ModeRegistry::new();
        let first = StubMode::new("dup").with_entries(["first"]);
        let second = StubMode::new("dup").with_entries(["second"]);

        let added = registry.register(first.into_descriptor());
        let again = registry.register(second.into_descriptor());

        assert!(matches!(added, Registration::Added(_)));
        assert_eq!(again, Registration::AlreadyPresent(added.key()));
        assert_eq!(registry.available_len(), 1);
        let mode = registry.mode(added.key()).expect("mode");
        assert_eq!(mode.display_value(0).as_deref(), Some("first"));
    }

    #[test]
    fn activating_a_name_twice_references_one_descriptor() {
        let mut registry = registry_with(&["dup"]);
        let errors = registry.activate("dup,dup", &StubScripts::default());

        assert!(errors.is_empty());
        assert_eq!(registry.active_len(), 2);
        assert_eq!(registry.active()[0], registry.active()[1]);
    }

    #[test]
    fn empty_list_activates_nothing() {
        let mut registry = registry_with(&["run"]);
        let errors = registry.activate("", &StubScripts::default());
        assert!(errors.is_empty());
        assert!(registry.active().is_empty());
    }

    #[test]
    fn missing_mode_is_one_error() {
        let mut registry = registry_with(&["run"]);
        let errors = registry.activate("missing", &StubScripts::default());

        assert!(registry.active().is_empty());
        assert_eq!(
            errors,
            vec![ConfigError::UnknownMode {
                name: "missing".to_string()
            }]
        );
    }

    #[test]
    fn unknown_names_do_not_stop_activation() {
        let mut registry = registry_with(&["run", "ssh", "drun"]);
        let errors = registry.activate("run,bogus", &StubScripts::default());

        assert_eq!(registry.active_len(), 1);
        assert_eq!(registry.active_index_of("run"), Some(0));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("bogus"));
    }

    #[test]
    fn hash_separator_and_empty_names() {
        let mut registry = registry_with(&["run", "ssh"]);
        let errors = registry.activate("run#ssh,,run", &StubScripts::default());

        assert_eq!(registry.active_len(), 3);
        assert_eq!(errors, vec![ConfigError::EmptyModeName { position: 2 }]);
    }

    #[test]
    fn script_specs_are_synthesized_and_registered() {
        let mut registry = registry_with(&["run"]);
        let scripts = StubScripts::accepting(&["clock"]);
        let errors = registry.activate("run,clock", &scripts);

        assert!(errors.is_empty());
        assert_eq!(registry.active_len(), 2);
        let key = registry.lookup_available("clock").expect("registered");
        assert_eq!(registry.descriptor(key).map(|d| &d.origin), Some(&ModeOrigin::Script));
        assert!(registry.context().create("clock").is_some());
    }

    #[test]
    fn listing_marks_active_modes() {
        let mut registry = registry_with(&["run", "ssh"]);
        registry.activate("ssh", &StubScripts::default());
        assert_eq!(registry.listing(), vec![("run", false), ("ssh", true)]);
    }

    #[test]
    fn init_runs_once() {
        let mut registry = ModeRegistry::new();
        let stub = StubMode::new("run");
        let stats = stub.stats();
        let key = registry.register(stub.into_descriptor()).key();

        registry.ensure_initialized(key).expect("init");
        registry.ensure_initialized(key).expect("init again");
        assert_eq!(stats.inits.get(), 1);
        assert!(registry.descriptor(key).is_some_and(ModeDescriptor::is_initialized));
    }

    #[test]
    fn failed_init_leaves_mode_uninitialized() {
        let mut registry = ModeRegistry::new();
        let key = registry
            .register(StubMode::new("broken").failing_init().into_descriptor())
            .key();

        assert!(registry.ensure_initialized(key).is_err());
        assert!(!registry.descriptor(key).expect("descriptor").is_initialized());
    }

    #[test]
    fn deactivate_all_destroys_initialized_modes_and_clears() {
        let mut registry = ModeRegistry::new();
        let used = StubMode::new("used");
        let unused = StubMode::new("unused");
        let (used_stats, unused_stats) = (used.stats(), unused.stats());
        let key = registry.register(used.into_descriptor()).key();
        registry.register(unused.into_descriptor());
        registry.activate("used", &StubScripts::default());
        registry.ensure_initialized(key).expect("init");

        registry.deactivate_all();

        assert_eq!(used_stats.destroys.get(), 1);
        assert_eq!(unused_stats.destroys.get(), 0);
        assert_eq!(registry.available_len(), 0);
        assert!(registry.active().is_empty());

        registry.deactivate_all();
        assert_eq!(used_stats.destroys.get(), 1);
    }

    #[test]
    fn builtins_win_over_plugins_and_scripts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let plugin = dir.path().join("shadow");
        std::fs::create_dir_all(&plugin).expect("mkdir");
        std::fs::write(
            plugin.join("plugin.toml"),
            format!(
                "name = \"run\"\nversion = \"1.0.0\"\nabi_version = {}\nentry = \"run.wasm\"\n",
                crate::plugin::PLUGIN_ABI_VERSION
            ),
        )
        .expect("manifest");

        let mut registry = ModeRegistry::new();
        let mut diagnostics = Diagnostics::default();
        registry.collect(
            vec![StubMode::new("run").into_descriptor()],
            &[dir.path().to_path_buf()],
            &PluginLoader::default(),
            vec![StubMode::new("run").into_descriptor(), StubMode::new("mine").into_descriptor()],
            &mut diagnostics,
        );

        assert_eq!(registry.listing(), vec![("run", false), ("mine", false)]);
        let key = registry.lookup_available("run").expect("run");
        assert_eq!(registry.descriptor(key).map(|d| &d.origin), Some(&ModeOrigin::Builtin));
        assert!(diagnostics.take_warnings().is_empty());
    }
}
