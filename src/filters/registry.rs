use crate::filters::presets;
use crate::filters::traits::ColorPreset;

type PresetFactory = Box<dyn Fn() -> Box<dyn ColorPreset> + Send + Sync>;

/// Registry of the available color presets
///
/// Presets are registered by name and keep their registration order, which
/// is the order the filter strip shows them in. Lookups ignore ASCII case.
pub struct PresetRegistry {
    presets: Vec<(String, PresetFactory)>,
}

impl PresetRegistry {
    /// Create a registry holding the built-in catalogue
    pub fn new() -> Self {
        let mut registry = Self { presets: Vec::new() };
        registry.register_builtin_presets();
        registry
    }

    fn register_builtin_presets(&mut self) {
        self.register("Original", || Box::new(presets::original()));
        self.register("Noir", || Box::new(presets::noir()));
        self.register("Chrome", || Box::new(presets::chrome()));
        self.register("Fade", || Box::new(presets::fade()));
        self.register("Instant", || Box::new(presets::instant()));
        self.register("Mono", || Box::new(presets::mono()));
        self.register("Process", || Box::new(presets::process()));
        self.register("Tonal", || Box::new(presets::tonal()));
        self.register("Transfer", || Box::new(presets::transfer()));
    }

    /// Register a custom preset, replacing any preset with the same name
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn ColorPreset> + Send + Sync + 'static,
    {
        match self.presets.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
            Some(entry) => entry.1 = Box::new(factory),
            None => self.presets.push((name.to_string(), Box::new(factory))),
        }
    }

    /// Get a new instance of a preset by name
    pub fn get_preset(&self, name: &str) -> Option<Box<dyn ColorPreset>> {
        self.presets
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, factory)| factory())
    }

    /// All preset names in catalogue order
    pub fn available_presets(&self) -> Vec<String> {
        self.presets.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn has_preset(&self, name: &str) -> bool {
        self.presets.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}

impl Default for PresetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_presets_available() {
        let registry = PresetRegistry::new();

        for name in ["Original", "Noir", "Chrome", "Fade", "Instant", "Mono", "Process", "Tonal", "Transfer"] {
            assert!(registry.has_preset(name), "missing {}", name);
        }
        assert_eq!(registry.len(), 9);
        assert_eq!(registry.available_presets()[0], "Original");
    }

    #[test]
    fn test_get_preset_ignores_case() {
        let registry = PresetRegistry::new();

        let noir = registry.get_preset("noir");
        assert!(noir.is_some());
        assert_eq!(noir.unwrap().name(), "Noir");

        assert!(registry.get_preset("sepia").is_none());
    }

    #[test]
    fn test_custom_preset_registration() {
        let mut registry = PresetRegistry::new();

        registry.register("Sepia", || Box::new(presets::fade()));
        assert!(registry.has_preset("sepia"));
        assert_eq!(registry.len(), 10);

        registry.register("mono", || Box::new(presets::noir()));
        assert_eq!(registry.len(), 10);
        assert_eq!(registry.get_preset("Mono").unwrap().name(), "Noir");
    }
}
