/// A deterministic color transform selectable by name
///
/// Presets work on normalized RGB in `[0, 1]` and must be pure: the same
/// input always yields the same output, with no state between calls.
pub trait ColorPreset: Send + Sync {
    /// Catalogue name, as shown in the filter strip
    fn name(&self) -> &str;

    /// Returns a human-readable description of this preset
    fn description(&self) -> &str;

    /// Map one normalized RGB triple. The result may leave `[0, 1]`; callers clamp.
    fn transform(&self, rgb: [f32; 3]) -> [f32; 3];

    /// Whether this preset leaves every color unchanged
    fn is_identity(&self) -> bool {
        false
    }
}
