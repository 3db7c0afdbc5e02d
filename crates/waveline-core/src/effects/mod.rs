//! Effect system - descriptor catalog, instances, and windowed rendering
//!
//! Effect DSP lives behind the platform [`OfflineRenderer`] boundary; this
//! module owns what the engine knows about effects: a closed table of effect
//! descriptors (parameter name / kind / bounds / default), typed instances
//! registered against a sample range, and the per-second offline rendering
//! plan.
//!
//! [`OfflineRenderer`]: crate::platform::OfflineRenderer

pub mod registry;
pub mod render;

pub use registry::{EffectId, EffectInstance, EffectsError, EffectsRegistry};

/// Value kinds a parameter can take
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Bool,
    Int,
    Float,
}

/// Description of one effect parameter
#[derive(Debug, Clone)]
pub struct ParamSpec {
    /// Parameter name as the platform DSP knows it
    pub name: &'static str,
    /// Value kind
    pub kind: ParamKind,
    /// Default value
    pub default: f64,
    /// Minimum value
    pub min: f64,
    /// Maximum value
    pub max: f64,
    /// UI step size
    pub step: f64,
}

impl ParamSpec {
    /// Create a float parameter with default bounds [0, 1]
    pub fn float(name: &'static str, default: f64) -> Self {
        Self {
            name,
            kind: ParamKind::Float,
            default,
            min: 0.0,
            max: 1.0,
            step: 1.0,
        }
    }

    /// Create an integer parameter with default bounds [0, 1]
    pub fn int(name: &'static str, default: f64) -> Self {
        Self {
            name,
            kind: ParamKind::Int,
            default,
            min: 0.0,
            max: 1.0,
            step: 1.0,
        }
    }

    /// Create a boolean parameter (0 = off, 1 = on)
    pub fn bool(name: &'static str, default: bool) -> Self {
        Self {
            name,
            kind: ParamKind::Bool,
            default: if default { 1.0 } else { 0.0 },
            min: 0.0,
            max: 1.0,
            step: 1.0,
        }
    }

    /// Set the value range
    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Set the UI step size
    pub fn step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    /// Clamp a value into this parameter's bounds
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

/// A parameter's current value on an effect instance
#[derive(Debug, Clone, PartialEq)]
pub struct ParamValue {
    pub name: &'static str,
    pub value: f64,
}

/// Description of one effect type
#[derive(Debug, Clone)]
pub struct EffectDescriptor {
    /// Type name callers register effects by
    pub name: &'static str,
    /// Parameter table, in the order the platform DSP expects
    pub params: Vec<ParamSpec>,
}

impl EffectDescriptor {
    fn new(name: &'static str, params: Vec<ParamSpec>) -> Self {
        Self { name, params }
    }

    /// Instantiate this descriptor's default parameter record
    pub fn default_params(&self) -> Vec<ParamValue> {
        self.params
            .iter()
            .map(|p| ParamValue {
                name: p.name,
                value: p.default,
            })
            .collect()
    }

    /// Look up a parameter spec by name
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }
}

/// The closed registry of known effect types
#[derive(Debug, Clone)]
pub struct EffectCatalog {
    descriptors: Vec<EffectDescriptor>,
}

impl Default for EffectCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl EffectCatalog {
    /// The built-in effect types with their parameter tables
    pub fn builtin() -> Self {
        let descriptors = vec![
            EffectDescriptor::new(
                "Gain",
                vec![ParamSpec::float("gain", 0.7).range(0.0, 30.0).step(0.1)],
            ),
            EffectDescriptor::new(
                "Panner",
                vec![ParamSpec::float("pan", 0.0).range(-1.0, 1.0).step(0.1)],
            ),
            EffectDescriptor::new(
                "Tremolo",
                vec![
                    ParamSpec::float("intensity", 0.3).range(0.0, 1.0).step(0.01),
                    ParamSpec::float("rate", 4.0).range(0.001, 8.0).step(0.001),
                    ParamSpec::int("stereoPhase", 0.0).range(0.0, 180.0),
                    ParamSpec::bool("bypass", false),
                ],
            ),
            EffectDescriptor::new(
                "Chorus",
                vec![
                    ParamSpec::float("rate", 1.5).range(0.01, 8.0).step(0.01),
                    ParamSpec::float("delay", 0.0045).range(0.0, 1.0).step(0.0001),
                    ParamSpec::float("feedback", 0.45).range(0.0, 0.8).step(0.01),
                    ParamSpec::bool("bypass", false),
                ],
            ),
            EffectDescriptor::new(
                "Phaser",
                vec![
                    ParamSpec::float("rate", 1.2).range(0.01, 8.0).step(0.01),
                    ParamSpec::float("depth", 0.3).range(0.0, 1.0).step(0.01),
                    ParamSpec::float("feedback", 0.2).range(0.0, 0.8).step(0.01),
                    ParamSpec::float("stereoPhase", 30.0).range(0.0, 180.0),
                    ParamSpec::int("baseModulationFrequency", 700.0).range(500.0, 1500.0),
                    ParamSpec::bool("bypass", false),
                ],
            ),
            EffectDescriptor::new(
                "Overdrive",
                vec![
                    ParamSpec::float("outputGain", 0.5).range(0.0, 1.0).step(0.01),
                    ParamSpec::float("drive", 0.7).range(0.0, 1.0).step(0.01),
                    ParamSpec::float("curveAmount", 0.8).range(0.0, 1.0).step(0.01),
                    ParamSpec::int("algorithmIndex", 0.0).range(0.0, 5.0),
                    ParamSpec::bool("bypass", false),
                ],
            ),
            EffectDescriptor::new(
                "Delay",
                vec![
                    ParamSpec::int("delayTime", 150.0).range(1.0, 10000.0),
                    ParamSpec::float("wetLevel", 0.25).range(0.0, 1.0).step(0.01),
                    ParamSpec::float("dryLevel", 1.0).range(0.0, 1.0).step(0.01),
                    ParamSpec::int("cutoff", 2000.0).range(20.0, 22050.0),
                    ParamSpec::float("feedback", 0.45).range(0.0, 0.8).step(0.01),
                    ParamSpec::bool("bypass", false),
                ],
            ),
            EffectDescriptor::new(
                "Compressor",
                vec![
                    ParamSpec::int("threshold", -1.0).range(-100.0, 0.0),
                    ParamSpec::int("makeupGain", 1.0).range(0.0, 5.0),
                    ParamSpec::int("attack", 1.0).range(0.0, 1000.0),
                    ParamSpec::int("release", 0.0).range(0.0, 3000.0),
                    ParamSpec::int("ratio", 4.0).range(1.0, 20.0),
                    ParamSpec::int("knee", 5.0).range(0.0, 40.0),
                    ParamSpec::bool("automakeup", true),
                    ParamSpec::bool("bypass", false),
                ],
            ),
            EffectDescriptor::new(
                "Bitcrusher",
                vec![
                    ParamSpec::int("bits", 4.0).range(1.0, 16.0),
                    ParamSpec::float("normfreq", 0.1).range(0.0, 1.0).step(0.1),
                    ParamSpec::int("bufferSize", 4096.0).range(256.0, 16384.0).step(2.0),
                ],
            ),
            EffectDescriptor::new(
                "MoogFilter",
                vec![
                    ParamSpec::float("cutoff", 0.065).range(0.0, 1.0).step(0.001),
                    ParamSpec::float("resonance", 3.5).range(0.0, 4.0).step(0.1),
                    ParamSpec::int("bufferSize", 4096.0).range(256.0, 16384.0).step(2.0),
                ],
            ),
        ];

        Self { descriptors }
    }

    /// Look up a descriptor by type name
    pub fn get(&self, name: &str) -> Option<&EffectDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    /// All descriptors in catalog order
    pub fn descriptors(&self) -> &[EffectDescriptor] {
        &self.descriptors
    }

    /// Number of known effect types
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// True when the catalog is empty (never, for the built-in catalog)
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_complete() {
        let catalog = EffectCatalog::builtin();
        assert_eq!(catalog.len(), 10);

        for name in [
            "Gain",
            "Panner",
            "Tremolo",
            "Chorus",
            "Phaser",
            "Overdrive",
            "Delay",
            "Compressor",
            "Bitcrusher",
            "MoogFilter",
        ] {
            assert!(catalog.get(name).is_some(), "missing descriptor: {}", name);
        }
        assert!(catalog.get("Reverb").is_none());
    }

    #[test]
    fn test_default_params_follow_descriptor() {
        let catalog = EffectCatalog::builtin();
        let delay = catalog.get("Delay").unwrap();

        let params = delay.default_params();
        assert_eq!(params.len(), 6);
        assert_eq!(params[0].name, "delayTime");
        assert_eq!(params[0].value, 150.0);
        assert_eq!(params[5].name, "bypass");
        assert_eq!(params[5].value, 0.0);
    }

    #[test]
    fn test_param_clamp() {
        let spec = ParamSpec::float("gain", 0.7).range(0.0, 30.0);
        assert_eq!(spec.clamp(-5.0), 0.0);
        assert_eq!(spec.clamp(12.0), 12.0);
        assert_eq!(spec.clamp(99.0), 30.0);
    }

    #[test]
    fn test_compressor_bool_defaults() {
        let catalog = EffectCatalog::builtin();
        let comp = catalog.get("Compressor").unwrap();
        assert_eq!(comp.param("automakeup").unwrap().default, 1.0);
        assert_eq!(comp.param("bypass").unwrap().default, 0.0);
        assert_eq!(comp.param("threshold").unwrap().min, -100.0);
    }
}
