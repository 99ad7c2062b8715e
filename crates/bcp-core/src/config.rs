// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub const DEFAULT_N_CHANGE_POINTS: usize = 2;
pub const DEFAULT_DRAWS: usize = 2000;
pub const DEFAULT_TUNE: usize = 1000;
pub const DEFAULT_CHAINS: usize = 4;
pub const DEFAULT_TARGET_ACCEPT: f64 = 0.9;

/// Typed sampler/model configuration.
///
/// The loader only coerces types; range validation (e.g. `target_accept` in
/// (0,1)) happens where the value is consumed and raises `InvalidInput` there.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModelConfig {
    pub n_change_points: usize,
    pub draws: usize,
    pub tune: usize,
    pub chains: usize,
    pub target_accept: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            n_change_points: DEFAULT_N_CHANGE_POINTS,
            draws: DEFAULT_DRAWS,
            tune: DEFAULT_TUNE,
            chains: DEFAULT_CHAINS,
            target_accept: DEFAULT_TARGET_ACCEPT,
        }
    }
}

/// Loader result: the effective config plus one warning per recovered field.
#[cfg(feature = "serde")]
#[derive(Clone, Debug, PartialEq)]
pub struct LoadedModelConfig {
    pub config: ModelConfig,
    pub warnings: Vec<String>,
}

#[cfg(feature = "serde")]
const RECOGNIZED_KEYS: [&str; 5] = ["n_change_points", "draws", "tune", "chains", "target_accept"];

/// Loads a model config from a JSON file with liberal parsing.
///
/// Missing file, unreadable body, missing keys, and type-malformed values all
/// fall back to the documented defaults without failing; every recovered field
/// and every unrecognized key produces a warning so a typo'd key is visible
/// without changing the default-substitution behavior.
#[cfg(feature = "serde")]
pub fn load_model_config(path: &std::path::Path) -> LoadedModelConfig {
    let defaults = ModelConfig::default();
    let mut warnings = Vec::new();

    if !path.exists() {
        return LoadedModelConfig {
            config: defaults,
            warnings,
        };
    }

    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            warnings.push(format!(
                "config file '{}' is unreadable ({err}); using defaults",
                path.display()
            ));
            return LoadedModelConfig {
                config: defaults,
                warnings,
            };
        }
    };

    let parsed: serde_json::Value = match serde_json::from_str(&raw) {
        Ok(parsed) => parsed,
        Err(err) => {
            warnings.push(format!(
                "config file '{}' is not valid JSON ({err}); using defaults",
                path.display()
            ));
            return LoadedModelConfig {
                config: defaults,
                warnings,
            };
        }
    };

    let Some(object) = parsed.as_object() else {
        warnings.push(format!(
            "config file '{}' must hold a JSON object; using defaults",
            path.display()
        ));
        return LoadedModelConfig {
            config: defaults,
            warnings,
        };
    };

    for key in object.keys() {
        if !RECOGNIZED_KEYS.contains(&key.as_str()) {
            warnings.push(format!("unrecognized config key '{key}' ignored"));
        }
    }

    let config = ModelConfig {
        n_change_points: coerce_usize(
            object,
            "n_change_points",
            defaults.n_change_points,
            &mut warnings,
        ),
        draws: coerce_usize(object, "draws", defaults.draws, &mut warnings),
        tune: coerce_usize(object, "tune", defaults.tune, &mut warnings),
        chains: coerce_usize(object, "chains", defaults.chains, &mut warnings),
        target_accept: coerce_f64(
            object,
            "target_accept",
            defaults.target_accept,
            &mut warnings,
        ),
    };

    LoadedModelConfig { config, warnings }
}

/// Integer coercion: JSON integers pass through, floats truncate, integer
/// strings parse. Anything else (including negatives) recovers to the default.
#[cfg(feature = "serde")]
fn coerce_usize(
    object: &serde_json::Map<String, serde_json::Value>,
    key: &str,
    default: usize,
    warnings: &mut Vec<String>,
) -> usize {
    let Some(value) = object.get(key) else {
        return default;
    };

    let coerced = match value {
        serde_json::Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                usize::try_from(v).ok()
            } else {
                n.as_f64()
                    .filter(|v| v.is_finite() && *v >= 0.0)
                    .map(|v| v.trunc() as usize)
            }
        }
        serde_json::Value::String(s) => s.trim().parse::<usize>().ok(),
        _ => None,
    };

    match coerced {
        Some(v) => v,
        None => {
            warnings.push(format!(
                "config field '{key}'={value} is not a non-negative integer; using default {default}"
            ));
            default
        }
    }
}

#[cfg(feature = "serde")]
fn coerce_f64(
    object: &serde_json::Map<String, serde_json::Value>,
    key: &str,
    default: f64,
    warnings: &mut Vec<String>,
) -> f64 {
    let Some(value) = object.get(key) else {
        return default;
    };

    let coerced = match value {
        serde_json::Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    };

    match coerced {
        Some(v) => v,
        None => {
            warnings.push(format!(
                "config field '{key}'={value} is not a finite number; using default {default}"
            ));
            default
        }
    }
}
