use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context, Result};
use cvdp_geofence::{load_segments, Bounds, Geofence, Point, QuadTreeConfig};
use tracing::{debug, info, warn};

use crate::features::{Feature, FeatureSet};
use crate::filter::{VelocityFilter, DEFAULT_MAX_SPEED, DEFAULT_MIN_SPEED};
use crate::redaction::{
    IdRedactor, IdReplacement, RedactionProperties, RedactionRuleset, SizeRedactor,
    DEFAULT_REDACTED_ID, DEFAULT_SIZE_REPLACEMENT,
};

/// Raw string-keyed privacy configuration.
pub type ConfigMap = HashMap<String, String>;

pub mod keys {
    pub const VELOCITY_FILTER: &str = "privacy.filter.velocity";
    pub const VELOCITY_MIN: &str = "privacy.filter.velocity.min";
    pub const VELOCITY_MAX: &str = "privacy.filter.velocity.max";

    pub const GEOFENCE_FILTER: &str = "privacy.filter.geofence";
    pub const GEOFENCE_EXTENSION: &str = "privacy.filter.geofence.extension";
    pub const GEOFENCE_SW_LAT: &str = "privacy.filter.geofence.sw.lat";
    pub const GEOFENCE_SW_LON: &str = "privacy.filter.geofence.sw.lon";
    pub const GEOFENCE_NE_LAT: &str = "privacy.filter.geofence.ne.lat";
    pub const GEOFENCE_NE_LON: &str = "privacy.filter.geofence.ne.lon";
    pub const GEOFENCE_MAPFILE: &str = "privacy.filter.geofence.mapfile";

    pub const ID_REDACTION: &str = "privacy.redaction.id";
    pub const ID_VALUE: &str = "privacy.redaction.id.value";
    pub const ID_INCLUSIONS: &str = "privacy.redaction.id.inclusions";
    pub const ID_INCLUDED: &str = "privacy.redaction.id.included";

    pub const SIZE_REDACTION: &str = "privacy.redaction.size";
    pub const SIZE_VALUE: &str = "privacy.redaction.size.value";

    pub const PARTII_REDACTION: &str = "privacy.redaction.partII";
    pub const PARTII_FIELDS: &str = "privacy.redaction.partII.fields";
    pub const REDACTION_PROPERTIES: &str = "privacy.redaction.properties";
}

pub const DEFAULT_GEOFENCE_EXTENSION_M: f64 = 10.0;

/// Reads `key=value` lines. Blank lines and `#` comments are skipped.
pub fn load_properties(path: &Path) -> Result<ConfigMap> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file '{}'", path.display()))?;
    Ok(parse_properties(&raw))
}

pub fn parse_properties(raw: &str) -> ConfigMap {
    let mut map = ConfigMap::new();
    for (number, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.split_once('=') {
            Some((key, value)) => {
                map.insert(key.trim().to_string(), value.trim().to_string());
            }
            None => debug!(line = number + 1, "ignoring config line without '='"),
        }
    }
    map
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeofenceSettings {
    pub bounds: Bounds,
    pub extension_m: f64,
    pub mapfile: Option<PathBuf>,
}

impl Default for GeofenceSettings {
    fn default() -> Self {
        Self {
            bounds: Bounds::WORLD,
            extension_m: DEFAULT_GEOFENCE_EXTENSION_M,
            mapfile: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PpmConfig {
    pub features: FeatureSet,
    pub velocity: VelocityFilter,
    pub geofence: GeofenceSettings,
    pub ruleset: RedactionRuleset,
}

impl Default for PpmConfig {
    fn default() -> Self {
        Self {
            features: FeatureSet::empty()
                .with(Feature::VelocityFilter)
                .with(Feature::GeofenceFilter)
                .with(Feature::IdRedaction)
                .with(Feature::PartIIRedaction),
            velocity: VelocityFilter::default(),
            geofence: GeofenceSettings::default(),
            ruleset: RedactionRuleset::default(),
        }
    }
}

impl PpmConfig {
    pub fn from_map(map: &ConfigMap) -> Result<Self> {
        let defaults = PpmConfig::default();

        let mut features = defaults.features;
        for (key, feature) in [
            (keys::VELOCITY_FILTER, Feature::VelocityFilter),
            (keys::GEOFENCE_FILTER, Feature::GeofenceFilter),
            (keys::ID_REDACTION, Feature::IdRedaction),
            (keys::SIZE_REDACTION, Feature::SizeRedaction),
            (keys::PARTII_REDACTION, Feature::PartIIRedaction),
        ] {
            if let Some(value) = map.get(key) {
                let on = parse_switch(value).with_context(|| format!("failed to parse {key}"))?;
                features.set(feature, on);
            }
        }

        let velocity = VelocityFilter::new(
            parse_f64(map, keys::VELOCITY_MIN, DEFAULT_MIN_SPEED)?,
            parse_f64(map, keys::VELOCITY_MAX, DEFAULT_MAX_SPEED)?,
        );

        let world = Bounds::WORLD;
        let geofence = GeofenceSettings {
            bounds: Bounds::new(
                Point::new(
                    parse_f64(map, keys::GEOFENCE_SW_LAT, world.sw.lat)?,
                    parse_f64(map, keys::GEOFENCE_SW_LON, world.sw.lon)?,
                ),
                Point::new(
                    parse_f64(map, keys::GEOFENCE_NE_LAT, world.ne.lat)?,
                    parse_f64(map, keys::GEOFENCE_NE_LON, world.ne.lon)?,
                ),
            ),
            extension_m: parse_f64(map, keys::GEOFENCE_EXTENSION, DEFAULT_GEOFENCE_EXTENSION_M)?,
            mapfile: non_empty(map, keys::GEOFENCE_MAPFILE).map(PathBuf::from),
        };

        let ruleset = RedactionRuleset::new(
            id_redactor(map)?,
            partii_properties(map)?,
            SizeRedactor::new(parse_f64(map, keys::SIZE_VALUE, DEFAULT_SIZE_REPLACEMENT)?),
        );

        Ok(Self {
            features,
            velocity,
            geofence,
            ruleset,
        })
    }

    pub fn validate(&self) -> Result<&Self> {
        let (min, max) = (self.velocity.min(), self.velocity.max());
        if !min.is_finite() || !max.is_finite() || min < 0.0 {
            bail!("velocity bounds must be finite and non-negative (min={min}, max={max})");
        }
        if min > max {
            bail!("velocity min {min} exceeds max {max}");
        }

        if !self.geofence.extension_m.is_finite() || self.geofence.extension_m < 0.0 {
            bail!(
                "geofence extension must be a non-negative distance, got {}",
                self.geofence.extension_m
            );
        }
        if !self.geofence.bounds.is_valid() {
            bail!("geofence bounds are invalid: {:?}", self.geofence.bounds);
        }

        if !self.ruleset.size.replacement().is_finite() {
            bail!("size replacement must be a finite number");
        }

        Ok(self)
    }

    /// Builds the index from the configured segment file. Without a file the
    /// index is empty, which suppresses every message while the geofence
    /// filter is active.
    pub fn build_geofence(&self) -> Result<Geofence> {
        let settings = &self.geofence;
        let segments = match settings.mapfile.as_deref() {
            Some(path) => load_segments(path)
                .with_context(|| format!("failed to load map file '{}'", path.display()))?,
            None => {
                if self.features.is_active(Feature::GeofenceFilter) {
                    warn!("geofence filter active without a map file; every message will be suppressed");
                }
                Vec::new()
            }
        };

        let geofence = Geofence::build(
            settings.bounds,
            &segments,
            settings.extension_m,
            QuadTreeConfig::default(),
        )
        .context("failed to build geofence index")?;
        Ok(geofence)
    }
}

fn id_redactor(map: &ConfigMap) -> Result<IdRedactor> {
    let replacement =
        IdReplacement::from_config(non_empty(map, keys::ID_VALUE).unwrap_or(DEFAULT_REDACTED_ID));

    let inclusions = match map.get(keys::ID_INCLUSIONS) {
        Some(value) => parse_switch(value)
            .with_context(|| format!("failed to parse {}", keys::ID_INCLUSIONS))?,
        None => true,
    };

    if !inclusions {
        return Ok(IdRedactor::redact_all(replacement));
    }
    let included = map
        .get(keys::ID_INCLUDED)
        .map(|ids| split_list(ids))
        .unwrap_or_default();
    Ok(IdRedactor::with_inclusions(included, replacement))
}

fn partii_properties(map: &ConfigMap) -> Result<RedactionProperties> {
    let mut properties = match non_empty(map, keys::REDACTION_PROPERTIES) {
        Some(path) => RedactionProperties::load(Path::new(path))
            .with_context(|| format!("failed to load {}", keys::REDACTION_PROPERTIES))?,
        None => RedactionProperties::default(),
    };
    if let Some(fields) = map.get(keys::PARTII_FIELDS) {
        properties.extend(split_list(fields));
    }
    Ok(properties)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty<'a>(map: &'a ConfigMap, key: &str) -> Option<&'a str> {
    map.get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn parse_f64(map: &ConfigMap, key: &str, default: f64) -> Result<f64> {
    match non_empty(map, key) {
        Some(value) => value
            .parse::<f64>()
            .with_context(|| format!("failed to parse {key} as a number: '{value}'")),
        None => Ok(default),
    }
}

fn parse_switch(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "1" | "yes" => Ok(true),
        "off" | "false" | "0" | "no" => Ok(false),
        other => Err(anyhow!("invalid switch value: {}", other)),
    }
}

/// Process-level settings taken from the environment.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub config_file: Option<PathBuf>,
    pub map_file: Option<PathBuf>,
    pub redaction_properties: Option<PathBuf>,
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            config_file: None,
            map_file: None,
            redaction_properties: None,
            log_level: "info".to_string(),
        }
    }
}

impl ServiceConfig {
    /// `cli_config` is the config path given on the command line; it wins
    /// over `PPM_CONFIG_FILE`.
    pub fn from_env(cli_config: Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Ok(path) = env::var("PPM_CONFIG_FILE") {
            if !path.trim().is_empty() {
                config.config_file = Some(PathBuf::from(path));
            }
        }
        if let Some(path) = cli_config {
            config.config_file = Some(PathBuf::from(path));
        }

        if let Ok(path) = env::var("PPM_MAP_FILE") {
            if !path.trim().is_empty() {
                config.map_file = Some(PathBuf::from(path));
            }
        }

        if let Ok(path) = env::var("REDACTION_PROPERTIES_PATH") {
            if !path.trim().is_empty() {
                config.redaction_properties = Some(PathBuf::from(path));
            }
        }

        if let Ok(level) = env::var("LOG_LEVEL") {
            if !level.trim().is_empty() {
                config.log_level = level;
            }
        }

        Ok(config)
    }

    /// Reads the config file (if any), applies the environment overrides and
    /// derives the typed configuration.
    pub fn load_ppm_config(&self) -> Result<PpmConfig> {
        let mut map = match self.config_file.as_deref() {
            Some(path) => load_properties(path)?,
            None => ConfigMap::new(),
        };

        if let Some(path) = &self.map_file {
            map.insert(
                keys::GEOFENCE_MAPFILE.to_string(),
                path.display().to_string(),
            );
        }
        if let Some(path) = &self.redaction_properties {
            map.insert(
                keys::REDACTION_PROPERTIES.to_string(),
                path.display().to_string(),
            );
        }

        let config = PpmConfig::from_map(&map)?;
        info!(
            features = ?config.features,
            velocity_min = config.velocity.min(),
            velocity_max = config.velocity.max(),
            extension_m = config.geofence.extension_m,
            partii_fields = config.ruleset.partii.len(),
            "privacy configuration loaded"
        );
        Ok(config)
    }
}
