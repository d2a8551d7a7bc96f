use std::fmt;

/// Independently toggleable privacy capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    VelocityFilter,
    GeofenceFilter,
    IdRedaction,
    SizeRedaction,
    PartIIRedaction,
}

impl Feature {
    pub const ALL: [Feature; 5] = [
        Feature::VelocityFilter,
        Feature::GeofenceFilter,
        Feature::IdRedaction,
        Feature::SizeRedaction,
        Feature::PartIIRedaction,
    ];

    pub const fn bit(self) -> u32 {
        match self {
            Feature::VelocityFilter => 1 << 0,
            Feature::GeofenceFilter => 1 << 1,
            Feature::IdRedaction => 1 << 2,
            Feature::SizeRedaction => 1 << 4,
            Feature::PartIIRedaction => 1 << 8,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Feature::VelocityFilter => "velocity_filter",
            Feature::GeofenceFilter => "geofence_filter",
            Feature::IdRedaction => "id_redaction",
            Feature::SizeRedaction => "size_redaction",
            Feature::PartIIRedaction => "partii_redaction",
        }
    }
}

/// Activation set held by each handler. Mutable between calls.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureSet(u32);

impl FeatureSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        Feature::ALL.iter().fold(Self::empty(), |set, f| set.with(*f))
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn with(self, feature: Feature) -> Self {
        Self(self.0 | feature.bit())
    }

    pub fn is_active(self, feature: Feature) -> bool {
        self.0 & feature.bit() != 0
    }

    /// Returns the resulting flag word.
    pub fn activate(&mut self, feature: Feature) -> u32 {
        self.0 |= feature.bit();
        self.0
    }

    /// Returns the resulting flag word.
    pub fn deactivate(&mut self, feature: Feature) -> u32 {
        self.0 &= !feature.bit();
        self.0
    }

    pub fn set(&mut self, feature: Feature, on: bool) {
        if on {
            self.activate(feature);
        } else {
            self.deactivate(feature);
        }
    }

    pub fn iter(self) -> impl Iterator<Item = Feature> {
        Feature::ALL.into_iter().filter(move |f| self.is_active(*f))
    }
}

impl fmt::Debug for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(Feature::as_str)).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_are_independent() {
        let mut set = FeatureSet::empty();
        set.activate(Feature::VelocityFilter);
        set.activate(Feature::PartIIRedaction);

        assert!(set.is_active(Feature::VelocityFilter));
        assert!(!set.is_active(Feature::GeofenceFilter));
        assert!(set.is_active(Feature::PartIIRedaction));

        set.deactivate(Feature::VelocityFilter);
        assert!(!set.is_active(Feature::VelocityFilter));
        assert!(set.is_active(Feature::PartIIRedaction));
    }

    #[test]
    fn test_flag_word_values() {
        let mut set = FeatureSet::empty();
        assert_eq!(set.activate(Feature::GeofenceFilter), 0x2);
        assert_eq!(set.activate(Feature::SizeRedaction), 0x12);
        assert_eq!(set.deactivate(Feature::GeofenceFilter), 0x10);
        assert_eq!(FeatureSet::all().bits(), 0x117);
    }

    #[test]
    fn test_debug_lists_active_features() {
        let set = FeatureSet::empty().with(Feature::IdRedaction);
        assert_eq!(format!("{set:?}"), "{\"id_redaction\"}");
    }
}
