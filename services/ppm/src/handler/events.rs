//! Event-driven construction of the message tree.
//!
//! serde_json drives a [`NodeSeed`] through the document. Every scalar and
//! container passes through the seed, which hands recognised members to the
//! [`ParseContext`] as they arrive. The context evaluates the active filters
//! the moment it has what they need; a rejection raises [`Abort`], which
//! serde turns into an error that unwinds the parser without reading the rest
//! of the input.

use std::fmt;

use cvdp_geofence::GeofenceIndex;
use serde::de::{self, DeserializeSeed, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_json::{Map, Number, Value};

use crate::bsm::Bsm;
use crate::features::{Feature, FeatureSet};
use crate::filter::VelocityFilter;
use crate::status::ResultStatus;

/// Members whose subtrees round-trip untouched but never feed the record.
/// The ODE envelope repeats coordinates in its metadata, and PartII elements
/// carry their own `id`.
const OPAQUE_MEMBERS: [&str; 2] = ["metadata", "partII"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Field {
    Root,
    Id,
    Latitude,
    Longitude,
    Speed,
    Width,
    Length,
    PartII,
    Other,
}

impl Field {
    fn from_key(key: &str) -> Self {
        match key {
            "id" => Field::Id,
            "latitude" | "lat" => Field::Latitude,
            "longitude" | "lon" | "long" => Field::Longitude,
            "speed" => Field::Speed,
            "width" => Field::Width,
            "length" => Field::Length,
            "partII" => Field::PartII,
            _ => Field::Other,
        }
    }

    fn is_numeric(self) -> bool {
        matches!(
            self,
            Field::Latitude | Field::Longitude | Field::Speed | Field::Width | Field::Length
        )
    }
}

/// Stops the parser. The reason is already recorded in the context status.
#[derive(Debug)]
pub(crate) struct Abort;

impl fmt::Display for Abort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("processing aborted")
    }
}

pub(crate) struct ParseContext<'h> {
    features: FeatureSet,
    velocity: &'h VelocityFilter,
    geofence: &'h dyn GeofenceIndex,
    bsm: Bsm,
    status: ResultStatus,
    path: Vec<String>,
    opaque_depth: usize,
    geofence_checked: bool,
}

impl<'h> ParseContext<'h> {
    pub(crate) fn new(
        features: FeatureSet,
        velocity: &'h VelocityFilter,
        geofence: &'h dyn GeofenceIndex,
    ) -> Self {
        Self {
            features,
            velocity,
            geofence,
            bsm: Bsm::default(),
            status: ResultStatus::Success,
            path: Vec::new(),
            opaque_depth: 0,
            geofence_checked: false,
        }
    }

    pub(crate) fn status(&self) -> ResultStatus {
        self.status
    }

    pub(crate) fn into_parts(self) -> (Bsm, ResultStatus) {
        (self.bsm, self.status)
    }

    /// Records the first failure only; later ones are ignored.
    fn fail(&mut self, status: ResultStatus) -> Abort {
        if self.status.is_success() {
            self.status = status;
        }
        Abort
    }

    /// End-of-document checks for fields an active filter never received.
    pub(crate) fn finish(&mut self) {
        if !self.status.is_success() {
            return;
        }
        if self.features.is_active(Feature::VelocityFilter) && self.bsm.speed.is_none() {
            self.fail(ResultStatus::Missing);
        } else if self.features.is_active(Feature::GeofenceFilter) && self.bsm.position().is_none()
        {
            self.fail(ResultStatus::Missing);
        }
    }

    fn pointer(&self) -> String {
        let mut pointer = String::new();
        for token in &self.path {
            pointer.push('/');
            pointer.push_str(token);
        }
        pointer
    }

    fn enter_member(&mut self, key: &str) -> Field {
        let field = if self.opaque_depth > 0 {
            Field::Other
        } else {
            Field::from_key(key)
        };

        self.path.push(key.replace('~', "~0").replace('/', "~1"));
        if field == Field::PartII && self.bsm.partii_pointer.is_none() {
            self.bsm.partii_pointer = Some(self.pointer());
        }
        if OPAQUE_MEMBERS.contains(&key) {
            self.opaque_depth += 1;
        }
        field
    }

    fn leave_member(&mut self, key: &str) {
        self.path.pop();
        if OPAQUE_MEMBERS.contains(&key) {
            self.opaque_depth -= 1;
        }
    }

    fn enter_index(&mut self, index: usize) {
        self.path.push(index.to_string());
    }

    fn leave_index(&mut self) {
        self.path.pop();
    }

    /// Only the first occurrence of a member is recorded.
    fn is_recorded(&self, field: Field) -> bool {
        match field {
            Field::Id => self.bsm.id.is_some(),
            Field::Latitude => self.bsm.latitude.is_some(),
            Field::Longitude => self.bsm.longitude.is_some(),
            Field::Speed => self.bsm.speed.is_some(),
            Field::Width => self.bsm.width.is_some(),
            Field::Length => self.bsm.length.is_some(),
            Field::Root | Field::PartII | Field::Other => false,
        }
    }

    /// A recognised scalar member expected a value but got a container.
    fn on_container(&mut self, field: Field) -> Result<(), Abort> {
        if (field.is_numeric() || field == Field::Id) && !self.is_recorded(field) {
            return Err(self.fail(ResultStatus::Other));
        }
        Ok(())
    }

    fn on_scalar(&mut self, field: Field, value: &Value) -> Result<(), Abort> {
        if self.is_recorded(field) {
            return Ok(());
        }
        match field {
            Field::Id => {
                self.bsm.id = match value {
                    Value::Null => None,
                    Value::String(s) => Some(s.clone()),
                    other => Some(other.to_string()),
                };
                if self.bsm.id.is_some() {
                    self.bsm.id_pointer = Some(self.pointer());
                }
                Ok(())
            }
            Field::Latitude | Field::Longitude | Field::Speed | Field::Width | Field::Length => {
                let Some(number) = self.numeric(value)? else {
                    return Ok(());
                };
                self.on_number(field, number)
            }
            _ => Ok(()),
        }
    }

    /// `None` for JSON null; numeric strings are accepted.
    fn numeric(&mut self, value: &Value) -> Result<Option<f64>, Abort> {
        let parsed = match value {
            Value::Null => return Ok(None),
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match parsed {
            Some(number) if number.is_finite() => Ok(Some(number)),
            _ => Err(self.fail(ResultStatus::Other)),
        }
    }

    fn on_number(&mut self, field: Field, number: f64) -> Result<(), Abort> {
        match field {
            Field::Speed => {
                self.bsm.speed = Some(number);
                if self.features.is_active(Feature::VelocityFilter)
                    && self.velocity.suppress(number)
                {
                    return Err(self.fail(ResultStatus::Speed));
                }
            }
            Field::Latitude => {
                self.bsm.latitude = Some(number);
                self.check_geofence()?;
            }
            Field::Longitude => {
                self.bsm.longitude = Some(number);
                self.check_geofence()?;
            }
            Field::Width => {
                self.bsm.width = Some(number);
                self.bsm.width_pointer = Some(self.pointer());
            }
            Field::Length => {
                self.bsm.length = Some(number);
                self.bsm.length_pointer = Some(self.pointer());
            }
            _ => {}
        }
        Ok(())
    }

    fn check_geofence(&mut self) -> Result<(), Abort> {
        if self.geofence_checked || !self.features.is_active(Feature::GeofenceFilter) {
            return Ok(());
        }
        let Some(position) = self.bsm.position() else {
            return Ok(());
        };

        self.geofence_checked = true;
        if !self.geofence.is_within(position) {
            return Err(self.fail(ResultStatus::Geoposition));
        }
        Ok(())
    }
}

/// Parses one complete document. Trailing content is a syntax error.
pub(crate) fn parse_document(
    message: &str,
    ctx: &mut ParseContext<'_>,
) -> Result<Value, serde_json::Error> {
    let mut deserializer = serde_json::Deserializer::from_str(message);
    let tree = NodeSeed {
        ctx,
        field: Field::Root,
    }
    .deserialize(&mut deserializer)?;
    deserializer.end()?;
    Ok(tree)
}

pub(crate) struct NodeSeed<'c, 'h> {
    ctx: &'c mut ParseContext<'h>,
    field: Field,
}

impl<'c, 'h> NodeSeed<'c, 'h> {
    fn scalar<E: de::Error>(self, value: Value) -> Result<Value, E> {
        let NodeSeed { ctx, field } = self;
        if field == Field::Root {
            return Err(E::custom("message root must be a JSON object"));
        }
        ctx.on_scalar(field, &value).map_err(E::custom)?;
        Ok(value)
    }
}

impl<'de, 'c, 'h> DeserializeSeed<'de> for NodeSeed<'c, 'h> {
    type Value = Value;

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(self)
    }
}

impl<'de, 'c, 'h> Visitor<'de> for NodeSeed<'c, 'h> {
    type Value = Value;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a JSON value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
        self.scalar(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        self.scalar(Value::Number(v.into()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        self.scalar(Value::Number(v.into()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        let number = Number::from_f64(v).ok_or_else(|| E::custom("invalid float value"))?;
        self.scalar(Value::Number(number))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        self.scalar(Value::String(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
        self.scalar(Value::String(v))
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        self.scalar(Value::Null)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        self.scalar(Value::Null)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let NodeSeed { ctx, field } = self;
        if field == Field::Root {
            return Err(de::Error::custom("message root must be a JSON object"));
        }
        ctx.on_container(field)
            .map_err(<A::Error as de::Error>::custom)?;

        let mut items = Vec::new();
        loop {
            ctx.enter_index(items.len());
            let next = seq.next_element_seed(NodeSeed {
                ctx: &mut *ctx,
                field: Field::Other,
            })?;
            ctx.leave_index();
            match next {
                Some(item) => items.push(item),
                None => break,
            }
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let NodeSeed { ctx, field } = self;
        ctx.on_container(field)
            .map_err(<A::Error as de::Error>::custom)?;

        let mut object = Map::new();
        while let Some(key) = map.next_key::<String>()? {
            // the record keeps the first value; a repeat would let the tree diverge
            if object.contains_key(&key) {
                return Err(de::Error::custom(format!("duplicate member '{key}'")));
            }
            let member = ctx.enter_member(&key);
            let value = map.next_value_seed(NodeSeed {
                ctx: &mut *ctx,
                field: member,
            })?;
            ctx.leave_member(&key);
            object.insert(key, value);
        }
        Ok(Value::Object(object))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvdp_geofence::Point;

    struct Fence(bool);

    impl GeofenceIndex for Fence {
        fn is_within(&self, _point: Point) -> bool {
            self.0
        }
    }

    fn run(
        message: &str,
        features: FeatureSet,
        inside: bool,
    ) -> (Result<Value, String>, Bsm, ResultStatus) {
        let velocity = VelocityFilter::new(1.0, 30.0);
        let fence = Fence(inside);
        let mut ctx = ParseContext::new(features, &velocity, &fence);
        let outcome = parse_document(message, &mut ctx).map_err(|e| e.to_string());
        if outcome.is_ok() {
            ctx.finish();
        }
        let (bsm, status) = ctx.into_parts();
        (outcome, bsm, status)
    }

    #[test]
    fn test_records_pointers_for_nested_fields() {
        let message = r#"{"payload":{"data":{"coreData":{"id":"A1","speed":5,"size":{"width":200,"length":500}},"partII":[{"id":"ext"}]}}}"#;
        let (outcome, bsm, status) = run(message, FeatureSet::empty(), true);

        assert!(outcome.is_ok());
        assert_eq!(status, ResultStatus::Success);
        assert_eq!(bsm.id.as_deref(), Some("A1"));
        assert_eq!(bsm.id_pointer.as_deref(), Some("/payload/data/coreData/id"));
        assert_eq!(bsm.width_pointer.as_deref(), Some("/payload/data/coreData/size/width"));
        assert_eq!(bsm.length, Some(500.0));
        assert_eq!(bsm.partii_pointer.as_deref(), Some("/payload/data/partII"));
    }

    #[test]
    fn test_opaque_members_do_not_feed_record() {
        let message = r#"{"metadata":{"latitude":"","longitude":""},"partII":[{"id":"VehicleSafetyExtensions","speed":99}],"id":"real"}"#;
        let (outcome, bsm, _) = run(message, FeatureSet::empty(), true);

        assert!(outcome.is_ok());
        assert_eq!(bsm.id.as_deref(), Some("real"));
        assert_eq!(bsm.latitude, None);
        assert_eq!(bsm.speed, None);
    }

    #[test]
    fn test_speed_rejection_stops_before_position() {
        let features = FeatureSet::empty()
            .with(Feature::VelocityFilter)
            .with(Feature::GeofenceFilter);
        let message = r#"{"speed":50.0,"lat":35.0,"lon":-85.0}"#;
        let (outcome, bsm, status) = run(message, features, false);

        assert!(outcome.is_err());
        assert_eq!(status, ResultStatus::Speed);
        assert_eq!(bsm.latitude, None);
    }

    #[test]
    fn test_pointer_escapes_special_characters() {
        let (_, bsm, _) = run(r#"{"a/b":{"c~d":{"id":"x"}}}"#, FeatureSet::empty(), true);
        assert_eq!(bsm.id_pointer.as_deref(), Some("/a~1b/c~0d/id"));
    }

    #[test]
    fn test_array_indices_in_pointer() {
        let (_, bsm, _) = run(r#"{"list":[{},{"id":"x"}]}"#, FeatureSet::empty(), true);
        assert_eq!(bsm.id_pointer.as_deref(), Some("/list/1/id"));
    }

    #[test]
    fn test_non_object_root_is_a_parse_error() {
        let (outcome, _, status) = run("[1,2,3]", FeatureSet::empty(), true);
        assert!(outcome.is_err());
        assert_eq!(status, ResultStatus::Success);
    }

    #[test]
    fn test_numeric_strings_are_accepted() {
        let features = FeatureSet::empty().with(Feature::VelocityFilter);
        let (outcome, bsm, status) = run(r#"{"speed":"12.5"}"#, features, true);
        assert!(outcome.is_ok());
        assert_eq!(status, ResultStatus::Success);
        assert_eq!(bsm.speed, Some(12.5));
    }

    #[test]
    fn test_non_numeric_speed_is_other() {
        let (outcome, _, status) = run(r#"{"speed":"fast"}"#, FeatureSet::empty(), true);
        assert!(outcome.is_err());
        assert_eq!(status, ResultStatus::Other);
    }

    #[test]
    fn test_repeated_member_is_not_revalidated() {
        let message = r#"{"speed":10,"detail":{"speed":"unknown","lat":[1,2]},"lat":35.0}"#;
        let (outcome, bsm, status) = run(message, FeatureSet::empty(), true);
        assert!(outcome.is_err());
        assert_eq!(status, ResultStatus::Other);
        assert_eq!(bsm.speed, Some(10.0));

        let message = r#"{"speed":10,"detail":{"speed":"unknown"}}"#;
        let (outcome, _, status) = run(message, FeatureSet::empty(), true);
        assert!(outcome.is_ok());
        assert_eq!(status, ResultStatus::Success);
    }

    #[test]
    fn test_duplicate_member_is_a_parse_error() {
        let features = FeatureSet::empty().with(Feature::VelocityFilter);
        let message = r#"{"id":"ZZZ","id":"ABC123","speed":10,"speed":99}"#;
        let (outcome, bsm, status) = run(message, features, true);

        assert!(outcome.unwrap_err().contains("duplicate member 'id'"));
        assert_eq!(status, ResultStatus::Success);
        assert_eq!(bsm.speed, None);
    }

    #[test]
    fn test_same_name_in_sibling_objects_is_allowed() {
        let message = r#"{"a":{"x":1},"b":{"x":2}}"#;
        let (outcome, _, _) = run(message, FeatureSet::empty(), true);
        assert!(outcome.is_ok());
    }

    #[test]
    fn test_first_occurrence_wins() {
        let message = r#"{"id":"first","nested":{"id":"second"}}"#;
        let (_, bsm, _) = run(message, FeatureSet::empty(), true);
        assert_eq!(bsm.id.as_deref(), Some("first"));
        assert_eq!(bsm.id_pointer.as_deref(), Some("/id"));
    }
}
