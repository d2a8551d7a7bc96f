use std::path::Path;

use serde_json::Value;
use tracing::debug;

use super::RedactionError;

/// Removes every member called `member` from `value`, at any depth and inside
/// every array element. Returns true when at least one member was removed.
/// Sibling members keep their order.
pub fn find_and_remove_all_instances_of_member(value: &mut Value, member: &str) -> bool {
    match value {
        Value::Object(map) => {
            let before = map.len();
            map.retain(|key, _| key != member);
            let mut found = map.len() != before;

            for (_, child) in map.iter_mut() {
                found |= find_and_remove_all_instances_of_member(child, member);
            }
            found
        }
        Value::Array(items) => {
            let mut found = false;
            for item in items.iter_mut() {
                found |= find_and_remove_all_instances_of_member(item, member);
            }
            found
        }
        _ => false,
    }
}

/// True if a member called `member` exists anywhere in `value`. Stops at the
/// first hit.
pub fn is_member_present(value: &Value, member: &str) -> bool {
    match value {
        Value::Object(map) => {
            map.contains_key(member)
                || map
                    .values()
                    .any(|child| is_member_present(child, member))
        }
        Value::Array(items) => items.iter().any(|item| is_member_present(item, member)),
        _ => false,
    }
}

/// Ordered, de-duplicated PartII member names to strip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedactionProperties {
    fields: Vec<String>,
}

impl RedactionProperties {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut properties = Self::default();
        properties.extend(fields);
        properties
    }

    /// One member name per line; blank lines and `#` comments are skipped.
    pub fn load(path: &Path) -> Result<Self, RedactionError> {
        let raw = std::fs::read_to_string(path).map_err(|source| RedactionError::PropertiesIo {
            path: path.display().to_string(),
            source,
        })?;
        let properties = Self::parse(&raw);
        debug!(
            path = %path.display(),
            fields = properties.len(),
            "loaded redaction properties"
        );
        Ok(properties)
    }

    pub fn parse(raw: &str) -> Self {
        Self::new(
            raw.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#')),
        )
    }

    pub fn extend<I, S>(&mut self, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for field in fields {
            let field = field.into();
            if !field.is_empty() && !self.fields.contains(&field) {
                self.fields.push(field);
            }
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
