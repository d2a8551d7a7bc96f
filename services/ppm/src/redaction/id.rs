use std::collections::HashSet;

use rand::Rng;

pub const DEFAULT_REDACTED_ID: &str = "FFFFFFFF";
/// Configured replacement value that selects per-message random ids.
pub const RANDOM_ID_KEYWORD: &str = "RANDOM";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdReplacement {
    Fixed(String),
    /// Eight uppercase hex digits, drawn fresh for every redaction.
    Random,
}

impl IdReplacement {
    pub fn from_config(value: &str) -> Self {
        if value.eq_ignore_ascii_case(RANDOM_ID_KEYWORD) {
            IdReplacement::Random
        } else {
            IdReplacement::Fixed(value.to_string())
        }
    }
}

/// Decides which temporary ids are overwritten and with what.
///
/// With an inclusion list only the listed ids are redacted; without one every
/// id is. The id member itself is always kept, only its value changes.
#[derive(Debug, Clone)]
pub struct IdRedactor {
    included: Option<HashSet<String>>,
    replacement: IdReplacement,
}

impl IdRedactor {
    pub fn redact_all(replacement: IdReplacement) -> Self {
        Self {
            included: None,
            replacement,
        }
    }

    pub fn with_inclusions<I, S>(ids: I, replacement: IdReplacement) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            included: Some(ids.into_iter().map(Into::into).collect()),
            replacement,
        }
    }

    pub fn has_inclusions(&self) -> bool {
        self.included.is_some()
    }

    pub fn inclusion_count(&self) -> usize {
        self.included.as_ref().map_or(0, HashSet::len)
    }

    pub fn replacement(&self) -> &IdReplacement {
        &self.replacement
    }

    pub fn is_redaction_eligible(&self, id: &str) -> bool {
        match &self.included {
            Some(ids) => ids.contains(id),
            None => true,
        }
    }

    pub fn replacement_value(&self) -> String {
        match &self.replacement {
            IdReplacement::Fixed(value) => value.clone(),
            IdReplacement::Random => format!("{:08X}", rand::thread_rng().gen::<u32>()),
        }
    }

    /// Returns the new id when `id` is eligible.
    pub fn redact(&self, id: &str) -> Option<String> {
        self.is_redaction_eligible(id).then(|| self.replacement_value())
    }
}

impl Default for IdRedactor {
    fn default() -> Self {
        Self::with_inclusions(
            Vec::<String>::new(),
            IdReplacement::Fixed(DEFAULT_REDACTED_ID.to_string()),
        )
    }
}
