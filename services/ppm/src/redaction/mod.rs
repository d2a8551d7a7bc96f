mod error;
mod id;
mod partii;
mod size;

pub use error::RedactionError;
pub use id::{IdRedactor, IdReplacement, DEFAULT_REDACTED_ID, RANDOM_ID_KEYWORD};
pub use partii::{find_and_remove_all_instances_of_member, is_member_present, RedactionProperties};
pub use size::{SizeRedactor, DEFAULT_SIZE_REPLACEMENT};

/// Everything a handler needs to know about what to redact. Built once from
/// configuration and never changed; share it behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct RedactionRuleset {
    pub id: IdRedactor,
    pub partii: RedactionProperties,
    pub size: SizeRedactor,
}

impl RedactionRuleset {
    pub fn new(id: IdRedactor, partii: RedactionProperties, size: SizeRedactor) -> Self {
        Self { id, partii, size }
    }

    pub fn is_id_redaction_eligible(&self, id: &str) -> bool {
        self.id.is_redaction_eligible(id)
    }

    pub fn partii_members(&self) -> &[String] {
        self.partii.fields()
    }
}
