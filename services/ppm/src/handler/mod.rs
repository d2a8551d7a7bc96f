//! Per-message retention decision and redaction.
//!
//! A [`BsmHandler`] is reused across messages. Each [`BsmHandler::process`]
//! call resets the per-call state (record, status, redacted tree, cached
//! output) and keeps the activation flags and shared collaborators.
//!
//! ```text
//! Idle -> Parsing -> Rejected(status)      filter failure, missing field, type mismatch
//!                 -> ParseFailed           syntax or structure error
//!                 -> Redacting -> Finalized   json() serialized the redacted tree
//! ```

mod events;

use std::sync::Arc;

use cvdp_geofence::GeofenceIndex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::bsm::Bsm;
use crate::config::PpmConfig;
use crate::features::{Feature, FeatureSet};
use crate::filter::VelocityFilter;
use crate::redaction::{
    find_and_remove_all_instances_of_member, is_member_present, IdRedactor, RedactionError,
    RedactionRuleset,
};
use crate::status::ResultStatus;

use events::{parse_document, ParseContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerState {
    Idle,
    Parsing,
    Rejected(ResultStatus),
    /// The tree is redacted; its serialized form has not been produced yet.
    Redacting,
    Finalized,
    ParseFailed,
}

pub struct BsmHandler {
    geofence: Arc<dyn GeofenceIndex + Send + Sync>,
    ruleset: Arc<RedactionRuleset>,
    velocity_filter: VelocityFilter,
    box_extension: f64,
    activated: FeatureSet,

    state: HandlerState,
    result: ResultStatus,
    bsm: Bsm,
    tree: Option<Value>,
    json: String,
    finalized: bool,
}

impl BsmHandler {
    pub fn new(geofence: Arc<dyn GeofenceIndex + Send + Sync>, config: &PpmConfig) -> Self {
        Self::with_ruleset(geofence, Arc::new(config.ruleset.clone()), config)
    }

    /// Lets a pool of handlers share one ruleset.
    pub fn with_ruleset(
        geofence: Arc<dyn GeofenceIndex + Send + Sync>,
        ruleset: Arc<RedactionRuleset>,
        config: &PpmConfig,
    ) -> Self {
        Self {
            geofence,
            ruleset,
            velocity_filter: config.velocity,
            box_extension: config.geofence.extension_m,
            activated: config.features,
            state: HandlerState::Idle,
            result: ResultStatus::Success,
            bsm: Bsm::default(),
            tree: None,
            json: String::new(),
            finalized: false,
        }
    }

    /// Processes one newline-free JSON message.
    ///
    /// Returns false only when the input is not a well-formed JSON object.
    /// A filter rejection still returns true; read [`BsmHandler::result`] to
    /// learn whether the message is retained.
    pub fn process(&mut self, message: &str) -> bool {
        self.reset();
        self.state = HandlerState::Parsing;

        if message.contains(['\n', '\r']) {
            debug!("message contains a raw line break");
            return self.parse_failed();
        }

        let (outcome, bsm, status) = {
            let mut ctx = ParseContext::new(
                self.activated,
                &self.velocity_filter,
                self.geofence.as_ref(),
            );
            let outcome = parse_document(message, &mut ctx);
            if outcome.is_ok() {
                ctx.finish();
            }
            let status = ctx.status();
            let (bsm, _) = ctx.into_parts();
            (outcome, bsm, status)
        };

        let mut tree = match outcome {
            Err(err) if status.is_success() => {
                debug!(error = %err, "message failed to parse");
                return self.parse_failed();
            }
            Err(_) => {
                self.bsm = bsm;
                return self.reject(status);
            }
            Ok(_) if !status.is_success() => {
                self.bsm = bsm;
                return self.reject(status);
            }
            Ok(tree) => tree,
        };

        self.bsm = bsm;
        self.state = HandlerState::Redacting;
        if let Err(err) = self.redact(&mut tree) {
            warn!(error = %err, "redaction failed");
            return self.reject(ResultStatus::Other);
        }
        self.tree = Some(tree);
        true
    }

    fn reset(&mut self) {
        self.bsm.reset();
        self.result = ResultStatus::Success;
        self.tree = None;
        self.json.clear();
        self.finalized = false;
        self.state = HandlerState::Idle;
    }

    fn parse_failed(&mut self) -> bool {
        self.bsm.reset();
        self.result = ResultStatus::Parse;
        self.state = HandlerState::ParseFailed;
        false
    }

    fn reject(&mut self, status: ResultStatus) -> bool {
        if self.result.is_success() {
            self.result = status;
        }
        self.state = HandlerState::Rejected(self.result);
        debug!(status = %self.result, "message suppressed");
        true
    }

    fn redact(&mut self, tree: &mut Value) -> Result<(), RedactionError> {
        if self.is_active(Feature::IdRedaction) {
            self.redact_id(tree)?;
        }
        if self.is_active(Feature::SizeRedaction) {
            self.redact_size(tree)?;
        }
        if self.is_active(Feature::PartIIRedaction) {
            if let Some(pointer) = self.bsm.partii_pointer.as_deref() {
                let partii = tree
                    .pointer_mut(pointer)
                    .ok_or_else(|| RedactionError::MissingTarget(pointer.to_string()))?;
                self.handle_partii_redaction(partii)?;
            }
        }
        Ok(())
    }

    fn redact_id(&mut self, tree: &mut Value) -> Result<(), RedactionError> {
        let (Some(id), Some(pointer)) = (self.bsm.id.as_deref(), self.bsm.id_pointer.as_deref())
        else {
            return Ok(());
        };
        let Some(replacement) = self.ruleset.id.redact(id) else {
            return Ok(());
        };

        let target = tree
            .pointer_mut(pointer)
            .ok_or_else(|| RedactionError::MissingTarget(pointer.to_string()))?;
        *target = Value::String(replacement.clone());
        debug!(pointer, "id redacted");
        self.bsm.id = Some(replacement);
        Ok(())
    }

    fn redact_size(&mut self, tree: &mut Value) -> Result<(), RedactionError> {
        let replacement = self.ruleset.size.replacement_value();
        let targets = [
            (self.bsm.width_pointer.as_deref(), &mut self.bsm.width),
            (self.bsm.length_pointer.as_deref(), &mut self.bsm.length),
        ];

        for (pointer, field) in targets {
            let Some(pointer) = pointer else {
                continue;
            };
            let target = tree
                .pointer_mut(pointer)
                .ok_or_else(|| RedactionError::MissingTarget(pointer.to_string()))?;
            *target = replacement.clone();
            *field = Some(self.ruleset.size.replacement());
        }
        Ok(())
    }

    /// Strips every configured member from the PartII block, at any depth.
    /// Returns how many configured names were found and removed.
    pub fn handle_partii_redaction(&self, partii: &mut Value) -> Result<usize, RedactionError> {
        match partii {
            Value::Null => return Ok(0),
            Value::Array(_) | Value::Object(_) => {}
            _ => {
                return Err(RedactionError::UnexpectedShape {
                    pointer: self.bsm.partii_pointer.clone().unwrap_or_default(),
                    expected: "array or object",
                })
            }
        }

        let mut removed = 0;
        for member in self.ruleset.partii_members() {
            if is_member_present(partii, member)
                && find_and_remove_all_instances_of_member(partii, member)
            {
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(removed, "partII members redacted");
        }
        Ok(removed)
    }

    pub fn find_and_remove_all_instances_of_member(&self, value: &mut Value, member: &str) -> bool {
        find_and_remove_all_instances_of_member(value, member)
    }

    pub fn is_member_present(&self, value: &Value, member: &str) -> bool {
        is_member_present(value, member)
    }

    pub fn result(&self) -> ResultStatus {
        self.result
    }

    pub fn result_string(&self) -> &'static str {
        self.result.as_str()
    }

    pub fn state(&self) -> HandlerState {
        self.state
    }

    pub fn bsm(&self) -> &Bsm {
        &self.bsm
    }

    /// The redacted message as a single line of JSON, or an empty string when
    /// the last message was not retained. Serialized once per call.
    pub fn json(&mut self) -> &str {
        if !self.finalized {
            self.finalized = true;
            if let (Some(tree), true) = (self.tree.as_ref(), self.result.is_success()) {
                match serde_json::to_string(tree) {
                    Ok(json) => {
                        debug_assert!(!json.contains('\n'));
                        self.json = json;
                        self.state = HandlerState::Finalized;
                    }
                    Err(err) => {
                        warn!(error = %err, "failed to serialize redacted message");
                        self.reject(ResultStatus::Other);
                    }
                }
            }
        }
        &self.json
    }

    pub fn bsm_buffer_size(&mut self) -> usize {
        self.json().len()
    }

    pub fn is_active(&self, feature: Feature) -> bool {
        self.activated.is_active(feature)
    }

    pub fn activate(&mut self, feature: Feature) -> u32 {
        self.activated.activate(feature)
    }

    pub fn deactivate(&mut self, feature: Feature) -> u32 {
        self.activated.deactivate(feature)
    }

    pub fn activation_flags(&self) -> FeatureSet {
        self.activated
    }

    pub fn velocity_filter(&self) -> &VelocityFilter {
        &self.velocity_filter
    }

    pub fn id_redactor(&self) -> &IdRedactor {
        &self.ruleset.id
    }

    pub fn ruleset(&self) -> &Arc<RedactionRuleset> {
        &self.ruleset
    }

    pub fn box_extension(&self) -> f64 {
        self.box_extension
    }
}
