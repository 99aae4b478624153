//! Response envelope
//!
//! Every outcome leaves the relay as `{success, message, data?, error_details?}`.
//! The fields are private: an envelope is only built through [`Envelope::ok`]
//! or the failure constructors, so `data` and `error_details` never appear
//! together.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{ErrorKind, ProxyError};
use crate::redact::Redactor;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    success: bool,
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_details: Option<Value>,
}

impl Envelope {
    /// Successful outcome
    pub fn ok(message: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            error_details: None,
        }
    }

    /// Failed outcome with pre-built details.
    ///
    /// The caller is responsible for `message` being safe to show.
    pub fn failure(message: impl Into<String>, details: Value) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            error_details: Some(details),
        }
    }

    /// Failed outcome for a relay error, redacted
    pub fn from_error(error: &ProxyError, action: &str, redactor: &Redactor) -> Self {
        let mut details = error.context();
        details["action"] = json!(redactor.redact(action));
        Self::failure(redactor.redact(&error.to_string()), details)
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn error_details(&self) -> Option<&Value> {
        self.error_details.as_ref()
    }

    /// Failure kind, if this is a failure envelope with a known kind
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error_details
            .as_ref()
            .and_then(|d| d.get("kind"))
            .and_then(|k| serde_json::from_value(k.clone()).ok())
    }

    pub fn into_data(self) -> Option<Value> {
        self.data
    }
}
