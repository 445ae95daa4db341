//! Wire types for the exchange chain.

use serde::Deserialize;
use serde_json::Value;

/// App code identifying Arknights in the binding list.
pub const ARKNIGHTS_APP_CODE: &str = "arknights";

/// One-shot identity proof presented at login. Never persisted.
#[derive(Clone)]
pub enum IdentityProof {
    /// Phone number and account password.
    PhonePassword { phone: String, password: String },
    /// Phone number and SMS verification code.
    SmsCode { phone: String, code: String },
}

impl IdentityProof {
    /// The phone number this proof is for.
    pub fn phone(&self) -> &str {
        match self {
            IdentityProof::PhonePassword { phone, .. } => phone,
            IdentityProof::SmsCode { phone, .. } => phone,
        }
    }
}

// The secret never goes to logs, so Debug is written by hand.
impl std::fmt::Debug for IdentityProof {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentityProof::PhonePassword { phone, .. } => f
                .debug_struct("PhonePassword")
                .field("phone", phone)
                .field("password", &"<redacted>")
                .finish(),
            IdentityProof::SmsCode { phone, .. } => f
                .debug_struct("SmsCode")
                .field("phone", phone)
                .field("code", &"<redacted>")
                .finish(),
        }
    }
}

/// Session credential pieces returned by the redeem step.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CredentialParts {
    /// Session credential sent as the `cred` header.
    pub cred: String,
    /// Secret used to sign session-scoped requests.
    #[serde(rename = "token")]
    pub sign_token: String,
    /// Skland account id.
    #[serde(rename = "userId")]
    pub account_id: String,
}

/// A game account bound to the Skland account.
#[derive(Debug, Clone, Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingCharacter {
    pub uid: String,
    #[serde(default)]
    pub is_official: bool,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub channel_master_id: String,
    #[serde(default)]
    pub channel_name: String,
    #[serde(default)]
    pub nick_name: String,
    #[serde(default)]
    pub is_delete: bool,
}

/// Per-game binding entry in the binding response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BindingList {
    pub app_code: String,
    #[serde(default)]
    pub binding_list: Vec<BindingCharacter>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BindingResponse {
    #[serde(default)]
    pub list: Vec<BindingList>,
}

/// Response envelope shared by both services.
///
/// The two upstream services use different discriminator field names for
/// historical reasons: Hypergryph endpoints answer with `status`/`msg`,
/// Skland endpoints with `code`/`message`. Both are captured here and the
/// per-endpoint [`SuccessPredicate`] picks which one is authoritative.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    pub status: Option<i64>,
    pub code: Option<i64>,
    pub msg: Option<String>,
    pub message: Option<String>,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    /// Best-effort human-readable failure message.
    pub fn failure_message(&self) -> String {
        self.msg
            .clone()
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| "unspecified service error".to_string())
    }
}

/// Which envelope field signals success for an endpoint family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuccessPredicate {
    /// Hypergryph identity endpoints: `status == 0`.
    StatusField,
    /// Skland API endpoints: `code == 0`.
    CodeField,
}

impl SuccessPredicate {
    /// Check the envelope. Returns the failing discriminator value on
    /// business failure, or `None` in the error position when the
    /// discriminator is missing entirely.
    pub(crate) fn check(&self, envelope: &Envelope) -> Result<(), Option<i64>> {
        let value = match self {
            SuccessPredicate::StatusField => envelope.status,
            SuccessPredicate::CodeField => envelope.code,
        };
        match value {
            Some(0) => Ok(()),
            Some(code) => Err(Some(code)),
            None => Err(None),
        }
    }
}
