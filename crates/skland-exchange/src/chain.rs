//! The token exchange chain.

use crate::error::{ExchangeError, ExchangeErrorKind, ExchangeResult, ExchangeStage};
use crate::types::{
    BindingCharacter, BindingResponse, CredentialParts, Envelope, IdentityProof, SuccessPredicate,
    ARKNIGHTS_APP_CODE,
};
use serde_json::{json, Value};
use skland_config_and_utils::{
    Config, DEFAULT_HYPERGRYPH_BASE_URL, DEFAULT_SKLAND_BASE_URL, PLATFORM_CODE, SKLAND_APP_CODE,
    SKLAND_CLIENT_VERSION,
};
use skland_transport::{summarize_response_body, HttpHandle, HttpRequest, HttpResponse};
use tracing::{debug, warn};

/// Endpoint bases and client identity used by the chain.
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    pub hypergryph_base_url: String,
    pub skland_base_url: String,
    pub app_code: String,
    pub client_version: String,
    pub platform: String,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            hypergryph_base_url: DEFAULT_HYPERGRYPH_BASE_URL.to_string(),
            skland_base_url: DEFAULT_SKLAND_BASE_URL.to_string(),
            app_code: SKLAND_APP_CODE.to_string(),
            client_version: SKLAND_CLIENT_VERSION.to_string(),
            platform: PLATFORM_CODE.to_string(),
        }
    }
}

impl From<&Config> for ExchangeConfig {
    fn from(config: &Config) -> Self {
        Self {
            hypergryph_base_url: config.hypergryph_base_url.clone(),
            skland_base_url: config.skland_base_url.clone(),
            ..Self::default()
        }
    }
}

/// Stateless executor for the four exchange steps.
///
/// Holds only the transport handle and endpoint configuration; all session
/// state lives upstream in the credential cache and orchestrator.
#[derive(Clone)]
pub struct TokenExchangeChain {
    http: HttpHandle,
    config: ExchangeConfig,
}

impl TokenExchangeChain {
    /// Create a chain over the given transport.
    pub fn new(http: HttpHandle, config: ExchangeConfig) -> Self {
        Self { http, config }
    }

    /// The endpoint and client identity configuration in use.
    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    /// Step 1: verify an identity proof and obtain the long-lived platform
    /// token.
    pub async fn prove_identity(&self, proof: &IdentityProof) -> ExchangeResult<String> {
        let (path, body) = match proof {
            IdentityProof::PhonePassword { phone, password } => (
                "/user/auth/v1/token_by_phone_password",
                json!({ "phone": phone, "password": password }),
            ),
            IdentityProof::SmsCode { phone, code } => (
                "/user/auth/v2/token_by_phone_code",
                json!({ "phone": phone, "code": code }),
            ),
        };

        let data = self
            .post_identity(ExchangeStage::ProveIdentity, path, body)
            .await?;

        require_string(&data, "token", ExchangeStage::ProveIdentity)
    }

    /// Request an SMS verification code for the given phone number.
    pub async fn send_sms_code(&self, phone: &str) -> ExchangeResult<()> {
        self.post_identity(
            ExchangeStage::SendSmsCode,
            "/general/v1/send_phone_code",
            json!({ "phone": phone, "type": 2 }),
        )
        .await?;
        Ok(())
    }

    /// Step 2: exchange the platform token for a one-time grant code.
    pub async fn request_grant(&self, platform_token: &str) -> ExchangeResult<String> {
        let data = self
            .post_identity(
                ExchangeStage::RequestGrant,
                "/user/oauth2/v2/grant",
                json!({
                    "token": platform_token,
                    "appCode": self.config.app_code,
                    "type": 0,
                }),
            )
            .await?;

        require_string(&data, "code", ExchangeStage::RequestGrant)
    }

    /// Step 3: redeem the grant code for the session credential pair.
    pub async fn redeem_grant(&self, grant_code: &str) -> ExchangeResult<CredentialParts> {
        let stage = ExchangeStage::RedeemGrant;
        let url = format!(
            "{}/api/v1/user/auth/generate_cred_by_code",
            self.config.skland_base_url
        );
        let request = HttpRequest::post(url, json!({ "kind": 1, "code": grant_code }))
            .headers(self.client_headers());

        let response = self.http.send(request).await.map_err(|e| ExchangeError::new(stage, e))?;
        let data = check_response(stage, &response, SuccessPredicate::CodeField)?;

        serde_json::from_value(data).map_err(|e| {
            ExchangeError::new(stage, ExchangeErrorKind::Malformed(e.to_string()))
        })
    }

    /// Step 4: enumerate game accounts bound to this session. Requires a
    /// signed request.
    pub async fn binding_lookup(
        &self,
        cred: &str,
        sign_token: &str,
    ) -> ExchangeResult<Vec<BindingCharacter>> {
        let stage = ExchangeStage::BindingLookup;
        let url = format!("{}/api/v1/game/player/binding", self.config.skland_base_url);

        let signed = skland_signing::signed_headers(
            cred,
            sign_token,
            "GET",
            &url,
            None,
            &self.config.platform,
            &self.config.client_version,
        )
        .map_err(|e| ExchangeError::new(stage, ExchangeErrorKind::Malformed(e.to_string())))?;

        let request = HttpRequest::get(url).headers(signed);
        let response = self.http.send(request).await.map_err(|e| ExchangeError::new(stage, e))?;
        let data = check_response(stage, &response, SuccessPredicate::CodeField)?;

        let bindings: BindingResponse = serde_json::from_value(data).map_err(|e| {
            ExchangeError::new(stage, ExchangeErrorKind::Malformed(e.to_string()))
        })?;

        Ok(bindings
            .list
            .into_iter()
            .find(|entry| entry.app_code == ARKNIGHTS_APP_CODE)
            .map(|entry| entry.binding_list)
            .unwrap_or_default())
    }

    /// Cheap validity probe for a session credential. Business rejection maps
    /// to `Ok(false)`; transport failures propagate so the caller can tell
    /// "invalid" apart from "unreachable".
    pub async fn check_cred(&self, cred: &str) -> ExchangeResult<bool> {
        let stage = ExchangeStage::CredCheck;
        let url = format!("{}/api/v1/user/check", self.config.skland_base_url);
        let request = HttpRequest::get(url)
            .headers(self.client_headers())
            .header("Cred", cred);

        let response = self.http.send(request).await.map_err(|e| ExchangeError::new(stage, e))?;
        match check_response(stage, &response, SuccessPredicate::CodeField) {
            Ok(_) => Ok(true),
            Err(ExchangeError {
                kind: ExchangeErrorKind::Business { code, message },
                ..
            }) => {
                debug!(code, message = %message, "cred check rejected");
                Ok(false)
            }
            Err(ExchangeError {
                kind: ExchangeErrorKind::Http { status },
                ..
            }) if status == 401 || status == 403 => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// POST to the Hypergryph identity service and unwrap its envelope.
    async fn post_identity(
        &self,
        stage: ExchangeStage,
        path: &str,
        body: Value,
    ) -> ExchangeResult<Value> {
        let url = format!("{}{}", self.config.hypergryph_base_url, path);
        let request = HttpRequest::post(url, body).headers(self.client_headers());

        let response = self.http.send(request).await.map_err(|e| ExchangeError::new(stage, e))?;
        check_response(stage, &response, SuccessPredicate::StatusField)
    }

    /// Client identity headers attached to every chain request.
    fn client_headers(&self) -> Vec<(String, String)> {
        vec![
            ("dId".to_string(), skland_signing::generate_device_id()),
            ("platform".to_string(), self.config.platform.clone()),
            ("vName".to_string(), self.config.client_version.clone()),
        ]
    }
}

/// Validate HTTP status and business discriminator, returning the `data`
/// payload on success.
fn check_response(
    stage: ExchangeStage,
    response: &HttpResponse,
    predicate: SuccessPredicate,
) -> ExchangeResult<Value> {
    if !response.is_success() {
        warn!(
            stage = %stage,
            status = response.status,
            body_summary = %summarize_response_body(&response.body.to_string()),
            "exchange step rejected at HTTP layer"
        );
        return Err(ExchangeError::new(
            stage,
            ExchangeErrorKind::Http {
                status: response.status,
            },
        ));
    }

    let envelope: Envelope = serde_json::from_value(response.body.clone()).map_err(|e| {
        ExchangeError::new(stage, ExchangeErrorKind::Malformed(e.to_string()))
    })?;

    match predicate.check(&envelope) {
        Ok(()) => Ok(envelope.data),
        Err(Some(code)) => Err(ExchangeError::new(
            stage,
            ExchangeErrorKind::Business {
                code,
                message: envelope.failure_message(),
            },
        )),
        Err(None) => Err(ExchangeError::new(
            stage,
            ExchangeErrorKind::Malformed("missing success discriminator".to_string()),
        )),
    }
}

fn require_string(data: &Value, field: &str, stage: ExchangeStage) -> ExchangeResult<String> {
    data.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            ExchangeError::new(
                stage,
                ExchangeErrorKind::Malformed(format!("missing `{}` in response data", field)),
            )
        })
}
