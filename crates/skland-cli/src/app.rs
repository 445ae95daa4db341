//! Command implementations: wire the transport, store, and orchestrator
//! together and drive them from the parsed CLI.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use skland_auth::{AuthOrchestrator, AuthPolicy};
use skland_config_and_utils::{Config, Paths};
use skland_exchange::{BindingCharacter, ExchangeConfig, TokenExchangeChain};
use skland_session_store::{FilePersistence, SessionStore, SessionStoreConfig};
use skland_transport::ReqwestClient;

/// Build the production orchestrator: reqwest transport, file-backed session
/// store under the base directory, and policy from config.
pub fn build_orchestrator(config: &Config, paths: &Paths) -> anyhow::Result<AuthOrchestrator> {
    paths.ensure_dirs()?;

    let client = ReqwestClient::new(Duration::from_secs(config.request_timeout_secs))
        .context("failed to build HTTP client")?;
    let chain = TokenExchangeChain::new(Arc::new(client), ExchangeConfig::from(config));

    let persistence = Arc::new(FilePersistence::new(paths.session_file()));
    let store = SessionStore::new(
        persistence,
        SessionStoreConfig {
            expiry: Duration::from_secs(config.session_expiry_days * 24 * 60 * 60),
            debounce: Duration::from_millis(config.save_debounce_ms),
        },
    );

    Ok(AuthOrchestrator::new(chain, store, AuthPolicy::from(config)))
}

pub async fn login(
    orchestrator: &AuthOrchestrator,
    phone: &str,
    password: Option<String>,
    code: Option<String>,
) -> anyhow::Result<()> {
    let bindings = match (password, code) {
        (Some(password), None) => orchestrator.login_with_password(phone, &password).await?,
        (None, Some(code)) => orchestrator.login_with_sms_code(phone, &code).await?,
        _ => bail!("provide exactly one of --password or --code"),
    };

    println!("Logged in as account {}", orchestrator.account_id().unwrap_or_default());
    print_bindings(&bindings);
    Ok(())
}

pub async fn send_code(orchestrator: &AuthOrchestrator, phone: &str) -> anyhow::Result<()> {
    orchestrator.send_sms_code(phone).await?;
    println!("Verification code sent to {}", phone);
    Ok(())
}

pub async fn status(orchestrator: &AuthOrchestrator) -> anyhow::Result<()> {
    let restored = orchestrator.restore().await?;
    println!("Session:    {}", orchestrator.state());
    println!("Credential: {}", orchestrator.credential_state());

    if restored {
        if let Some(account_id) = orchestrator.account_id() {
            println!("Account:    {}", account_id);
        }
        print_bindings(&orchestrator.bindings());
    } else {
        println!("No session. Log in with `skland login`.");
    }
    Ok(())
}

pub async fn check(orchestrator: &AuthOrchestrator) -> anyhow::Result<()> {
    if !orchestrator.restore().await? {
        bail!("no session to check; log in first");
    }
    if orchestrator.verify_session().await? {
        println!("Session is valid.");
        Ok(())
    } else {
        bail!("session was rejected by the service and has been cleared")
    }
}

pub async fn sign(
    orchestrator: &AuthOrchestrator,
    method: &str,
    url: &str,
    body: Option<&str>,
) -> anyhow::Result<()> {
    if !orchestrator.restore().await? {
        bail!("no session; log in first");
    }

    let body = body
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()
        .context("request body is not valid JSON")?;

    let headers = orchestrator
        .signed_request_headers(method, url, body.as_ref())
        .await?;
    for (name, value) in headers {
        println!("{}: {}", name, value);
    }
    Ok(())
}

pub async fn logout(orchestrator: &AuthOrchestrator) -> anyhow::Result<()> {
    orchestrator.logout().await?;
    println!("Logged out.");
    Ok(())
}

fn print_bindings(bindings: &[BindingCharacter]) {
    if bindings.is_empty() {
        println!("No bound game accounts.");
        return;
    }
    println!("Bound game accounts:");
    for binding in bindings {
        let default = if binding.is_default { " (default)" } else { "" };
        println!(
            "  {} {} [{}]{}",
            binding.uid, binding.nick_name, binding.channel_name, default
        );
    }
}
