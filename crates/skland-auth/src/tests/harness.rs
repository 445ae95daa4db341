//! Shared test fixtures: a scripted HTTP transport and an orchestrator wired
//! to in-memory persistence.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde_json::{json, Value};
use skland_exchange::{ExchangeConfig, TokenExchangeChain};
use skland_session_store::{
    MemoryPersistence, PersistError, PersistResult, Persistence, SessionStore, SessionStoreConfig,
};
use skland_transport::{HttpClient, HttpRequest, HttpResponse, TransportError, TransportResult};

use crate::{AuthOrchestrator, AuthPolicy};

pub const PASSWORD_ROUTE: &str = "/user/auth/v1/token_by_phone_password";
pub const SMS_LOGIN_ROUTE: &str = "/user/auth/v2/token_by_phone_code";
pub const SMS_SEND_ROUTE: &str = "/general/v1/send_phone_code";
pub const GRANT_ROUTE: &str = "/user/oauth2/v2/grant";
pub const REDEEM_ROUTE: &str = "/api/v1/user/auth/generate_cred_by_code";
pub const BINDING_ROUTE: &str = "/api/v1/game/player/binding";
pub const CHECK_ROUTE: &str = "/api/v1/user/check";

/// Scripted transport. Requests are matched to routes by URL substring; each
/// route serves queued one-shot responses first, then its sticky response.
pub struct MockHttp {
    routes: Mutex<HashMap<&'static str, Route>>,
    delay: Mutex<Duration>,
}

#[derive(Default)]
struct Route {
    queue: VecDeque<TransportResult<HttpResponse>>,
    sticky: Option<TransportResult<HttpResponse>>,
    hits: usize,
}

impl MockHttp {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            routes: Mutex::new(HashMap::new()),
            delay: Mutex::new(Duration::ZERO),
        })
    }

    /// Serve `response` for every request whose URL contains `path`.
    pub fn route(&self, path: &'static str, response: TransportResult<HttpResponse>) {
        self.routes.lock().unwrap().entry(path).or_default().sticky = Some(response);
    }

    /// Serve `response` once, ahead of the sticky response.
    pub fn route_once(&self, path: &'static str, response: TransportResult<HttpResponse>) {
        self.routes
            .lock()
            .unwrap()
            .entry(path)
            .or_default()
            .queue
            .push_back(response);
    }

    /// Delay every response, so tests can overlap concurrent requests.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn hits(&self, path: &'static str) -> usize {
        self.routes
            .lock()
            .unwrap()
            .get(path)
            .map(|route| route.hits)
            .unwrap_or(0)
    }
}

impl HttpClient for MockHttp {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, TransportResult<HttpResponse>> {
        let delay = *self.delay.lock().unwrap();
        let result = {
            let mut routes = self.routes.lock().unwrap();
            let matched = routes
                .iter_mut()
                .find(|(path, _)| request.url.contains(**path));
            match matched {
                Some((_, route)) => {
                    route.hits += 1;
                    route
                        .queue
                        .pop_front()
                        .or_else(|| route.sticky.clone())
                        .unwrap_or_else(|| {
                            Err(TransportError::Request(format!(
                                "route for {} has no responses left",
                                request.url
                            )))
                        })
                }
                None => Err(TransportError::Request(format!(
                    "no route for {}",
                    request.url
                ))),
            }
        };
        Box::pin(async move {
            if delay > Duration::ZERO {
                tokio::time::sleep(delay).await;
            }
            result
        })
    }
}

/// Persistence backend whose every operation fails.
pub struct FailingPersistence;

impl Persistence for FailingPersistence {
    fn set(&self, _key: &str, _value: &str) -> PersistResult<()> {
        Err(PersistError::Backend("disk on fire".to_string()))
    }

    fn get(&self, _key: &str) -> PersistResult<Option<String>> {
        Err(PersistError::Backend("disk on fire".to_string()))
    }

    fn remove(&self, _key: &str) -> PersistResult<bool> {
        Err(PersistError::Backend("disk on fire".to_string()))
    }
}

pub fn ok_json(body: Value) -> TransportResult<HttpResponse> {
    Ok(HttpResponse {
        status: 200,
        headers: Vec::new(),
        body,
    })
}

pub fn transport_failure() -> TransportResult<HttpResponse> {
    Err(TransportError::Request("connection reset".to_string()))
}

/// Hypergryph-style business rejection (`status` discriminator).
pub fn status_rejection(status: i64, msg: &str) -> TransportResult<HttpResponse> {
    ok_json(json!({ "status": status, "msg": msg, "data": null }))
}

/// Skland-style business rejection (`code` discriminator).
pub fn code_rejection(code: i64, message: &str) -> TransportResult<HttpResponse> {
    ok_json(json!({ "code": code, "message": message }))
}

/// Script every step of the chain to succeed with the canonical fixture
/// values: platform token `tokA`, grant `grantB`, cred `credC`/`signD`,
/// account `id1`, one bound character `123`.
pub fn script_happy_chain(http: &MockHttp) {
    http.route(
        PASSWORD_ROUTE,
        ok_json(json!({ "status": 0, "msg": "OK", "data": { "token": "tokA" } })),
    );
    http.route(
        SMS_LOGIN_ROUTE,
        ok_json(json!({ "status": 0, "msg": "OK", "data": { "token": "tokA" } })),
    );
    http.route(
        SMS_SEND_ROUTE,
        ok_json(json!({ "status": 0, "msg": "OK", "data": {} })),
    );
    http.route(
        GRANT_ROUTE,
        ok_json(json!({ "status": 0, "msg": "OK", "data": { "code": "grantB" } })),
    );
    http.route(
        REDEEM_ROUTE,
        ok_json(json!({
            "code": 0,
            "message": "OK",
            "data": { "cred": "credC", "token": "signD", "userId": "id1" },
        })),
    );
    http.route(
        BINDING_ROUTE,
        ok_json(json!({
            "code": 0,
            "data": {
                "list": [{
                    "appCode": "arknights",
                    "bindingList": [
                        { "uid": "123", "isDefault": true, "nickName": "Doctor" },
                    ],
                }],
            },
        })),
    );
    http.route(CHECK_ROUTE, ok_json(json!({ "code": 0, "data": {} })));
}

/// An orchestrator plus handles to everything behind it.
pub struct TestAuth {
    pub http: Arc<MockHttp>,
    pub orchestrator: AuthOrchestrator,
    pub store: SessionStore,
    pub persistence: Arc<MemoryPersistence>,
}

pub fn auth_fixture() -> TestAuth {
    auth_fixture_with(MockHttp::new())
}

pub fn auth_fixture_with(http: Arc<MockHttp>) -> TestAuth {
    let persistence = Arc::new(MemoryPersistence::new());
    let store = SessionStore::new(persistence.clone(), SessionStoreConfig::default());
    let chain = TokenExchangeChain::new(http.clone(), ExchangeConfig::default());
    let orchestrator = AuthOrchestrator::new(chain, store.clone(), AuthPolicy::default());
    TestAuth {
        http,
        orchestrator,
        store,
        persistence,
    }
}

/// Fixture over an arbitrary persistence backend (no direct handle kept).
pub fn auth_fixture_over(http: Arc<MockHttp>, persistence: Arc<dyn Persistence>) -> AuthOrchestrator {
    let store = SessionStore::new(persistence, SessionStoreConfig::default());
    let chain = TokenExchangeChain::new(http, ExchangeConfig::default());
    AuthOrchestrator::new(chain, store, AuthPolicy::default())
}

/// Let spawned background work (restore revalidation, detached refreshes)
/// run to completion under the paused clock.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    // Auto-advance past any pending retry delays or debounce windows.
    tokio::time::sleep(Duration::from_secs(5)).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
