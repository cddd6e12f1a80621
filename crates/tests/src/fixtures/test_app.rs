use std::net::SocketAddr;
use std::sync::Arc;

use bson::{DateTime, oid::ObjectId};
use studyroom_api::{build_router, state::AppState};
use studyroom_config::Settings;
use studyroom_db::models::UserRole;
use studyroom_services::dao::MemoryMessageStore;
use studyroom_services::{Clock, Identity, JwtIdentityLookup, ManualClock, SystemClock};
use tokio::net::TcpListener;

/// The chat API served in-process on an ephemeral port, backed by the
/// in-memory store.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    pub state: AppState,
    pub store: Arc<MemoryMessageStore>,
    jwt: Arc<JwtIdentityLookup>,
}

pub struct TestUser {
    pub identity: Identity,
    pub access_token: String,
}

impl TestUser {
    pub fn id(&self) -> String {
        self.identity.id.to_hex()
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_clock(Arc::new(SystemClock)).await
    }

    /// Starts the app with a clock the test controls.
    pub async fn spawn_manual_clock() -> (Self, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(DateTime::now()));
        let app = Self::spawn_with_clock(clock.clone()).await;
        (app, clock)
    }

    pub async fn spawn_with_clock(clock: Arc<dyn Clock>) -> Self {
        let mut settings = Settings::default();
        settings.jwt.secret = "test-secret".to_string();
        settings.chat.sweep_interval_secs = 0;

        let store = Arc::new(MemoryMessageStore::new());
        let jwt = Arc::new(JwtIdentityLookup::new(&settings.jwt));
        let state = AppState::new(settings, store.clone(), jwt.clone(), clock);
        let app = build_router(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            client: reqwest::Client::new(),
            state,
            store,
            jwt,
        }
    }

    pub fn user(&self, name: &str) -> TestUser {
        self.issue(name, UserRole::User)
    }

    pub fn admin(&self, name: &str) -> TestUser {
        self.issue(name, UserRole::Admin)
    }

    fn issue(&self, name: &str, role: UserRole) -> TestUser {
        let identity = Identity {
            id: ObjectId::new(),
            name: name.to_string(),
            role,
        };
        let access_token = self.jwt.issue(&identity).unwrap();
        TestUser {
            identity,
            access_token,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn auth_get(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path)).bearer_auth(token)
    }

    pub fn auth_post(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client.post(self.url(path)).bearer_auth(token)
    }

    pub fn auth_put(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client.put(self.url(path)).bearer_auth(token)
    }

    pub fn auth_delete(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client.delete(self.url(path)).bearer_auth(token)
    }

    /// Posts a message over HTTP and returns the created message JSON.
    pub async fn send_message(&self, user: &TestUser, content: &str) -> serde_json::Value {
        let resp = self
            .auth_post("/api/messages", &user.access_token)
            .json(&serde_json::json!({ "content": content }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 201, "Failed to create message");
        resp.json().await.unwrap()
    }
}
