//! Integration tests for armature-hybrid-session

use armature_hybrid_session::database_store::entity;
use armature_hybrid_session::*;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, EntityTrait, PaginatorTrait};
use std::sync::Arc;

const NOW: i64 = 1_268_654_400;
const SESSION_ID: &str = "abc123";
const DATA: &[u8] = br#"{"color":"red"}"#;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn sqlite() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).min_connections(1).sqlx_logging(false);
    Database::connect(options).await.unwrap()
}

struct Site {
    config: HybridSessionConfig,
    jar: Arc<MemoryCookieJar>,
    conn: DatabaseConnection,
    clock: MockClock,
}

impl Site {
    async fn new(config: HybridSessionConfig) -> Self {
        init_tracing();
        let conn = sqlite().await;
        let clock = MockClock::new(NOW);
        let installer = DatabaseStore::new(conn.clone(), &config, Arc::new(clock.clone())).unwrap();
        installer.install_schema().await.unwrap();

        Self {
            config,
            jar: Arc::new(MemoryCookieJar::new()),
            conn,
            clock,
        }
    }

    fn session(&self) -> HybridSession {
        HybridSession::from_config(
            &self.config,
            self.jar.clone(),
            Some(self.conn.clone()),
            Arc::new(self.clock.clone()),
        )
        .unwrap()
    }

    /// Run one request: open, read, optionally write, close.
    async fn request(&self, write: Option<&[u8]>) -> Option<Vec<u8>> {
        self.jar.next_request();
        let mut session = self.session();

        assert!(session.open("", "SESSID").await.unwrap());
        let data = session.read(SESSION_ID).await.unwrap();
        if let Some(payload) = write {
            assert!(session.write(SESSION_ID, payload).await.unwrap());
        }
        assert!(session.close().await.unwrap());

        data
    }

    async fn rows(&self) -> u64 {
        entity::Entity::find().count(&self.conn).await.unwrap()
    }
}

fn config() -> HybridSessionConfig {
    HybridSessionConfig::new("site-secret").with_gc_max_lifetime(1440)
}

#[tokio::test]
async fn test_cookie_round_trip_across_requests() {
    let site = Site::new(config()).await;

    assert_eq!(site.request(Some(DATA)).await, None);
    assert!(site.jar.outgoing("SESSID_2").is_some());
    assert_eq!(site.rows().await, 0);

    assert_eq!(site.request(Some(DATA)).await, Some(DATA.to_vec()));
}

#[tokio::test]
async fn test_cookie_session_expires() {
    let site = Site::new(config()).await;

    site.request(Some(DATA)).await;
    site.clock.advance(1441);

    assert_eq!(site.request(None).await, None);
}

#[tokio::test]
async fn test_headers_sent_falls_back_to_database() {
    let site = Site::new(config()).await;

    site.jar.next_request();
    let mut session = site.session();
    session.open("", "SESSID").await.unwrap();
    site.jar.set_headers_sent(true);
    assert!(session.write(SESSION_ID, DATA).await.unwrap());
    session.close().await.unwrap();

    assert!(site.jar.outgoing("SESSID_2").is_none());
    assert_eq!(site.rows().await, 1);

    assert_eq!(site.request(None).await, Some(DATA.to_vec()));
}

#[tokio::test]
async fn test_oversized_session_falls_back_to_database() {
    let site = Site::new(config().with_cookie_max_length(256)).await;
    let large = vec![b'x'; 2000];

    site.request(Some(large.as_slice())).await;

    let cookie = site.jar.outgoing("SESSID_2").unwrap();
    assert!(cookie.expired);
    assert_eq!(site.rows().await, 1);

    assert_eq!(site.request(None).await, Some(large));
}

#[tokio::test]
async fn test_database_session_expires() {
    let site = Site::new(config().with_cookie_max_length(16)).await;

    site.request(Some(DATA)).await;
    assert_eq!(site.rows().await, 1);

    site.clock.advance(1440);
    assert_eq!(site.request(None).await, Some(DATA.to_vec()));

    site.clock.advance(1441);
    assert_eq!(site.request(None).await, None);
}

#[tokio::test]
async fn test_cookie_shadows_stale_database_row() {
    let site = Site::new(config().with_cookie_max_length(128)).await;
    let large = vec![b'y'; 100];

    site.request(Some(large.as_slice())).await;
    assert_eq!(site.rows().await, 1);

    // Small enough for the cookie; the row is left behind.
    site.request(Some(b"small".as_slice())).await;
    assert_eq!(site.rows().await, 1);

    assert_eq!(site.request(None).await, Some(b"small".to_vec()));
}

#[tokio::test]
async fn test_missing_key_uses_database_only() {
    let site = Site::new(HybridSessionConfig::default()).await;

    site.request(Some(DATA)).await;
    assert!(site.jar.outgoing("SESSID_2").is_none());
    assert_eq!(site.rows().await, 1);

    assert_eq!(site.request(None).await, Some(DATA.to_vec()));
}

#[tokio::test]
async fn test_destroy_clears_every_backend() {
    let site = Site::new(config()).await;
    site.request(Some(DATA)).await;

    site.jar.next_request();
    let mut session = site.session();
    session.open("", "SESSID").await.unwrap();
    assert!(session.destroy(SESSION_ID).await.unwrap());
    session.close().await.unwrap();

    assert!(site.jar.outgoing("SESSID_2").unwrap().expired);
    assert_eq!(site.request(None).await, None);
}

#[tokio::test]
async fn test_gc_reaches_every_backend() {
    let site = Site::new(config().with_cookie_max_length(16)).await;
    site.request(Some(DATA)).await;
    site.clock.advance(1441);

    let mut session = site.session();
    assert_eq!(session.gc(1440).await.unwrap(), Some(2));
    assert_eq!(site.rows().await, 0);
}

#[tokio::test]
async fn test_backend_order_follows_config() {
    let site = Site::new(config().with_backends(vec![BackendKind::Database, BackendKind::Cookie])).await;
    let session = site.session();

    let names: Vec<_> = session.handlers().iter().map(|h| h.name()).collect();
    assert_eq!(names, vec!["database", "cookie"]);

    site.request(Some(DATA)).await;
    assert_eq!(site.rows().await, 1);
    assert!(site.jar.outgoing("SESSID_2").is_none());
}

#[tokio::test]
async fn test_database_backend_requires_connection() {
    let result = HybridSession::from_config(
        &config(),
        Arc::new(MemoryCookieJar::new()),
        None,
        SystemClock::shared(),
    );
    assert!(matches!(result, Err(SessionError::Config(_))));
}

#[test]
fn test_cookie_only_config() {
    let config = config().with_backends(vec![BackendKind::Cookie]);
    let session = HybridSession::from_config(
        &config,
        Arc::new(MemoryCookieJar::new()),
        None,
        SystemClock::shared(),
    )
    .unwrap();

    assert_eq!(session.handlers().len(), 1);
    assert!(session.has_key());
}
