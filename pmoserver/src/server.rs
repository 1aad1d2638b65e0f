//! # Module Server - Listener HTTP des montages DLNA
//!
//! Un seul listener Axum sert tous les montages enregistrés. Chaque requête
//! est confiée au premier montage dont le préfixe couvre son chemin ; les
//! routes propres au serveur (`/info`, logs) sont enregistrées à côté.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{ConnectInfo, Request, State, connect_info::Connected},
    handler::Handler,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    serve::IncomingStream,
};
use parking_lot::RwLock as SyncRwLock;
use pmoconfig::get_config;
use pmomount::{MediaBackend, Mount, MountRequest};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{net::TcpListener, signal, sync::RwLock, task::JoinHandle};
use tracing::{debug, error, info, warn};

use crate::logs::{LogState, create_logs_router, init_logging, log_dump};

/// Taille maximale d'un corps de requête transmis à un montage.
pub const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Extrémités d'une connexion acceptée.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionInfo {
    pub remote: SocketAddr,
    pub local: SocketAddr,
}

impl Connected<IncomingStream<'_, TcpListener>> for ConnectionInfo {
    fn connect_info(stream: IncomingStream<'_, TcpListener>) -> Self {
        let remote = *stream.remote_addr();
        let local = stream
            .io()
            .local_addr()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 0)));
        Self { remote, local }
    }
}

/// Montages enregistrés, dans l'ordre d'enregistrement.
#[derive(Clone, Default)]
pub struct MountTable {
    mounts: Arc<SyncRwLock<Vec<Arc<Mount>>>>,
}

impl MountTable {
    pub fn add(&self, mount: Arc<Mount>) {
        self.mounts.write().push(mount);
    }

    /// Premier montage dont le préfixe couvre `path`.
    pub fn find(&self, path: &str) -> Option<Arc<Mount>> {
        self.mounts
            .read()
            .iter()
            .find(|m| path.starts_with(m.prefix()) || path == m.prefix().trim_end_matches('/'))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.mounts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.read().is_empty()
    }

    pub fn infos(&self) -> Vec<MountInfo> {
        self.mounts
            .read()
            .iter()
            .map(|m| MountInfo {
                name: m.friendly_name().to_string(),
                uuid: m.uuid().to_string(),
                prefix: m.prefix().to_string(),
                descriptor: m.descriptor_uri(),
                revision: m.revision(),
            })
            .collect()
    }
}

/// Description d'un montage renvoyée par `/info`
#[derive(Debug, Clone, Serialize)]
pub struct MountInfo {
    pub name: String,
    pub uuid: String,
    pub prefix: String,
    pub descriptor: String,
    pub revision: u32,
}

async fn dispatch(
    State(mounts): State<MountTable>,
    ConnectInfo(conn): ConnectInfo<ConnectionInfo>,
    request: Request,
) -> Response {
    let (parts, body) = request.into_parts();
    let path = parts.uri.path().to_string();

    let Some(mount) = mounts.find(&path) else {
        debug!(path = %path, remote = %conn.remote, "No mount for path");
        return StatusCode::NOT_FOUND.into_response();
    };

    let body: Bytes = match axum::body::to_bytes(body, MAX_BODY_SIZE).await {
        Ok(body) => body,
        Err(e) => {
            warn!(path = %path, error = %e, "Rejected request body");
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }
    };

    let request = MountRequest {
        method: parts.method,
        path,
        headers: parts.headers,
        remote: conn.remote,
        local: conn.local,
        body,
    };

    match mount.handle(request).await {
        Ok(response) => response.into_http().await,
        Err(e) => e.into_response(),
    }
}

async fn mounts_info(State(mounts): State<MountTable>) -> Json<Vec<MountInfo>> {
    Json(mounts.infos())
}

/// Serveur principal
pub struct Server {
    name: String,
    base_url: String,
    http_port: u16,
    router: Arc<RwLock<Router>>,
    mounts: MountTable,
    join_handle: Option<JoinHandle<()>>,
}

impl Server {
    /// Crée une nouvelle instance de serveur
    ///
    /// # Arguments
    ///
    /// * `name` - Nom du serveur (pour les logs)
    /// * `base_url` - Adresse annoncée (ex: "192.168.1.5")
    /// * `http_port` - Port HTTP à écouter
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, http_port: u16) -> Self {
        let mounts = MountTable::default();
        let info_route = Router::new()
            .route("/info", get(mounts_info))
            .with_state(mounts.clone());

        Self {
            name: name.into(),
            base_url: base_url.into(),
            http_port,
            router: Arc::new(RwLock::new(info_route)),
            mounts,
            join_handle: None,
        }
    }

    /// Enregistre un montage ; ses requêtes lui sont transmises telles quelles.
    pub fn add_mount(&mut self, mount: Arc<Mount>) {
        info!(
            prefix = mount.prefix(),
            name = mount.friendly_name(),
            "Serving http://{}:{}{}",
            self.base_url,
            self.http_port,
            mount.descriptor_uri()
        );
        self.mounts.add(mount);
    }

    pub fn mounts(&self) -> &MountTable {
        &self.mounts
    }

    /// Ajoute un handler GET avec état
    pub async fn add_handler_with_state<H, T, S>(&mut self, path: &str, handler: H, state: S)
    where
        H: Handler<T, S> + Clone + 'static,
        T: 'static,
        S: Clone + Send + Sync + 'static,
    {
        let route = Router::new().route(path, get(handler)).with_state(state);

        let mut r = self.router.write().await;
        *r = std::mem::take(&mut *r).merge(route);
    }

    /// Monte un sous-router sous `path`
    pub async fn add_router(&mut self, path: &str, sub_router: Router) {
        let normalized = format!("/{}", path.trim_start_matches('/'));
        let mut r = self.router.write().await;
        *r = std::mem::take(&mut *r).nest(&normalized, sub_router);
    }

    /// Application complète : routes du serveur puis montages en repli.
    pub async fn app(&self) -> Router {
        let dispatcher = Router::new()
            .fallback(dispatch)
            .with_state(self.mounts.clone());
        self.router.read().await.clone().merge(dispatcher)
    }

    /// Démarre le serveur HTTP
    ///
    /// Lie le port configuré, lance le service et un watcher Ctrl+C.
    /// Retourne l'adresse effectivement liée.
    pub async fn start(&mut self) -> std::io::Result<SocketAddr> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.http_port));
        let listener = TcpListener::bind(addr).await?;
        let bound = listener.local_addr()?;
        info!(
            "Server {} running at http://{}:{} ({} mounts)",
            self.name,
            self.base_url,
            bound.port(),
            self.mounts.len()
        );

        let app = self.app().await;
        let server_task = tokio::spawn(async move {
            let service = app.into_make_service_with_connect_info::<ConnectionInfo>();
            if let Err(e) = axum::serve(listener, service).await {
                error!(error = %e, "HTTP server stopped");
            }
        });

        let shutdown_task = tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => info!("Ctrl+C reçu, arrêt gracieux"),
                Err(e) => {
                    error!(error = %e, "Failed to listen for Ctrl+C");
                    std::future::pending::<()>().await;
                }
            }
        });

        self.join_handle = Some(tokio::spawn(async move {
            tokio::select! {
                _ = server_task => {},
                _ = shutdown_task => {},
            }
        }));

        Ok(bound)
    }

    /// Attend la fin du serveur
    pub async fn wait(&mut self) {
        if let Some(h) = self.join_handle.take() {
            let _ = h.await;
        }
    }

    /// Initialise le système de logging et enregistre les routes de logs
    ///
    /// Routes : `/log-dump` et `/api/log_setup`.
    pub async fn init_logging(&mut self) -> LogState {
        let log_state = init_logging();

        self.add_handler_with_state("/log-dump", log_dump, log_state.clone())
            .await;
        self.add_router("/api", create_logs_router(log_state.clone()))
            .await;
        log_state
    }
}

/// Builder pattern
pub struct ServerBuilder {
    name: String,
    base_url: String,
    http_port: u16,
}

impl ServerBuilder {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, http_port: u16) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            http_port,
        }
    }

    pub fn new_configured() -> Self {
        let config = get_config();
        Self {
            name: "PMODLNA".to_string(),
            base_url: config.get_base_url(),
            http_port: config.get_http_port(),
        }
    }

    /// Construit le serveur
    pub fn build(self) -> Server {
        Server::new(self.name, self.base_url, self.http_port)
    }
}
