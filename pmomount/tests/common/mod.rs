#![allow(dead_code)]

use async_trait::async_trait;
use axum::http::{HeaderMap, Method};
use pmomount::{
    Authorizer, ChangeNotifier, MediaBackend, MediaItem, MediaResource, MountRequest,
    ResourceReader,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

pub const REMOTE: &str = "192.168.1.20:50000";
pub const LOCAL: &str = "192.168.1.5:8080";

/// Ressource en mémoire
#[derive(Debug)]
pub struct MemResource {
    pub mime: &'static str,
    pub data: Vec<u8>,
}

#[async_trait]
impl MediaResource for MemResource {
    fn content_type(&self) -> &str {
        self.mime
    }

    fn size(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }

    async fn open(&self) -> std::io::Result<Box<dyn ResourceReader>> {
        Ok(Box::new(std::io::Cursor::new(self.data.clone())))
    }
}

/// Ressource sur disque
#[derive(Debug)]
pub struct DiskFile {
    pub mime: &'static str,
    pub path: PathBuf,
}

#[async_trait]
impl MediaResource for DiskFile {
    fn content_type(&self) -> &str {
        self.mime
    }

    fn size(&self) -> Option<u64> {
        std::fs::metadata(&self.path).ok().map(|m| m.len())
    }

    async fn open(&self) -> std::io::Result<Box<dyn ResourceReader>> {
        Ok(Box::new(tokio::fs::File::open(&self.path).await?))
    }
}

#[derive(Debug, Default)]
pub struct FakeItem {
    pub id: String,
    pub title: String,
    pub parent: Option<String>,
    pub children: Vec<Arc<dyn MediaItem>>,
    pub content: Option<Arc<dyn MediaResource>>,
    pub cover: Option<Arc<dyn MediaResource>>,
    pub subtitle: Option<Arc<dyn MediaResource>>,
}

impl MediaItem for FakeItem {
    fn id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn parent_id(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    fn is_container(&self) -> bool {
        !self.children.is_empty()
    }

    fn children(&self) -> Vec<Arc<dyn MediaItem>> {
        self.children.clone()
    }

    fn content(&self) -> Option<Arc<dyn MediaResource>> {
        self.content.clone()
    }

    fn cover(&self) -> Option<Arc<dyn MediaResource>> {
        self.cover.clone()
    }

    fn subtitle(&self) -> Option<Arc<dyn MediaResource>> {
        self.subtitle.clone()
    }
}

pub struct DenyAll;

impl Authorizer for DenyAll {
    fn authorize(&self, _: &HeaderMap, _: SocketAddr, _: Option<&str>) -> bool {
        false
    }
}

/// Backend de test qui compte les résolutions d'items.
pub struct FakeBackend {
    pub name: String,
    pub uuid: Uuid,
    pub items: HashMap<String, Arc<dyn MediaItem>>,
    pub authorizer: Option<Arc<dyn Authorizer>>,
    pub notifier: Option<ChangeNotifier>,
    pub lookups: AtomicUsize,
}

impl FakeBackend {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            uuid: Uuid::new_v4(),
            items: HashMap::new(),
            authorizer: None,
            notifier: Some(ChangeNotifier::new()),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn with_item(mut self, item: FakeItem) -> Self {
        self.items.insert(item.id.clone(), Arc::new(item));
        self
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl MediaBackend for FakeBackend {
    fn friendly_name(&self) -> &str {
        &self.name
    }

    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn authorizer(&self) -> Option<Arc<dyn Authorizer>> {
        self.authorizer.clone()
    }

    fn get_item(&self, id: &str) -> Option<Arc<dyn MediaItem>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.items.get(id).cloned()
    }

    fn change_notifier(&self) -> Option<&ChangeNotifier> {
        self.notifier.as_ref()
    }
}

/// Bibliothèque : racine "0" avec un morceau "7" (contenu seul) et un film "8"
/// (contenu, couverture, sous-titres).
pub fn library() -> FakeBackend {
    let track = FakeItem {
        id: "7".into(),
        title: "Track seven".into(),
        parent: Some("0".into()),
        content: Some(Arc::new(MemResource {
            mime: "audio/mpeg",
            data: b"0123456789".to_vec(),
        })),
        ..Default::default()
    };
    let movie = FakeItem {
        id: "8".into(),
        title: "Movie".into(),
        parent: Some("0".into()),
        content: Some(Arc::new(MemResource {
            mime: "video/mp4",
            data: vec![0u8; 32],
        })),
        cover: Some(Arc::new(MemResource {
            mime: "image/jpeg",
            data: b"jpeg".to_vec(),
        })),
        subtitle: Some(Arc::new(MemResource {
            mime: "text/srt",
            data: b"1\n00:00:01,000 --> 00:00:02,000\nHi\n".to_vec(),
        })),
        ..Default::default()
    };
    let track: Arc<dyn MediaItem> = Arc::new(track);
    let movie: Arc<dyn MediaItem> = Arc::new(movie);
    let root = FakeItem {
        id: "0".into(),
        title: "Library".into(),
        children: vec![track.clone(), movie.clone()],
        ..Default::default()
    };

    let mut backend = FakeBackend::new("Library").with_item(root);
    backend.items.insert("7".into(), track);
    backend.items.insert("8".into(), movie);
    backend
}

pub fn request(method: Method, path: &str) -> MountRequest {
    MountRequest::new(
        method,
        path,
        REMOTE.parse().unwrap(),
        LOCAL.parse().unwrap(),
    )
}

pub fn get(path: &str) -> MountRequest {
    request(Method::GET, path)
}

pub fn no_mac(_: std::net::IpAddr) -> Option<String> {
    None
}

pub async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8_lossy(&bytes).into_owned()
}

pub fn soap_envelope(action: &str, args: &[(&str, &str)]) -> String {
    let args: String = args
        .iter()
        .map(|(k, v)| format!("<{k}>{v}</{k}>"))
        .collect();
    format!(
        r#"<?xml version="1.0"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">
  <s:Body>
    <u:{action} xmlns:u="urn:schemas-upnp-org:service:ContentDirectory:1">{args}</u:{action}>
  </s:Body>
</s:Envelope>"#
    )
}
