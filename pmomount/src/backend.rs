//! Contrats consommés par un montage : backend, items et ressources.
//!
//! Un item est une poignée opaque dont les capacités (contenu streamable,
//! couverture, sous-titres) s'interrogent indépendamment. Le routeur vérifie
//! la capacité demandée et répond `NotFound` si elle est absente.

use async_trait::async_trait;
use axum::http::HeaderMap;
use std::fmt::Debug;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncSeek};
use uuid::Uuid;

use crate::notify::ChangeNotifier;

/// Flux de lecture d'une ressource, positionnable pour les requêtes `Range`.
pub trait ResourceReader: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T: AsyncRead + AsyncSeek + Send + Unpin> ResourceReader for T {}

/// Ressource binaire servie telle quelle (fichier, couverture, sous-titre).
#[async_trait]
pub trait MediaResource: Debug + Send + Sync {
    /// Type MIME annoncé au client.
    fn content_type(&self) -> &str;

    /// Taille en octets si connue ; sans taille, les plages sont ignorées.
    fn size(&self) -> Option<u64>;

    /// Ouvre un lecteur neuf. Le lecteur est fermé quand il est abandonné.
    async fn open(&self) -> std::io::Result<Box<dyn ResourceReader>>;
}

/// Poignée opaque sur un objet du contenu d'un backend.
pub trait MediaItem: Debug + Send + Sync {
    fn id(&self) -> &str;

    fn title(&self) -> &str;

    /// Identifiant du parent, `None` pour la racine.
    fn parent_id(&self) -> Option<&str> {
        None
    }

    fn is_container(&self) -> bool {
        false
    }

    fn children(&self) -> Vec<Arc<dyn MediaItem>> {
        Vec::new()
    }

    /// Capacité "contenu streamable".
    fn content(&self) -> Option<Arc<dyn MediaResource>> {
        None
    }

    /// Capacité "image de couverture".
    fn cover(&self) -> Option<Arc<dyn MediaResource>> {
        None
    }

    /// Capacité "sous-titres".
    fn subtitle(&self) -> Option<Arc<dyn MediaResource>> {
        None
    }
}

/// Politique d'autorisation d'un backend.
///
/// `mac` est l'adresse matérielle du pair si elle a pu être résolue.
pub trait Authorizer: Send + Sync {
    fn authorize(&self, headers: &HeaderMap, remote: SocketAddr, mac: Option<&str>) -> bool;
}

/// Backend de médias exposé par un montage.
pub trait MediaBackend: Send + Sync {
    fn friendly_name(&self) -> &str;

    /// Identifiant par défaut du device.
    fn uuid(&self) -> Uuid;

    /// `None` signifie "tout autoriser".
    fn authorizer(&self) -> Option<Arc<dyn Authorizer>> {
        None
    }

    fn get_item(&self, id: &str) -> Option<Arc<dyn MediaItem>>;

    /// Notifications de changement de contenu, pour les backends volatils.
    fn change_notifier(&self) -> Option<&ChangeNotifier> {
        None
    }
}
