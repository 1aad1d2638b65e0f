//! Montage d'un backend sous un préfixe HTTP unique (`/mm-<n>/`).
//!
//! Un [`Mount`] présente son backend comme un device UPnP distinct :
//! il génère la description du device, route les requêtes sous son préfixe
//! et invalide ses caches quand le backend annonce un changement de contenu.
//!
//! ```ignore
//! let mount = MountBuilder::new(backend).product_tag("pmodlna").build()?;
//! server.add_mount(Arc::new(mount));
//! ```

use axum::http::{Method, StatusCode, header};
use parking_lot::Mutex;
use std::io::Cursor;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, info, warn};
use uuid::Uuid;
use xmltree::Element;

use crate::auth::{MacLookup, check_authorization};
use crate::backend::{Authorizer, MediaBackend, MediaItem, MediaResource};
use crate::control::{ContentDirectoryControl, ControlContext, ControlHandler};
use crate::descriptor::{
    CONTENT_DIRECTORY_SCHEMA, DescriptorFields, DescriptorGenerator, Resources,
};
use crate::error::MountError;
use crate::identity::AddressIdentities;
use crate::index::{HtmlIndex, IndexRenderer};
use crate::notify::{ChangeNotifier, Subscription};
use crate::request::MountRequest;
use crate::response::{ItemResponse, MountResponse, TransferMode, XML_CONTENT_TYPE};
use crate::state::MountState;

/// Compteur des préfixes, partagé par tous les montages du processus.
static MOUNT_COUNTER: AtomicU32 = AtomicU32::new(0);

fn next_prefix() -> String {
    let n = MOUNT_COUNTER.fetch_add(1, Ordering::SeqCst) + 1;
    format!("/mm-{}/", n)
}

/// Tag produit ajouté au nom affiché par défaut.
pub const DEFAULT_PRODUCT_TAG: &str = "pmodlna";

/// Construction d'un [`Mount`].
pub struct MountBuilder {
    backend: Arc<dyn MediaBackend>,
    product_tag: String,
    model_number: String,
    control: Arc<dyn ControlHandler>,
    index: Arc<dyn IndexRenderer>,
    template: Option<Vec<u8>>,
    mac_lookup: MacLookup,
}

impl MountBuilder {
    pub fn new(backend: Arc<dyn MediaBackend>) -> Self {
        Self {
            backend,
            product_tag: DEFAULT_PRODUCT_TAG.to_string(),
            model_number: env!("CARGO_PKG_VERSION").to_string(),
            control: Arc::new(ContentDirectoryControl::new()),
            index: Arc::new(HtmlIndex),
            template: None,
            mac_lookup: pmoutils::lookup_mac,
        }
    }

    pub fn product_tag(mut self, tag: impl Into<String>) -> Self {
        self.product_tag = tag.into();
        self
    }

    /// Version annoncée dans `modelNumber`.
    pub fn model_number(mut self, version: impl Into<String>) -> Self {
        self.model_number = version.into();
        self
    }

    pub fn control(mut self, handler: Arc<dyn ControlHandler>) -> Self {
        self.control = handler;
        self
    }

    pub fn index(mut self, renderer: Arc<dyn IndexRenderer>) -> Self {
        self.index = renderer;
        self
    }

    /// Remplace le modèle de description embarqué.
    pub fn template(mut self, xml: impl Into<Vec<u8>>) -> Self {
        self.template = Some(xml.into());
        self
    }

    pub fn mac_lookup(mut self, lookup: MacLookup) -> Self {
        self.mac_lookup = lookup;
        self
    }

    /// Valide les ressources, attribue le préfixe et s'abonne aux changements.
    ///
    /// # Errors
    ///
    /// [`MountError::Configuration`] si le modèle de description ou le schéma
    /// ContentDirectory est absent ou mal formé.
    pub fn build(self) -> Result<Mount, MountError> {
        let descriptor = match &self.template {
            Some(xml) => DescriptorGenerator::from_template(xml)?,
            None => DescriptorGenerator::bundled()?,
        };
        validate_schema()?;

        let prefix = next_prefix();
        let state = Arc::new(MountState::new());

        let listening = Arc::new(Mutex::new(true));
        let subscription = self.backend.change_notifier().map(|notifier| {
            subscribe_changes(
                notifier,
                state.clone(),
                listening.clone(),
                self.backend.uuid(),
                prefix.clone(),
            )
        });

        info!(
            prefix = %prefix,
            name = self.backend.friendly_name(),
            uuid = %self.backend.uuid(),
            watched = subscription.is_some(),
            "Mounted media backend"
        );

        Ok(Mount {
            prefix,
            backend: self.backend,
            identities: AddressIdentities::new(),
            state,
            descriptor,
            product_tag: self.product_tag,
            model_number: self.model_number,
            control: self.control,
            index: self.index,
            mac_lookup: self.mac_lookup,
            subscription: Mutex::new(subscription),
            listening,
        })
    }
}

fn validate_schema() -> Result<(), MountError> {
    let file = Resources::get(CONTENT_DIRECTORY_SCHEMA).ok_or_else(|| {
        MountError::Configuration(format!("missing bundled resource {}", CONTENT_DIRECTORY_SCHEMA))
    })?;
    Element::parse(Cursor::new(file.data.as_ref())).map_err(|e| {
        MountError::Configuration(format!("malformed {}: {}", CONTENT_DIRECTORY_SCHEMA, e))
    })?;
    Ok(())
}

/// Le callback ne fait plus rien dès que `listening` passe à `false`, y compris
/// pendant une notification déjà en cours.
fn subscribe_changes(
    notifier: &ChangeNotifier,
    state: Arc<MountState>,
    listening: Arc<Mutex<bool>>,
    uuid: Uuid,
    prefix: String,
) -> Subscription {
    notifier.subscribe(move || {
        let listening = listening.lock();
        if !*listening {
            return;
        }
        let revision = state.invalidate();
        info!(uuid = %uuid, prefix = %prefix, revision, "Rescanned mount {}", uuid);
    })
}

/// Backend exposé sous un préfixe HTTP unique.
pub struct Mount {
    prefix: String,
    backend: Arc<dyn MediaBackend>,
    identities: AddressIdentities,
    state: Arc<MountState>,
    descriptor: DescriptorGenerator,
    product_tag: String,
    model_number: String,
    control: Arc<dyn ControlHandler>,
    index: Arc<dyn IndexRenderer>,
    mac_lookup: MacLookup,
    subscription: Mutex<Option<Subscription>>,
    listening: Arc<Mutex<bool>>,
}

impl std::fmt::Debug for Mount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mount")
            .field("prefix", &self.prefix)
            .field("name", &self.backend.friendly_name())
            .field("revision", &self.revision())
            .finish()
    }
}

/// Catégorie de ressource servie par `file/`, `cover/` et `subtitle/`.
#[derive(Debug, Clone, Copy)]
enum ItemRoute {
    File,
    Cover,
    Subtitle,
}

impl ItemRoute {
    fn name(&self) -> &'static str {
        match self {
            ItemRoute::File => "file",
            ItemRoute::Cover => "cover",
            ItemRoute::Subtitle => "subtitle",
        }
    }

    fn transfer_mode(&self) -> TransferMode {
        match self {
            ItemRoute::File => TransferMode::Streaming,
            ItemRoute::Cover => TransferMode::Interactive,
            ItemRoute::Subtitle => TransferMode::Background,
        }
    }

    fn resource(&self, item: &dyn MediaItem) -> Option<Arc<dyn MediaResource>> {
        match self {
            ItemRoute::File => item.content(),
            ItemRoute::Cover => item.cover(),
            ItemRoute::Subtitle => item.subtitle(),
        }
    }
}

/// Identifiant d'item : premier segment du chemin, le reste est ignoré.
fn first_segment(rest: &str) -> &str {
    rest.split('/').next().unwrap_or_default()
}

impl Mount {
    /// Préfixe du montage, de la forme `/mm-<n>/`.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Chemin de la description du device.
    pub fn descriptor_uri(&self) -> String {
        format!("{}description.xml", self.prefix)
    }

    pub fn revision(&self) -> u32 {
        self.state.revision()
    }

    pub fn state(&self) -> &MountState {
        &self.state
    }

    pub fn backend(&self) -> &Arc<dyn MediaBackend> {
        &self.backend
    }

    /// Associe un identifiant de device à une adresse.
    pub fn register_identity(&self, address: IpAddr, uuid: Uuid) -> Result<(), MountError> {
        self.identities.register(address, uuid)?;
        debug!(prefix = %self.prefix, address = %address, uuid = %uuid, "Registered device identity");
        Ok(())
    }

    /// Identifiant annoncé aux clients qui joignent le serveur via `address`.
    pub fn resolve_identity(&self, address: IpAddr) -> Uuid {
        self.identities.resolve(address, self.backend.uuid())
    }

    /// Description du device vue depuis l'adresse locale `local`.
    pub fn generate_descriptor(&self, local: IpAddr) -> Result<String, MountError> {
        let fields = DescriptorFields {
            uuid: self.resolve_identity(local),
            model_number: &self.model_number,
            friendly_name: format!("{} — {}", self.backend.friendly_name(), self.product_tag),
            prefix: &self.prefix,
        };
        self.descriptor.render(&fields)
    }

    /// Cesse de suivre les changements du backend.
    ///
    /// La révision n'évolue plus ensuite. Sans effet si déjà détaché.
    pub fn detach(&self) {
        *self.listening.lock() = false;
        if let Some(subscription) = self.subscription.lock().take() {
            subscription.cancel();
            info!(prefix = %self.prefix, "Detached mount from change notifications");
        }
    }

    pub fn is_attached(&self) -> bool {
        self.subscription.lock().is_some()
    }

    /// Traite une requête dont le chemin commence par le préfixe du montage.
    ///
    /// L'autorisation est vérifiée avant tout routage.
    pub async fn handle(&self, request: MountRequest) -> Result<MountResponse, MountError> {
        let authorizer = self.backend.authorizer();
        check_authorization(
            authorizer.as_deref(),
            &request.headers,
            request.remote,
            self.mac_lookup,
        )
        .await?;

        let path = match request.path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest,
            None if request.path == self.prefix.trim_end_matches('/') => "",
            None => {
                warn!("Did not understand {} {}", request.method, request.path);
                return Err(MountError::NotFound(request.path.clone()));
            }
        };
        debug!(prefix = %self.prefix, method = %request.method, path, "Mount request");

        match path {
            "" | "index.html" => Ok(MountResponse::Redirect {
                location: format!("{}index/0", self.prefix),
            }),
            "description.xml" => Ok(MountResponse::xml(
                self.generate_descriptor(request.local.ip().to_canonical())?,
            )),
            "contentDirectory.xml" => Ok(MountResponse::Resource {
                status: StatusCode::OK,
                content_type: XML_CONTENT_TYPE,
                key: CONTENT_DIRECTORY_SCHEMA,
            }),
            "control" => {
                let ctx = ControlContext {
                    prefix: &self.prefix,
                    backend: self.backend.as_ref(),
                    state: &self.state,
                };
                self.control.handle(ctx, &request).await
            }
            _ => {
                if let Some(rest) = path.strip_prefix("file/") {
                    self.serve_item(ItemRoute::File, first_segment(rest), &request)
                } else if let Some(rest) = path.strip_prefix("cover/") {
                    self.serve_item(ItemRoute::Cover, first_segment(rest), &request)
                } else if let Some(rest) = path.strip_prefix("subtitle/") {
                    self.serve_item(ItemRoute::Subtitle, first_segment(rest), &request)
                } else if let Some(id) = path.strip_prefix("index/") {
                    let item = self.lookup(id)?;
                    self.index.render(&self.prefix, item.as_ref())
                } else {
                    warn!("Did not understand {} {}", request.method, request.path);
                    Err(MountError::NotFound(request.path.clone()))
                }
            }
        }
    }

    fn lookup(&self, id: &str) -> Result<Arc<dyn MediaItem>, MountError> {
        self.backend
            .get_item(id)
            .ok_or_else(|| MountError::NotFound(format!("{}: no item {}", self.prefix, id)))
    }

    fn serve_item(
        &self,
        route: ItemRoute,
        id: &str,
        request: &MountRequest,
    ) -> Result<MountResponse, MountError> {
        let item = self.lookup(id)?;
        let resource = route.resource(item.as_ref()).ok_or_else(|| {
            MountError::NotFound(format!("{}: item {} has no {}", self.prefix, id, route.name()))
        })?;

        info!(
            prefix = %self.prefix,
            remote = %request.remote,
            id,
            kind = route.name(),
            title = item.title(),
            "Serving {}",
            route.name()
        );

        Ok(MountResponse::Item(ItemResponse {
            resource,
            range: request.header_str(header::RANGE).map(str::to_string),
            transfer_mode: route.transfer_mode(),
            head_only: request.method == Method::HEAD,
        }))
    }
}

impl MediaBackend for Mount {
    fn friendly_name(&self) -> &str {
        self.backend.friendly_name()
    }

    fn uuid(&self) -> Uuid {
        self.backend.uuid()
    }

    fn authorizer(&self) -> Option<Arc<dyn Authorizer>> {
        self.backend.authorizer()
    }

    fn get_item(&self, id: &str) -> Option<Arc<dyn MediaItem>> {
        self.backend.get_item(id)
    }

    fn change_notifier(&self) -> Option<&ChangeNotifier> {
        self.backend.change_notifier()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_segment() {
        assert_eq!(first_segment("7"), "7");
        assert_eq!(first_segment("7/ignored-suffix"), "7");
        assert_eq!(first_segment(""), "");
    }

    #[test]
    fn test_prefixes_are_unique() {
        let a = next_prefix();
        let b = next_prefix();
        assert_ne!(a, b);
        assert!(a.starts_with("/mm-") && a.ends_with('/'));
    }
}
