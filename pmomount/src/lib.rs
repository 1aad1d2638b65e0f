//! # pmomount - Montage de backends média en devices DLNA
//!
//! Chaque backend est exposé sous un préfixe HTTP unique (`/mm-1/`, `/mm-2/`,
//! ...) et se présente comme un MediaServer UPnP distinct. Un même listener
//! HTTP peut ainsi servir plusieurs bibliothèques indépendantes.
//!
//! Sous son préfixe, un montage sert :
//!
//! - `description.xml` : description du device, personnalisée par adresse locale
//! - `contentDirectory.xml` : schéma du service ContentDirectory
//! - `control` : actions SOAP
//! - `file/<id>`, `cover/<id>`, `subtitle/<id>` : flux des ressources d'un item
//! - `index/<id>` : index HTML navigable
//!
//! Toute requête passe d'abord par l'autorisateur du backend (sauf loopback).

pub mod auth;
pub mod backend;
pub mod control;
pub mod descriptor;
pub mod didl;
pub mod error;
pub mod identity;
pub mod index;
pub mod mount;
pub mod notify;
pub mod range;
pub mod request;
pub mod response;
pub mod soap;
pub mod state;

pub use auth::{AddressAllowList, AnyOf, MacAllowList, MacLookup};
pub use backend::{Authorizer, MediaBackend, MediaItem, MediaResource, ResourceReader};
pub use control::{ContentDirectoryControl, ControlContext, ControlHandler};
pub use error::MountError;
pub use index::{HtmlIndex, IndexRenderer};
pub use mount::{Mount, MountBuilder};
pub use notify::{ChangeNotifier, Subscription};
pub use request::MountRequest;
pub use response::{MountResponse, TransferMode};
