//! # pmoserver - Listener HTTP des montages DLNA
//!
//! Cette crate fournit le serveur Axum qui héberge les montages `pmomount` :
//! un seul port, un préfixe par montage.
//!
//! ## Fonctionnalités
//!
//! - **Dispatch par préfixe** : chaque requête est confiée au montage dont le
//!   préfixe couvre son chemin, avec les adresses locale et distante de la connexion
//! - **`/info`** : liste JSON des montages (nom, uuid, préfixe, description, révision)
//! - **Logs** : buffer circulaire (`/log-dump`) et niveau modifiable à chaud
//!   (`/api/log_setup`)
//! - **Arrêt gracieux** : gestion propre de l'arrêt sur Ctrl+C
//!
//! ## Exemple d'utilisation
//!
//! ```rust,no_run
//! use pmoserver::ServerBuilder;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let mut server = ServerBuilder::new("PMODLNA", "192.168.1.5", 8080).build();
//!     server.init_logging().await;
//!     // server.add_mount(Arc::new(mount));
//!     server.start().await?;
//!     server.wait().await;
//!     Ok(())
//! }
//! ```

pub mod logs;
pub mod server;

pub use logs::{BufferLayer, LogState, log_dump};
pub use server::{ConnectionInfo, MAX_BODY_SIZE, MountInfo, MountTable, Server, ServerBuilder};
