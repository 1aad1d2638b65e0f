mod access;
mod folder;

use anyhow::{Context, Result};
use folder::FolderBackend;
use pmoconfig::{MediaDirectory, get_config};
use pmomount::{MountBuilder, MountError};
use pmoserver::{Server, ServerBuilder};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

fn directory_uuid(dir: &MediaDirectory) -> Uuid {
    dir.uuid
        .as_deref()
        .and_then(|u| Uuid::parse_str(u.trim()).ok())
        .unwrap_or_else(|| {
            warn!(path = %dir.path, "Invalid or missing device UUID, using a temporary one");
            Uuid::new_v4()
        })
}

/// Monte chaque répertoire configuré ; un répertoire illisible est ignoré.
fn mount_directories(server: &mut Server) -> Result<Vec<Arc<FolderBackend>>> {
    let config = get_config();
    let product_tag = config.get_product_tag()?;
    let authorizer =
        access::build_authorizer(config.get_allowed_addresses()?, config.get_allowed_macs()?);
    let identities = config.get_address_identities()?;

    let mut backends = Vec::new();
    for dir in config.get_media_directories()? {
        let backend = match FolderBackend::open(&dir.path, dir.name.clone(), directory_uuid(&dir)) {
            Ok(b) => Arc::new(b.with_authorizer(authorizer.clone())),
            Err(e) => {
                warn!("⚠️ Skipping media directory {}: {:#}", dir.path, e);
                continue;
            }
        };

        let mount = MountBuilder::new(backend.clone())
            .product_tag(product_tag.clone())
            .build()
            .with_context(|| format!("cannot mount {}", dir.path))?;

        for identity in &identities {
            match mount.register_identity(identity.address, identity.uuid) {
                Ok(()) => {}
                Err(MountError::DuplicateBinding(addr)) => {
                    warn!("⚠️ Address {} already bound on {}", addr, mount.prefix())
                }
                Err(e) => return Err(e.into()),
            }
        }

        server.add_mount(Arc::new(mount));
        backends.push(backend);
    }
    Ok(backends)
}

/// Rescanne périodiquement les répertoires montés.
fn spawn_rescan(backends: Vec<Arc<FolderBackend>>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            for backend in &backends {
                let b = backend.clone();
                match tokio::task::spawn_blocking(move || b.rescan()).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => {
                        warn!(path = %backend.root().display(), "Rescan failed: {:#}", e)
                    }
                    Err(e) => error!("Rescan task aborted: {}", e),
                }
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    // ========== PHASE 1 : Serveur HTTP et logs ==========
    let mut server = ServerBuilder::new_configured().build();
    server.init_logging().await;

    // ========== PHASE 2 : Montages ==========
    info!("📁 Mounting media directories...");
    let backends = mount_directories(&mut server)?;
    if backends.is_empty() {
        warn!("⚠️ No media directory mounted, check media.directories in the configuration");
    } else {
        info!("✅ {} media director(y/ies) mounted", backends.len());
        for backend in &backends {
            info!("  - {} ({} items)", backend.root().display(), backend.item_count());
        }
    }

    let interval = get_config().get_rescan_interval_secs()?;
    if interval > 0 && !backends.is_empty() {
        spawn_rescan(backends, Duration::from_secs(interval as u64));
    }

    // ========== PHASE 3 : Démarrage ==========
    let addr = server.start().await.context("cannot start HTTP server")?;
    info!("🚀 PMODLNA listening on {}", addr);
    for (iface, addresses) in pmoutils::list_all_ips() {
        for ip in addresses {
            info!("  - {} reachable at http://{}:{}/", iface, ip, addr.port());
        }
    }

    server.wait().await;
    info!("👋 PMODLNA stopped");
    Ok(())
}
