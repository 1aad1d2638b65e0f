//! Contrôle d'accès appliqué à chaque requête d'un montage.

use axum::http::HeaderMap;
use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::warn;

use crate::backend::Authorizer;
use crate::error::MountError;

/// Résolution de l'adresse matérielle d'un pair.
pub type MacLookup = fn(IpAddr) -> Option<String>;

/// Évalue l'autorisateur du backend pour une requête.
///
/// Les requêtes loopback passent toujours. L'adresse matérielle n'est
/// résolue que si un autorisateur est présent, hors des workers async.
pub async fn check_authorization(
    authorizer: Option<&dyn Authorizer>,
    headers: &HeaderMap,
    remote: SocketAddr,
    mac_lookup: MacLookup,
) -> Result<(), MountError> {
    let Some(authorizer) = authorizer else {
        return Ok(());
    };

    let ip = remote.ip().to_canonical();
    if ip.is_loopback() {
        return Ok(());
    }

    let mac = tokio::task::spawn_blocking(move || mac_lookup(ip))
        .await
        .unwrap_or_else(|e| {
            warn!(remote = %remote, error = %e, "MAC lookup task failed");
            None
        });
    if authorizer.authorize(headers, remote, mac.as_deref()) {
        Ok(())
    } else {
        warn!(remote = %remote, mac = ?mac, "Request denied by authorizer");
        Err(MountError::Unauthorized(remote))
    }
}

/// Autorise une liste fixe d'adresses IP.
#[derive(Debug, Clone, Default)]
pub struct AddressAllowList {
    addresses: HashSet<IpAddr>,
}

impl AddressAllowList {
    pub fn new(addresses: impl IntoIterator<Item = IpAddr>) -> Self {
        Self {
            addresses: addresses.into_iter().map(|a| a.to_canonical()).collect(),
        }
    }
}

impl Authorizer for AddressAllowList {
    fn authorize(&self, _headers: &HeaderMap, remote: SocketAddr, _mac: Option<&str>) -> bool {
        self.addresses.contains(&remote.ip().to_canonical())
    }
}

/// Autorise une liste fixe d'adresses matérielles (insensible à la casse).
#[derive(Debug, Clone, Default)]
pub struct MacAllowList {
    macs: HashSet<String>,
}

impl MacAllowList {
    pub fn new<S: AsRef<str>>(macs: impl IntoIterator<Item = S>) -> Self {
        Self {
            macs: macs
                .into_iter()
                .map(|m| m.as_ref().trim().to_lowercase())
                .collect(),
        }
    }
}

impl Authorizer for MacAllowList {
    fn authorize(&self, _headers: &HeaderMap, _remote: SocketAddr, mac: Option<&str>) -> bool {
        mac.is_some_and(|m| self.macs.contains(&m.to_lowercase()))
    }
}

/// Autorise dès qu'une des politiques autorise.
#[derive(Clone, Default)]
pub struct AnyOf {
    policies: Vec<Arc<dyn Authorizer>>,
}

impl AnyOf {
    pub fn new(policies: Vec<Arc<dyn Authorizer>>) -> Self {
        Self { policies }
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl Authorizer for AnyOf {
    fn authorize(&self, headers: &HeaderMap, remote: SocketAddr, mac: Option<&str>) -> bool {
        self.policies
            .iter()
            .any(|p| p.authorize(headers, remote, mac))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct DenyAll;

    impl Authorizer for DenyAll {
        fn authorize(&self, _: &HeaderMap, _: SocketAddr, _: Option<&str>) -> bool {
            false
        }
    }

    static LOOKUPS: AtomicUsize = AtomicUsize::new(0);

    fn counting_lookup(_: IpAddr) -> Option<String> {
        LOOKUPS.fetch_add(1, Ordering::SeqCst);
        Some("aa:bb:cc:dd:ee:ff".to_string())
    }

    fn no_mac(_: IpAddr) -> Option<String> {
        None
    }

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_no_authorizer_allows() {
        let headers = HeaderMap::new();
        assert!(check_authorization(None, &headers, addr("10.0.0.2:5000"), no_mac).await.is_ok());
    }

    #[tokio::test]
    async fn test_loopback_bypasses_denial() {
        let headers = HeaderMap::new();
        let deny = DenyAll;
        assert!(check_authorization(Some(&deny), &headers, addr("127.0.0.1:5000"), no_mac).await.is_ok());
        assert!(check_authorization(Some(&deny), &headers, addr("[::1]:5000"), no_mac).await.is_ok());
        assert!(
            check_authorization(Some(&deny), &headers, addr("[::ffff:127.0.0.1]:5000"), no_mac).await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_denial_is_unauthorized() {
        let headers = HeaderMap::new();
        let deny = DenyAll;
        let err = check_authorization(Some(&deny), &headers, addr("10.0.0.2:5000"), no_mac).await
            .unwrap_err();
        assert!(matches!(err, MountError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_mac_lookup_only_with_authorizer() {
        let headers = HeaderMap::new();
        let before = LOOKUPS.load(Ordering::SeqCst);
        check_authorization(None, &headers, addr("10.0.0.2:5000"), counting_lookup).await.unwrap();
        assert_eq!(LOOKUPS.load(Ordering::SeqCst), before);

        let allow = MacAllowList::new(["AA:BB:CC:DD:EE:FF"]);
        check_authorization(Some(&allow), &headers, addr("10.0.0.2:5000"), counting_lookup).await
            .unwrap();
        assert!(LOOKUPS.load(Ordering::SeqCst) > before);
    }

    static LOOKUP_THREAD: parking_lot::Mutex<Option<std::thread::ThreadId>> =
        parking_lot::Mutex::new(None);

    fn recording_lookup(_: IpAddr) -> Option<String> {
        *LOOKUP_THREAD.lock() = Some(std::thread::current().id());
        None
    }

    #[tokio::test]
    async fn test_mac_lookup_runs_off_the_async_worker() {
        let headers = HeaderMap::new();
        let allow = MacAllowList::new(["aa:bb:cc:dd:ee:ff"]);
        let result =
            check_authorization(Some(&allow), &headers, addr("10.0.0.3:5000"), recording_lookup)
                .await;
        assert!(matches!(result, Err(MountError::Unauthorized(_))));

        let lookup_thread = LOOKUP_THREAD.lock().expect("lookup was called");
        assert_ne!(lookup_thread, std::thread::current().id());
    }

    #[test]
    fn test_allow_lists_and_composition() {
        let headers = HeaderMap::new();
        let ips = AddressAllowList::new(["192.168.1.5".parse().unwrap()]);
        assert!(ips.authorize(&headers, addr("192.168.1.5:1"), None));
        assert!(!ips.authorize(&headers, addr("192.168.1.6:1"), None));

        let macs = MacAllowList::new(["aa:bb:cc:dd:ee:ff"]);
        assert!(!macs.authorize(&headers, addr("192.168.1.6:1"), None));

        let any = AnyOf::new(vec![Arc::new(ips), Arc::new(macs)]);
        assert!(any.authorize(&headers, addr("192.168.1.6:1"), Some("AA:BB:CC:DD:EE:FF")));
        assert!(!any.authorize(&headers, addr("192.168.1.6:1"), Some("00:11:22:33:44:55")));
    }
}
