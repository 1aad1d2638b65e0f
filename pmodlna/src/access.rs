//! Politique d'accès construite à partir de la configuration.

use pmomount::{AddressAllowList, AnyOf, Authorizer, MacAllowList};
use std::net::IpAddr;
use std::sync::Arc;

/// Combine les listes d'adresses IP et MAC autorisées.
///
/// Retourne `None` si les deux listes sont vides : tout est autorisé.
pub fn build_authorizer(addresses: Vec<IpAddr>, macs: Vec<String>) -> Option<Arc<dyn Authorizer>> {
    let mut policies: Vec<Arc<dyn Authorizer>> = Vec::new();
    if !addresses.is_empty() {
        policies.push(Arc::new(AddressAllowList::new(addresses)));
    }
    if !macs.is_empty() {
        policies.push(Arc::new(MacAllowList::new(macs)));
    }

    let any = AnyOf::new(policies);
    if any.is_empty() {
        None
    } else {
        Some(Arc::new(any))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    fn remote(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_empty_lists_allow_everything() {
        assert!(build_authorizer(Vec::new(), Vec::new()).is_none());
    }

    #[test]
    fn test_either_list_grants_access() {
        let auth = build_authorizer(
            vec!["192.168.1.20".parse().unwrap()],
            vec!["AA:BB:CC:00:11:22".to_string()],
        )
        .unwrap();
        let headers = Default::default();

        assert!(auth.authorize(&headers, remote("192.168.1.20:4000"), None));
        assert!(auth.authorize(&headers, remote("192.168.1.21:4000"), Some("aa:bb:cc:00:11:22")));
        assert!(!auth.authorize(&headers, remote("192.168.1.21:4000"), None));
    }
}
