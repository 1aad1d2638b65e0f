use get_if_addrs::get_if_addrs;
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// Devine l'adresse IP locale de la machine.
///
/// Un socket UDP est "connecté" vers un serveur DNS public : aucun paquet n'est
/// émis, mais le système choisit l'interface qui servirait à joindre Internet.
/// En cas d'échec, retourne `127.0.0.1`.
///
/// # Examples
///
/// ```
/// let ip = pmoutils::guess_local_ip();
/// assert!(ip.parse::<std::net::IpAddr>().is_ok());
/// ```
pub fn guess_local_ip() -> String {
    local_ip_via_udp()
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
        .to_string()
}

fn local_ip_via_udp() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}

/// Liste les adresses IPv4 non-loopback, regroupées par interface.
///
/// Les interfaces sont triées par nom. Une erreur d'énumération donne une map vide.
pub fn list_all_ips() -> BTreeMap<String, Vec<IpAddr>> {
    let mut result: BTreeMap<String, Vec<IpAddr>> = BTreeMap::new();

    let interfaces = match get_if_addrs() {
        Ok(interfaces) => interfaces,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to enumerate network interfaces");
            return result;
        }
    };

    for iface in interfaces {
        let ip = iface.ip();
        if ip.is_loopback() || !ip.is_ipv4() {
            continue;
        }
        let entry = result.entry(iface.name).or_default();
        if !entry.contains(&ip) {
            entry.push(ip);
        }
    }

    result
}
