//! Résolution IP → adresse matérielle via la table de voisinage du noyau.
//!
//! Sous Linux, la table est lue dans `/proc/net/arp` :
//!
//! ```text
//! IP address       HW type     Flags       HW address            Mask     Device
//! 192.168.1.5      0x1         0x2         aa:bb:cc:dd:ee:ff     *        eth0
//! ```
//!
//! Les entrées incomplètes (flags `0x0` ou adresse nulle) sont ignorées.

use std::collections::HashMap;
use std::net::IpAddr;

const ARP_TABLE: &str = "/proc/net/arp";
const NULL_MAC: &str = "00:00:00:00:00:00";

/// Retourne l'adresse MAC connue pour `ip`, en minuscules, ou `None`.
///
/// Les adresses loopback et IPv6 n'ont pas d'entrée dans la table ARP.
pub fn lookup_mac(ip: IpAddr) -> Option<String> {
    if ip.is_loopback() || !ip.is_ipv4() {
        return None;
    }

    let table = match std::fs::read_to_string(ARP_TABLE) {
        Ok(content) => content,
        Err(e) => {
            tracing::trace!(error = %e, "ARP table not readable");
            return None;
        }
    };

    parse_arp_table(&table).remove(&ip)
}

/// Analyse le contenu textuel d'une table ARP au format `/proc/net/arp`.
pub fn parse_arp_table(content: &str) -> HashMap<IpAddr, String> {
    content
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 {
                return None;
            }
            let ip = fields[0].parse::<IpAddr>().ok()?;
            let flags = fields[2];
            let mac = fields[3].to_lowercase();
            if flags == "0x0" || mac == NULL_MAC {
                return None;
            }
            Some((ip, mac))
        })
        .collect()
}
