/// Utilitaires réseau partagés par les crates `pmo*`.
///
/// # Fonctions principales
///
/// - [`guess_local_ip`] : devine l'adresse IP locale utilisée pour les connexions sortantes
/// - [`list_all_ips`] : liste les adresses IPv4 non-loopback par interface
/// - [`lookup_mac`] : retrouve l'adresse matérielle d'un pair dans la table de voisinage
///
/// # Examples
///
/// ```
/// use pmoutils::guess_local_ip;
///
/// let ip = guess_local_ip();
/// println!("Adresse IP locale: {}", ip);
/// ```
mod arp;
mod ip_utils;

pub use arp::{lookup_mac, parse_arp_table};
pub use ip_utils::{guess_local_ip, list_all_ips};
