//! Identifiant de device par adresse cliente.
//!
//! Les associations ne sont jamais retirées pendant la vie du montage.
//! Les adresses IPv6 de la forme `::ffff:a.b.c.d` sont ramenées à leur forme IPv4.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::IpAddr;
use uuid::Uuid;

use crate::error::MountError;

#[derive(Debug, Default)]
pub struct AddressIdentities {
    bindings: RwLock<HashMap<IpAddr, Uuid>>,
}

impl AddressIdentities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associe `uuid` à `address`.
    ///
    /// # Errors
    ///
    /// [`MountError::DuplicateBinding`] si l'adresse est déjà associée ;
    /// l'association existante est conservée.
    pub fn register(&self, address: IpAddr, uuid: Uuid) -> Result<(), MountError> {
        let address = address.to_canonical();
        let mut bindings = self.bindings.write();
        if bindings.contains_key(&address) {
            return Err(MountError::DuplicateBinding(address));
        }
        bindings.insert(address, uuid);
        Ok(())
    }

    pub fn get(&self, address: IpAddr) -> Option<Uuid> {
        self.bindings.read().get(&address.to_canonical()).copied()
    }

    /// Identifiant associé à `address`, sinon `default`.
    pub fn resolve(&self, address: IpAddr, default: Uuid) -> Uuid {
        self.get(address).unwrap_or(default)
    }

    pub fn len(&self) -> usize {
        self.bindings.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.read().is_empty()
    }
}
