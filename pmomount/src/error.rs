//! Erreurs du montage de devices.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::net::{IpAddr, SocketAddr};
use thiserror::Error;

/// Issues possibles d'une requête ou de la configuration d'un montage.
#[derive(Error, Debug)]
pub enum MountError {
    /// Requête refusée par l'autorisateur du backend
    #[error("Request from {0} denied by authorizer")]
    Unauthorized(SocketAddr),

    /// Chemin inconnu, identifiant inconnu ou capacité absente
    #[error("Not found: {0}")]
    NotFound(String),

    /// Ressource embarquée absente ou mal formée
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Adresse déjà associée à un identifiant de device
    #[error("Address {0} is already bound to a device identifier")]
    DuplicateBinding(IpAddr),

    #[error("XML serialization failed: {0}")]
    Xml(#[from] xmltree::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MountError {
    /// Code HTTP associé à l'erreur.
    pub fn status(&self) -> StatusCode {
        match self {
            MountError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            MountError::NotFound(_) => StatusCode::NOT_FOUND,
            MountError::DuplicateBinding(_) => StatusCode::CONFLICT,
            MountError::Configuration(_) | MountError::Xml(_) | MountError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for MountError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Mount request failed");
        }
        (status, status.canonical_reason().unwrap_or_default().to_string()).into_response()
    }
}
