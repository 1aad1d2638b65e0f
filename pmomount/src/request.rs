use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderValue, Method, header::HeaderName};
use std::net::SocketAddr;

/// Requête entrante, déjà associée au préfixe d'un montage par le listener.
#[derive(Debug, Clone)]
pub struct MountRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub remote: SocketAddr,
    pub local: SocketAddr,
    pub body: Bytes,
}

impl MountRequest {
    pub fn new(method: Method, path: impl Into<String>, remote: SocketAddr, local: SocketAddr) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            remote,
            local,
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header_str(&self, name: HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Hôte vu par le client, à défaut l'adresse locale de la connexion.
    pub fn host(&self) -> String {
        self.header_str(axum::http::header::HOST)
            .map(str::to_string)
            .unwrap_or_else(|| self.local.to_string())
    }
}
