//! Réponses d'un montage et leur conversion en réponses HTTP.

use axum::{
    body::Body,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use std::io::SeekFrom;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::error;

use crate::backend::MediaResource;
use crate::descriptor::Resources;
use crate::error::MountError;
use crate::range::ByteRange;

pub const XML_CONTENT_TYPE: &str = "text/xml; charset=\"utf-8\"";
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

const TRANSFER_MODE: &str = "transfermode.dlna.org";

/// Indication de mise en cache d'un flux d'item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// Contenu média : pas d'indication de cache
    Streaming,
    /// Conservable indéfiniment (couvertures)
    Interactive,
    /// À ne pas mettre en cache (sous-titres)
    Background,
}

impl TransferMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferMode::Streaming => "Streaming",
            TransferMode::Interactive => "Interactive",
            TransferMode::Background => "Background",
        }
    }

    pub fn cache_control(&self) -> Option<&'static str> {
        match self {
            TransferMode::Streaming => None,
            TransferMode::Interactive => Some("public, max-age=31536000, immutable"),
            TransferMode::Background => Some("no-cache"),
        }
    }
}

/// Flux d'une ressource d'item, ouvert au moment de produire la réponse.
#[derive(Debug, Clone)]
pub struct ItemResponse {
    pub resource: Arc<dyn MediaResource>,
    pub range: Option<String>,
    pub transfer_mode: TransferMode,
    pub head_only: bool,
}

#[derive(Debug)]
pub enum MountResponse {
    Redirect {
        location: String,
    },
    Xml {
        status: StatusCode,
        body: String,
    },
    /// Ressource embarquée désignée par sa clé
    Resource {
        status: StatusCode,
        content_type: &'static str,
        key: &'static str,
    },
    Item(ItemResponse),
    Html {
        status: StatusCode,
        body: String,
    },
}

impl MountResponse {
    pub fn xml(body: String) -> Self {
        MountResponse::Xml {
            status: StatusCode::OK,
            body,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            MountResponse::Redirect { .. } => StatusCode::TEMPORARY_REDIRECT,
            MountResponse::Xml { status, .. }
            | MountResponse::Resource { status, .. }
            | MountResponse::Html { status, .. } => *status,
            MountResponse::Item(_) => StatusCode::OK,
        }
    }

    /// Convertit en réponse HTTP ; les flux d'items sont ouverts ici.
    pub async fn into_http(self) -> Response {
        match self {
            MountResponse::Redirect { location } => Redirect::temporary(&location).into_response(),
            MountResponse::Xml { status, body } => {
                (status, [(header::CONTENT_TYPE, XML_CONTENT_TYPE)], body).into_response()
            }
            MountResponse::Html { status, body } => {
                (status, [(header::CONTENT_TYPE, HTML_CONTENT_TYPE)], body).into_response()
            }
            MountResponse::Resource {
                status,
                content_type,
                key,
            } => match Resources::get(key) {
                Some(file) => {
                    (status, [(header::CONTENT_TYPE, content_type)], file.data.into_owned())
                        .into_response()
                }
                None => {
                    MountError::Configuration(format!("missing bundled resource {}", key))
                        .into_response()
                }
            },
            MountResponse::Item(item) => match stream_item(item).await {
                Ok(response) => response,
                Err(e) => e.into_response(),
            },
        }
    }
}

async fn stream_item(item: ItemResponse) -> Result<Response, MountError> {
    let size = item.resource.size();
    let range = match (item.range.as_deref(), size) {
        (Some(h), Some(size)) => ByteRange::parse(h, size),
        _ => ByteRange::Full,
    };

    let mut builder = axum::http::Response::builder()
        .header(header::CONTENT_TYPE, item.resource.content_type())
        .header(header::ACCEPT_RANGES, "bytes")
        .header(TRANSFER_MODE, item.transfer_mode.as_str());
    if let Some(cache_control) = item.transfer_mode.cache_control() {
        builder = builder.header(header::CACHE_CONTROL, cache_control);
    }

    let (status, start, length) = match (range, size) {
        (ByteRange::Unsatisfiable, Some(size)) => {
            let response = builder
                .status(StatusCode::RANGE_NOT_SATISFIABLE)
                .header(header::CONTENT_RANGE, format!("bytes */{}", size))
                .body(Body::empty())
                .map_err(http_error)?;
            return Ok(response);
        }
        (ByteRange::Partial { start, end }, Some(size)) => {
            builder = builder.header(
                header::CONTENT_RANGE,
                format!("bytes {}-{}/{}", start, end, size),
            );
            (StatusCode::PARTIAL_CONTENT, start, range.len())
        }
        (_, size) => (StatusCode::OK, 0, size),
    };

    if let Some(length) = length {
        builder = builder.header(header::CONTENT_LENGTH, HeaderValue::from(length));
    }
    builder = builder.status(status);

    if item.head_only {
        return builder.body(Body::empty()).map_err(http_error);
    }

    // Le lecteur appartient au flux : il est fermé dès que le client se déconnecte
    let mut reader = item.resource.open().await?;
    if start > 0 {
        reader.seek(SeekFrom::Start(start)).await?;
    }
    let body = match length {
        Some(length) if status == StatusCode::PARTIAL_CONTENT => {
            Body::from_stream(ReaderStream::new(reader.take(length)))
        }
        _ => Body::from_stream(ReaderStream::new(reader)),
    };

    builder.body(body).map_err(http_error)
}

fn http_error(e: axum::http::Error) -> MountError {
    error!(error = %e, "Failed to build item response");
    MountError::Configuration(e.to_string())
}
