//! Traitement des actions SOAP reçues sur `<préfixe>control`.
//!
//! Le handler par défaut, [`ContentDirectoryControl`], implémente le service
//! ContentDirectory:1 au-dessus du backend du montage. Les réponses `Browse`
//! sont mises en cache dans l'état du montage et invalidées à chaque
//! changement de contenu.

use async_trait::async_trait;
use axum::http::StatusCode;
use tracing::{debug, warn};

use crate::backend::{MediaBackend, MediaItem};
use crate::didl::{UrlBase, render_didl};
use crate::error::MountError;
use crate::request::MountRequest;
use crate::response::MountResponse;
use crate::soap::{SoapAction, build_soap_fault, build_soap_response, error_codes, parse_soap_action};
use crate::state::MountState;

pub const CONTENT_DIRECTORY_URN: &str = "urn:schemas-upnp-org:service:ContentDirectory:1";

/// Ce qu'un handler de contrôle voit du montage.
#[derive(Clone, Copy)]
pub struct ControlContext<'a> {
    pub prefix: &'a str,
    pub backend: &'a dyn MediaBackend,
    pub state: &'a MountState,
}

/// Collaborateur qui répond aux requêtes SOAP d'un montage.
///
/// Sa réponse est renvoyée telle quelle au client.
#[async_trait]
pub trait ControlHandler: Send + Sync {
    async fn handle(
        &self,
        ctx: ControlContext<'_>,
        request: &MountRequest,
    ) -> Result<MountResponse, MountError>;
}

/// Service ContentDirectory:1 (Browse, GetSystemUpdateID, capacités).
#[derive(Debug, Clone, Default)]
pub struct ContentDirectoryControl;

impl ContentDirectoryControl {
    pub fn new() -> Self {
        Self
    }
}

fn fault(code: &str, description: &str) -> Result<MountResponse, MountError> {
    Ok(MountResponse::Xml {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: build_soap_fault(code, description)?,
    })
}

fn reply(action: &str, values: Vec<(&str, String)>) -> Result<MountResponse, MountError> {
    let values = values
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    Ok(MountResponse::xml(build_soap_response(
        CONTENT_DIRECTORY_URN,
        action,
        values,
    )?))
}

/// Issue d'un Browse qui n'a pas pu produire de résultat.
enum BrowseFailure {
    Fault(&'static str, &'static str),
    Error(MountError),
}

impl From<xmltree::Error> for BrowseFailure {
    fn from(e: xmltree::Error) -> Self {
        BrowseFailure::Error(e.into())
    }
}

fn parse_index(action: &SoapAction, name: &str) -> Result<usize, BrowseFailure> {
    match action.arg(name).map(str::trim) {
        None | Some("") => Ok(0),
        Some(v) => v
            .parse()
            .map_err(|_| BrowseFailure::Fault(error_codes::INVALID_ARGS, "Invalid Args")),
    }
}

fn browse(
    ctx: ControlContext<'_>,
    action: &SoapAction,
    host: &str,
    revision: u32,
) -> Result<String, BrowseFailure> {
    let object_id = action
        .arg("ObjectID")
        .ok_or(BrowseFailure::Fault(error_codes::INVALID_ARGS, "Invalid Args"))?;
    let start = parse_index(action, "StartingIndex")?;
    let requested = parse_index(action, "RequestedCount")?;

    let item = ctx
        .backend
        .get_item(object_id)
        .ok_or(BrowseFailure::Fault(error_codes::NO_SUCH_OBJECT, "No such object"))?;

    let base = UrlBase {
        host,
        prefix: ctx.prefix,
    };

    let (result, returned, total) = match action.arg("BrowseFlag") {
        Some("BrowseMetadata") => {
            let didl = render_didl([item.as_ref()], base)?;
            (didl, 1, 1)
        }
        Some("BrowseDirectChildren") => {
            let children = item.children();
            let total = children.len();
            let take = if requested == 0 { usize::MAX } else { requested };
            let page: Vec<&dyn MediaItem> =
                children.iter().skip(start).take(take).map(|c| &**c).collect();
            let didl = render_didl(page.iter().copied(), base)?;
            (didl, page.len(), total)
        }
        _ => {
            return Err(BrowseFailure::Fault(error_codes::INVALID_ARGS, "Invalid Args"));
        }
    };

    build_soap_response(
        CONTENT_DIRECTORY_URN,
        "Browse",
        vec![
            ("Result".to_string(), result),
            ("NumberReturned".to_string(), returned.to_string()),
            ("TotalMatches".to_string(), total.to_string()),
            ("UpdateID".to_string(), revision.to_string()),
        ],
    )
    .map_err(Into::into)
}

#[async_trait]
impl ControlHandler for ContentDirectoryControl {
    async fn handle(
        &self,
        ctx: ControlContext<'_>,
        request: &MountRequest,
    ) -> Result<MountResponse, MountError> {
        let action = match parse_soap_action(&request.body) {
            Ok(action) => action,
            Err(e) => {
                warn!(prefix = ctx.prefix, error = %e, "Malformed SOAP request");
                return fault(error_codes::INVALID_ARGS, "Invalid Args");
            }
        };
        debug!(prefix = ctx.prefix, action = %action.name, "SOAP action");

        match action.name.as_str() {
            "GetSystemUpdateID" => reply(
                "GetSystemUpdateID",
                vec![("Id", ctx.state.revision().to_string())],
            ),
            "GetSearchCapabilities" => {
                reply("GetSearchCapabilities", vec![("SearchCaps", String::new())])
            }
            "GetSortCapabilities" => reply("GetSortCapabilities", vec![("SortCaps", String::new())]),
            "Browse" => {
                let host = request.host();
                let key = format!("{}?{}@{}", action.name, action.canonical_args(), host);
                if let Some(body) = ctx.state.cached(&key) {
                    debug!(prefix = ctx.prefix, "Browse served from cache");
                    return Ok(MountResponse::xml(body));
                }

                let revision = ctx.state.revision();
                match browse(ctx, &action, &host, revision) {
                    Ok(body) => {
                        ctx.state.store(key, revision, body.clone());
                        Ok(MountResponse::xml(body))
                    }
                    Err(BrowseFailure::Fault(code, description)) => fault(code, description),
                    Err(BrowseFailure::Error(e)) => Err(e),
                }
            }
            other => {
                warn!(prefix = ctx.prefix, action = other, "Unsupported SOAP action");
                fault(error_codes::INVALID_ACTION, "Invalid Action")
            }
        }
    }
}
