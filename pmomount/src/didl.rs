//! Sérialisation DIDL-Lite des items d'un backend pour l'action Browse.

use xmltree::{Element, EmitterConfig, XMLNode};

use crate::backend::MediaItem;

const DIDL_NS: &str = "urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/";
const DC_NS: &str = "http://purl.org/dc/elements/1.1/";
const UPNP_NS: &str = "urn:schemas-upnp-org:metadata-1-0/upnp/";
const DLNA_NS: &str = "urn:schemas-dlna-org:metadata-1-0/";
const SEC_NS: &str = "http://www.sec.co.kr/";

/// Racine des URLs de ressources : `http://<hôte><préfixe>`.
#[derive(Debug, Clone, Copy)]
pub struct UrlBase<'a> {
    pub host: &'a str,
    pub prefix: &'a str,
}

impl UrlBase<'_> {
    pub fn url(&self, route: &str, id: &str) -> String {
        format!("http://{}{}{}/{}", self.host, self.prefix, route, id)
    }
}

/// Classe UPnP d'un item selon son type MIME.
pub fn upnp_class(mime: &str) -> &'static str {
    match mime.split('/').next().unwrap_or_default() {
        "audio" => "object.item.audioItem.musicTrack",
        "video" => "object.item.videoItem",
        "image" => "object.item.imageItem.photo",
        _ => "object.item",
    }
}

/// Profil DLNA d'une vignette selon son type MIME.
pub fn thumbnail_profile(mime: &str) -> &'static str {
    match mime {
        "image/png" => "PNG_TN",
        _ => "JPEG_TN",
    }
}

fn text_element(name: &str, text: impl Into<String>) -> Element {
    let mut elem = Element::new(name);
    elem.children.push(XMLNode::Text(text.into()));
    elem
}

fn object_element(item: &dyn MediaItem, base: UrlBase<'_>) -> Element {
    let parent_id = item.parent_id().unwrap_or("-1");
    let mut elem = Element::new(if item.is_container() { "container" } else { "item" });
    elem.attributes.insert("id".to_string(), item.id().to_string());
    elem.attributes
        .insert("parentID".to_string(), parent_id.to_string());
    elem.attributes
        .insert("restricted".to_string(), "1".to_string());

    elem.children
        .push(XMLNode::Element(text_element("dc:title", item.title())));

    if item.is_container() {
        let children = item.children().len();
        elem.attributes
            .insert("childCount".to_string(), children.to_string());
        elem.children.push(XMLNode::Element(text_element(
            "upnp:class",
            "object.container.storageFolder",
        )));
    } else {
        let mime = item
            .content()
            .map(|c| c.content_type().to_string())
            .unwrap_or_default();
        elem.children
            .push(XMLNode::Element(text_element("upnp:class", upnp_class(&mime))));
    }

    if let Some(cover) = item.cover() {
        let mut art = text_element("upnp:albumArtURI", base.url("cover", item.id()));
        art.attributes.insert(
            "dlna:profileID".to_string(),
            thumbnail_profile(cover.content_type()).to_string(),
        );
        elem.children.push(XMLNode::Element(art));
    }

    if let Some(content) = item.content() {
        let mut res = text_element("res", base.url("file", item.id()));
        res.attributes.insert(
            "protocolInfo".to_string(),
            format!("http-get:*:{}:*", content.content_type()),
        );
        if let Some(size) = content.size() {
            res.attributes.insert("size".to_string(), size.to_string());
        }
        elem.children.push(XMLNode::Element(res));
    }

    if let Some(subtitle) = item.subtitle() {
        let mut caption = text_element("sec:CaptionInfoEx", base.url("subtitle", item.id()));
        let kind = subtitle
            .content_type()
            .rsplit('/')
            .next()
            .unwrap_or("srt")
            .trim_start_matches("x-")
            .to_string();
        caption.attributes.insert("sec:type".to_string(), kind);
        elem.children.push(XMLNode::Element(caption));
    }

    elem
}

/// Produit un document DIDL-Lite (sans déclaration XML) pour `items`.
pub fn render_didl<'a, I>(items: I, base: UrlBase<'_>) -> Result<String, xmltree::Error>
where
    I: IntoIterator<Item = &'a dyn MediaItem>,
{
    let mut root = Element::new("DIDL-Lite");
    for (attr, ns) in [
        ("xmlns", DIDL_NS),
        ("xmlns:dc", DC_NS),
        ("xmlns:upnp", UPNP_NS),
        ("xmlns:dlna", DLNA_NS),
        ("xmlns:sec", SEC_NS),
    ] {
        root.attributes.insert(attr.to_string(), ns.to_string());
    }

    for item in items {
        root.children
            .push(XMLNode::Element(object_element(item, base)));
    }

    let mut buf = Vec::new();
    let config = EmitterConfig::new()
        .write_document_declaration(false)
        .perform_indent(false);
    root.write_with_config(&mut buf, config)?;

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MediaResource, ResourceReader};
    use async_trait::async_trait;
    use std::sync::Arc;

    #[derive(Debug)]
    struct Blob(&'static str, u64);

    #[async_trait]
    impl MediaResource for Blob {
        fn content_type(&self) -> &str {
            self.0
        }

        fn size(&self) -> Option<u64> {
            Some(self.1)
        }

        async fn open(&self) -> std::io::Result<Box<dyn ResourceReader>> {
            Ok(Box::new(std::io::Cursor::new(Vec::new())))
        }
    }

    #[derive(Debug)]
    struct Track;

    impl MediaItem for Track {
        fn id(&self) -> &str {
            "42"
        }

        fn title(&self) -> &str {
            "Song & Dance"
        }

        fn parent_id(&self) -> Option<&str> {
            Some("0")
        }

        fn content(&self) -> Option<Arc<dyn MediaResource>> {
            Some(Arc::new(Blob("audio/flac", 1234)))
        }

        fn cover(&self) -> Option<Arc<dyn MediaResource>> {
            Some(Arc::new(Blob("image/jpeg", 10)))
        }
    }

    #[test]
    fn test_upnp_class_from_mime() {
        assert_eq!(upnp_class("audio/mpeg"), "object.item.audioItem.musicTrack");
        assert_eq!(upnp_class("video/mp4"), "object.item.videoItem");
        assert_eq!(upnp_class("image/png"), "object.item.imageItem.photo");
        assert_eq!(upnp_class(""), "object.item");
    }

    #[test]
    fn test_item_rendering() {
        let track = Track;
        let base = UrlBase {
            host: "192.168.1.2:8080",
            prefix: "/mm-3/",
        };
        let xml = render_didl([&track as &dyn MediaItem], base).unwrap();

        assert!(xml.starts_with("<DIDL-Lite"));
        assert!(xml.contains(r#"id="42""#));
        assert!(xml.contains(r#"parentID="0""#));
        assert!(xml.contains("Song &amp; Dance"));
        assert!(xml.contains("http://192.168.1.2:8080/mm-3/file/42"));
        assert!(xml.contains("http://192.168.1.2:8080/mm-3/cover/42"));
        assert!(xml.contains(r#"protocolInfo="http-get:*:audio/flac:*""#));
        assert!(xml.contains(r#"size="1234""#));
        assert!(!xml.contains("subtitle/42"));
        assert!(xml.contains(r#"dlna:profileID="JPEG_TN""#));
    }

    #[derive(Debug)]
    struct Poster;

    impl MediaItem for Poster {
        fn id(&self) -> &str {
            "43"
        }

        fn title(&self) -> &str {
            "Poster"
        }

        fn cover(&self) -> Option<Arc<dyn MediaResource>> {
            Some(Arc::new(Blob("image/png", 10)))
        }
    }

    #[test]
    fn test_png_cover_profile() {
        let base = UrlBase {
            host: "h",
            prefix: "/mm-1/",
        };
        let xml = render_didl([&Poster as &dyn MediaItem], base).unwrap();
        assert!(xml.contains(r#"dlna:profileID="PNG_TN""#));
        assert!(!xml.contains("JPEG_TN"));
        assert_eq!(thumbnail_profile("image/jpeg"), "JPEG_TN");
    }
}
