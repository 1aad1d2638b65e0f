//! Index HTML navigable des items d'un montage.

use axum::http::StatusCode;
use xmltree::{Element, EmitterConfig, XMLNode};

use crate::backend::MediaItem;
use crate::error::MountError;
use crate::response::MountResponse;

/// Collaborateur qui produit la page `index/<id>` d'un item.
pub trait IndexRenderer: Send + Sync {
    fn render(&self, prefix: &str, item: &dyn MediaItem) -> Result<MountResponse, MountError>;
}

/// Rendu HTML minimal : titre, lien vers le parent, enfants et ressources.
#[derive(Debug, Clone, Default)]
pub struct HtmlIndex;

fn text_element(name: &str, text: impl Into<String>) -> Element {
    let mut elem = Element::new(name);
    elem.children.push(XMLNode::Text(text.into()));
    elem
}

fn link(href: String, text: &str) -> Element {
    let mut a = text_element("a", text);
    a.attributes.insert("href".to_string(), href);
    a
}

fn list_entry(content: Element) -> XMLNode {
    let mut li = Element::new("li");
    li.children.push(XMLNode::Element(content));
    XMLNode::Element(li)
}

impl IndexRenderer for HtmlIndex {
    fn render(&self, prefix: &str, item: &dyn MediaItem) -> Result<MountResponse, MountError> {
        let mut head = Element::new("head");
        let mut meta = Element::new("meta");
        meta.attributes
            .insert("charset".to_string(), "utf-8".to_string());
        head.children.push(XMLNode::Element(meta));
        head.children
            .push(XMLNode::Element(text_element("title", item.title())));

        let mut body = Element::new("body");
        body.children
            .push(XMLNode::Element(text_element("h1", item.title())));

        if let Some(parent) = item.parent_id() {
            body.children.push(XMLNode::Element(link(
                format!("{}index/{}", prefix, parent),
                "..",
            )));
        }

        let mut resources = Element::new("ul");
        resources.attributes
            .insert("class".to_string(), "resources".to_string());
        for (route, present) in [
            ("file", item.content().is_some()),
            ("cover", item.cover().is_some()),
            ("subtitle", item.subtitle().is_some()),
        ] {
            if present {
                resources.children.push(list_entry(link(
                    format!("{}{}/{}", prefix, route, item.id()),
                    route,
                )));
            }
        }
        if !resources.children.is_empty() {
            body.children.push(XMLNode::Element(resources));
        }

        let children = item.children();
        if !children.is_empty() {
            let mut list = Element::new("ul");
            list.attributes
                .insert("class".to_string(), "children".to_string());
            for child in &children {
                list.children.push(list_entry(link(
                    format!("{}index/{}", prefix, child.id()),
                    child.title(),
                )));
            }
            body.children.push(XMLNode::Element(list));
        }

        let mut html = Element::new("html");
        html.children.push(XMLNode::Element(head));
        html.children.push(XMLNode::Element(body));

        let mut buf = b"<!DOCTYPE html>\n".to_vec();
        let config = EmitterConfig::new()
            .write_document_declaration(false)
            .normalize_empty_elements(false)
            .perform_indent(true);
        html.write_with_config(&mut buf, config)?;

        Ok(MountResponse::Html {
            status: StatusCode::OK,
            body: String::from_utf8_lossy(&buf).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Debug)]
    struct Node {
        id: &'static str,
        title: &'static str,
        parent: Option<&'static str>,
        kids: Vec<Arc<dyn MediaItem>>,
    }

    impl MediaItem for Node {
        fn id(&self) -> &str {
            self.id
        }

        fn title(&self) -> &str {
            self.title
        }

        fn parent_id(&self) -> Option<&str> {
            self.parent
        }

        fn is_container(&self) -> bool {
            !self.kids.is_empty()
        }

        fn children(&self) -> Vec<Arc<dyn MediaItem>> {
            self.kids.clone()
        }
    }

    #[test]
    fn test_index_lists_children() {
        let leaf: Arc<dyn MediaItem> = Arc::new(Node {
            id: "a1",
            title: "Album <1>",
            parent: Some("0"),
            kids: Vec::new(),
        });
        let root = Node {
            id: "0",
            title: "Music",
            parent: None,
            kids: vec![leaf],
        };

        let response = HtmlIndex.render("/mm-2/", &root).unwrap();
        let MountResponse::Html { status, body } = response else {
            panic!("expected an HTML page");
        };
        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with("<!DOCTYPE html>"));
        assert!(body.contains(r#"href="/mm-2/index/a1""#));
        assert!(body.contains("Album &lt;1"));
        assert!(!body.contains(".."));
        assert!(!body.contains("/mm-2/file/0"));
    }
}
