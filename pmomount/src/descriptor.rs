//! Génération du document de description du device.
//!
//! Le modèle embarqué est analysé une seule fois ; chaque requête travaille sur
//! une copie dont six éléments sont remplacés. Les éléments sont retrouvés par
//! nom de balise (premier élément correspondant dans l'ordre du document), ce qui
//! rend la substitution insensible aux attributs et aux espaces du modèle.

use rust_embed::RustEmbed;
use std::io::Cursor;
use uuid::Uuid;
use xmltree::{Element, EmitterConfig, XMLNode};

use crate::error::MountError;

/// Ressources embarquées à la compilation.
#[derive(RustEmbed)]
#[folder = "resources/"]
pub struct Resources;

/// Clé du modèle de description du device.
pub const DESCRIPTION_TEMPLATE: &str = "description.xml";

/// Clé du schéma du service ContentDirectory.
pub const CONTENT_DIRECTORY_SCHEMA: &str = "contentDirectory.xml";

const SUBSTITUTED_TAGS: [&str; 6] = [
    "UDN",
    "modelNumber",
    "friendlyName",
    "SCPDURL",
    "controlURL",
    "eventSubURL",
];

/// Valeurs propres à une requête.
#[derive(Debug, Clone)]
pub struct DescriptorFields<'a> {
    pub uuid: Uuid,
    pub model_number: &'a str,
    pub friendly_name: String,
    pub prefix: &'a str,
}

#[derive(Debug, Clone)]
pub struct DescriptorGenerator {
    template: Element,
}

impl DescriptorGenerator {
    /// Charge le modèle embarqué.
    pub fn bundled() -> Result<Self, MountError> {
        let file = Resources::get(DESCRIPTION_TEMPLATE).ok_or_else(|| {
            MountError::Configuration(format!("missing bundled resource {}", DESCRIPTION_TEMPLATE))
        })?;
        Self::from_template(&file.data)
    }

    /// Analyse un modèle et vérifie qu'il contient toutes les balises substituées.
    pub fn from_template(xml: &[u8]) -> Result<Self, MountError> {
        let mut template = Element::parse(Cursor::new(xml))
            .map_err(|e| MountError::Configuration(format!("malformed device template: {}", e)))?;

        for tag in SUBSTITUTED_TAGS {
            if first_element_mut(&mut template, tag).is_none() {
                return Err(MountError::Configuration(format!(
                    "device template has no <{}> element",
                    tag
                )));
            }
        }

        Ok(Self { template })
    }

    /// Produit le document complet pour une requête.
    pub fn render(&self, fields: &DescriptorFields<'_>) -> Result<String, MountError> {
        let mut doc = self.template.clone();

        let values = [
            ("UDN", format!("uuid:{}", fields.uuid)),
            ("modelNumber", fields.model_number.to_string()),
            ("friendlyName", fields.friendly_name.clone()),
            ("SCPDURL", format!("{}contentDirectory.xml", fields.prefix)),
            ("controlURL", format!("{}control", fields.prefix)),
            ("eventSubURL", format!("{}events", fields.prefix)),
        ];

        for (tag, value) in values {
            let elem = first_element_mut(&mut doc, tag).ok_or_else(|| {
                MountError::Configuration(format!("device template has no <{}> element", tag))
            })?;
            elem.children.clear();
            elem.children.push(XMLNode::Text(value));
        }

        let mut buf = Vec::new();
        let config = EmitterConfig::new()
            .write_document_declaration(true)
            .perform_indent(true)
            .indent_string("  ");
        doc.write_with_config(&mut buf, config)?;

        String::from_utf8(buf)
            .map_err(|e| MountError::Configuration(format!("descriptor is not UTF-8: {}", e)))
    }
}

/// Premier élément nommé `name`, en profondeur d'abord, racine comprise.
pub(crate) fn first_element_mut<'a>(elem: &'a mut Element, name: &str) -> Option<&'a mut Element> {
    if elem.name == name {
        return Some(elem);
    }
    for child in elem.children.iter_mut() {
        if let XMLNode::Element(child) = child {
            if let Some(found) = first_element_mut(child, name) {
                return Some(found);
            }
        }
    }
    None
}
