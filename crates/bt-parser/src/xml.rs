use std::collections::BTreeMap;

use bt_core::{BtError, SourceLocation, SourceSpan};
use roxmltree::{Document, Node};

#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    pub root: XmlElementNode,
}

/// One element of a tree document. Text and comment nodes are dropped at
/// parse time; child order is build order.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElementNode {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    pub children: Vec<XmlElementNode>,
    pub location: SourceSpan,
}

pub fn parse_xml_document(source: &str) -> Result<XmlDocument, BtError> {
    let document = Document::parse(source)
        .map_err(|error| BtError::new("XML_PARSE_ERROR", error.to_string()))?;

    let Some(root) = document.root().children().find(|node| node.is_element()) else {
        return Err(BtError::new(
            "XML_PARSE_ERROR",
            "XML document must contain a root element.",
        ));
    };

    Ok(XmlDocument {
        root: parse_element(&document, root),
    })
}

fn parse_element(document: &Document<'_>, node: Node<'_, '_>) -> XmlElementNode {
    let mut attributes = BTreeMap::new();
    for attribute in node.attributes() {
        attributes.insert(attribute.name().to_string(), attribute.value().to_string());
    }

    let children = node
        .children()
        .filter(|child| child.is_element())
        .map(|child| parse_element(document, child))
        .collect();

    XmlElementNode {
        tag: node.tag_name().name().to_string(),
        attributes,
        children,
        location: node_span(document, node.range().start, node.range().end),
    }
}

fn node_span(document: &Document<'_>, start: usize, end: usize) -> SourceSpan {
    let start_pos = document.text_pos_at(start);
    let end_pos = document.text_pos_at(end);
    SourceSpan {
        start: SourceLocation {
            line: start_pos.row as usize,
            column: start_pos.col as usize,
        },
        end: SourceLocation {
            line: end_pos.row as usize,
            column: end_pos.col as usize,
        },
    }
}
