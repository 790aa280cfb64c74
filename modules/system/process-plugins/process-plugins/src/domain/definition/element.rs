//! Minimal namespace-agnostic XML element tree.
//!
//! Tags and attributes are keyed by local name only, so `bpmn:serviceTask`,
//! `bpmn2:serviceTask` and `serviceTask` are the same element and
//! `camunda:class` and `operaton:class` the same attribute.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::domain::error::DefinitionError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    /// Parses `xml` and returns its root element.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError::Xml`] for malformed input and
    /// [`DefinitionError::Empty`] if the document has no root element.
    pub fn parse(xml: &str) -> Result<Self, DefinitionError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut open: Vec<Element> = Vec::new();
        let mut root = None;

        loop {
            match reader.read_event()? {
                Event::Start(start) => open.push(Self::open(&start)?),
                Event::Empty(start) => {
                    let element = Self::open(&start)?;
                    Self::attach(&mut open, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = open
                        .pop()
                        .ok_or_else(|| DefinitionError::Xml("unbalanced end tag".to_owned()))?;
                    Self::attach(&mut open, &mut root, element)?;
                }
                Event::Text(text) => {
                    if let Some(current) = open.last_mut() {
                        current.text.push_str(&text.unescape()?);
                    }
                }
                Event::CData(data) => {
                    if let Some(current) = open.last_mut() {
                        let data = data.into_inner();
                        let data = std::str::from_utf8(&data)
                            .map_err(|e| DefinitionError::Xml(e.to_string()))?;
                        current.text.push_str(data);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(unclosed) = open.last() {
            return Err(DefinitionError::Xml(format!(
                "element '{}' is not closed",
                unclosed.name
            )));
        }
        root.ok_or(DefinitionError::Empty)
    }

    fn open(start: &BytesStart<'_>) -> Result<Self, DefinitionError> {
        let name = utf8(start.local_name().as_ref())?;
        let mut attributes = Vec::new();
        for attribute in start.attributes() {
            let attribute = attribute?;
            let key = utf8(attribute.key.local_name().as_ref())?;
            let value = attribute.unescape_value()?.into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name,
            attributes,
            children: Vec::new(),
            text: String::new(),
        })
    }

    fn attach(
        open: &mut [Element],
        root: &mut Option<Element>,
        element: Element,
    ) -> Result<(), DefinitionError> {
        if let Some(parent) = open.last_mut() {
            parent.children.push(element);
            return Ok(());
        }
        if root.is_some() {
            return Err(DefinitionError::Xml(
                "document has more than one root element".to_owned(),
            ));
        }
        *root = Some(element);
        Ok(())
    }

    /// Local tag name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn attribute(&self, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == local_name)
            .map(|(_, value)| value.as_str())
    }

    /// Attribute value, `None` when missing or blank.
    #[must_use]
    pub fn non_blank_attribute(&self, local_name: &str) -> Option<&str> {
        self.attribute(local_name).filter(|v| !v.trim().is_empty())
    }

    #[must_use]
    pub fn children(&self) -> &[Element] {
        &self.children
    }

    #[must_use]
    pub fn child(&self, local_name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == local_name)
    }

    pub fn children_named<'a>(&'a self, local_name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == local_name)
    }

    /// Concatenated, trimmed character data of this element.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

fn utf8(bytes: &[u8]) -> Result<String, DefinitionError> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|e| DefinitionError::Xml(e.to_string()))
}
