//! Document Tree
//!
//! A small owned element tree. Parsing and writing go through quick-xml; the
//! encoder and decoder only ever see [`Element`]s.

use crate::error::SerializeError;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

/// One element with its attributes, text and children
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    /// Create an empty element
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Element name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set an attribute, replacing a previous value
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl ToString) {
        let name = name.into();
        let value = value.to_string();
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Builder form of [`Element::set_attribute`]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Set the attribute only when a value is present
    pub fn set_optional(&mut self, name: &str, value: Option<impl ToString>) {
        if let Some(value) = value {
            self.set_attribute(name, value);
        }
    }

    /// Attribute value
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Attribute value, failing when absent
    pub fn required(&self, name: &'static str) -> Result<&str, SerializeError> {
        self.attribute(name)
            .ok_or_else(|| SerializeError::MissingAttribute {
                element: self.name.clone(),
                attribute: name,
            })
    }

    /// Attribute parsed into `T`, failing when absent or invalid
    pub fn parse_required<T: std::str::FromStr>(&self, name: &'static str) -> Result<T, SerializeError> {
        let raw = self.required(name)?;
        self.parse_value(name, raw)
    }

    /// Attribute parsed into `T` when present
    pub fn parse_optional<T: std::str::FromStr>(&self, name: &str) -> Result<Option<T>, SerializeError> {
        self.attribute(name)
            .map(|raw| self.parse_value(name, raw))
            .transpose()
    }

    fn parse_value<T: std::str::FromStr>(&self, name: &str, raw: &str) -> Result<T, SerializeError> {
        raw.trim().parse().map_err(|_| SerializeError::InvalidAttribute {
            element: self.name.clone(),
            attribute: name.to_string(),
            value: raw.to_string(),
        })
    }

    /// Attributes in document order
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Text content
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Set text content
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Append a child
    pub fn push(&mut self, child: Element) {
        self.children.push(child);
    }

    /// All children in document order
    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// Children with the given name
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// First child with the given name
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.name == name)
    }

    /// Parse a document and return its root element
    pub fn parse(xml: &str) -> Result<Element, SerializeError> {
        let mut reader = Reader::from_str(xml);

        let mut stack: Vec<Element> = Vec::new();
        let mut root = None;

        loop {
            match reader.read_event().map_err(SerializeError::xml)? {
                Event::Start(start) => stack.push(from_start(&start)?),
                Event::Empty(start) => attach(&mut stack, &mut root, from_start(&start)?)?,
                Event::End(_) => {
                    let mut element = stack
                        .pop()
                        .ok_or(SerializeError::Unbalanced("closing tag without opening tag"))?;
                    // indentation between children; leaf text is kept verbatim
                    if !element.children.is_empty() && element.text.trim().is_empty() {
                        element.text.clear();
                    }
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    if let Some(current) = stack.last_mut() {
                        current
                            .text
                            .push_str(&text.unescape().map_err(SerializeError::xml)?);
                    }
                }
                Event::CData(data) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&String::from_utf8_lossy(&data));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(SerializeError::Unbalanced("unclosed element"));
        }
        root.ok_or(SerializeError::EmptyDocument)
    }

    /// Write the element as an indented document with an XML declaration
    pub fn to_xml(&self) -> Result<String, SerializeError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(SerializeError::xml)?;
        write_element(&mut writer, self).map_err(SerializeError::xml)?;

        String::from_utf8(writer.into_inner()).map_err(SerializeError::xml)
    }
}

fn from_start(start: &BytesStart<'_>) -> Result<Element, SerializeError> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for attribute in start.attributes() {
        let attribute = attribute.map_err(SerializeError::xml)?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute.unescape_value().map_err(SerializeError::xml)?;
        element.attributes.push((key, value.into_owned()));
    }
    Ok(element)
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), SerializeError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_some() => return Err(SerializeError::Unbalanced("multiple root elements")),
        None => *root = Some(element),
    }
    Ok(())
}

fn write_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    element: &Element,
) -> Result<(), quick_xml::Error> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() && element.text.is_empty() {
        return writer.write_event(Event::Empty(start));
    }

    writer.write_event(Event::Start(start))?;
    if !element.text.is_empty() {
        writer.write_event(Event::Text(BytesText::new(&element.text)))?;
    }
    for child in &element.children {
        write_element(writer, child)?;
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested() {
        let root = Element::parse(
            r#"<?xml version="1.0"?>
            <suite uuid="abc">
              <env><uname os="linux"/></env>
              <error code="3">went &amp; failed</error>
            </suite>"#,
        )
        .unwrap();

        assert_eq!(root.name(), "suite");
        assert_eq!(root.attribute("uuid"), Some("abc"));
        let env = root.child("env").unwrap();
        assert_eq!(env.children()[0].attribute("os"), Some("linux"));
        assert_eq!(root.child("error").unwrap().text(), "went & failed");
    }

    #[test]
    fn test_written_document_parses_back() {
        let mut root = Element::new("suite").with_attribute("context", "a \"quoted\" <ctx>");
        let mut error = Element::new("error").with_attribute("line", 12);
        error.set_text("x < y");
        root.push(error);
        root.push(Element::new("benchmark").with_attribute("class", "sorting"));

        let xml = root.to_xml().unwrap();
        assert!(xml.starts_with("<?xml"));
        assert_eq!(Element::parse(&xml).unwrap(), root);
    }

    #[test]
    fn test_leaf_text_keeps_surrounding_whitespace() {
        let mut root = Element::new("variant");
        let mut error = Element::new("error").with_attribute("exception-class", "NoiseDetected");
        error.set_text("benchmark made noise:  debug: still here\n");
        root.push(error);

        let parsed = Element::parse(&root.to_xml().unwrap()).unwrap();

        assert_eq!(parsed.text(), "");
        assert_eq!(
            parsed.child("error").unwrap().text(),
            "benchmark made noise:  debug: still here\n"
        );
    }

    #[test]
    fn test_unbalanced_documents() {
        assert!(Element::parse("<suite><benchmark></suite>").is_err());
        assert!(Element::parse("<suite><benchmark>").is_err());
        assert!(matches!(
            Element::parse("<suite/><suite/>"),
            Err(SerializeError::Unbalanced(_))
        ));
    }

    #[test]
    fn test_empty_document() {
        assert!(matches!(Element::parse(""), Err(SerializeError::EmptyDocument)));
    }

    #[test]
    fn test_typed_attributes() {
        let element = Element::new("variant")
            .with_attribute("revs", 10)
            .with_attribute("warmup", "x");

        assert_eq!(element.parse_required::<u32>("revs").unwrap(), 10);
        assert!(matches!(
            element.parse_required::<u32>("warmup"),
            Err(SerializeError::InvalidAttribute { .. })
        ));
        assert!(matches!(
            element.parse_required::<u32>("sleep"),
            Err(SerializeError::MissingAttribute { .. })
        ));
        assert_eq!(element.parse_optional::<u64>("sleep").unwrap(), None);
    }
}
