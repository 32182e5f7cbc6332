//! The wire format tree.
//!
//! Every wire document is a single XML element tree. [`Element`] is the in-memory form used by
//! both directions: the encoder builds one and renders it, the decoders parse one and walk it.
//!
//! Rendering is compact and deterministic: no declaration, no indentation, attributes in
//! insertion order, double-quoted values, childless elements self-closed. Attribute values
//! carry line breaks and tabs as character references so a conforming reader does not fold
//! them into spaces. Control characters XML cannot carry at all become U+FFFD.

use crate::{WireError, WireResult};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Tag names used on the wire.
pub mod tags {
    pub const QUANTITY: &str = "quantity";
    pub const QUANTITY_SAMPLE: &str = "quantitySample";
    pub const CATEGORY: &str = "category";
    pub const CATEGORY_SAMPLE: &str = "categorySample";
    pub const CORRELATION: &str = "correlation";
    pub const CORRELATION_SAMPLE: &str = "correlationSample";
    pub const CHARACTERISTIC: &str = "characteristic";
    pub const WORKOUT: &str = "workout";
    pub const WORKOUT_SAMPLE: &str = "workoutSample";
    pub const TOTAL_DISTANCE: &str = "totalDistance";
    pub const TOTAL_ENERGY_BURNED: &str = "totalEnergyBurned";
    pub const EVENT: &str = "event";
    pub const STATISTICS: &str = "statistics";
    pub const STATISTICS_COLLECTION: &str = "statisticsCollection";
    pub const STATISTIC: &str = "statistic";
    pub const INTERVAL: &str = "interval";
    pub const DOCUMENTS: &str = "documents";
    pub const DOCUMENT: &str = "document";
    pub const CONTENT: &str = "content";
    pub const PEDOMETER: &str = "pedometer";
    pub const PEDOMETER_DATA: &str = "pedometerData";
    pub const COMBINED: &str = "combined";
    pub const TOTAL: &str = "total";
    pub const SOURCE: &str = "source";
    pub const METADATA: &str = "metadata";
    pub const ENTRY: &str = "entry";
    pub const ERROR: &str = "error";
}

/// One node of a wire document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: Option<String>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
            children: Vec::new(),
            text: None,
        }
    }

    /// Set an attribute, replacing an earlier value for the same key in place.
    pub fn attr(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Set an attribute only when `value` is present.
    pub fn attr_opt<V: Into<String>>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.attr(key, value),
            None => self,
        }
    }

    pub fn set_attr(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key.to_owned(), value)),
        }
    }

    pub fn child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// First child with the given tag.
    pub fn find(&self, tag: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.tag == tag)
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty() && self.text.is_none()
    }

    /// Render this element and its subtree.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_into(&mut out);
        out
    }

    fn write_into(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag);
        for (key, value) in &self.attributes {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            escape_into(out, value, true);
            out.push('"');
        }
        if self.is_leaf() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        if let Some(text) = &self.text {
            escape_into(out, text, false);
        }
        for child in &self.children {
            child.write_into(out);
        }
        out.push_str("</");
        out.push_str(&self.tag);
        out.push('>');
    }

    /// Parse a complete document into its root element.
    ///
    /// Whitespace-only text is dropped from elements that have children and kept in those that
    /// do not. Comments, processing instructions and the XML declaration are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Xml`] for syntax errors, mismatched or unclosed tags, stray text
    /// outside the root, duplicate attributes and documents with zero or several roots.
    pub fn parse(xml: &str) -> WireResult<Element> {
        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let event = reader.read_event().map_err(|e| {
                WireError::Xml(format!("{e} at position {}", reader.buffer_position()))
            })?;
            match event {
                Event::Start(start) => {
                    let element = open(&start)?;
                    if stack.is_empty() && root.is_some() {
                        return Err(WireError::Xml("multiple root elements".into()));
                    }
                    stack.push(element);
                }
                Event::Empty(start) => {
                    let element = open(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let mut element = stack
                        .pop()
                        .ok_or_else(|| WireError::Xml("closing tag without opening tag".into()))?;
                    if !element.children.is_empty()
                        && element.text.as_deref().is_some_and(|t| t.trim().is_empty())
                    {
                        element.text = None;
                    }
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    let text = text
                        .unescape()
                        .map_err(|e| WireError::Xml(e.to_string()))?;
                    append_text(&mut stack, &text)?;
                }
                Event::CData(data) => {
                    let text = std::str::from_utf8(data.as_ref())
                        .map_err(|e| WireError::Xml(e.to_string()))?;
                    append_text(&mut stack, text)?;
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(WireError::Xml(format!(
                "unexpected end of input inside <{}>",
                open.tag
            )));
        }
        root.ok_or_else(|| WireError::Xml("document has no root element".into()))
    }
}

fn open(start: &BytesStart<'_>) -> WireResult<Element> {
    let tag = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| WireError::Xml(e.to_string()))?
        .to_owned();
    let mut element = Element::new(tag);
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| WireError::Xml(e.to_string()))?;
        let key = std::str::from_utf8(attribute.key.as_ref())
            .map_err(|e| WireError::Xml(e.to_string()))?
            .to_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| WireError::Xml(e.to_string()))?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> WireResult<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        return Ok(());
    }
    if root.is_some() {
        return Err(WireError::Xml("multiple root elements".into()));
    }
    *root = Some(element);
    Ok(())
}

fn append_text(stack: &mut [Element], text: &str) -> WireResult<()> {
    match stack.last_mut() {
        Some(top) => {
            top.text.get_or_insert_with(String::new).push_str(text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(WireError::Xml(format!("text outside root element: '{}'", text.trim()))),
    }
}

fn escape_into(out: &mut String, value: &str, attribute: bool) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\n' if attribute => out.push_str("&#10;"),
            '\t' if attribute => out.push_str("&#9;"),
            '\r' => out.push_str("&#13;"),
            '\n' | '\t' => out.push(c),
            c if (c as u32) < 0x20 => out.push(char::REPLACEMENT_CHARACTER),
            '\u{FFFE}' | '\u{FFFF}' => out.push(char::REPLACEMENT_CHARACTER),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_compact_and_escaped() {
        let element = Element::new("entry")
            .attr("key", "note")
            .attr("value", "a < b & \"c\"");
        assert_eq!(
            element.to_xml(),
            "<entry key=\"note\" value=\"a &lt; b &amp; &quot;c&quot;\"/>"
        );

        let nested = Element::new("metadata").child(element.clone());
        assert!(nested.to_xml().starts_with("<metadata><entry "));
        assert!(nested.to_xml().ends_with("</metadata>"));
    }

    #[test]
    fn attribute_whitespace_survives_as_references() {
        let element = Element::new("entry").attr("value", "a\nb\tc\rd");
        let xml = element.to_xml();
        assert_eq!(xml, "<entry value=\"a&#10;b&#9;c&#13;d\"/>");
        assert_eq!(Element::parse(&xml).expect("parses"), element);

        let bell = Element::new("entry").attr("value", "ring\u{7}").to_xml();
        assert_eq!(bell, "<entry value=\"ring\u{FFFD}\"/>");
        assert!(Element::parse(&bell).is_ok());
    }

    #[test]
    fn whitespace_text_is_kept_in_leaves_only() {
        let parsed = Element::parse("<document><content>  \n </content></document>")
            .expect("well formed");
        assert_eq!(parsed.text, None);
        assert_eq!(parsed.children[0].text.as_deref(), Some("  \n "));

        let content = Element::new("content").with_text("line one\n\tline two\r\n");
        assert_eq!(Element::parse(&content.to_xml()).expect("parses"), content);
    }

    #[test]
    fn attr_replaces_in_place() {
        let element = Element::new("x").attr("a", "1").attr("b", "2").attr("a", "3");
        let attrs: Vec<_> = element.attributes().collect();
        assert_eq!(attrs, vec![("a", "3"), ("b", "2")]);
    }

    #[test]
    fn parses_what_it_renders() {
        let original = Element::new("documents")
            .attr("done", "true")
            .child(
                Element::new("document")
                    .attr("title", "Visit & summary")
                    .child(Element::new("content").with_text("<ClinicalDocument/>")),
            );
        let parsed = Element::parse(&original.to_xml()).expect("own output parses");
        assert_eq!(parsed, original);
    }

    #[test]
    fn accepts_single_quotes_and_whitespace() {
        let parsed = Element::parse("<?xml version='1.0'?>\n<and>\n  <eq field='x' value='1'/>\n</and>")
            .expect("well formed");
        assert_eq!(parsed.tag, "and");
        assert_eq!(parsed.children.len(), 1);
        assert_eq!(parsed.children[0].attribute("field"), Some("x"));
        assert!(parsed.text.is_none());
    }

    #[test]
    fn rejects_structural_errors() {
        for bad in [
            "<and><eq field='x'/>",
            "<and></or>",
            "<a/><b/>",
            "hello",
            "",
            "<eq field='x' field='y'/>",
        ] {
            let err = Element::parse(bad).expect_err("must be rejected");
            assert!(matches!(err, WireError::Xml(_)), "{bad}: {err:?}");
        }
    }
}
