//! Lightweight element tree for ADX markup.
//!
//! ADX files are read leniently: anything before the first `<` is dropped
//! and a syntax error part-way through keeps whatever was parsed up to
//! that point.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// A parsed markup element with its attributes, children and direct text.
#[derive(Debug, Clone, Default)]
pub struct Element {
    /// Tag name
    pub name: String,
    /// Attributes in document order, values unescaped
    pub attributes: Vec<(String, String)>,
    /// Child elements in document order
    pub children: Vec<Element>,
    /// Concatenated direct text, untrimmed
    pub text: String,
}

impl Element {
    fn from_start(e: &BytesStart) -> Self {
        let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
        let attributes = e
            .attributes()
            .flatten()
            .map(|attr| {
                let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
                let value = attr
                    .unescape_value()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).to_string());
                (key, value)
            })
            .collect();

        Self {
            name,
            attributes,
            children: Vec::new(),
            text: String::new(),
        }
    }

    /// Look up an attribute value by name. Empty values count as absent.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }

    /// Trimmed text content of this element.
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    /// All descendants named `name`, in document order (self excluded).
    pub fn descendants<'a, 'n>(&'a self, name: &'n str) -> Descendants<'a, 'n> {
        Descendants {
            stack: self.children.iter().rev().collect(),
            name,
        }
    }

    /// First descendant named `name`, in document order.
    pub fn first(&self, name: &str) -> Option<&Element> {
        self.descendants(name).next()
    }

    /// The first top-level element when `self` is a document node.
    pub fn root(&self) -> Option<&Element> {
        self.children.first()
    }
}

/// Pre-order iterator over descendants with a given name.
pub struct Descendants<'a, 'n> {
    stack: Vec<&'a Element>,
    name: &'n str,
}

impl<'a> Iterator for Descendants<'a, '_> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            self.stack.extend(node.children.iter().rev());
            if node.name == self.name {
                return Some(node);
            }
        }
        None
    }
}

/// Find where the markup starts, skipping any binary or garbage prefix.
pub fn markup_start(input: &str) -> Option<usize> {
    input.find('<')
}

/// Parse markup into a document node whose children are the top-level
/// elements.
pub fn parse_document(xml: &str) -> Element {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    // stack[0] is the document node
    let mut stack: Vec<Element> = vec![Element::default()];

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                stack.push(Element::from_start(e));
            }
            Ok(Event::Empty(ref e)) => {
                let element = Element::from_start(e);
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(element);
                }
            }
            Ok(Event::End(_)) => {
                if stack.len() > 1 {
                    close_element(&mut stack);
                }
            }
            Ok(Event::Text(ref e)) => {
                if let Some(current) = stack.last_mut() {
                    let text = e
                        .unescape()
                        .map(|t| t.to_string())
                        .unwrap_or_else(|_| String::from_utf8_lossy(e.as_ref()).to_string());
                    current.text.push_str(&text);
                }
            }
            Ok(Event::CData(ref e)) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::warn!(
                    "ADX markup error at byte {}: {e}; keeping elements parsed so far",
                    reader.buffer_position()
                );
                break;
            }
            _ => {}
        }
    }

    // Close anything left open by truncation or a syntax error
    while stack.len() > 1 {
        close_element(&mut stack);
    }

    stack.pop().unwrap_or_default()
}

fn close_element(stack: &mut Vec<Element>) {
    if let Some(done) = stack.pop() {
        if let Some(parent) = stack.last_mut() {
            parent.children.push(done);
        }
    }
}
