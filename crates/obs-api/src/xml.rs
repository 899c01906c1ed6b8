//! A minimal owned element tree over [`xmlparser`], enough for OBS documents.
//!
//! Namespaces are ignored, text and attribute values are entity-decoded.

use std::borrow::Cow;

use thiserror::Error;
use xmlparser::{ElementEnd, Token, Tokenizer};

/// Failure to turn a response body into an [`Element`] tree.
#[derive(Debug, Error)]
pub enum XmlError {
    /// The tokenizer rejected the input.
    #[error(transparent)]
    Syntax(#[from] xmlparser::Error),

    /// The body is not UTF-8.
    #[error("document is not valid UTF-8")]
    Encoding(#[from] std::str::Utf8Error),

    /// Start and end tags do not pair up.
    #[error("unbalanced element structure")]
    Unbalanced,

    /// No root element was found.
    #[error("document has no root element")]
    Empty,
}

/// An XML element with its attributes, child elements and concatenated text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Self::default()
        }
    }

    /// Parse a complete document and return its root element.
    pub fn parse(document: &[u8]) -> Result<Self, XmlError> {
        let document = std::str::from_utf8(document)?;
        let mut open: Vec<Self> = Vec::new();
        let mut root = None;

        for token in Tokenizer::from(document) {
            match token? {
                Token::ElementStart { local, .. } => open.push(Self::named(local.as_str())),
                Token::Attribute { local, value, .. } => {
                    let element = open.last_mut().ok_or(XmlError::Unbalanced)?;
                    element
                        .attributes
                        .push((local.as_str().to_owned(), unescape(value.as_str()).into_owned()));
                }
                Token::ElementEnd { end, .. } => match end {
                    ElementEnd::Open => {}
                    ElementEnd::Close(..) | ElementEnd::Empty => {
                        let done = open.pop().ok_or(XmlError::Unbalanced)?;
                        match open.last_mut() {
                            Some(parent) => parent.children.push(done),
                            None if root.is_none() => root = Some(done),
                            None => return Err(XmlError::Unbalanced),
                        }
                    }
                },
                Token::Text { text } => {
                    if let Some(element) = open.last_mut() {
                        element.text.push_str(&unescape(text.as_str()));
                    }
                }
                Token::Cdata { text, .. } => {
                    if let Some(element) = open.last_mut() {
                        element.text.push_str(text.as_str());
                    }
                }
                _ => {}
            }
        }

        if !open.is_empty() {
            return Err(XmlError::Unbalanced);
        }
        root.ok_or(XmlError::Empty)
    }

    /// The local element name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The value of attribute `name`, if present.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// The element's text with surrounding whitespace removed.
    #[must_use]
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    /// All child elements in document order.
    #[must_use]
    pub fn children(&self) -> &[Self] {
        &self.children
    }

    /// The first child element called `name`.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Self> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Text of the first child element called `name`, if it has any.
    #[must_use]
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(Self::text).filter(|t| !t.is_empty())
    }

    /// Child elements called `name`.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Self> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }
}

fn unescape(raw: &str) -> Cow<'_, str> {
    if !raw.contains('&') {
        return Cow::Borrowed(raw);
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        match tail.find(';').and_then(|end| Some((decode_entity(&tail[1..end])?, end))) {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let number = entity.strip_prefix('#')?;
            let code = match number.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}
