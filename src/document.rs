use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// A parsed response document, as produced by the injected parser.
pub type Document = Rc<dyn Any>;

/// Turns response text into a structured document.
///
/// Closures `Fn(&str) -> Result<Document, String>` implement this directly.
pub trait DocumentParser {
    fn parse(&self, text: &str) -> Result<Document, String>;
}

impl<F> DocumentParser for F
where
    F: Fn(&str) -> Result<Document, String>,
{
    fn parse(&self, text: &str) -> Result<Document, String> {
        self(text)
    }
}

/// Outcome of parsing the response body.
#[derive(Clone, Default)]
pub enum ResponseXml {
    /// No text has been parsed since the last `open`, or no parser is set.
    #[default]
    NotAttempted,
    /// The text was parsed and did not form a document.
    Unavailable,
    Document(Document),
}

impl ResponseXml {
    pub fn is_attempted(&self) -> bool {
        !matches!(self, ResponseXml::NotAttempted)
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, ResponseXml::Unavailable)
    }

    /// The parsed document, if it is a `T`.
    pub fn document<T: Any>(&self) -> Option<&T> {
        match self {
            ResponseXml::Document(doc) => doc.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl fmt::Debug for ResponseXml {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseXml::NotAttempted => f.write_str("NotAttempted"),
            ResponseXml::Unavailable => f.write_str("Unavailable"),
            ResponseXml::Document(_) => f.write_str("Document(..)"),
        }
    }
}
