use super::HttpMethod;
use crate::runtime::headers::{CONTENT_TYPE, RequestHeaders};
use url::Url;

pub const MARKUP_CONTENT_TYPE: &str = "text/xml; charset=UTF-8";
pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=UTF-8";

/// Payload passed to `send`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendBody {
    /// Plain text, sent as `text/plain` unless the caller says otherwise.
    Text(String),
    /// Serialized markup, sent as `text/xml` unless the caller says otherwise.
    Markup(String),
}

impl SendBody {
    pub fn as_str(&self) -> &str {
        match self {
            SendBody::Text(s) | SendBody::Markup(s) => s,
        }
    }

    pub fn default_content_type(&self) -> &'static str {
        match self {
            SendBody::Text(_) => TEXT_CONTENT_TYPE,
            SendBody::Markup(_) => MARKUP_CONTENT_TYPE,
        }
    }
}

impl From<&str> for SendBody {
    fn from(s: &str) -> Self {
        SendBody::Text(s.to_string())
    }
}

impl From<String> for SendBody {
    fn from(s: String) -> Self {
        SendBody::Text(s)
    }
}

/// Drop the body for methods that cannot carry one, and empty bodies.
/// A surviving body fills in a default `content-type`.
pub fn normalize_body(
    method: &HttpMethod,
    body: Option<SendBody>,
    headers: &mut RequestHeaders,
) -> Option<String> {
    if !method.carries_body() {
        return None;
    }

    let body = body.filter(|b| !b.as_str().is_empty())?;
    headers.set_default(CONTENT_TYPE, body.default_content_type());

    match body {
        SendBody::Text(s) | SendBody::Markup(s) => Some(s),
    }
}

/// Everything the relay needs to perform one request.
#[derive(Debug)]
pub struct Descriptor<'a> {
    pub target: &'a Url,
    pub object: &'a str,
    pub method: &'a HttpMethod,
    pub headers: &'a RequestHeaders,
    pub body: Option<&'a str>,
}

impl Descriptor<'_> {
    /// Append this descriptor to `endpoint` as query parameters.
    pub fn to_url(&self, endpoint: &Url) -> String {
        let mut url = endpoint.as_str().to_string();
        let separator = if endpoint.query().is_some() { '&' } else { '?' };
        url.push(separator);

        url.push_str("url=");
        url.push_str(&urlencoding::encode(self.target.as_str()));
        url.push_str("&object=");
        url.push_str(&urlencoding::encode(self.object));
        url.push_str("&method=");
        url.push_str(&urlencoding::encode(self.method.as_str()));

        for (i, (key, value)) in self.headers.iter().enumerate() {
            url.push_str(&format!(
                "&header{i}k={}&header{i}v={}",
                urlencoding::encode(key),
                urlencoding::encode(value)
            ));
        }

        if let Some(body) = self.body {
            url.push_str("&data=");
            url.push_str(&urlencoding::encode(body));
        }

        url
    }
}
