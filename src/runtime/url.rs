use crate::error::XhrError;
use url::Url;

/// Resolve a request target against the caller's base location.
///
/// Absolute inputs are returned as-is (normalized). Relative inputs need a
/// base. Nothing outside the arguments is consulted.
pub fn resolve_url(input: &str, base: Option<&Url>) -> Result<Url, XhrError> {
    let input = input.trim();

    match Url::parse(input) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = base.ok_or_else(|| {
                XhrError::InvalidUrl(format!("relative url {:?} without base location", input))
            })?;
            base.join(input)
                .map_err(|e| XhrError::InvalidUrl(format!("{}: {}", input, e)))
        }
        Err(e) => Err(XhrError::InvalidUrl(format!("{}: {}", input, e))),
    }
}
