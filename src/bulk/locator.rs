pub const LOCATOR_HEADER: &str = "Sforce-Locator";

/// Header value the server sends once the last page has been served.
const TERMINAL_LOCATOR: &str = "null";

/// Continuation token for job results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// First request; no locator parameter is sent.
    Start,
    Next(String),
    /// No pages remain. Retrieval must stop here.
    Exhausted,
}

impl Locator {
    /// Reads the value of the locator header. A missing or blank header is
    /// treated as terminal, since resending without a locator would restart
    /// from the first page.
    pub fn from_header(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(TERMINAL_LOCATOR) | Some("") | None => Locator::Exhausted,
            Some(token) => Locator::Next(token.to_string()),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Locator::Exhausted)
    }

    /// Value for the `locator` query parameter, if one should be sent.
    pub fn as_param(&self) -> Option<&str> {
        match self {
            Locator::Next(token) => Some(token),
            Locator::Start | Locator::Exhausted => None,
        }
    }
}
