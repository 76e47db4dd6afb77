use std::collections::BTreeMap;

/// Malformed cookie text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Cookie text is empty")]
    Empty,
    #[error("Malformed cookie entry (expected name=value): {0}")]
    MalformedEntry(String),
}

/// Cookie name to value, names unique
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    cookies: BTreeMap<String, String>,
}

impl Credentials {
    /// Parse `name=value` pairs separated by `;`.
    ///
    /// Blank segments are skipped; a segment without `=` or with an empty
    /// name rejects the whole text. A repeated name keeps the last value.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut cookies = BTreeMap::new();

        for segment in text.split(';') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }

            let (name, value) = segment
                .split_once('=')
                .ok_or_else(|| ParseError::MalformedEntry(segment.to_string()))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(ParseError::MalformedEntry(segment.to_string()));
            }
            cookies.insert(name.to_string(), value.trim().to_string());
        }

        if cookies.is_empty() {
            return Err(ParseError::Empty);
        }
        Ok(Self { cookies })
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Value for an HTTP `Cookie` header
    pub fn header_value(&self) -> String {
        self.cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}
