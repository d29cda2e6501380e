//! Composite identifier codec
//!
//! Identifiers are built once at creation and parsed back on every later
//! call, e.g. `123456789012/default/jane` for a QuickSight user.

use crate::error::{ProviderError, Result};

/// Encodes and decodes delimiter-joined identifiers with a fixed set of
/// named components.
#[derive(Debug, Clone, Copy)]
pub struct IdCodec {
    delimiter: char,
    components: &'static [&'static str],
    trailing_rest: bool,
}

impl IdCodec {
    pub const fn new(delimiter: char, components: &'static [&'static str]) -> Self {
        Self {
            delimiter,
            components,
            trailing_rest: false,
        }
    }

    /// Let the last component keep any further delimiters, e.g. the
    /// `ROLE/SESSION` user names QuickSight assigns to IAM identities.
    pub const fn with_trailing_rest(mut self) -> Self {
        self.trailing_rest = true;
        self
    }

    /// Number of components in the identifier
    pub fn arity(&self) -> usize {
        self.components.len()
    }

    /// Human-readable layout, e.g. `AWS_ACCOUNT_ID/NAMESPACE/USER_NAME`
    pub fn expected(&self) -> String {
        self.components
            .iter()
            .map(|c| c.to_ascii_uppercase())
            .collect::<Vec<_>>()
            .join(&self.delimiter.to_string())
    }

    pub fn encode(&self, parts: &[&str]) -> Result<String> {
        if parts.len() != self.arity() {
            return Err(ProviderError::validation(
                "id",
                format!(
                    "expected {} components ({}), got {}",
                    self.arity(),
                    self.expected(),
                    parts.len()
                ),
            ));
        }

        let last = self.arity() - 1;
        for (index, (name, part)) in self.components.iter().zip(parts).enumerate() {
            if part.is_empty() {
                return Err(ProviderError::validation(*name, "must not be empty"));
            }
            if part.contains(self.delimiter) && !(self.trailing_rest && index == last) {
                return Err(ProviderError::validation(
                    *name,
                    format!("must not contain '{}'", self.delimiter),
                ));
            }
        }

        Ok(parts.join(&self.delimiter.to_string()))
    }

    pub fn decode(&self, id: &str) -> Result<Vec<String>> {
        let parts: Vec<&str> = if self.trailing_rest {
            id.splitn(self.arity(), self.delimiter).collect()
        } else {
            id.split(self.delimiter).collect()
        };
        if parts.len() != self.arity() || parts.iter().any(|p| p.is_empty()) {
            return Err(ProviderError::MalformedIdentifier {
                id: id.to_string(),
                expected: self.expected(),
            });
        }
        Ok(parts.into_iter().map(|p| p.to_string()).collect())
    }

    /// Decode into a fixed-size array, for destructuring at call sites
    pub fn decode_n<const N: usize>(&self, id: &str) -> Result<[String; N]> {
        let parts = self.decode(id)?;
        parts
            .try_into()
            .map_err(|_| ProviderError::MalformedIdentifier {
                id: id.to_string(),
                expected: self.expected(),
            })
    }
}
