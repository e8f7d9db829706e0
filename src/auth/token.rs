/// Bearer credential for the warehouse query API or the mail relay.
pub struct Token(String);

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self(value.trim().to_owned())
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Treats a blank value as "no credential", which is what an empty
    /// environment variable means in practice.
    pub fn non_empty(value: Option<String>) -> Option<Self> {
        value.map(Self::from).filter(|token| !token.0.is_empty())
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<redacted>")
    }
}
