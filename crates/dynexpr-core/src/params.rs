//! Value placeholder generation.

/// Issues value placeholder tokens that are unique within one context.
///
/// The counter only moves forward: a token is never handed out twice, even if
/// the binding it was issued for is abandoned.
#[derive(Debug)]
pub struct ParameterGenerator {
    prefix: String,
    next: usize,
}

impl ParameterGenerator {
    /// Create a generator whose tokens start with `prefix`.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 0,
        }
    }

    /// Issue the next token.
    pub fn next_token(&mut self) -> String {
        let token = format!("{}{}", self.prefix, self.next);
        self.next += 1;
        token
    }

    /// Number of tokens issued so far.
    #[must_use]
    pub fn issued(&self) -> usize {
        self.next
    }
}

impl Default for ParameterGenerator {
    fn default() -> Self {
        Self::new(":p")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_should_issue_sequential_tokens() {
        let mut generator = ParameterGenerator::default();
        assert_eq!(generator.next_token(), ":p0");
        assert_eq!(generator.next_token(), ":p1");
        assert_eq!(generator.issued(), 2);
    }

    #[test]
    fn test_should_never_repeat_a_token() {
        let mut generator = ParameterGenerator::new(":v");
        let tokens: HashSet<String> = (0..500).map(|_| generator.next_token()).collect();
        assert_eq!(tokens.len(), 500);
    }
}
