use super::error::{NoidError, Result};

/// Betanumeric alphabet: digits plus consonants without `l`, no vowels.
pub const XDIGIT: &[u8] = b"0123456789bcdfghjkmnpqrstvwxz";
pub const DIGIT: &[u8] = b"0123456789";

/// How the first character of a mask asks identifiers to be generated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generator {
    Random,
    Sequential,
    Unbounded,
}

/// One position of the generated identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    Digit,
    Extended,
}

impl Placeholder {
    pub fn alphabet(self) -> &'static [u8] {
        match self {
            Placeholder::Digit => DIGIT,
            Placeholder::Extended => XDIGIT,
        }
    }
}

/// Parsed `[prefix.]mask` template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub prefix: String,
    pub generator: Generator,
    pub placeholders: Vec<Placeholder>,
    pub check_char: bool,
}

impl Template {
    pub fn parse(template: &str) -> Result<Self> {
        let (prefix, mask) = match template.rsplit_once('.') {
            Some((prefix, mask)) => (prefix, mask),
            None => ("", template),
        };

        let invalid = |reason: &str| NoidError::InvalidTemplate {
            template: template.to_string(),
            reason: reason.to_string(),
        };

        let mut chars = mask.chars();
        let generator = match chars.next() {
            Some('r') => Generator::Random,
            Some('s') => Generator::Sequential,
            Some('z') => Generator::Unbounded,
            Some(other) => return Err(invalid(&format!("unknown generator '{other}'"))),
            None => return Err(invalid("mask is empty")),
        };

        let body: Vec<char> = chars.collect();
        let mut placeholders = Vec::with_capacity(body.len());
        let mut check_char = false;

        for (idx, c) in body.iter().enumerate() {
            match c {
                'd' => placeholders.push(Placeholder::Digit),
                'e' | 'z' => placeholders.push(Placeholder::Extended),
                'k' if idx + 1 == body.len() => check_char = true,
                'k' => return Err(invalid("check character 'k' must be last")),
                other => return Err(invalid(&format!("unknown placeholder '{other}'"))),
            }
        }

        if placeholders.is_empty() {
            return Err(invalid("mask has no placeholder characters"));
        }

        Ok(Self {
            prefix: prefix.to_string(),
            generator,
            placeholders,
            check_char,
        })
    }

    /// Number of distinct identifiers the placeholders can produce (saturating)
    pub fn capacity(&self) -> u128 {
        self.placeholders
            .iter()
            .fold(1u128, |acc, p| acc.saturating_mul(p.alphabet().len() as u128))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_prefix() {
        let t = Template::parse("vt.reedeedk").unwrap();
        assert_eq!(t.prefix, "vt");
        assert_eq!(t.generator, Generator::Random);
        assert_eq!(t.placeholders.len(), 6);
        assert!(t.check_char);
    }

    #[test]
    fn test_parse_repeated_z() {
        let t = Template::parse("zzzzzzzz").unwrap();
        assert_eq!(t.prefix, "");
        assert_eq!(t.generator, Generator::Unbounded);
        assert_eq!(t.placeholders, vec![Placeholder::Extended; 7]);
        assert!(!t.check_char);
    }

    #[test]
    fn test_prefix_keeps_inner_dots() {
        let t = Template::parse("a.b.sdd").unwrap();
        assert_eq!(t.prefix, "a.b");
        assert_eq!(t.generator, Generator::Sequential);
    }

    #[test]
    fn test_rejects_bad_templates() {
        for bad in ["", "x", "r", "rk", "rdkd", "rdq", "vt."] {
            assert!(
                matches!(Template::parse(bad), Err(NoidError::InvalidTemplate { .. })),
                "template {bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_capacity() {
        assert_eq!(Template::parse("rdd").unwrap().capacity(), 100);
        assert_eq!(Template::parse("re").unwrap().capacity(), 29);
    }
}
