use std::fmt;

use serde::{Deserialize, Serialize};

/// World seed as stored in session/save data: a number or a free-form string.
///
/// Serialized untagged, so `42` and `"A1B2C3"` are both valid JSON seeds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Seed {
    Number(u64),
    Text(String),
}

impl Seed {
    /// Resolve to the 32-bit value that parameterizes every generator.
    ///
    /// Numbers are truncated to 32 bits. Strings holding a decimal integer
    /// resolve like the number, so `"42"` and `42` produce the same world.
    /// Any other string is CRC-32 (IEEE) of its UTF-8 bytes.
    pub fn value(&self) -> u32 {
        match self {
            Seed::Number(n) => *n as u32,
            Seed::Text(s) => match s.parse::<u64>() {
                Ok(n) => n as u32,
                Err(_) => crc32fast::hash(s.as_bytes()),
            },
        }
    }
}

impl Default for Seed {
    fn default() -> Self {
        Seed::Number(42)
    }
}

impl From<u32> for Seed {
    fn from(value: u32) -> Self {
        Seed::Number(value as u64)
    }
}

impl From<u64> for Seed {
    fn from(value: u64) -> Self {
        Seed::Number(value)
    }
}

impl From<&str> for Seed {
    fn from(value: &str) -> Self {
        Seed::Text(value.to_string())
    }
}

impl From<String> for Seed {
    fn from(value: String) -> Self {
        Seed::Text(value)
    }
}

impl fmt::Display for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Seed::Number(n) => write!(f, "{}", n),
            Seed::Text(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_string_matches_number() {
        assert_eq!(Seed::from("42").value(), Seed::from(42u32).value());
        assert_eq!(Seed::from("42").value(), 42);
    }

    #[test]
    fn test_text_seed_is_stable() {
        let a = Seed::from("K3X9QZ0ABC");
        let b = Seed::from("K3X9QZ0ABC".to_string());
        assert_eq!(a.value(), b.value());
        assert_ne!(a.value(), Seed::from("K3X9QZ0ABD").value());
    }

    #[test]
    fn test_large_number_truncates() {
        assert_eq!(Seed::from(0x1_0000_0005u64).value(), 5);
    }

    #[test]
    fn test_serde_untagged() {
        let n: Seed = serde_json::from_str("42").unwrap();
        let s: Seed = serde_json::from_str("\"HAVEN\"").unwrap();
        assert_eq!(n, Seed::Number(42));
        assert_eq!(s, Seed::Text("HAVEN".into()));
        assert_eq!(serde_json::to_string(&s).unwrap(), "\"HAVEN\"");
    }
}
