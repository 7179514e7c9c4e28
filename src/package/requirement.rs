//! Requirement strings such as `foo`, `foo>=1.0` or `? bar >= 0.17.0`.

use anyhow::Result;
use std::fmt;
use std::str::FromStr;

use super::Version;
use crate::error::Error;

/// Name of the game itself; a requirement on it is a compatibility check.
pub const BASE_MOD: &str = "base";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Ne,
    Ge,
    Gt,
    Le,
    Lt,
}

impl Operator {
    // Two-character operators first so `>=` is not read as `>`.
    const ALL: [(&'static str, Operator); 6] = [
        ("==", Operator::Eq),
        ("!=", Operator::Ne),
        (">=", Operator::Ge),
        ("<=", Operator::Le),
        (">", Operator::Gt),
        ("<", Operator::Lt),
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Ge => ">=",
            Operator::Gt => ">",
            Operator::Le => "<=",
            Operator::Lt => "<",
        }
    }

    fn evaluate(&self, candidate: &Version, bound: &Version) -> bool {
        match self {
            Operator::Eq => candidate == bound,
            Operator::Ne => candidate != bound,
            Operator::Ge => candidate >= bound,
            Operator::Gt => candidate > bound,
            Operator::Le => candidate <= bound,
            Operator::Lt => candidate < bound,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a dependency entry in `info.json` relates to its mod.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    Required,
    /// `?` prefix
    Optional,
    /// `(?)` prefix
    HiddenOptional,
    /// `!` prefix
    Incompatible,
    /// `~` prefix: required, without load-order effect
    Unordered,
}

impl DependencyKind {
    /// Whether the dependency must be installed for its mod to load.
    pub fn is_required(&self) -> bool {
        matches!(self, DependencyKind::Required | DependencyKind::Unordered)
    }
}

/// A mod name with an optional version constraint.
///
/// The name is kept verbatim, including any dependency prefix; use
/// [`Requirement::kind`] and [`Requirement::bare_name`] to inspect it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Requirement {
    pub name: String,
    pub constraint: Option<(Operator, Version)>,
}

impl Requirement {
    /// A requirement matching any version of `name`.
    pub fn any(name: impl Into<String>) -> Self {
        Requirement {
            name: name.into(),
            constraint: None,
        }
    }

    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Requirement {
            name: name.into(),
            constraint: self.constraint.clone(),
        }
    }

    pub fn operator(&self) -> Option<Operator> {
        self.constraint.as_ref().map(|(op, _)| *op)
    }

    pub fn version(&self) -> Option<&Version> {
        self.constraint.as_ref().map(|(_, v)| v)
    }

    /// Whether `version` satisfies the constraint. A bare name matches anything.
    pub fn matches(&self, version: &Version) -> bool {
        match &self.constraint {
            Some((op, bound)) => op.evaluate(version, bound),
            None => true,
        }
    }

    pub fn kind(&self) -> DependencyKind {
        let name = self.name.as_str();
        if name.starts_with("(?)") {
            DependencyKind::HiddenOptional
        } else if name.starts_with('?') {
            DependencyKind::Optional
        } else if name.starts_with('!') {
            DependencyKind::Incompatible
        } else if name.starts_with('~') {
            DependencyKind::Unordered
        } else {
            DependencyKind::Required
        }
    }

    /// The name without any dependency prefix.
    pub fn bare_name(&self) -> &str {
        let name = self.name.as_str();
        let stripped = name
            .strip_prefix("(?)")
            .or_else(|| name.strip_prefix(['?', '!', '~']))
            .unwrap_or(name);
        stripped.trim()
    }

    /// Whether this is the game-version self-check on `base`.
    pub fn is_base(&self) -> bool {
        self.bare_name() == BASE_MOD
    }
}

impl FromStr for Requirement {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidRequirement(s.to_string());

        let split = s.char_indices().find_map(|(i, _)| {
            Operator::ALL
                .iter()
                .find(|(token, _)| s[i..].starts_with(token))
                .map(|(token, op)| (i, *token, *op))
        });

        let (name, constraint) = match split {
            Some((i, token, op)) => {
                let version_text = s[i + token.len()..].trim();
                if version_text.is_empty() {
                    return Err(invalid().into());
                }
                let version: Version = version_text.parse().map_err(|_| invalid())?;
                (s[..i].trim(), Some((op, version)))
            }
            None => (s.trim(), None),
        };

        if name.is_empty() || name.contains(['<', '>', '=']) {
            return Err(invalid().into());
        }

        Ok(Requirement {
            name: name.to_string(),
            constraint,
        })
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.constraint {
            Some((op, version)) => write!(f, "{}{}{}", self.name, op, version),
            None => write!(f, "{}", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(s: &str) -> Requirement {
        s.parse().unwrap()
    }

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_bare_name() {
        let r = req("foo");
        assert_eq!(r.name, "foo");
        assert!(r.constraint.is_none());
        assert!(r.matches(&v("0.0.1")));
    }

    #[test]
    fn test_parse_each_operator() {
        for (text, op) in [
            ("foo==1.2", Operator::Eq),
            ("foo!=1.2", Operator::Ne),
            ("foo>=1.2", Operator::Ge),
            ("foo>1.2", Operator::Gt),
            ("foo<=1.2", Operator::Le),
            ("foo<1.2", Operator::Lt),
        ] {
            let r = req(text);
            assert_eq!(r.name, "foo", "{}", text);
            assert_eq!(r.operator(), Some(op), "{}", text);
            assert_eq!(r.version(), Some(&v("1.2")));
        }
    }

    #[test]
    fn test_roundtrip_name_and_operator() {
        for text in ["foo==1.2", "foo!=1.2", "foo>=1.0", "foo>1", "foo<=0.17.3", "foo<2.0"] {
            let parsed = req(text);
            let reparsed = req(&parsed.to_string());
            assert_eq!(parsed.name, reparsed.name);
            assert_eq!(parsed.operator(), reparsed.operator());
            assert_eq!(parsed, reparsed);
        }
    }

    #[test]
    fn test_parse_with_spaces() {
        let r = req("base >= 0.17");
        assert_eq!(r.name, "base");
        assert_eq!(r.operator(), Some(Operator::Ge));
        assert!(r.is_base());
    }

    #[test]
    fn test_parse_invalid() {
        for text in ["", "   ", ">=1.0", "foo>=", "foo=1.0", "foo==abc", "foo<>1"] {
            let err = text.parse::<Requirement>().unwrap_err();
            assert_eq!(
                Error::find(&err),
                Some(&Error::InvalidRequirement(text.to_string())),
                "{:?}",
                text
            );
        }
    }

    #[test]
    fn test_matches() {
        let r = req("foo>=1.0");
        assert!(!r.matches(&v("0.9")));
        assert!(r.matches(&v("1.0")));
        assert!(r.matches(&v("1.2")));

        let r = req("foo!=1.0");
        assert!(r.matches(&v("1.1")));
        assert!(!r.matches(&v("1.0.0")));

        let r = req("foo<1.0");
        assert!(r.matches(&v("1.0-rc1")));
    }

    #[test]
    fn test_dependency_kinds() {
        assert_eq!(req("foo").kind(), DependencyKind::Required);
        assert_eq!(req("? foo >= 1.0").kind(), DependencyKind::Optional);
        assert_eq!(req("?foo").kind(), DependencyKind::Optional);
        assert_eq!(req("(?) foo").kind(), DependencyKind::HiddenOptional);
        assert_eq!(req("! foo").kind(), DependencyKind::Incompatible);
        assert_eq!(req("~ foo >= 2.0").kind(), DependencyKind::Unordered);

        assert!(DependencyKind::Unordered.is_required());
        assert!(!DependencyKind::Optional.is_required());
    }

    #[test]
    fn test_optional_prefix_is_kept_in_name() {
        let r = req("? bobores >= 0.17.0");
        assert_eq!(r.name, "? bobores");
        assert_eq!(r.bare_name(), "bobores");
        assert_eq!(req("(?) foo").bare_name(), "foo");
        assert_eq!(req("~foo").bare_name(), "foo");
    }

    #[test]
    fn test_any_and_with_name() {
        let r = Requirement::any("foo");
        assert_eq!(r.to_string(), "foo");

        let renamed = req("foo>=1.0").with_name("Foo");
        assert_eq!(renamed.to_string(), "Foo>=1.0");
    }
}
