use crate::artifacts::refs::INVALID_REF_NAME_REGEX;
use anyhow::Context;

pub const HEADS_PREFIX: &str = "refs/heads/";
pub const TAGS_PREFIX: &str = "refs/tags/";
pub const REMOTES_PREFIX: &str = "refs/remotes/";

/// Short name of a branch, tag or remote-tracking branch
///
/// `feature/login` rather than `refs/heads/feature/login`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefName(String);

impl RefName {
    pub fn try_parse(name: String) -> anyhow::Result<Self> {
        if name.is_empty() {
            anyhow::bail!("ref name cannot be empty");
        }

        let re = regex::Regex::new(INVALID_REF_NAME_REGEX)
            .with_context(|| format!("invalid ref name regex: {INVALID_REF_NAME_REGEX}"))?;

        if re.is_match(&name) {
            anyhow::bail!("invalid ref name: {}", name);
        } else {
            Ok(Self(name))
        }
    }
}

impl AsRef<str> for RefName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RefName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::proptest;
    use rstest::rstest;

    proptest! {
        #[test]
        fn hierarchical_names_are_valid(
            prefix in "[a-zA-Z0-9_-]+",
            suffix in "[a-zA-Z0-9_-]+"
        ) {
            assert!(RefName::try_parse(format!("{}/{}", prefix, suffix)).is_ok());
        }

        #[test]
        fn lock_files_are_not_refs(prefix in "[a-zA-Z0-9_-]+") {
            assert!(RefName::try_parse(format!("{}.lock", prefix)).is_err());
        }

        #[test]
        fn special_characters_are_rejected(
            prefix in "[a-zA-Z0-9_-]+",
            suffix in "[a-zA-Z0-9_-]+",
            special_char in r"[\*:\?\[\\^~ ]"
        ) {
            let name = format!("{}{}{}", prefix, special_char, suffix);
            assert!(RefName::try_parse(name).is_err());
        }
    }

    #[rstest]
    #[case::empty("")]
    #[case::leading_dot(".hidden")]
    #[case::double_dot("a..b")]
    #[case::leading_slash("/main")]
    #[case::trailing_slash("main/")]
    #[case::reflog_syntax("main@{1}")]
    #[case::dot_component("feature/.wip")]
    fn invalid_names_are_rejected(#[case] name: &str) {
        assert!(RefName::try_parse(name.to_string()).is_err());
    }

    #[rstest]
    #[case("main")]
    #[case("v1.0.0")]
    #[case("origin/feature-123")]
    fn valid_names_are_accepted(#[case] name: &str) {
        assert_eq!(RefName::try_parse(name.to_string()).unwrap().as_ref(), name);
    }
}
