//! `${VAR}` expansion for string settings.

use std::env::VarError;

use crate::ConfigError;

/// Expand `${VAR}` and `${VAR:-default}` references in `value`.
///
/// A reference to an unset variable without a default is an error naming
/// both the variable and the config `field` it appeared in. Bare `$VAR` is
/// left untouched so paths and hosts containing `$` survive unchanged.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    if !value.contains("${") {
        return Ok(value.to_owned());
    }

    shellexpand::env_with_context(value, |name| std::env::var(name).map(Some))
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| ConfigError::EnvVar {
            field: field.to_owned(),
            message: match e.cause {
                VarError::NotPresent => format!("${{{}}} not set", e.var_name),
                VarError::NotUnicode(_) => format!("${{{}}} is not valid unicode", e.var_name),
            },
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_is_returned_as_is() {
        assert_eq!(expand_env("127.0.0.1", "server.host").unwrap(), "127.0.0.1");
    }

    #[test]
    fn test_bare_dollar_is_not_expanded() {
        assert_eq!(expand_env("decks/$draft", "deck.root_dir").unwrap(), "decks/$draft");
    }

    #[test]
    fn test_braced_var_is_expanded() {
        // SAFETY: variable name is unique to this test
        unsafe {
            std::env::set_var("SLIDES_TEST_HOST", "0.0.0.0");
        }
        let result = expand_env("${SLIDES_TEST_HOST}", "server.host").unwrap();
        assert_eq!(result, "0.0.0.0");
        unsafe {
            std::env::remove_var("SLIDES_TEST_HOST");
        }
    }

    #[test]
    fn test_default_used_when_unset() {
        // SAFETY: variable name is unique to this test
        unsafe {
            std::env::remove_var("SLIDES_TEST_UNSET_ROOT");
        }
        let result = expand_env("${SLIDES_TEST_UNSET_ROOT:-talks}", "deck.root_dir").unwrap();
        assert_eq!(result, "talks");
    }

    #[test]
    fn test_var_embedded_in_path() {
        // SAFETY: variable name is unique to this test
        unsafe {
            std::env::set_var("SLIDES_TEST_HOME", "/home/presenter");
        }
        let result = expand_env("${SLIDES_TEST_HOME}/talks", "deck.root_dir").unwrap();
        assert_eq!(result, "/home/presenter/talks");
        unsafe {
            std::env::remove_var("SLIDES_TEST_HOME");
        }
    }

    #[test]
    fn test_missing_var_names_field_and_var() {
        // SAFETY: variable name is unique to this test
        unsafe {
            std::env::remove_var("SLIDES_TEST_MISSING");
        }
        let err = expand_env("${SLIDES_TEST_MISSING}", "server.host").unwrap_err();
        assert!(matches!(err, ConfigError::EnvVar { .. }));
        let message = err.to_string();
        assert!(message.contains("SLIDES_TEST_MISSING"));
        assert!(message.contains("server.host"));
    }
}
