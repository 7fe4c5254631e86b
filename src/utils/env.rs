use std::str::FromStr;

/// Get environment variable with ESHTAREK_ prefix, falling back to unprefixed version
///
/// Checks `ESHTAREK_{key}` first, then `{key}`, so `PORT` set by a hosting
/// platform is still honoured.
pub fn get_env_with_prefix(key: &str) -> Option<String> {
    std::env::var(format!("ESHTAREK_{}", key))
        .or_else(|_| std::env::var(key))
        .ok()
}

/// Like [`get_env_with_prefix`], parsed into `T`. Unparseable values are
/// logged and treated as absent.
pub fn get_env_parsed<T: FromStr>(key: &str) -> Option<T> {
    let raw = get_env_with_prefix(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparseable environment variable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_env_with_prefix() {
        unsafe {
            std::env::set_var("ESHTAREK_TEST_ENV_VAR", "prefixed_value");
        }
        assert_eq!(
            get_env_with_prefix("TEST_ENV_VAR"),
            Some("prefixed_value".to_string())
        );
        unsafe {
            std::env::remove_var("ESHTAREK_TEST_ENV_VAR");
        }

        unsafe {
            std::env::set_var("ESHTAREK_FALLBACK_ONLY", "unprefixed_value");
            std::env::remove_var("ESHTAREK_FALLBACK_ONLY");
            std::env::set_var("FALLBACK_ONLY", "unprefixed_value");
        }
        assert_eq!(
            get_env_with_prefix("FALLBACK_ONLY"),
            Some("unprefixed_value".to_string())
        );
        unsafe {
            std::env::remove_var("FALLBACK_ONLY");
        }

        assert_eq!(get_env_with_prefix("NON_EXISTENT_ENV_VAR"), None);
    }

    #[test]
    fn test_get_env_parsed_ignores_garbage() {
        unsafe {
            std::env::set_var("ESHTAREK_PARSED_PORT", "not-a-port");
        }
        assert_eq!(get_env_parsed::<u16>("PARSED_PORT"), None);
        unsafe {
            std::env::set_var("ESHTAREK_PARSED_PORT", "9100");
        }
        assert_eq!(get_env_parsed::<u16>("PARSED_PORT"), Some(9100));
        unsafe {
            std::env::remove_var("ESHTAREK_PARSED_PORT");
        }
    }
}
