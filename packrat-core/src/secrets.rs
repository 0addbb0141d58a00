use eyre::{eyre, WrapErr};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where a credential comes from. Credentials are never stored in the config file itself.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Secret {
    FromEnvVar {
        #[serde(rename = "env-var", alias = "env_var")]
        env_var: String,
    },
    FromToml {
        toml: String,
        key: String,
    },
}

impl Secret {
    pub fn label(&self) -> &str {
        match self {
            Secret::FromEnvVar { .. } => "environment variable",
            Secret::FromToml { .. } => "TOML value",
        }
    }

    pub fn resolve(&self) -> eyre::Result<SecretValue> {
        match self {
            Secret::FromEnvVar { env_var } => {
                let value = std::env::var(env_var)
                    .wrap_err_with(|| format!("environment variable '{}' not set", env_var))?;
                Ok(SecretValue(value))
            }
            Secret::FromToml { toml, key } => {
                let secrets_file = std::fs::read_to_string(toml)
                    .wrap_err_with(|| format!("failed to read secrets file '{}'", toml))?;
                let secrets: HashMap<String, String> = toml::from_str(&secrets_file)
                    .wrap_err_with(|| format!("failed to parse secrets file '{}'", toml))?;
                secrets
                    .get(key.as_str())
                    .cloned()
                    .map(SecretValue)
                    .ok_or_else(|| eyre!("key '{}' not found in secrets file '{}'", key, toml))
            }
        }
    }
}

pub struct SecretValue(pub String);

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretValue(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    mod env_var {
        use super::*;

        #[test]
        fn should_resolve_secret() {
            std::env::set_var("PACKRAT_TEST_SECRET1", "smtp-password");
            let secret = Secret::FromEnvVar {
                env_var: "PACKRAT_TEST_SECRET1".to_owned(),
            };

            let value = secret.resolve().unwrap();

            assert_eq!(&value.0, "smtp-password");
            std::env::remove_var("PACKRAT_TEST_SECRET1");
        }

        #[test]
        fn should_fail_if_env_var_is_missing() {
            std::env::remove_var("PACKRAT_TEST_SECRET2");
            let secret = Secret::FromEnvVar {
                env_var: "PACKRAT_TEST_SECRET2".to_owned(),
            };

            assert!(secret.resolve().is_err());
        }
    }

    mod toml {
        use super::*;

        #[test]
        fn should_resolve_secret() {
            let mut tmp = tempfile::NamedTempFile::new().unwrap();
            tmp.write_all(br#"smtp = "toml-password""#).unwrap();
            let secret = Secret::FromToml {
                toml: tmp.path().to_str().unwrap().to_owned(),
                key: "smtp".to_owned(),
            };

            let value = secret.resolve().unwrap();

            assert_eq!(&value.0, "toml-password");
        }

        #[test]
        fn should_fail_if_key_is_missing() {
            let mut tmp = tempfile::NamedTempFile::new().unwrap();
            tmp.write_all(br#"other = "value""#).unwrap();
            let secret = Secret::FromToml {
                toml: tmp.path().to_str().unwrap().to_owned(),
                key: "smtp".to_owned(),
            };

            assert!(secret.resolve().is_err());
        }

        #[test]
        fn should_fail_if_file_is_invalid() {
            let mut tmp = tempfile::NamedTempFile::new().unwrap();
            tmp.write_all(b"smtp = nope").unwrap();
            let secret = Secret::FromToml {
                toml: tmp.path().to_str().unwrap().to_owned(),
                key: "smtp".to_owned(),
            };

            assert!(secret.resolve().is_err());
        }
    }

    #[test]
    fn should_not_print_secret_values() {
        let value = SecretValue("hunter2".to_owned());

        assert!(!format!("{value:?}").contains("hunter2"));
    }
}
