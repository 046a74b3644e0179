use std::path::Path;

use cloudstorm_client::prelude::Credentials;
use serde::Deserialize;

use crate::error::RunError;

/// Where the cloud is and how to log in to it as an administrator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CloudConfig {
    #[serde(default)]
    pub identity: IdentityConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IdentityConfig {
    pub uri: String,
    pub admin_username: String,
    pub admin_password: String,
    pub admin_tenant_name: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            uri: "http://localhost:5000/v2.0/".to_string(),
            admin_username: "admin".to_string(),
            admin_password: "admin".to_string(),
            admin_tenant_name: "admin".to_string(),
        }
    }
}

impl CloudConfig {
    pub fn load(path: &Path) -> Result<Self, RunError> {
        let content = std::fs::read_to_string(path).map_err(|source| RunError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, RunError> {
        toml::from_str(content).map_err(|e| RunError::invalid(e.to_string()))
    }

    pub fn admin_credentials(&self) -> Credentials {
        Credentials::new(
            &self.identity.admin_username,
            &self.identity.admin_password,
            &self.identity.admin_tenant_name,
            &self.identity.uri,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_values_use_the_local_defaults() {
        let config = CloudConfig::parse(
            r#"
            [identity]
            uri = "https://keystone.example.com:5000/v2.0/"
            admin_password = "secret"
            "#,
        )
        .unwrap();

        let admin = config.admin_credentials();
        assert_eq!("admin", admin.username);
        assert_eq!("secret", admin.password);
        assert_eq!("admin", admin.tenant_name);
        assert_eq!("https://keystone.example.com:5000/v2.0/", admin.auth_url);
    }

    #[test]
    fn an_empty_file_is_the_default() {
        assert_eq!(CloudConfig::default(), CloudConfig::parse("").unwrap());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(CloudConfig::parse("[identity]\nregion = \"one\"\n").is_err());
    }
}
