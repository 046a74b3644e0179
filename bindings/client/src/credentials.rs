use std::fmt::{Debug, Formatter};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CloudError, CloudResult};

/// Port of the administrative identity endpoint.
pub const ADMIN_PORT: u16 = 35357;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub tenant_name: String,
    pub auth_url: String,
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("tenant_name", &self.tenant_name)
            .field("auth_url", &self.auth_url)
            .finish()
    }
}

impl Credentials {
    pub fn new(username: &str, password: &str, tenant_name: &str, auth_url: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            tenant_name: tenant_name.to_string(),
            auth_url: auth_url.to_string(),
        }
    }

    /// The identity endpoint moved to the administrative port.
    pub fn admin_endpoint(&self) -> CloudResult<String> {
        let invalid = |reason: String| CloudError::InvalidEndpoint {
            url: self.auth_url.clone(),
            reason,
        };

        let mut url = Url::parse(&self.auth_url).map_err(|e| invalid(e.to_string()))?;
        url.set_port(Some(ADMIN_PORT))
            .map_err(|_| invalid("URL cannot carry a port".to_string()))?;

        Ok(url.to_string())
    }
}
