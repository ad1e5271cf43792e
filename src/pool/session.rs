use std::fmt;

use zeroize::{Zeroize, Zeroizing};

use crate::{
    source::StatementConnection,
    util::{Result, Status},
};

/// Where a database session connects to. Credentials travel separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub schema: String,
}

impl Default for SessionParams {
    // Oracle Express Edition on the local machine.
    fn default() -> Self {
        SessionParams {
            host: "localhost".to_string(),
            port: 1521,
            database: "xe".to_string(),
            schema: String::new(),
        }
    }
}

impl SessionParams {
    /// `host:port/database`, the EZConnect form.
    pub fn connect_descriptor(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Status::invalid_argument("host must not be empty"));
        }
        if self.port == 0 {
            return Err(Status::invalid_argument("port must not be 0"));
        }
        if self.database.trim().is_empty() {
            return Err(Status::invalid_argument("database name must not be empty"));
        }
        if self.schema.trim().is_empty() {
            return Err(Status::invalid_argument("schema must not be empty"));
        }
        Ok(())
    }
}

/// Password bytes, zeroed on [`Credentials::wipe`] and on drop.
pub struct Credentials {
    secret: Zeroizing<Vec<u8>>,
}

impl Credentials {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Credentials {
            secret: Zeroizing::new(secret.into()),
        }
    }

    pub fn expose(&self) -> &[u8] {
        &self.secret
    }

    pub fn wipe(&mut self) {
        self.secret.zeroize();
    }

    pub fn is_wiped(&self) -> bool {
        self.secret.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credentials(***)")
    }
}

/// Opens one authenticated connection for a session.
pub trait Connector: Send + Sync {
    fn connect(
        &self,
        params: &SessionParams,
        credentials: &Credentials,
    ) -> Result<Box<dyn StatementConnection>>;
}
