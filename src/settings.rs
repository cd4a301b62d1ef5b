use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;

use crate::utils::commission::CommissionRates;

#[derive(Debug, Deserialize)]
pub struct Server {
    pub listen: String,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
    pub backend: StorageBackend,
    pub seed_file: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default)]
    pub run_migrations: bool,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: Server,
    pub storage: Storage,
    pub postgres: Option<Postgres>,
    #[serde(default)]
    pub commission: CommissionRates,
}

impl Settings {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        Self::from_builder(
            Config::builder()
                .add_source(File::with_name(path))
                .add_source(
                    Environment::with_prefix("ADMIN")
                        .prefix_separator("__")
                        .separator("__")
                        .try_parsing(true),
                ),
        )
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let settings: Settings = builder
            .set_default("server.listen", "0.0.0.0:8080")?
            .set_default("storage.backend", "postgres")?
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let rates = &self.commission;
        if rates.direct == 0 || rates.level2 == 0 || rates.level3 == 0 {
            return Err(ConfigError::Message(
                "commission rates must all be greater than zero".to_string(),
            ));
        }

        if self.storage.backend == StorageBackend::Postgres && self.postgres.is_none() {
            return Err(ConfigError::Message(
                "the postgres backend requires a [postgres] section".to_string(),
            ));
        }

        Ok(())
    }
}
