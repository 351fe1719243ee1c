use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::cli::Cli;
use crate::cli::output::OutputFormat;
use crate::config::Config;
use crate::error::{CtlError, Result};
use crate::install::Installer;
use crate::storage::RegistryStore;
use crate::sync::SyncEngine;
use crate::utils::cancel::CancelToken;

/// Everything a command needs, resolved once from the command line.
pub struct AppContext {
    pub config: Config,
    pub store: RegistryStore,
    pub output_format: OutputFormat,
    pub cancel: CancelToken,
}

impl AppContext {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let root = match &cli.root {
            Some(root) => root.clone(),
            None => default_root()?,
        };
        let config = Config::load(cli.config.as_deref(), &root)?;
        let store = RegistryStore::open(&root)?
            .with_lock_timeout(Duration::from_millis(config.sync.lock_timeout_ms));

        let cancel = CancelToken::new();
        cancel.cancel_on_ctrl_c();

        debug!(root = %store.root().display(), "registry opened");

        Ok(Self {
            config,
            store,
            output_format: cli.output_format(),
            cancel,
        })
    }

    #[must_use]
    pub fn installer(&self) -> Installer {
        Installer::new(self.store.clone(), &self.config, self.cancel.clone())
    }

    pub fn sync_engine(&self) -> Result<SyncEngine> {
        SyncEngine::with_default_fetcher(self.store.clone(), &self.config, self.cancel.clone())
    }
}

fn default_root() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| CtlError::Config("data directory not found; pass --root".to_string()))?;
    Ok(data_dir.join("skillctl"))
}
