//! CLI execution context.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use bazaar_observability::{init_logging, LogLevel};
use bazaar_sdk::{ClientConfig, Marketplace};
use dialoguer::{Input, Password};

use crate::config::find_config_file;
use crate::output::Output;

/// Execution context for CLI commands.
pub struct Context {
    pub config: ClientConfig,
    /// File the config was read from, if any.
    pub config_path: Option<PathBuf>,
    pub output: Output,
    pub cwd: PathBuf,
    pub market: Marketplace,
}

impl Context {
    /// Load config (explicit path, else the nearest config file, else
    /// defaults), apply `BAZAAR_*` overrides, start logging and build the
    /// marketplace.
    pub fn load(config_path: Option<&str>, output: Output, verbose: bool) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;

        let config_path = match config_path {
            Some(path) => Some(PathBuf::from(path)),
            None => find_config_file(&cwd),
        };
        let mut config = match &config_path {
            Some(path) => ClientConfig::load(&path.to_string_lossy())?,
            None => ClientConfig::default(),
        };
        config
            .apply_env()
            .context("Invalid BAZAAR_* environment override")?;

        let mut logging = config.logging.clone();
        if verbose {
            logging = logging.with_level(LogLevel::Debug);
        }
        init_logging(&logging).context("Failed to initialize logging")?;

        let market = Marketplace::builder(config.clone())
            .with_notifier(Arc::new(output.clone()))
            .build()
            .context("Failed to create API client")?;

        Ok(Self {
            config,
            config_path,
            output,
            cwd,
            market,
        })
    }

    /// Make sure there is a session, asking for credentials if needed.
    pub async fn require_session(&self) -> Result<()> {
        let session = self.market.session();
        if session.fetch_session(false).await {
            return Ok(());
        }
        if self.output.is_json() {
            bail!("Not signed in. Run `bazaar login` first.");
        }
        self.output.info("Sign in to continue");
        self.login(None).await
    }

    /// Prompt for whatever is missing and log in.
    pub async fn login(&self, email: Option<String>) -> Result<()> {
        let email = match email {
            Some(email) => email,
            None => Input::<String>::new().with_prompt("Email").interact_text()?,
        };
        let password = Password::new().with_prompt("Password").interact()?;

        let spinner = self.output.spinner("Signing in...");
        let result = self.market.session().login(&email, &password).await;
        spinner.finish_and_clear();
        result.map_err(|e| anyhow::anyhow!(e.user_message()))?;
        Ok(())
    }
}
