//! CLI runner - executes commands

use crate::catalog::{Catalog, Selection};
use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::TapConfig;
use crate::engine::SyncReport;
use crate::error::{Error, Result};
use crate::gitlab;
use crate::output::{Emitter, JsonLinesEmitter};
use crate::state::BookmarkStore;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Discover => self.discover(),
            Commands::Sync { streams } => self.sync(streams.as_deref()).await.map(|_| ()),
            Commands::Streams => self.streams(),
        }
    }

    /// Load and validate the configuration
    fn load_config(&self) -> Result<TapConfig> {
        let path = self
            .cli
            .config
            .as_ref()
            .ok_or_else(|| Error::config("Configuration file not specified (use --config)"))?;
        let config = TapConfig::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Load bookmarks
    fn load_state(&self) -> Result<BookmarkStore> {
        // Inline state takes precedence
        if let Some(state_json) = &self.cli.state_json {
            BookmarkStore::from_json(state_json)
        } else if let Some(path) = &self.cli.state {
            BookmarkStore::from_file(path)
        } else {
            Ok(BookmarkStore::in_memory())
        }
    }

    /// Resolve the selection from `--streams`, the catalog, or every enabled stream
    fn load_selection(&self, config: &TapConfig, streams: Option<&str>) -> Result<Selection> {
        if let Some(list) = streams {
            let mut names = Vec::new();
            for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                if !gitlab::STREAM_NAMES.contains(&name) {
                    return Err(Error::StreamNotFound {
                        stream: name.to_string(),
                    });
                }
                if gitlab::is_enabled(name, config) {
                    names.push(name.to_string());
                } else {
                    warn!(stream = %name, "Stream is not enabled by the configuration, ignoring");
                }
            }
            return Ok(Selection::streams(names));
        }

        let catalog = match &self.cli.catalog {
            Some(path) => Catalog::load(path)?,
            None => gitlab::discover(config, true),
        };
        Ok(Selection::from_catalog(&catalog))
    }

    /// Print the catalog
    fn discover(&self) -> Result<()> {
        let config = self.load_config()?;
        let catalog = gitlab::discover(&config, false);
        self.output_message(&serde_json::to_value(&catalog)?);
        Ok(())
    }

    /// List stream names
    fn streams(&self) -> Result<()> {
        let config = match &self.cli.config {
            Some(_) => Some(self.load_config()?),
            None => None,
        };

        let streams: Vec<Value> = gitlab::STREAM_NAMES
            .iter()
            .map(|name| {
                let enabled = config
                    .as_ref()
                    .map_or(true, |c| gitlab::is_enabled(name, c));
                json!({"name": name, "enabled": enabled})
            })
            .collect();

        self.output_message(&json!({
            "type": "STREAMS",
            "streams": streams,
        }));
        Ok(())
    }

    /// Run a sync, writing messages to stdout
    async fn sync(&self, streams: Option<&str>) -> Result<SyncReport> {
        let config = self.load_config()?;
        let selection = self.load_selection(&config, streams)?;
        let bookmarks = self.load_state()?;
        let emitter: Arc<dyn Emitter> = Arc::new(JsonLinesEmitter::stdout());

        info!(
            api_url = %config.api_url,
            groups = config.groups.len(),
            projects = config.projects.len(),
            "Loaded configuration"
        );

        let engine = gitlab::sync_engine(&config, emitter, bookmarks, selection)?;

        let cancel = engine.context().cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, stopping after in-flight pages");
                cancel.cancel();
            }
        });

        engine.run().await
    }

    /// Output a message
    fn output_message(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}
