use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api;
use crate::config;
use crate::data::Directory;
use crate::lifecycle::{ChangeEvent, CommitOutcome};
use crate::logging::{self, Sink};
use crate::page::Page;
use crate::ui;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config_file: Option<PathBuf>,
    pub api_base: Option<String>,
    /// Render one employee's posts to stdout instead of starting the UI.
    pub print_user: Option<String>,
}

fn load_config(options: &RunOptions) -> Result<config::Config> {
    let mut cfg = config::load(config::LoadOptions {
        config_file: options.config_file.clone(),
        env_prefix: None,
    })
    .context("load config")?;
    if let Some(base) = options.api_base.as_ref() {
        cfg.api.base_url = base.clone();
    }
    Ok(cfg)
}

fn directory(cfg: &config::Config) -> Result<Directory> {
    let client = api::Client::new(api::ClientConfig {
        base_url: cfg.api.base_url.clone(),
        user_agent: cfg.api.user_agent.clone(),
        timeout: cfg.api.timeout,
        http_client: None,
    })
    .context("create api client")?;
    Ok(Directory::new(Arc::new(client)))
}

pub fn run(options: RunOptions) -> Result<()> {
    let cfg = load_config(&options)?;

    if let Some(user) = options.print_user.as_ref() {
        let _log_guard = logging::init(&cfg.log, Sink::Stderr)?;
        let directory = directory(&cfg)?;
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        return print_posts(&directory, cfg.ui.fallback_user_id, user, &mut out);
    }

    let _log_guard = logging::init(&cfg.log, Sink::File)?;
    tracing::info!(version = crate::VERSION, base_url = %cfg.api.base_url, "starting staffroll");

    let directory = directory(&cfg)?;
    let mut model = ui::Model::new(ui::Options {
        directory,
        fallback_user_id: cfg.ui.fallback_user_id,
        status_message: format!("Connecting to {}", cfg.api.base_url),
    });
    model.run()?;

    tracing::info!("staffroll exited");
    Ok(())
}

/// Runs one blocking refresh cycle for `user` and writes the `main` region.
pub fn print_posts(
    directory: &Directory,
    fallback_user_id: u64,
    user: &str,
    out: &mut impl Write,
) -> Result<()> {
    let mut page = Page::new(fallback_user_id);
    let outcome = page.refresh(directory, &ChangeEvent::new(user));
    writeln!(out, "{}", page.document().main.to_html()).context("write posts")?;
    if let CommitOutcome::Failed(err) = outcome {
        return Err(err).context("refresh posts");
    }
    Ok(())
}
