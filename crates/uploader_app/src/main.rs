mod app;
mod cli;
mod config;
mod edit;
mod effects;
mod render;

use std::fs;
use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use log::LevelFilter;
use uploader_core::edit::MetadataDraft;
use uploader_core::Msg;
use uploader_engine::{EngineHandle, ReqwestArchiveApi};
use uploader_logging::uploader_info;

use crate::cli::{Cli, Command};
use crate::config::AppConfig;
use crate::edit::EditSession;
use crate::effects::EffectRunner;
use crate::render::Renderer;

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.apply_overrides(&cli.overrides);

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    uploader_logging::initialize(config.log_destination, level, &config.log_file);
    uploader_info!("Using archive server {}", config.server_url);

    let api = ReqwestArchiveApi::new(config.api_settings())
        .with_context(|| format!("invalid server url {}", config.server_url))?;
    let mut renderer =
        Renderer::new(io::stdout().lock()).with_link_base(api.base_url().as_str());

    match cli.command {
        Command::Upload { files } => {
            let initial = vec![
                Msg::CategoryChanged(config.category.clone()),
                Msg::FilesSelected(files),
            ];
            run_uploads(api, &config, &mut renderer, initial)
        }
        Command::Download { urls, from_file } => {
            let mut input = urls.join("\n");
            if let Some(path) = from_file {
                let listed = fs::read_to_string(&path)
                    .with_context(|| format!("could not read {}", path.display()))?;
                input.push('\n');
                input.push_str(&listed);
            }
            let initial = vec![
                Msg::CategoryChanged(config.category.clone()),
                Msg::InputChanged(input),
                Msg::UrlsSubmitted,
            ];
            run_uploads(api, &config, &mut renderer, initial)
        }
        Command::SaveMetadata(metadata) => {
            let mut session = EditSession::new(&api, &mut renderer)?;
            let draft = MetadataDraft::new(metadata.title, &metadata.tags);
            Ok(exit_code(session.save_metadata(&metadata.id, &draft)?))
        }
        Command::RunPlugin {
            metadata,
            plugin,
            arg,
            save,
        } => {
            let mut session = EditSession::new(&api, &mut renderer)?;
            let draft = MetadataDraft::new(metadata.title, &metadata.tags);
            session.run_plugin(&metadata.id, draft, &plugin, arg.as_deref(), save)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Suggestions { min_weight } => {
            let suggestions = EditSession::new(&api, &mut renderer)?.suggestions(min_weight)?;
            for label in suggestions {
                println!("{label}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Delete { id, yes } => {
            EditSession::new(&api, &mut renderer)?.delete(&id, yes)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_uploads<W: io::Write>(
    api: ReqwestArchiveApi,
    config: &AppConfig,
    renderer: &mut Renderer<W>,
    initial: Vec<Msg>,
) -> anyhow::Result<ExitCode> {
    let engine = EngineHandle::new(Arc::new(api), config.poll_settings())
        .context("could not start the upload engine")?;
    let runner = EffectRunner::new(engine);
    let report = app::run_session(&runner, renderer, initial);
    runner.shutdown();
    let report = report?;
    uploader_info!(
        "Session finished: {} completed, {} failed",
        report.completed,
        report.failed
    );
    Ok(exit_code(report.failed == 0))
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
