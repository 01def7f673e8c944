use std::{io::Write, sync::Arc};

use clap::Parser;
use cli::{Args, Commands};
use debhub_config::Config;
use debhub_core::{
    cache::DiskCache,
    index::{IndexBuilder, IndexOptions},
    origin::HttpOrigin,
    signing::{GpgSigner, Signer},
    source::GithubSource,
    CoreResult, ErrorContext,
};
use debhub_dl::http_client::configure_http_client;
use index::{build_index, export_key};
use inspect::inspect_package;
use logging::setup_logging;
use status::display_status;
use tracing::{debug, info, warn};
use ureq::http::{HeaderMap, HeaderName, HeaderValue};

mod cli;
mod index;
mod inspect;
mod logging;
mod status;
mod utils;

/// Parses `Name: value` pairs, skipping malformed ones.
fn parse_headers(raw: &[String]) -> HeaderMap {
    raw.iter()
        .filter_map(|header| {
            let Some((key, value)) = header.split_once(':') else {
                warn!("Ignoring malformed header {header:?}");
                return None;
            };
            match (
                HeaderName::from_bytes(key.trim().as_bytes()),
                HeaderValue::from_str(value.trim()),
            ) {
                (Ok(key), Ok(value)) => Some((key, value)),
                _ => {
                    warn!("Ignoring invalid header {header:?}");
                    None
                }
            }
        })
        .collect()
}

fn index_builder(config: &Config) -> CoreResult<IndexBuilder> {
    IndexBuilder::from_config(config, Arc::new(GithubSource), Arc::new(HttpOrigin))
}

fn handle_cli() -> CoreResult<()> {
    let args = Args::parse();

    setup_logging(&args);

    if args.no_color {
        utils::disable_color();
    }

    let config = Config::load(args.config.as_deref())?;
    debug!(cache_dir = %config.cache_dir().display(), "loaded configuration");

    let user_agent = args.user_agent.clone().or_else(|| config.user_agent.clone());
    let headers = parse_headers(&args.header);
    configure_http_client(|client| {
        if let Some(user_agent) = user_agent {
            client.user_agent = Some(user_agent);
        }
        if !headers.is_empty() {
            client.headers = Some(headers);
        }
    });

    match args.command {
        Commands::Build {
            owner,
            repo,
            output,
            suite,
            component,
            partitioned,
        } => {
            let builder = index_builder(&config)?;
            let signer = GpgSigner::from_config(&config)?;
            let options = IndexOptions {
                suite,
                component,
                partitioned,
            };
            build_index(
                &builder,
                signer.as_ref().map(|s| s as &dyn Signer),
                &owner,
                repo.as_deref(),
                &options,
                &output,
            )?;
        }
        Commands::Status {
            owner,
            repo,
        } => {
            let builder = index_builder(&config)?;
            display_status(&builder, &owner, repo.as_deref())?;
        }
        Commands::Inspect {
            file,
        } => inspect_package(&file)?,
        Commands::ExportKey => {
            let signer = GpgSigner::from_config(&config)?;
            export_key(signer.as_ref().map(|s| s as &dyn Signer))?;
        }
        Commands::Clean => {
            let cache = DiskCache::new(config.cache_dir());
            cache.clear()?;
            info!("Removed package cache at {}", cache.root().display());
        }
        Commands::Config => {
            let toml = config.to_toml()?;
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(toml.as_bytes())
                .and_then(|_| stdout.flush())
                .with_context(|| "writing configuration to stdout".to_string())?;
        }
    }

    Ok(())
}

fn main() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    if let Err(err) = handle_cli() {
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(1);
    }
}
