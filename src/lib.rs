use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tracing::info;

use diffview_config::Config;
use diffview_git::{DiffExecutor, DiffRequest, DiffType, Limits, RepositoryLocator};
use diffview_path::{AbsolutePathPolicy, PathResolver};
use diffview_server::{ContentServer, ContentStore};

pub mod editor;
pub mod pipeline;
pub mod render;

pub use pipeline::{DiffPipeline, PublishedDiff};

const ENV_CONFIG_PATH: &str = "DIFFVIEW_CONFIG";
const ENV_LISTEN_ADDR: &str = "DIFFVIEW_LISTEN";

pub async fn run_from_args<I>(args: I) -> Result<()>
where
    I: IntoIterator<Item = String>,
{
    tracing_subscriber::fmt::init();

    let args = CliArgs::parse(args)?;
    let config = match &args.config_path {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };

    let listen_addr = args
        .listen
        .as_deref()
        .unwrap_or(config.listen_addr.as_str());
    let listen_addr = listen_addr
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid listen address: `{listen_addr}`"))?;

    let workspace_root = match &config.workspace_root {
        Some(root) => root.clone(),
        None => env::current_dir().context("failed to determine working directory")?,
    };

    let store = Arc::new(ContentStore::new(Duration::from_secs(config.store.ttl_secs)));
    let server = ContentServer::new(
        Arc::clone(&store),
        Duration::from_secs(config.store.sweep_interval_secs),
    );
    let mut running = server
        .start(listen_addr)
        .await
        .map_err(|err| anyhow!("failed to start content server: {err}"))?;

    info!(
        base_url = running.base_url(),
        workspace_root = %workspace_root.display(),
        "diffview serving"
    );

    let pipeline = build_pipeline(&config, &workspace_root, Arc::clone(&store));

    if let Some(diff_type) = args.diff {
        let mut request = DiffRequest::new(diff_type);
        request.base = args.base;
        request.target = args.target;

        let diff = pipeline
            .generate(&workspace_root, &request)
            .await
            .map_err(|err| anyhow!("{err}"))?;
        let published = pipeline.publish(&diff).await;
        println!("{}", running.url_for(&published.url_path));
    } else {
        println!("{}", running.base_url());
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to wait for Ctrl-C")?;
    running.dispose().await;

    Ok(())
}

pub async fn run_from_env() -> Result<()> {
    run_from_args(env::args()).await
}

/// Builds the fully wired pipeline from a validated config. Exposed so
/// embedding tools can reuse the wiring with their own renderer and
/// store.
pub fn build_pipeline(
    config: &Config,
    workspace_root: &Path,
    store: Arc<ContentStore>,
) -> DiffPipeline {
    let policy = if config.paths.allow_absolute {
        AbsolutePathPolicy::Allow
    } else {
        AbsolutePathPolicy::Deny
    };

    DiffPipeline::new(
        RepositoryLocator::with_timeout(Duration::from_secs(config.git.detect_timeout_secs)),
        DiffExecutor::with_limits(Limits {
            timeout: Duration::from_secs(config.git.diff_timeout_secs),
            max_output_bytes: config.git.max_output_bytes,
        }),
        PathResolver::new(workspace_root, policy),
        Arc::new(render::PreformattedRenderer),
        store,
    )
}

fn load_config(path: &PathBuf) -> Result<Config> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file `{}`", path.display()))?;
    Config::from_toml(&raw).with_context(|| format!("failed to parse config `{}`", path.display()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliArgs {
    config_path: Option<PathBuf>,
    listen: Option<String>,
    diff: Option<DiffType>,
    base: Option<String>,
    target: Option<String>,
}

impl CliArgs {
    fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut iter = args.into_iter();
        let _program_name = iter.next();

        let mut config_path = env::var_os(ENV_CONFIG_PATH).map(PathBuf::from);
        let mut listen = env::var(ENV_LISTEN_ADDR).ok();
        let mut diff = None;
        let mut base = None;
        let mut target = None;

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                "--config" => {
                    let value = iter
                        .next()
                        .ok_or_else(|| anyhow!("missing value for `--config`"))?;
                    config_path = Some(PathBuf::from(value));
                }
                "--listen" => {
                    listen = Some(
                        iter.next()
                            .ok_or_else(|| anyhow!("missing value for `--listen`"))?,
                    );
                }
                "--diff" => {
                    let value = iter
                        .next()
                        .ok_or_else(|| anyhow!("missing value for `--diff`"))?;
                    diff = Some(parse_diff_type(&value)?);
                }
                "--base" => {
                    base = Some(
                        iter.next()
                            .ok_or_else(|| anyhow!("missing value for `--base`"))?,
                    );
                }
                "--target" => {
                    target = Some(
                        iter.next()
                            .ok_or_else(|| anyhow!("missing value for `--target`"))?,
                    );
                }
                _ => return Err(anyhow!("unknown argument `{arg}`")),
            }
        }

        Ok(Self {
            config_path,
            listen,
            diff,
            base,
            target,
        })
    }
}

fn parse_diff_type(value: &str) -> Result<DiffType> {
    match value {
        "staged" => Ok(DiffType::Staged),
        "unstaged" => Ok(DiffType::Unstaged),
        "commit" => Ok(DiffType::Commit),
        "commit-range" => Ok(DiffType::CommitRange),
        "branch" => Ok(DiffType::Branch),
        other => Err(anyhow!(
            "unknown diff type `{other}`; expected staged, unstaged, commit, commit-range, or branch"
        )),
    }
}

fn print_usage() {
    eprintln!(
        "usage: diffview [--config <path>] [--listen <addr>] [--diff <type>] [--base <ref>] [--target <ref>]\n\
         env:\n  {ENV_CONFIG_PATH}=<path>\n  {ENV_LISTEN_ADDR}=<addr>"
    );
}
