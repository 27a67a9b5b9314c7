use clap::{Parser, Subcommand};
use quire::chain::PluginRegistry;
use quire::config::{self, SiteConfig};
use quire::session::GenerationSession;
use quire::sink::DirSink;
use quire::tree::ContentTree;
use quire::{cache, output};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(clap::Args, Clone, Debug, Default)]
struct GenArgs {
    /// Generate only the resource at this path (relative to the content root)
    #[arg(long, conflicts_with = "node")]
    resource: Option<PathBuf>,

    /// With --resource: skip the render when source and settings are unchanged
    #[arg(long, requires = "resource")]
    incremental: bool,

    /// Generate only the resources directly under this node
    #[arg(long)]
    node: Option<PathBuf>,

    /// Ignore the freshness cache. Outputs are still recorded for next time.
    #[arg(long)]
    no_cache: bool,
}

#[derive(Parser)]
#[command(name = "quire")]
#[command(version)]
#[command(about = "Static content generator with a plugin lifecycle")]
#[command(long_about = "\
Static content generator with a plugin lifecycle

Every directory under the content root becomes a node, every file a
resource. Markdown is rendered to HTML, other text is passed through,
binaries are copied. Configured plugins are notified at each step.

Site structure:

  my-site/
  ├── site.toml            # Site config (optional)
  ├── content/
  │   ├── meta.toml        # Node metadata, inherited by subdirectories
  │   ├── index.html       # Text resource → deploy/index.html
  │   ├── favicon.ico      # Binary resource → copied
  │   └── blog/
  │       ├── meta.toml    # Overrides parent metadata for blog/
  │       └── post.md      # Markdown → deploy/blog/post.html
  └── deploy/              # Output

Run 'quire gen-config' to generate a documented site.toml.")]
struct Cli {
    /// Site root (the directory holding site.toml)
    #[arg(long, default_value = ".", global = true)]
    site: PathBuf,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate the site, one node, or one resource
    Gen(GenArgs),
    /// Validate config and content without generating
    Check,
    /// Print a stock site.toml with all options documented
    GenConfig,
    /// List the available plugin identifiers
    Plugins,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Gen(args) => {
            let config = config::load_config(&cli.site)?;
            init_thread_pool(&config.processing);
            let report = generate(&cli.site, config, &args)?;
            output::print_report(&report);
        }
        Command::Check => {
            let config = config::load_config(&cli.site)?;
            let content = config.content_dir(&cli.site);
            println!("==> Checking {}", content.display());
            let tree = ContentTree::load(&content)?;
            let registry = PluginRegistry::with_builtins();
            if let Some(missing) = config.plugins.iter().find(|id| !registry.contains(id)) {
                return Err(format!("Unknown plugin '{missing}'").into());
            }
            output::print_tree(&tree);
            println!("==> Content is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
        Command::Plugins => {
            output::print_plugins(PluginRegistry::with_builtins().identifiers());
        }
    }

    Ok(())
}

fn generate(
    site: &Path,
    config: SiteConfig,
    args: &GenArgs,
) -> Result<quire::session::GenerationReport, Box<dyn std::error::Error>> {
    let content = config.content_dir(site);
    let deploy = config.deploy_dir(site);
    let incremental = args.incremental || config.generation.incremental;
    let resource = args.resource.as_deref().map(|p| content_relative(p, &config));
    let node = args.node.as_deref().map(|p| content_relative(p, &config));

    let tree = Arc::new(ContentTree::load(&content)?);
    info!(content = %content.display(), deploy = %deploy.display(), "loaded site");

    let cache_file = cache::manifest_path(&deploy);
    if args.no_cache && cache_file.exists() {
        std::fs::remove_file(&cache_file)?;
    }
    let sink = Arc::new(DirSink::new(&deploy));
    let mut session = GenerationSession::new(tree, config, sink).with_cache_file(cache_file);

    let report = match (resource, node) {
        (Some(path), _) => session.generate_resource_at_path(&path, incremental)?,
        (None, Some(path)) => session.generate_node_at_path(&path)?,
        (None, None) => session.generate_all()?,
    };
    Ok(report)
}

/// Accept paths relative to the content root or to the site root.
///
/// `.` components and trailing slashes are ignored on both sides, so
/// `./content/a/page.md` matches a `content_root` of `content/`.
fn content_relative(path: &Path, config: &SiteConfig) -> PathBuf {
    let path = normalize(path);
    let root = normalize(Path::new(&config.content_root));
    path.strip_prefix(&root)
        .map(Path::to_path_buf)
        .unwrap_or(path)
}

fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Install the tracing subscriber. Logs go to stderr so stdout stays clean
/// for reports.
///
/// `verbose`: 0 = WARN, 1 = INFO, 2 = DEBUG, 3+ = TRACE. `RUST_LOG`
/// directives are applied on top.
fn init_tracing(verbose: u8) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(level.into()))
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores: the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gen_defaults_to_whole_site() {
        let cli = Cli::parse_from(["quire", "gen"]);
        assert_eq!(cli.site, PathBuf::from("."));
        assert_eq!(cli.verbose, 0);
        match cli.command {
            Command::Gen(args) => {
                assert!(args.resource.is_none());
                assert!(args.node.is_none());
                assert!(!args.incremental);
                assert!(!args.no_cache);
            }
            other => panic!("expected gen, got {other:?}"),
        }
    }

    #[test]
    fn gen_single_resource_incremental() {
        let cli = Cli::parse_from([
            "quire",
            "--site",
            "blog",
            "-vv",
            "gen",
            "--resource",
            "a/page.md",
            "--incremental",
        ]);
        assert_eq!(cli.site, PathBuf::from("blog"));
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Gen(args) => {
                assert_eq!(args.resource, Some(PathBuf::from("a/page.md")));
                assert!(args.incremental);
            }
            other => panic!("expected gen, got {other:?}"),
        }
    }

    #[test]
    fn incremental_requires_resource() {
        assert!(Cli::try_parse_from(["quire", "gen", "--incremental"]).is_err());
    }

    #[test]
    fn resource_and_node_conflict() {
        assert!(
            Cli::try_parse_from(["quire", "gen", "--resource", "a.html", "--node", "a"]).is_err()
        );
    }

    #[test]
    fn content_relative_strips_content_root() {
        let config = SiteConfig::default();
        assert_eq!(
            content_relative(Path::new("content/a/page.md"), &config),
            PathBuf::from("a/page.md")
        );
        assert_eq!(
            content_relative(Path::new("a/page.md"), &config),
            PathBuf::from("a/page.md")
        );
    }

    #[test]
    fn content_relative_ignores_dot_and_trailing_slash() {
        for root in ["./content", "content/", "./content/"] {
            let config = SiteConfig {
                content_root: root.into(),
                ..SiteConfig::default()
            };
            assert_eq!(
                content_relative(Path::new("./content/a/page.md"), &config),
                PathBuf::from("a/page.md"),
                "content_root = {root:?}"
            );
            assert_eq!(
                content_relative(Path::new("content/a/page.md"), &config),
                PathBuf::from("a/page.md")
            );
        }
    }

    #[test]
    fn generate_writes_deploy_dir_and_cache() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("content/a")).unwrap();
        std::fs::write(tmp.path().join("content/index.html"), "<p>home</p>").unwrap();
        std::fs::write(tmp.path().join("content/a/post.md"), "# Post").unwrap();

        let report = generate(tmp.path(), SiteConfig::default(), &GenArgs::default()).unwrap();

        assert_eq!(report.written.len(), 2);
        assert!(tmp.path().join("deploy/index.html").is_file());
        assert!(tmp.path().join("deploy/a/post.html").is_file());
        assert!(tmp.path().join("deploy").join(cache::MANIFEST_FILENAME).is_file());

        let args = GenArgs {
            resource: Some(PathBuf::from("content/a/post.md")),
            incremental: true,
            ..GenArgs::default()
        };
        let report = generate(tmp.path(), SiteConfig::default(), &args).unwrap();
        assert_eq!(report.fresh, vec![PathBuf::from("a/post.html")]);
    }
}
