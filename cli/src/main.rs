use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

mod commands;
mod config;
mod logging;
mod output;

use config::MigrateConfig;
use migration::ContentKind;
use output::OutputFormat;

/// ctm - move content objects between tenants of the content platform
#[derive(Parser)]
#[command(name = "ctm")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write logs to daily files in this directory
    #[arg(long, global = true, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Configuration file with endpoint templates and schema versions
    #[arg(
        long,
        global = true,
        env = "CTM_CONFIG_PATH",
        default_value = "config/config.migrate.yaml"
    )]
    config: PathBuf,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TargetArg {
    /// Another organization's production environment
    Production,
    /// The source organization's sandbox
    Sandbox,
}

/// Source and destination tenants
#[derive(Args, Debug, Clone)]
pub struct TenantArgs {
    /// Source organization
    #[arg(long, env = "CTM_FROM_ORG")]
    pub from_org: String,

    /// Destination organization; defaults to sandbox.<from-org> for sandbox targets
    #[arg(long, env = "CTM_TO_ORG")]
    pub to_org: Option<String>,

    /// Bearer token for the source organization
    #[arg(long, env = "CTM_FROM_TOKEN", hide_env_values = true)]
    pub from_token: String,

    /// Bearer token for the destination organization
    #[arg(long, env = "CTM_TO_TOKEN", hide_env_values = true)]
    pub to_token: String,

    #[arg(long, value_enum, default_value_t = TargetArg::Production)]
    pub target: TargetArg,

    /// Validate without creating anything in the destination
    #[arg(long)]
    pub dry_run: bool,
}

/// One object to migrate
#[derive(Args, Debug, Clone)]
pub struct ObjectArgs {
    /// Id of the object in the source organization
    pub id: String,

    #[command(flatten)]
    pub tenants: TenantArgs,

    /// Destination website
    #[arg(long, env = "CTM_TO_WEBSITE")]
    pub to_website: Option<String>,

    /// Destination section; every placement collapses into it when given
    #[arg(long, env = "CTM_TO_SECTION")]
    pub to_section: Option<String>,

    /// Redirect URL to recreate once a gallery is posted (repeatable)
    #[arg(long = "redirect-url", value_name = "URL")]
    pub redirect_urls: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate one story with its circulation and redirects
    Story(ObjectArgs),
    /// Migrate one published video
    Video(ObjectArgs),
    /// Migrate one photo gallery
    Gallery(ObjectArgs),
    /// Migrate one image
    Image(ObjectArgs),
    /// Copy one author record
    Author(ObjectArgs),
    /// Recreate one collection
    Collection(ObjectArgs),
    /// Recreate one lightbox with its photos
    Lightbox(ObjectArgs),

    /// Copy every author of the source organization
    Authors {
        #[command(flatten)]
        tenants: TenantArgs,

        /// Most authors to process; 0 processes all
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },

    /// Recreate the story redirects of a source website
    Redirects {
        #[command(flatten)]
        tenants: TenantArgs,

        /// Website whose redirects are scanned
        #[arg(long)]
        source_website: String,

        /// Website the redirects are created on
        #[arg(long, env = "CTM_TO_WEBSITE")]
        to_website: String,

        /// URL substring that marks video redirects, e.g. /video
        #[arg(long = "video-urlstring")]
        video_marker: Option<String>,

        /// URL substring that marks gallery redirects, e.g. /gallery
        #[arg(long = "gallery-urlstring")]
        gallery_marker: Option<String>,

        /// Most redirects to process; 0 processes all
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let _guard = match logging::init_logging(cli.verbose, cli.log_dir.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            output::print_error(&e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cli).await {
        output::print_error(&e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = MigrateConfig::load(&cli.config)?;
    let format = cli.format;

    match cli.command {
        Commands::Story(args) => commands::migrate::execute(ContentKind::Story, args, &config, format).await,
        Commands::Video(args) => commands::migrate::execute(ContentKind::Video, args, &config, format).await,
        Commands::Gallery(args) => commands::migrate::execute(ContentKind::Gallery, args, &config, format).await,
        Commands::Image(args) => commands::migrate::execute(ContentKind::Image, args, &config, format).await,
        Commands::Author(args) => commands::migrate::execute(ContentKind::Author, args, &config, format).await,
        Commands::Collection(args) => {
            commands::migrate::execute(ContentKind::Collection, args, &config, format).await
        }
        Commands::Lightbox(args) => commands::migrate::execute(ContentKind::Lightbox, args, &config, format).await,
        Commands::Authors { tenants, limit } => commands::bulk::authors(tenants, limit, &config, format).await,
        Commands::Redirects {
            tenants,
            source_website,
            to_website,
            video_marker,
            gallery_marker,
            limit,
        } => {
            let scan = migration::RedirectScan {
                source_website,
                destination_website: to_website,
                video_marker,
                gallery_marker,
                cap: commands::cap(limit),
            };
            commands::bulk::redirects(tenants, scan, &config, format).await
        }
    }
}
