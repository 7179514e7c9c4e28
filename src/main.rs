use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use fac::cleanup::spawn_interrupt_handler;
use fac::commands::{
    self, CleanArgs, EnableArgs, FetchArgs, HoldArgs, InstallArgs, MakeCompatibleArgs, PackArgs,
    RemoveArgs, SearchArgs, Services, ShowArgs, UnholdArgs, UpdateArgs,
};
use fac::config::{Config, Context, Overrides};
use fac::provider::{DEFAULT_API_URL, DEFAULT_AUTH_URL};
use fac::runtime::RealRuntime;

/// fac - mod manager for Factorio
///
/// Install, update and remove mods from the Factorio mod portal.
///
/// Examples:
///   fac install Warehousing        # Install a mod and its dependencies
///   fac install "bobores>=0.17.2"  # Install a specific version range
///   fac update                     # Update every installed mod
#[derive(Parser, Debug)]
#[command(author, version = env!("FAC_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Use a specific game version instead of the detected one
    #[arg(
        long = "game-version",
        short = 'g',
        env = "FAC_GAME_VERSION",
        value_name = "VERSION",
        global = true
    )]
    game_version: Option<String>,

    /// Use a specific mods directory
    #[arg(
        long = "mods-directory",
        short = 'm',
        env = "FAC_MODS_DIRECTORY",
        value_name = "DIR",
        global = true
    )]
    mods_directory: Option<PathBuf>,

    /// Ignore game version when selecting releases
    #[arg(long = "ignore-game-ver", short = 'i', global = true)]
    ignore_game_version: bool,

    /// Use a specific configuration file
    #[arg(long, env = "FAC_CONFIG", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Show debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Mod portal API URL
    #[arg(long = "api-url", value_name = "URL", default_value = DEFAULT_API_URL, global = true)]
    api_url: String,

    /// Login endpoint used to obtain a download token
    #[arg(long = "auth-url", value_name = "URL", default_value = DEFAULT_AUTH_URL, global = true)]
    auth_url: String,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Install (or update) mods and their dependencies
    Install(InstallArgs),

    /// Update installed mods
    Update(UpdateArgs),

    /// Remove mods
    Remove(RemoveArgs),

    /// List installed mods and their status
    List,

    /// Show details about specific mods
    Show(ShowArgs),

    /// Search the mod portal
    Search(SearchArgs),

    /// Enable mods
    Enable(EnableArgs),

    /// Disable mods
    Disable(EnableArgs),

    /// Hold mods (prevent automatic updates), or list held mods
    Hold(HoldArgs),

    /// Unhold mods
    Unhold(UnholdArgs),

    /// Pack mods into zip archives
    Pack(PackArgs),

    /// Unpack mods into directories
    Unpack(PackArgs),

    /// Download mods to a directory without installing them
    Fetch(FetchArgs),

    /// Remove all but the highest installed version of each mod
    Clean(CleanArgs),

    /// Change the supported game version of mods to the current one
    MakeCompatible(MakeCompatibleArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let runtime = Arc::new(RealRuntime);
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::default_path(runtime.as_ref())?,
    };
    let config = Config::load(runtime.as_ref(), &config_path)?;
    let overrides = Overrides {
        game_version: cli.game_version.clone(),
        mods_dir: cli.mods_directory.clone(),
        ignore_game_version: cli.ignore_game_version,
    };
    let context = Context::resolve(runtime.as_ref(), &config, &overrides)?;
    let mut services = Services::build(runtime, config, context, &cli.api_url, &cli.auth_url)?;

    let interrupt = spawn_interrupt_handler(Arc::clone(&services.cleanup));
    let result = run(&mut services, cli.command).await;
    interrupt.abort();
    result
}

async fn run(services: &mut Services<RealRuntime>, command: Commands) -> Result<()> {
    match command {
        Commands::Install(args) => commands::install(services, &args).await,
        Commands::Update(args) => commands::update(services, &args).await,
        Commands::Remove(args) => commands::remove(services, &args).await,
        Commands::List => commands::list(services),
        Commands::Show(args) => commands::show(services.catalog.as_ref(), &args).await,
        Commands::Search(args) => commands::search(services.catalog.as_ref(), &args).await,
        Commands::Enable(args) => commands::set_enabled(services, &args, true).await,
        Commands::Disable(args) => commands::set_enabled(services, &args, false).await,
        Commands::Hold(args) => commands::hold(services, &args).await,
        Commands::Unhold(args) => commands::unhold(services, &args),
        Commands::Pack(args) => commands::pack(services, &args, true).await,
        Commands::Unpack(args) => commands::pack(services, &args, false).await,
        Commands::Fetch(args) => commands::fetch(services, &args).await,
        Commands::Clean(args) => commands::clean(services, &args),
        Commands::MakeCompatible(args) => commands::make_compatible(services, &args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_install_parsing() {
        let cli = Cli::try_parse_from(["fac", "install", "-U", "foo", "bar>=1.0"]).unwrap();
        match cli.command {
            Commands::Install(args) => {
                assert_eq!(args.requirements, vec!["foo", "bar>=1.0"]);
                assert!(args.unpack);
                assert!(!args.no_deps);
            }
            _ => panic!("Expected Install command"),
        }
        assert_eq!(cli.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn test_cli_global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "fac", "list", "-g", "0.16", "-m", "/tmp/mods", "-i", "--config", "/tmp/c.json",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::List));
        assert_eq!(cli.game_version.as_deref(), Some("0.16"));
        assert_eq!(cli.mods_directory, Some(PathBuf::from("/tmp/mods")));
        assert!(cli.ignore_game_version);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.json")));
    }

    #[test]
    fn test_cli_disable_and_unpack_share_args() {
        let cli = Cli::try_parse_from(["fac", "disable", "foo"]).unwrap();
        assert!(matches!(cli.command, Commands::Disable(ref a) if a.mods == vec!["foo"]));

        let cli = Cli::try_parse_from(["fac", "unpack", "-K", "foo"]).unwrap();
        assert!(matches!(cli.command, Commands::Unpack(ref a) if a.keep));
    }

    #[test]
    fn test_cli_make_compatible_is_kebab_case() {
        let cli = Cli::try_parse_from(["fac", "make-compatible", "foo"]).unwrap();
        assert!(matches!(cli.command, Commands::MakeCompatible(_)));
    }

    #[test]
    fn test_cli_install_requires_requirement() {
        assert!(Cli::try_parse_from(["fac", "install"]).is_err());
    }
}
