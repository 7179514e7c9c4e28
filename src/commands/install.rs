use anyhow::{Result, bail};
use log::debug;

use crate::install::{InstallOptions, Outcome, Report};
use crate::package::Requirement;
use crate::runtime::Runtime;

use super::services::Services;

#[derive(clap::Args, Debug, Clone, Default)]
pub struct InstallArgs {
    /// Requirements to install ("name", "name>=1.0", "name==1.2", ...)
    #[arg(value_name = "REQUIREMENT", required = true)]
    pub requirements: Vec<String>,

    /// Allow updating held mods
    #[arg(short = 'H', long)]
    pub held: bool,

    /// Allow reinstalling mods
    #[arg(short = 'R', long)]
    pub reinstall: bool,

    /// Allow downgrading mods
    #[arg(short = 'D', long)]
    pub downgrade: bool,

    /// Unpack mod archives
    #[arg(short = 'U', long)]
    pub unpack: bool,

    /// Do not install any dependencies
    #[arg(short = 'd', long)]
    pub no_deps: bool,
}

/// Install or update mods matching the given requirements
#[tracing::instrument(skip(services))]
pub async fn install<R: Runtime>(services: &Services<R>, args: &InstallArgs) -> Result<()> {
    let requirements = args
        .requirements
        .iter()
        .map(|r| r.parse::<Requirement>())
        .collect::<Result<Vec<_>>>()?;

    let store = services.store();
    let options = services
        .context
        .resolve_options(args.held, args.reinstall, args.downgrade);
    let resolution = services
        .resolver(&store, options)
        .resolve(&requirements, !args.no_deps)
        .await?;
    debug!("Planned {} install(s)", resolution.plan.len());

    let install_options = InstallOptions {
        unpack: args.unpack.then_some(true),
        enable: None,
    };
    let report = services
        .orchestrator(&store)
        .execute(resolution, install_options)
        .await;

    print_report(&report);
    match report.failures() {
        0 => Ok(()),
        n => bail!("{} requirement(s) could not be installed", n),
    }
}

fn print_report(report: &Report) {
    for (req, outcome) in &report.requirements {
        match outcome {
            Outcome::Installed(path) => debug!("{} installed at {}", req, path.display()),
            Outcome::Skipped(reason) => println!("{} is {}", req.name, reason),
            Outcome::Failed(reason) => println!("Error: {}", reason),
        }
    }
    for (name, outcome) in &report.dependencies {
        match outcome {
            Outcome::Installed(_) => println!("Installed dependency: {}", name),
            Outcome::Skipped(reason) => println!("{} is {}", name, reason),
            Outcome::Failed(reason) => println!("Dependency error: {}", reason),
        }
    }
}
