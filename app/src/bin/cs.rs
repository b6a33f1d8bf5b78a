use std::path::PathBuf;

use anyhow::Result;
use serde::Deserialize;
use structopt::StructOpt;

use coffeeshop::config::{read_toml, EnvLogger};
use coffeeshop::drinks::Catalog;
use coffeeshop::services::{ListDrinks, Queryable};

#[derive(Debug, StructOpt)]
#[structopt(name = "cs", about = "Drinks catalog admin")]
struct Opt {
    /// Configuration file
    #[structopt(parse(from_os_str))]
    config: PathBuf,
    #[structopt(subcommand)]
    command: Commands,
}

#[derive(Debug, StructOpt)]
enum Commands {
    #[structopt(name = "setup", about = "Create the schema if absent")]
    Setup,
    #[structopt(name = "reset", about = "Drop everything and seed a single drink")]
    Reset,
    #[structopt(name = "show-menu", about = "Show every drink")]
    ShowMenu,
}

#[derive(Deserialize, Debug)]
struct Config {
    #[serde(flatten)]
    coffeeshop: coffeeshop::Config,
    #[serde(default)]
    env_logger: EnvLogger,
}

fn main() -> Result<()> {
    let opt = Opt::from_args();
    let mut config: Config = read_toml(&opt.config)?;
    config.env_logger.builder().init();
    config.coffeeshop.apply_env()?;

    let catalog = Catalog::new(config.coffeeshop.postgres.build()?);

    match opt.command {
        Commands::Setup => catalog.setup()?,
        Commands::Reset => {
            let drink = catalog.reset()?;
            println!("{}: {}", drink.id, drink.title);
        }
        Commands::ShowMenu => {
            for drink in catalog.query(ListDrinks)? {
                println!("{}: {}", drink.id, drink.title);
            }
        }
    }

    Ok(())
}
