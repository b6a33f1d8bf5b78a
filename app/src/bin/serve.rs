use std::path::PathBuf;

use actix_web::middleware::Logger;
use actix_web::HttpServer;
use anyhow::{Context, Result};
use log::*;
use serde::Deserialize;
use structopt::StructOpt;

use coffeeshop::config::{read_toml, EnvLogger};
use coffeeshop::CoffeeShop;

#[derive(Debug, StructOpt)]
#[structopt(name = "serve", about = "Serve the drinks catalog.")]
struct Opt {
    /// Configuration file
    #[structopt(parse(from_os_str))]
    config: PathBuf,
}

#[derive(Deserialize, Debug)]
struct Config {
    #[serde(flatten)]
    coffeeshop: coffeeshop::Config,
    listener: Listener,
    #[serde(default)]
    env_logger: EnvLogger,
}

#[derive(Deserialize, Debug)]
struct Listener {
    addr: std::net::SocketAddr,
}

#[actix_web::main]
async fn main() -> Result<()> {
    let opt = Opt::from_args();
    let mut config: Config = read_toml(&opt.config)?;
    config.env_logger.builder().init();
    debug!("Options: {:?}", opt);

    config.coffeeshop.apply_env()?;
    let shop = CoffeeShop::new(&config.coffeeshop).await?;
    shop.catalog().setup().context("setup schema")?;

    let srv = HttpServer::new(move || shop.app().wrap(Logger::default()))
        .bind(config.listener.addr)
        .context("bind")?;
    info!("Listening on: {:?}", srv.addrs());
    srv.run().await?;
    Ok(())
}
