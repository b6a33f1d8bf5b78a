use std::sync::Arc;

use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{web, App};
use anyhow::{Context, Result};
use log::*;
use r2d2::Pool;
use r2d2_postgres::PostgresConnectionManager;

use infra::persistence::Storage;

pub mod auth;
pub mod config;
pub mod drinks;
pub mod errors;
pub mod services;

#[cfg(test)]
mod test;

pub use crate::config::Config;

use crate::auth::Authorizer;
use crate::drinks::{Catalog, DrinkResources};

/// Everything a running server needs: the catalog and the means to check
/// who is asking.
pub struct CoffeeShop<M: r2d2::ManageConnection> {
    catalog: Catalog<M>,
    auth: Arc<Authorizer>,
}

impl CoffeeShop<PostgresConnectionManager> {
    pub async fn new(config: &Config) -> Result<Self> {
        let db = config.postgres.build().context("connect to postgres")?;
        let auth = Authorizer::discover(&config.auth)
            .await
            .context("load token signing keys")?;
        Ok(CoffeeShop::with_parts(db, auth))
    }
}

impl<M: r2d2::ManageConnection<Connection = D>, D: Storage + Send + 'static> CoffeeShop<M> {
    pub fn with_parts(db: Pool<M>, auth: Authorizer) -> Self {
        CoffeeShop {
            catalog: Catalog::new(db),
            auth: Arc::new(auth),
        }
    }

    pub fn catalog(&self) -> &Catalog<M> {
        &self.catalog
    }

    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        DrinkResources::new(self.catalog.clone(), self.auth.clone()).configure(cfg)
    }

    pub fn app(
        &self,
    ) -> App<
        impl ServiceFactory<
            ServiceRequest,
            Config = (),
            Response = ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        info!("Booting coffeeshop");
        App::new()
            .configure(|cfg| self.configure(cfg))
            .default_service(web::route().to(errors::resource_not_found))
    }
}

impl<M: r2d2::ManageConnection> Clone for CoffeeShop<M> {
    fn clone(&self) -> Self {
        CoffeeShop {
            catalog: self.catalog.clone(),
            auth: self.auth.clone(),
        }
    }
}
