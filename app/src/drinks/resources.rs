use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse};
use anyhow::Result;
use log::*;
use serde::Serialize;

use infra::persistence::Storage;

use super::{Catalog, Drink, DrinkForm};
use crate::auth::Authorizer;
use crate::errors::{method_not_allowed, ApiError};
use crate::services::{
    Commandable, CreateDrink, DeleteDrink, ListDrinks, Queryable, UpdateDrink,
};

pub const GET_DRINKS_DETAIL: &str = "get:drinks-detail";
pub const POST_DRINKS: &str = "post:drinks";
pub const PATCH_DRINKS: &str = "patch:drinks";
pub const DELETE_DRINKS: &str = "delete:drinks";

/// Larger request bodies are unprocessable.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// The HTTP face of the catalog.
pub struct DrinkResources<M: r2d2::ManageConnection> {
    catalog: Catalog<M>,
    auth: Arc<Authorizer>,
}

#[derive(Debug, Serialize)]
struct DrinkList<T> {
    success: bool,
    drinks: Vec<T>,
}

#[derive(Debug, Serialize)]
struct Deleted {
    success: bool,
    delete: i32,
}

impl<T: Serialize> DrinkList<T> {
    fn of(drinks: Vec<T>) -> HttpResponse {
        HttpResponse::Ok().json(DrinkList {
            success: true,
            drinks,
        })
    }
}

/// Only read once the caller is known to be allowed to send it.
async fn read_form(payload: web::Payload) -> Result<DrinkForm, ApiError> {
    let body = payload
        .to_bytes_limited(MAX_BODY_BYTES)
        .await
        .map_err(ApiError::unprocessable)?
        .map_err(ApiError::unprocessable)?;
    DrinkForm::parse(&body).map_err(ApiError::unprocessable)
}

/// Digit runs too long for an id name no drink.
fn drink_id(req: &HttpRequest) -> Result<i32, ApiError> {
    req.match_info()
        .get("id")
        .and_then(|id| id.parse().ok())
        .ok_or(ApiError::NotFound)
}

impl<M: r2d2::ManageConnection<Connection = D>, D: Storage + Send + 'static> DrinkResources<M> {
    pub fn new(catalog: Catalog<M>, auth: Arc<Authorizer>) -> Self {
        DrinkResources { catalog, auth }
    }

    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.service({
            let list = self.clone();
            let create = self.clone();
            web::resource("/drinks")
                .route(web::get().to(move || {
                    let me = list.clone();
                    async move { me.list_summary().await }
                }))
                .route(web::post().to(move |req: HttpRequest, body: web::Payload| {
                    let me = create.clone();
                    async move { me.create(req, body).await }
                }))
                .default_service(web::route().to(method_not_allowed))
        })
        .service({
            let me = self.clone();
            web::resource("/drinks-detail")
                .route(web::get().to(move |req: HttpRequest| {
                    let me = me.clone();
                    async move { me.list_detail(req).await }
                }))
                .default_service(web::route().to(method_not_allowed))
        })
        .service({
            let update = self.clone();
            let delete = self.clone();
            web::resource(r"/drinks/{id:\d+}")
                .route(web::patch().to(move |req: HttpRequest, body: web::Payload| {
                    let me = update.clone();
                    async move { me.update(req, body).await }
                }))
                .route(web::delete().to(move |req: HttpRequest| {
                    let me = delete.clone();
                    async move { me.delete(req).await }
                }))
                .default_service(web::route().to(method_not_allowed))
        });
    }

    async fn list_summary(&self) -> Result<HttpResponse, ApiError> {
        let drinks = self.in_pool(|catalog| catalog.query(ListDrinks)).await?;
        if drinks.is_empty() {
            return Err(ApiError::NotFound);
        }
        Ok(DrinkList::of(drinks.iter().map(Drink::short).collect::<Vec<_>>()))
    }

    async fn list_detail(&self, req: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.auth.authorize(&req, GET_DRINKS_DETAIL).await?;

        let drinks = self.in_pool(|catalog| catalog.query(ListDrinks)).await?;
        if drinks.is_empty() {
            return Err(ApiError::NotFound);
        }
        Ok(DrinkList::of(drinks.iter().map(Drink::long).collect::<Vec<_>>()))
    }

    async fn create(&self, req: HttpRequest, body: web::Payload) -> Result<HttpResponse, ApiError> {
        self.auth.authorize(&req, POST_DRINKS).await?;

        let form = read_form(body).await?;
        let drink = self
            .in_pool(move |catalog| catalog.execute(CreateDrink(form)))
            .await?;
        info!("Created drink {}: {:?}", drink.id, drink.title);
        Ok(DrinkList::of(vec![drink.long()]))
    }

    async fn update(&self, req: HttpRequest, body: web::Payload) -> Result<HttpResponse, ApiError> {
        self.auth.authorize(&req, PATCH_DRINKS).await?;

        let id = drink_id(&req)?;
        let form = read_form(body).await?;
        let drink = self
            .in_pool(move |catalog| catalog.execute(UpdateDrink { id, form }))
            .await?
            .ok_or(ApiError::NotFound)?;
        info!("Updated drink {}: {:?}", drink.id, drink.title);
        Ok(DrinkList::of(vec![drink.long()]))
    }

    async fn delete(&self, req: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.auth.authorize(&req, DELETE_DRINKS).await?;

        let id = drink_id(&req)?;
        let deleted = self
            .in_pool(move |catalog| catalog.execute(DeleteDrink { id }))
            .await?;
        if !deleted {
            return Err(ApiError::NotFound);
        }
        info!("Deleted drink {}", id);
        Ok(HttpResponse::Ok().json(Deleted {
            success: true,
            delete: id,
        }))
    }

    /// Runs catalog work on the blocking pool. Whatever goes wrong in there
    /// is reported as unprocessable; absence is signalled through the value.
    async fn in_pool<R, F>(&self, f: F) -> Result<R, ApiError>
    where
        R: Send + 'static,
        F: FnOnce(&Catalog<M>) -> Result<R> + Send + 'static,
    {
        let catalog = self.catalog.clone();
        web::block(move || f(&catalog))
            .await
            .map_err(ApiError::unprocessable)?
            .map_err(ApiError::unprocessable)
    }
}

impl<M: r2d2::ManageConnection> Clone for DrinkResources<M> {
    fn clone(&self) -> Self {
        DrinkResources {
            catalog: self.catalog.clone(),
            auth: self.auth.clone(),
        }
    }
}
