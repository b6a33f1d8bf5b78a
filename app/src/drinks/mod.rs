use anyhow::Result;
use log::*;
use r2d2::Pool;
use serde_json::json;

use infra::persistence::Storage;

use crate::services::{
    Commandable, CreateDrink, DeleteDrink, ListDrinks, Queryable, UpdateDrink,
};

mod models;
mod resources;

pub use self::models::{
    Drink, DrinkForm, Ingredient, LongDrink, Recipe, ShortDrink, ShortIngredient,
};
pub use self::resources::{
    DrinkResources, DELETE_DRINKS, GET_DRINKS_DETAIL, MAX_BODY_BYTES, PATCH_DRINKS,
    POST_DRINKS,
};

/// The drinks on offer, backed by whatever store the pool hands out.
#[derive(Debug)]
pub struct Catalog<M: r2d2::ManageConnection> {
    db: Pool<M>,
}

impl<M: r2d2::ManageConnection<Connection = D>, D: Storage + Send + 'static> Catalog<M> {
    pub fn new(db: Pool<M>) -> Self {
        Catalog { db }
    }

    pub fn setup(&self) -> Result<()> {
        debug!("Init schema");
        self.db.get()?.setup()
    }

    /// Empties the catalog and seeds it with a glass of water.
    pub fn reset(&self) -> Result<Drink> {
        self.db.get()?.reset()?;
        let water = DrinkForm {
            title: Some("water".to_string()),
            recipe: Some(json!([{"name": "water", "color": "blue", "parts": 1}])),
        };
        let drink = self.execute(CreateDrink(water))?;
        info!("Reset catalog to {:?}", drink);
        Ok(drink)
    }
}

impl<M: r2d2::ManageConnection> Clone for Catalog<M> {
    fn clone(&self) -> Self {
        let db = self.db.clone();
        Catalog { db }
    }
}

impl<M: r2d2::ManageConnection<Connection = D>, D: Storage + Send + 'static> Queryable<ListDrinks>
    for Catalog<M>
{
    fn query(&self, _: ListDrinks) -> Result<Vec<Drink>> {
        let records = self.db.get()?.list_drinks()?;
        records.into_iter().map(Drink::from_record).collect()
    }
}

impl<M: r2d2::ManageConnection<Connection = D>, D: Storage + Send + 'static>
    Commandable<CreateDrink> for Catalog<M>
{
    fn execute(&self, CreateDrink(form): CreateDrink) -> Result<Drink> {
        let fields = form.into_fields()?;
        let record = self.db.get()?.insert_drink(&fields)?;
        debug!("Created {:?}", record);
        Drink::from_record(record)
    }
}

impl<M: r2d2::ManageConnection<Connection = D>, D: Storage + Send + 'static>
    Commandable<UpdateDrink> for Catalog<M>
{
    fn execute(&self, UpdateDrink { id, form }: UpdateDrink) -> Result<Option<Drink>> {
        let conn = self.db.get()?;
        if conn.load_drink(id)?.is_none() {
            debug!("No drink {} to update", id);
            return Ok(None);
        }
        let fields = form.into_fields()?;
        let record = conn.update_drink(id, &fields)?;
        debug!("Updated {} -> {:?}", id, record);
        record.map(Drink::from_record).transpose()
    }
}

impl<M: r2d2::ManageConnection<Connection = D>, D: Storage + Send + 'static>
    Commandable<DeleteDrink> for Catalog<M>
{
    fn execute(&self, DeleteDrink { id }: DeleteDrink) -> Result<bool> {
        let deleted = self.db.get()?.delete_drink(id)?;
        debug!("Delete {} -> {}", id, deleted);
        Ok(deleted)
    }
}
