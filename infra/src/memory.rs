//! A process-local stand-in for the PostgreSQL store, handed out through an
//! r2d2 pool so callers see the same connection type either way.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use log::*;

use crate::persistence::{required, ConstraintViolation, DrinkFields, DrinkRecord, Storage};

#[derive(Debug, Default)]
struct Tables {
    drinks: BTreeMap<i32, DrinkRecord>,
    last_id: i32,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryConnectionManager {
    store: MemoryStore,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<Tables>> {
        self.tables
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }
}

impl Tables {
    fn check_unique(&self, title: &str, except: Option<i32>) -> Result<()> {
        let clash = self
            .drinks
            .values()
            .any(|d| d.title == title && Some(d.id) != except);
        if clash {
            return Err(ConstraintViolation(format!("drinks.title {:?} already exists", title)).into());
        }
        Ok(())
    }
}

impl Storage for MemoryStore {
    fn setup(&self) -> Result<()> {
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        let mut tables = self.lock()?;
        *tables = Tables::default();
        Ok(())
    }

    fn list_drinks(&self) -> Result<Vec<DrinkRecord>> {
        let tables = self.lock()?;
        Ok(tables.drinks.values().cloned().collect())
    }

    fn load_drink(&self, id: i32) -> Result<Option<DrinkRecord>> {
        let tables = self.lock()?;
        Ok(tables.drinks.get(&id).cloned())
    }

    fn insert_drink(&self, fields: &DrinkFields) -> Result<DrinkRecord> {
        let title = required(&fields.title, "title")?;
        let recipe = required(&fields.recipe, "recipe")?;
        let mut tables = self.lock()?;
        tables.check_unique(title, None)?;

        tables.last_id += 1;
        let record = DrinkRecord {
            id: tables.last_id,
            title: title.to_string(),
            recipe: recipe.to_string(),
        };
        tables.drinks.insert(record.id, record.clone());
        debug!("Inserted {:?}", record);
        Ok(record)
    }

    fn update_drink(&self, id: i32, fields: &DrinkFields) -> Result<Option<DrinkRecord>> {
        let mut tables = self.lock()?;
        if !tables.drinks.contains_key(&id) {
            return Ok(None);
        }
        let title = required(&fields.title, "title")?;
        let recipe = required(&fields.recipe, "recipe")?;
        tables.check_unique(title, Some(id))?;

        let record = DrinkRecord {
            id,
            title: title.to_string(),
            recipe: recipe.to_string(),
        };
        tables.drinks.insert(id, record.clone());
        debug!("Updated {:?}", record);
        Ok(Some(record))
    }

    fn delete_drink(&self, id: i32) -> Result<bool> {
        let mut tables = self.lock()?;
        Ok(tables.drinks.remove(&id).is_some())
    }
}

impl MemoryConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// The store every pooled connection shares.
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }
}

impl r2d2::ManageConnection for MemoryConnectionManager {
    type Connection = MemoryStore;
    type Error = Infallible;

    fn connect(&self) -> Result<MemoryStore, Infallible> {
        Ok(self.store.clone())
    }

    fn is_valid(&self, _: &mut MemoryStore) -> Result<(), Infallible> {
        Ok(())
    }

    fn has_broken(&self, _: &mut MemoryStore) -> bool {
        false
    }
}
