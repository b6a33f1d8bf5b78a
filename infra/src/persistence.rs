use anyhow::{anyhow, Context, Result};
use err_derive::Error;
use log::*;
use postgres::rows::Row;
use postgres::types::FromSql;
use postgres::GenericConnection;
use r2d2::Pool;
use r2d2_postgres::{PostgresConnectionManager, TlsMode};

/// A row of the `drinks` table. The recipe is kept as the JSON text it was
/// stored as; interpreting it is up to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrinkRecord {
    pub id: i32,
    pub title: String,
    pub recipe: String,
}

/// Column values for an insert or a wholesale update. `None` is written as
/// SQL `NULL`, which the schema rejects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrinkFields {
    pub title: Option<String>,
    pub recipe: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error(display = "constraint violated: {}", _0)]
pub struct ConstraintViolation(pub String);

pub trait Storage {
    fn setup(&self) -> Result<()>;
    /// Drops every drink and starts identifiers afresh.
    fn reset(&self) -> Result<()>;
    fn list_drinks(&self) -> Result<Vec<DrinkRecord>>;
    fn load_drink(&self, id: i32) -> Result<Option<DrinkRecord>>;
    fn insert_drink(&self, fields: &DrinkFields) -> Result<DrinkRecord>;
    /// Returns `None` when no drink has the given id.
    fn update_drink(&self, id: i32, fields: &DrinkFields) -> Result<Option<DrinkRecord>>;
    /// Returns `false` when no drink has the given id.
    fn delete_drink(&self, id: i32) -> Result<bool>;
}

const SETUP_SQL: &'static str = include_str!("schema.sql");
const DROP_SQL: &'static str = "DROP TABLE IF EXISTS drinks";
const LIST_SQL: &'static str = "SELECT id, title, recipe FROM drinks ORDER BY id";
const LOAD_SQL: &'static str = "SELECT id, title, recipe FROM drinks WHERE id = $1";
const INSERT_SQL: &'static str =
    "INSERT INTO drinks (title, recipe) VALUES ($1, $2) RETURNING id, title, recipe";
const UPDATE_SQL: &'static str =
    "UPDATE drinks SET title = $2, recipe = $3 WHERE id = $1 RETURNING id, title, recipe";
const DELETE_SQL: &'static str = "DELETE FROM drinks WHERE id = $1";

pub(crate) fn required<'a>(value: &'a Option<String>, column: &str) -> Result<&'a str> {
    value
        .as_ref()
        .map(|s| s.as_str())
        .ok_or_else(|| ConstraintViolation(format!("drinks.{} must not be null", column)).into())
}

fn column<T: FromSql>(row: &Row, idx: usize) -> Result<T> {
    let val = row
        .get_opt(idx)
        .ok_or_else(|| anyhow!("Missing column {} in row?", idx))??;
    Ok(val)
}

fn record_of(row: &Row) -> Result<DrinkRecord> {
    Ok(DrinkRecord {
        id: column(row, 0)?,
        title: column(row, 1)?,
        recipe: column(row, 2)?,
    })
}

fn first_record<C: GenericConnection + ?Sized>(
    conn: &C,
    sql: &str,
    params: &[&dyn postgres::types::ToSql],
) -> Result<Option<DrinkRecord>> {
    let rows = conn.prepare_cached(sql)?.query(params)?;
    let res = rows.iter().next().map(|row| record_of(&row)).transpose()?;
    Ok(res)
}

impl Storage for postgres::Connection {
    fn setup(&self) -> Result<()> {
        self.batch_execute(SETUP_SQL).context("create drinks table")?;
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        let t = self.transaction()?;
        t.batch_execute(DROP_SQL).context("drop drinks table")?;
        t.batch_execute(SETUP_SQL).context("create drinks table")?;
        t.commit()?;
        Ok(())
    }

    fn list_drinks(&self) -> Result<Vec<DrinkRecord>> {
        let rows = self.prepare_cached(LIST_SQL)?.query(&[])?;
        let drinks = rows
            .iter()
            .map(|row| record_of(&row))
            .collect::<Result<Vec<_>>>()?;
        debug!("Listed {} drinks", drinks.len());
        Ok(drinks)
    }

    fn load_drink(&self, id: i32) -> Result<Option<DrinkRecord>> {
        let res = first_record(self, LOAD_SQL, &[&id])?;
        debug!("Load {} -> {:?}", id, res);
        Ok(res)
    }

    fn insert_drink(&self, fields: &DrinkFields) -> Result<DrinkRecord> {
        let title = required(&fields.title, "title")?;
        let recipe = required(&fields.recipe, "recipe")?;
        let t = self.transaction()?;
        let res = first_record(&t, INSERT_SQL, &[&title, &recipe])
            .context("insert drink")?
            .ok_or_else(|| anyhow!("Insert returned no row?"))?;
        t.commit()?;
        debug!("Inserted {:?}", res);
        Ok(res)
    }

    fn update_drink(&self, id: i32, fields: &DrinkFields) -> Result<Option<DrinkRecord>> {
        let t = self.transaction()?;
        if first_record(&t, LOAD_SQL, &[&id])?.is_none() {
            debug!("No drink {} to update", id);
            return Ok(None);
        }
        let title = required(&fields.title, "title")?;
        let recipe = required(&fields.recipe, "recipe")?;
        let res = first_record(&t, UPDATE_SQL, &[&id, &title, &recipe]).context("update drink")?;
        t.commit()?;
        debug!("Updated {} -> {:?}", id, res);
        Ok(res)
    }

    fn delete_drink(&self, id: i32) -> Result<bool> {
        let t = self.transaction()?;
        let nrows = t.prepare_cached(DELETE_SQL)?.execute(&[&id])?;
        t.commit()?;
        debug!("Delete {} removed {} rows", id, nrows);
        if nrows > 1 {
            warn!("Delete impacted {} rows not 1", nrows);
        }
        Ok(nrows > 0)
    }
}

pub fn postgres_pool(url: &str, max_size: u32) -> Result<Pool<PostgresConnectionManager>> {
    let manager = PostgresConnectionManager::new(url, TlsMode::None).context("postgres url")?;
    let builder = r2d2::Pool::builder().max_size(max_size);
    debug!("Pool builder: {:?}", builder);
    let pool = builder.build(manager).context("build pool")?;
    Ok(pool)
}
