//! The operations the catalog offers, independent of HTTP. Handlers and
//! the command line both go through these.

use anyhow::Result;

use crate::drinks::{Drink, DrinkForm};

pub trait Request {
    type Resp;
}

/// Requests that only read.
pub trait Queryable<Req>
where
    Req: Request,
{
    fn query(&self, req: Req) -> Result<Req::Resp>;
}

/// Requests that change what is stored. Each one commits or fails as a
/// whole.
pub trait Commandable<Req>
where
    Req: Request,
{
    fn execute(&self, req: Req) -> Result<Req::Resp>;
}

/// Every drink, ordered by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListDrinks;

#[derive(Debug, Clone, PartialEq)]
pub struct CreateDrink(pub DrinkForm);

/// Replaces both title and recipe; fields missing from the form are
/// written as missing.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateDrink {
    pub id: i32,
    pub form: DrinkForm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteDrink {
    pub id: i32,
}

impl Request for ListDrinks {
    type Resp = Vec<Drink>;
}

impl Request for CreateDrink {
    type Resp = Drink;
}

/// `None` when there is no drink with that id.
impl Request for UpdateDrink {
    type Resp = Option<Drink>;
}

/// `false` when there is no drink with that id.
impl Request for DeleteDrink {
    type Resp = bool;
}
