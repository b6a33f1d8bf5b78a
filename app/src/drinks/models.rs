use std::num::NonZeroU32;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use infra::persistence::{DrinkFields, DrinkRecord};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    pub color: String,
    pub parts: NonZeroU32,
}

/// A recipe is either one ingredient or a list of them. The shape given is
/// the shape stored and returned in full; the short form is always a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Recipe {
    One(Ingredient),
    Many(Vec<Ingredient>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drink {
    pub id: i32,
    pub title: String,
    pub recipe: Recipe,
}

/// The body of a create or update request. Both fields may be missing; the
/// store decides whether that is acceptable.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DrinkForm {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub recipe: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct ShortIngredient<'a> {
    name: &'a str,
    color: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ShortDrink<'a> {
    id: i32,
    title: &'a str,
    recipe: Vec<ShortIngredient<'a>>,
}

#[derive(Debug, Serialize)]
pub struct LongDrink<'a> {
    id: i32,
    title: &'a str,
    recipe: &'a Recipe,
}

impl Ingredient {
    fn short(&self) -> ShortIngredient {
        ShortIngredient {
            name: &self.name,
            color: &self.color,
        }
    }
}

impl Recipe {
    pub fn ingredients(&self) -> &[Ingredient] {
        match self {
            Recipe::One(ingredient) => std::slice::from_ref(ingredient),
            Recipe::Many(ingredients) => ingredients,
        }
    }
}

impl Drink {
    pub fn from_record(record: DrinkRecord) -> Result<Self> {
        let recipe = serde_json::from_str(&record.recipe)
            .with_context(|| format!("malformed stored recipe for drink {}", record.id))?;
        Ok(Drink {
            id: record.id,
            title: record.title,
            recipe,
        })
    }

    pub fn short(&self) -> ShortDrink {
        ShortDrink {
            id: self.id,
            title: &self.title,
            recipe: self.recipe.ingredients().iter().map(Ingredient::short).collect(),
        }
    }

    pub fn long(&self) -> LongDrink {
        LongDrink {
            id: self.id,
            title: &self.title,
            recipe: &self.recipe,
        }
    }
}

impl DrinkForm {
    pub fn parse(body: &[u8]) -> Result<Self> {
        let form = serde_json::from_slice(body).context("parse drink form")?;
        Ok(form)
    }

    /// Validates the recipe and serializes it for storage.
    pub fn into_fields(self) -> Result<DrinkFields> {
        let recipe = match self.recipe {
            Some(value) => {
                let recipe: Recipe = serde_json::from_value(value).context("malformed recipe")?;
                Some(serde_json::to_string(&recipe)?)
            }
            None => None,
        };
        Ok(DrinkFields {
            title: self.title,
            recipe,
        })
    }
}
