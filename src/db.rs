//! SQLite snapshot store for recipes and raw-material stock
//!
//! Read side of the planner when running offline. Stock rows are only
//! written by sample loading and tests; commits never touch them.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Result};

use crate::error::ServiceError;
use crate::models::{Ingredient, OutputType, RawMaterialStock, Recipe, RecipeCatalog};
use crate::provider::{RawMaterialProvider, RecipeProvider};

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- ids are only unique within a vendor
        CREATE TABLE IF NOT EXISTS recipes (
            vendor_id TEXT NOT NULL,
            id TEXT NOT NULL,
            title TEXT NOT NULL,
            servings INTEGER NOT NULL,
            output_type TEXT NOT NULL,
            output_item_id TEXT NOT NULL,
            PRIMARY KEY (vendor_id, id)
        );

        -- position keeps the declared ingredient order
        CREATE TABLE IF NOT EXISTS recipe_ingredients (
            vendor_id TEXT NOT NULL,
            recipe_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            name TEXT NOT NULL,
            quantity REAL NOT NULL,
            unit TEXT NOT NULL,
            notes TEXT,
            PRIMARY KEY (vendor_id, recipe_id, position)
        );

        CREATE TABLE IF NOT EXISTS raw_materials (
            vendor_id TEXT NOT NULL,
            item_id TEXT NOT NULL,
            name TEXT NOT NULL,
            opening_amount REAL NOT NULL DEFAULT 0,
            closing_amount REAL NOT NULL DEFAULT 0,
            unit TEXT NOT NULL,
            PRIMARY KEY (vendor_id, item_id)
        );
        "#,
    )?;
    Ok(())
}

/// Insert or replace a recipe together with its ingredient list
pub fn upsert_recipe(conn: &Connection, vendor_id: &str, recipe: &Recipe) -> Result<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute(
        "INSERT OR REPLACE INTO recipes (vendor_id, id, title, servings, output_type, output_item_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        (
            vendor_id,
            &recipe.id,
            &recipe.title,
            recipe.servings,
            recipe.output_type.to_string(),
            &recipe.output_item_id,
        ),
    )?;

    tx.execute(
        "DELETE FROM recipe_ingredients WHERE vendor_id = ?1 AND recipe_id = ?2",
        (vendor_id, &recipe.id),
    )?;
    for (position, ingredient) in recipe.ingredients.iter().enumerate() {
        tx.execute(
            "INSERT INTO recipe_ingredients (vendor_id, recipe_id, position, name, quantity, unit, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            (
                vendor_id,
                &recipe.id,
                position as i64,
                &ingredient.name,
                ingredient.quantity,
                &ingredient.unit,
                &ingredient.notes,
            ),
        )?;
    }

    tx.commit()
}

/// Insert or replace a raw-material stock row
pub fn upsert_raw_material(conn: &Connection, vendor_id: &str, stock: &RawMaterialStock) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO raw_materials (vendor_id, item_id, name, opening_amount, closing_amount, unit)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        (
            vendor_id,
            &stock.item_id,
            &stock.name,
            stock.opening_amount,
            stock.closing_amount,
            &stock.unit,
        ),
    )?;
    Ok(())
}

/// Clear one vendor's recipes and stock (for re-import)
pub fn clear_data(conn: &Connection, vendor_id: &str) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM recipe_ingredients WHERE vendor_id = ?1", [vendor_id])?;
    tx.execute("DELETE FROM recipes WHERE vendor_id = ?1", [vendor_id])?;
    tx.execute("DELETE FROM raw_materials WHERE vendor_id = ?1", [vendor_id])?;
    tx.commit()
}

fn parse_output_type(idx: usize, value: &str) -> Result<OutputType> {
    match value {
        "retail" => Ok(OutputType::Retail),
        "produce" => Ok(OutputType::Produce),
        other => Err(rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unknown output type '{other}'").into(),
        )),
    }
}

fn get_ingredients(conn: &Connection, vendor_id: &str, recipe_id: &str) -> Result<Vec<Ingredient>> {
    let mut stmt = conn.prepare(
        "SELECT name, quantity, unit, notes
         FROM recipe_ingredients
         WHERE vendor_id = ?1 AND recipe_id = ?2
         ORDER BY position",
    )?;

    let rows = stmt.query_map([vendor_id, recipe_id], |row| {
        Ok(Ingredient {
            name: row.get(0)?,
            quantity: row.get(1)?,
            unit: row.get(2)?,
            notes: row.get(3)?,
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// List a vendor's recipes, ordered by title
pub fn list_recipes(conn: &Connection, vendor_id: &str) -> Result<Vec<Recipe>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, servings, output_type, output_item_id
         FROM recipes
         WHERE vendor_id = ?1
         ORDER BY title",
    )?;

    let rows = stmt.query_map([vendor_id], |row| {
        let output_type: String = row.get(3)?;
        Ok(Recipe {
            id: row.get(0)?,
            title: row.get(1)?,
            servings: row.get(2)?,
            ingredients: Vec::new(),
            output_type: parse_output_type(3, &output_type)?,
            output_item_id: row.get(4)?,
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        let mut recipe = row?;
        recipe.ingredients = get_ingredients(conn, vendor_id, &recipe.id)?;
        results.push(recipe);
    }
    Ok(results)
}

/// Look up a single recipe of a vendor by id
pub fn get_recipe(conn: &Connection, vendor_id: &str, recipe_id: &str) -> Result<Option<Recipe>> {
    let recipe = conn
        .query_row(
            "SELECT id, title, servings, output_type, output_item_id
             FROM recipes
             WHERE vendor_id = ?1 AND id = ?2",
            [vendor_id, recipe_id],
            |row| {
                let output_type: String = row.get(3)?;
                Ok(Recipe {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    servings: row.get(2)?,
                    ingredients: Vec::new(),
                    output_type: parse_output_type(3, &output_type)?,
                    output_item_id: row.get(4)?,
                })
            },
        )
        .optional()?;

    match recipe {
        Some(mut recipe) => {
            recipe.ingredients = get_ingredients(conn, vendor_id, &recipe.id)?;
            Ok(Some(recipe))
        }
        None => Ok(None),
    }
}

/// List a vendor's raw-material stock in insertion order
pub fn list_raw_materials(conn: &Connection, vendor_id: &str) -> Result<Vec<RawMaterialStock>> {
    let mut stmt = conn.prepare(
        "SELECT item_id, name, opening_amount, closing_amount, unit
         FROM raw_materials
         WHERE vendor_id = ?1
         ORDER BY rowid",
    )?;

    let rows = stmt.query_map([vendor_id], |row| {
        Ok(RawMaterialStock {
            item_id: row.get(0)?,
            name: row.get(1)?,
            opening_amount: row.get(2)?,
            closing_amount: row.get(3)?,
            unit: row.get(4)?,
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// Load a small bakery vendor for trying the planner without real data
pub fn load_sample_data(conn: &Connection, vendor_id: &str) -> Result<usize> {
    clear_data(conn, vendor_id)?;

    let stock = [
        ("rm-flour", "Flour", 5.0, 2.5, "kg"),
        ("rm-sugar", "Sugar", 2000.0, 0.0, "g"),
        ("rm-milk", "Milk", 4.0, 3.0, "l"),
        ("rm-eggs", "Eggs", 30.0, 24.0, "pieces"),
        ("rm-butter", "Butter", 1.0, 0.0, "lb"),
        ("rm-lettuce", "Lettuce", 6.0, 6.0, "bunch"),
        ("rm-tomato", "Tomato", 20.0, 12.0, "piece"),
        ("rm-olive-oil", "Olive Oil", 1.0, 0.75, "l"),
    ];
    for (item_id, name, opening, closing, unit) in stock {
        upsert_raw_material(
            conn,
            vendor_id,
            &RawMaterialStock {
                item_id: item_id.to_string(),
                name: name.to_string(),
                opening_amount: opening,
                closing_amount: closing,
                unit: unit.to_string(),
            },
        )?;
    }

    let ingredient = |name: &str, quantity: f64, unit: &str| Ingredient {
        name: name.to_string(),
        quantity,
        unit: unit.to_string(),
        notes: None,
    };

    let recipes = [
        Recipe {
            id: "pancakes".to_string(),
            title: "Pancakes".to_string(),
            servings: 4,
            ingredients: vec![
                ingredient("Flour", 200.0, "grams"),
                ingredient("Milk", 1.5, "cups"),
                ingredient("Eggs", 2.0, "pieces"),
                ingredient("Sugar", 25.0, "grams"),
                ingredient("Butter", 2.0, "oz"),
            ],
            output_type: OutputType::Retail,
            output_item_id: "item-pancakes".to_string(),
        },
        Recipe {
            id: "garden-salad".to_string(),
            title: "Garden Salad".to_string(),
            servings: 2,
            ingredients: vec![
                ingredient("Lettuce", 1.0, "bunch"),
                ingredient("Tomato", 2.0, "piece"),
                ingredient("Olive Oil", 2.0, "tbsp"),
            ],
            output_type: OutputType::Produce,
            output_item_id: "produce-salad".to_string(),
        },
    ];
    for recipe in &recipes {
        upsert_recipe(conn, vendor_id, recipe)?;
    }

    Ok(recipes.len())
}

/// Snapshot provider backed by a SQLite database
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Exclusive access to the underlying connection
    pub fn lock(&self) -> std::result::Result<MutexGuard<'_, Connection>, ServiceError> {
        self.conn
            .lock()
            .map_err(|e| ServiceError::Unavailable(e.to_string()))
    }

    /// Run `f` with exclusive access to the connection
    pub fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T>,
    ) -> std::result::Result<T, ServiceError> {
        let conn = self.lock()?;
        Ok(f(&conn)?)
    }
}

#[async_trait]
impl RecipeProvider for SqliteStore {
    async fn recipes(&self, vendor_id: &str) -> std::result::Result<RecipeCatalog, ServiceError> {
        let recipes = self.with_conn(|conn| list_recipes(conn, vendor_id))?;
        Ok(RecipeCatalog::from_recipes(recipes))
    }
}

#[async_trait]
impl RawMaterialProvider for SqliteStore {
    async fn raw_materials(
        &self,
        vendor_id: &str,
    ) -> std::result::Result<Vec<RawMaterialStock>, ServiceError> {
        self.with_conn(|conn| list_raw_materials(conn, vendor_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recipe_round_trips_through_sqlite() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        load_sample_data(&conn, "v1").unwrap();

        let recipe = get_recipe(&conn, "v1", "pancakes").unwrap().unwrap();
        assert_eq!(recipe.servings, 4);
        assert_eq!(recipe.output_type, OutputType::Retail);
        let names: Vec<&str> = recipe.ingredients.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["Flour", "Milk", "Eggs", "Sugar", "Butter"]);

        assert!(get_recipe(&conn, "v1", "missing").unwrap().is_none());
    }

    #[test]
    fn test_lists_are_scoped_by_vendor() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        load_sample_data(&conn, "v1").unwrap();

        assert_eq!(list_recipes(&conn, "v1").unwrap().len(), 2);
        assert!(list_recipes(&conn, "v2").unwrap().is_empty());
        assert_eq!(list_raw_materials(&conn, "v1").unwrap()[0].item_id, "rm-flour");
    }

    #[test]
    fn test_sample_load_leaves_other_vendors_alone() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        load_sample_data(&conn, "v1").unwrap();
        load_sample_data(&conn, "v2").unwrap();

        assert_eq!(list_recipes(&conn, "v1").unwrap().len(), 2);
        assert_eq!(list_raw_materials(&conn, "v1").unwrap().len(), 8);

        clear_data(&conn, "v2").unwrap();
        assert!(list_recipes(&conn, "v2").unwrap().is_empty());
        assert!(list_raw_materials(&conn, "v2").unwrap().is_empty());
        assert_eq!(list_recipes(&conn, "v1").unwrap().len(), 2);
        assert_eq!(get_recipe(&conn, "v1", "pancakes").unwrap().unwrap().ingredients.len(), 5);
    }

    #[test]
    fn test_same_ids_coexist_across_vendors() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let mut recipe = Recipe {
            id: "toast".to_string(),
            title: "Toast".to_string(),
            servings: 1,
            ingredients: vec![Ingredient {
                name: "Bread".to_string(),
                quantity: 2.0,
                unit: "slices".to_string(),
                notes: None,
            }],
            output_type: OutputType::Retail,
            output_item_id: "item-toast".to_string(),
        };
        upsert_recipe(&conn, "v1", &recipe).unwrap();

        recipe.ingredients[0].quantity = 3.0;
        recipe.ingredients.push(Ingredient {
            name: "Butter".to_string(),
            quantity: 10.0,
            unit: "g".to_string(),
            notes: None,
        });
        upsert_recipe(&conn, "v2", &recipe).unwrap();

        let v1 = get_recipe(&conn, "v1", "toast").unwrap().unwrap();
        assert_eq!(v1.ingredients.len(), 1);
        assert_eq!(v1.ingredients[0].quantity, 2.0);
        let v2 = get_recipe(&conn, "v2", "toast").unwrap().unwrap();
        assert_eq!(v2.ingredients.len(), 2);

        let stock = RawMaterialStock {
            item_id: "rm-bread".to_string(),
            name: "Bread".to_string(),
            opening_amount: 20.0,
            closing_amount: 0.0,
            unit: "slice".to_string(),
        };
        upsert_raw_material(&conn, "v1", &stock).unwrap();
        upsert_raw_material(&conn, "v2", &stock).unwrap();
        assert_eq!(list_raw_materials(&conn, "v1").unwrap().len(), 1);
        assert_eq!(list_raw_materials(&conn, "v2").unwrap().len(), 1);
    }

    #[test]
    fn test_failed_upsert_keeps_previous_ingredients() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        load_sample_data(&conn, "v1").unwrap();

        // fail the second ingredient insert
        conn.execute_batch(
            "CREATE TRIGGER reject_poison BEFORE INSERT ON recipe_ingredients
             WHEN NEW.name = 'Poison'
             BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
        )
        .unwrap();

        let mut recipe = get_recipe(&conn, "v1", "pancakes").unwrap().unwrap();
        recipe.ingredients.truncate(1);
        recipe.ingredients.push(Ingredient {
            name: "Poison".to_string(),
            quantity: 1.0,
            unit: "g".to_string(),
            notes: None,
        });
        assert!(upsert_recipe(&conn, "v1", &recipe).is_err());

        let stored = get_recipe(&conn, "v1", "pancakes").unwrap().unwrap();
        assert_eq!(stored.ingredients.len(), 5);
    }

    #[tokio::test]
    async fn test_store_partitions_catalog() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.with_conn(|conn| load_sample_data(conn, "v1")).unwrap();

        let catalog = store.recipes("v1").await.unwrap();
        assert_eq!(catalog.retail[0].id, "pancakes");
        assert_eq!(catalog.produce[0].id, "garden-salad");

        let stock = store.raw_materials("v1").await.unwrap();
        assert_eq!(stock.len(), 8);
    }
}
