//! Bulk import of recipe JSON files into the snapshot store

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::db;
use crate::models::Recipe;

/// Find every `*.json` file below `dir`
pub fn find_recipe_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    files
}

fn parse_recipe_file(path: &Path) -> Result<Recipe> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let recipe: Recipe = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse recipe {}", path.display()))?;
    if recipe.servings == 0 {
        anyhow::bail!("recipe '{}' in {} has zero servings", recipe.id, path.display());
    }
    Ok(recipe)
}

/// Import all recipe files under `dir` for one vendor
pub fn import_recipes(conn: &Connection, vendor_id: &str, dir: &Path) -> Result<ImportStats> {
    let mut stats = ImportStats::default();

    let files = find_recipe_files(dir);
    info!(dir = %dir.display(), files = files.len(), "importing recipes");

    for path in &files {
        match parse_recipe_file(path) {
            Ok(recipe) => {
                db::upsert_recipe(conn, vendor_id, &recipe)
                    .with_context(|| format!("Failed to store recipe {}", recipe.id))?;
                stats.recipes += 1;
                stats.ingredients += recipe.ingredients.len();
                info!(recipe = %recipe.id, ingredients = recipe.ingredients.len(), "imported");
            }
            Err(e) => {
                warn!(file = %path.display(), error = %format!("{e:#}"), "skipping recipe file");
                stats.errors += 1;
            }
        }
    }

    Ok(stats)
}

#[derive(Debug, Default)]
pub struct ImportStats {
    pub recipes: usize,
    pub ingredients: usize,
    pub errors: usize,
}

impl std::fmt::Display for ImportStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Imported {} recipes ({} ingredients). Errors: {}",
            self.recipes, self.ingredients, self.errors
        )
    }
}
