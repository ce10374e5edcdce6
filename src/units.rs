//! Unit normalization, classification and conversion
//!
//! Every unit string is resolved to a canonical symbol through an alias
//! table, then classified into a category. Mass and volume units carry a
//! factor to a common base (grams, millilitres); count units do not
//! convert into one another.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Conversion-compatibility class of a canonical unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitCategory {
    Mass,
    Volume,
    Count,
    Unknown,
}

impl std::fmt::Display for UnitCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            UnitCategory::Mass => "mass",
            UnitCategory::Volume => "volume",
            UnitCategory::Count => "count",
            UnitCategory::Unknown => "unknown",
        };
        f.pad(name)
    }
}

/// Outcome of converting a quantity between two units
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Conversion {
    Converted(f64),
    /// The units are in different categories, or are distinct count units.
    Incompatible,
}

impl Conversion {
    pub fn value(self) -> Option<f64> {
        match self {
            Conversion::Converted(v) => Some(v),
            Conversion::Incompatible => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct UnitDef {
    category: UnitCategory,
    /// Multiplier to the category's base unit. None for count units.
    factor: Option<f64>,
}

/// `trim(lowercase(unit))`
pub fn normalize(unit: &str) -> String {
    unit.trim().to_lowercase()
}

/// Immutable unit configuration: aliases, categories and base factors.
///
/// Build once (usually via `Default`) and share; use [`UnitTableBuilder`]
/// to register extra units.
#[derive(Debug, Clone)]
pub struct UnitTable {
    aliases: HashMap<String, String>,
    units: HashMap<String, UnitDef>,
}

impl UnitTable {
    pub fn builder() -> UnitTableBuilder {
        UnitTableBuilder::default()
    }

    /// Resolve an alias to its canonical symbol. Unknown strings come back
    /// normalized and are their own canonical form.
    pub fn canonicalize(&self, unit: &str) -> String {
        let normalized = normalize(unit);
        match self.aliases.get(&normalized) {
            Some(canonical) => canonical.clone(),
            None => normalized,
        }
    }

    pub fn category(&self, unit: &str) -> UnitCategory {
        self.units
            .get(&self.canonicalize(unit))
            .map_or(UnitCategory::Unknown, |def| def.category)
    }

    pub fn can_convert(&self, from: &str, to: &str) -> bool {
        let from = self.canonicalize(from);
        let to = self.canonicalize(to);
        let from_cat = self.category(&from);
        let to_cat = self.category(&to);

        if from_cat != to_cat {
            return false;
        }
        match from_cat {
            UnitCategory::Mass | UnitCategory::Volume => true,
            // no implied piece <-> slice style conversions
            UnitCategory::Count | UnitCategory::Unknown => from == to,
        }
    }

    /// Convert `qty` from one unit to another through the category base unit.
    pub fn try_convert(&self, qty: f64, from: &str, to: &str) -> Conversion {
        let from = self.canonicalize(from);
        let to = self.canonicalize(to);

        if from == to {
            return Conversion::Converted(qty);
        }
        if !self.can_convert(&from, &to) {
            return Conversion::Incompatible;
        }

        let from_factor = self.units.get(&from).and_then(|d| d.factor);
        let to_factor = self.units.get(&to).and_then(|d| d.factor);
        match (from_factor, to_factor) {
            (Some(a), Some(b)) => Conversion::Converted(qty * a / b),
            _ => Conversion::Incompatible,
        }
    }

    /// Like [`try_convert`](Self::try_convert), but an incompatible pair
    /// returns `qty` unchanged. Callers must check [`can_convert`](Self::can_convert)
    /// before trusting the number.
    pub fn convert(&self, qty: f64, from: &str, to: &str) -> f64 {
        self.try_convert(qty, from, to).value().unwrap_or(qty)
    }

    /// Canonical symbols of every registered unit, sorted
    pub fn known_units(&self) -> Vec<&str> {
        let mut units: Vec<&str> = self.units.keys().map(String::as_str).collect();
        units.sort_unstable();
        units
    }
}

impl Default for UnitTable {
    fn default() -> Self {
        let mut builder = UnitTable::builder();

        for (symbol, grams, aliases) in [
            ("g", 1.0, &["gram", "grams", "gm", "gms", "gr"][..]),
            ("kg", 1000.0, &["kilogram", "kilograms", "kgs", "kilo", "kilos"][..]),
            ("oz", 28.3495, &["ounce", "ounces"][..]),
            ("lb", 453.59237, &["pound", "pounds", "lbs"][..]),
        ] {
            builder = builder.measured(symbol, UnitCategory::Mass, grams, aliases);
        }

        for (symbol, millilitres, aliases) in [
            (
                "ml",
                1.0,
                &["milliliter", "milliliters", "millilitre", "millilitres", "mls"][..],
            ),
            ("l", 1000.0, &["liter", "liters", "litre", "litres", "ltr"][..]),
            ("cup", 240.0, &["cups"][..]),
            ("tbsp", 15.0, &["tablespoon", "tablespoons", "tbsps", "tbs"][..]),
            ("tsp", 5.0, &["teaspoon", "teaspoons", "tsps"][..]),
        ] {
            builder = builder.measured(symbol, UnitCategory::Volume, millilitres, aliases);
        }

        for (symbol, aliases) in [
            ("piece", &["pieces", "pcs", "pc"][..]),
            ("slice", &["slices"][..]),
            ("clove", &["cloves"][..]),
            ("pinch", &["pinches"][..]),
            ("dash", &["dashes"][..]),
            ("handful", &["handfuls"][..]),
            ("bunch", &["bunches"][..]),
            ("packet", &["packets", "pkt"][..]),
            ("can", &["cans"][..]),
            ("bottle", &["bottles"][..]),
        ] {
            builder = builder.counted(symbol, aliases);
        }

        builder.build()
    }
}

/// Assembles a [`UnitTable`]. Later registrations override earlier ones.
#[derive(Debug, Default)]
pub struct UnitTableBuilder {
    aliases: HashMap<String, String>,
    units: HashMap<String, UnitDef>,
}

impl UnitTableBuilder {
    /// Register a mass or volume unit with its factor to the base unit
    pub fn measured(
        mut self,
        symbol: &str,
        category: UnitCategory,
        factor: f64,
        aliases: &[&str],
    ) -> Self {
        let symbol = normalize(symbol);
        self.units.insert(
            symbol.clone(),
            UnitDef {
                category,
                factor: Some(factor),
            },
        );
        self.add_aliases(&symbol, aliases);
        self
    }

    /// Register a discrete count unit
    pub fn counted(mut self, symbol: &str, aliases: &[&str]) -> Self {
        let symbol = normalize(symbol);
        self.units.insert(
            symbol.clone(),
            UnitDef {
                category: UnitCategory::Count,
                factor: None,
            },
        );
        self.add_aliases(&symbol, aliases);
        self
    }

    pub fn alias(mut self, alias: &str, symbol: &str) -> Self {
        self.aliases.insert(normalize(alias), normalize(symbol));
        self
    }

    fn add_aliases(&mut self, symbol: &str, aliases: &[&str]) {
        for alias in aliases {
            self.aliases.insert(normalize(alias), symbol.to_string());
        }
    }

    pub fn build(self) -> UnitTable {
        UnitTable {
            aliases: self.aliases,
            units: self.units,
        }
    }
}
