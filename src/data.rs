//! Collaborator records and catalog loading
//!
//! The engine reads these records; it never writes them back. Field names
//! follow the upstream catalog (camelCase JSON). CSV catalogs are loaded with
//! Polars, one fertilizer per row.

use crate::nutrients::{Nutrient, NutrientMap};
use anyhow::{Context, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Optional per-nutrient percentages, as found in a `composition` sub-object
/// or as discrete `*Percentage` fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NutrientFields {
    pub nitrogen: Option<f64>,
    pub phosphorus: Option<f64>,
    pub potassium: Option<f64>,
    pub calcium: Option<f64>,
    pub magnesium: Option<f64>,
    pub sulfur: Option<f64>,
    pub iron: Option<f64>,
    pub manganese: Option<f64>,
    pub zinc: Option<f64>,
    pub copper: Option<f64>,
    pub boron: Option<f64>,
    pub molybdenum: Option<f64>,
}

impl NutrientFields {
    pub fn pairs(&self) -> [(Nutrient, Option<f64>); 12] {
        [
            (Nutrient::N, self.nitrogen),
            (Nutrient::P, self.phosphorus),
            (Nutrient::K, self.potassium),
            (Nutrient::Ca, self.calcium),
            (Nutrient::Mg, self.magnesium),
            (Nutrient::S, self.sulfur),
            (Nutrient::Fe, self.iron),
            (Nutrient::Mn, self.manganese),
            (Nutrient::Zn, self.zinc),
            (Nutrient::Cu, self.copper),
            (Nutrient::B, self.boron),
            (Nutrient::Mo, self.molybdenum),
        ]
    }

    pub fn set(&mut self, nutrient: Nutrient, value: Option<f64>) {
        let slot = match nutrient {
            Nutrient::N => &mut self.nitrogen,
            Nutrient::P => &mut self.phosphorus,
            Nutrient::K => &mut self.potassium,
            Nutrient::Ca => &mut self.calcium,
            Nutrient::Mg => &mut self.magnesium,
            Nutrient::S => &mut self.sulfur,
            Nutrient::Fe => &mut self.iron,
            Nutrient::Mn => &mut self.manganese,
            Nutrient::Zn => &mut self.zinc,
            Nutrient::Cu => &mut self.copper,
            Nutrient::B => &mut self.boron,
            Nutrient::Mo => &mut self.molybdenum,
        };
        *slot = value;
    }
}

/// Top-level `*Percentage` fields, the catalog's flat record shape
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FlatPercentages {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nitrogen_percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phosphorus_percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub potassium_percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calcium_percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub magnesium_percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sulfur_percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iron_percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manganese_percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zinc_percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copper_percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boron_percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub molybdenum_percentage: Option<f64>,
}

impl FlatPercentages {
    /// `None` when no field is present at all
    pub fn to_fields(&self) -> Option<NutrientFields> {
        let fields = NutrientFields {
            nitrogen: self.nitrogen_percentage,
            phosphorus: self.phosphorus_percentage,
            potassium: self.potassium_percentage,
            calcium: self.calcium_percentage,
            magnesium: self.magnesium_percentage,
            sulfur: self.sulfur_percentage,
            iron: self.iron_percentage,
            manganese: self.manganese_percentage,
            zinc: self.zinc_percentage,
            copper: self.copper_percentage,
            boron: self.boron_percentage,
            molybdenum: self.molybdenum_percentage,
        };
        fields.pairs().iter().any(|(_, v)| v.is_some()).then_some(fields)
    }
}

/// Raw chemical-analysis fields (elemental symbols, with H2PO4 / SO4 forms)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", default)]
pub struct ChemicalAnalysis {
    pub n: Option<f64>,
    pub p: Option<f64>,
    pub k: Option<f64>,
    pub ca: Option<f64>,
    pub mg: Option<f64>,
    pub s: Option<f64>,
    pub fe: Option<f64>,
    pub mn: Option<f64>,
    pub zn: Option<f64>,
    pub cu: Option<f64>,
    pub b: Option<f64>,
    pub mo: Option<f64>,
    pub h2po4: Option<f64>,
    pub so4: Option<f64>,
}

/// Fertilizer as returned by the catalog query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FertilizerRecord {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub composition: Option<NutrientFields>,
    /// Nested percentage object
    pub percentages: Option<NutrientFields>,
    #[serde(flatten)]
    pub flat_percentages: FlatPercentages,
    pub analysis: Option<ChemicalAnalysis>,
    /// Price per kilogram
    pub price_per_unit: Option<f64>,
    /// g/L
    pub max_solubility: Option<f64>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Crop-phase nutrient requirement (mg/L per ion form)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CropPhaseRequirement {
    pub crop_phase_id: Option<i64>,
    pub no3: Option<f64>,
    pub nh4: Option<f64>,
    pub h2po4: Option<f64>,
    pub k: Option<f64>,
    pub ca: Option<f64>,
    pub mg: Option<f64>,
    pub so4: Option<f64>,
    pub fe: Option<f64>,
    pub ph: Option<f64>,
    pub ec: Option<f64>,
}

/// USDA soil texture class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureClass {
    Sand,
    LoamySand,
    SandyLoam,
    Loam,
    SiltLoam,
    Silt,
    SandyClayLoam,
    ClayLoam,
    SiltyClayLoam,
    SandyClay,
    SiltyClay,
    Clay,
}

impl TextureClass {
    /// Parse a free-text class name ("Sandy Loam", "sandy_loam", "sandy-loam")
    pub fn parse(name: &str) -> Option<Self> {
        let key: String = name
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '_' || c == '-' { ' ' } else { c })
            .collect();
        let key = key.split_whitespace().collect::<Vec<_>>().join(" ");

        match key.as_str() {
            "sand" => Some(TextureClass::Sand),
            "loamy sand" => Some(TextureClass::LoamySand),
            "sandy loam" => Some(TextureClass::SandyLoam),
            "loam" => Some(TextureClass::Loam),
            "silt loam" => Some(TextureClass::SiltLoam),
            "silt" => Some(TextureClass::Silt),
            "sandy clay loam" => Some(TextureClass::SandyClayLoam),
            "clay loam" => Some(TextureClass::ClayLoam),
            "silty clay loam" => Some(TextureClass::SiltyClayLoam),
            "sandy clay" => Some(TextureClass::SandyClay),
            "silty clay" => Some(TextureClass::SiltyClay),
            "clay" => Some(TextureClass::Clay),
            _ => None,
        }
    }
}

/// Soil analysis snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoilAnalysis {
    #[serde(default)]
    pub sample_date: Option<String>,
    pub ph: f64,
    pub texture_class: TextureClass,
    /// Nutrient → soil test level (ppm in the rooting layer)
    #[serde(default)]
    pub nutrient_levels: NutrientMap,
    /// Cation exchange capacity, meq/100g
    #[serde(default)]
    pub cation_exchange_capacity: Option<f64>,
    /// Saturated paste EC, dS/m
    #[serde(default)]
    pub electrical_conductivity: Option<f64>,
}

/// Irrigation water baseline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WaterChemistry {
    /// Nutrient → mg/L already present in the water (elemental basis)
    pub concentrations: NutrientMap,
    pub ph: Option<f64>,
    pub ec: Option<f64>,
}

// ============================================================================
// CSV catalog loading
// ============================================================================

/// Percentage columns recognised in a CSV catalog, in nutrient order
pub const PERCENTAGE_COLUMNS: &[(&str, Nutrient)] = &[
    ("nitrogen_percentage", Nutrient::N),
    ("phosphorus_percentage", Nutrient::P),
    ("potassium_percentage", Nutrient::K),
    ("calcium_percentage", Nutrient::Ca),
    ("magnesium_percentage", Nutrient::Mg),
    ("sulfur_percentage", Nutrient::S),
    ("iron_percentage", Nutrient::Fe),
    ("manganese_percentage", Nutrient::Mn),
    ("zinc_percentage", Nutrient::Zn),
    ("copper_percentage", Nutrient::Cu),
    ("boron_percentage", Nutrient::B),
    ("molybdenum_percentage", Nutrient::Mo),
];

/// Load a fertilizer catalog from CSV
pub fn load_fertilizer_catalog(path: &Path) -> Result<Vec<FertilizerRecord>> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .with_context(|| format!("Failed to create CSV reader: {:?}", path))?
        .finish()
        .with_context(|| format!("Failed to load fertilizer catalog: {:?}", path))?;

    records_from_frame(&df)
}

/// Convert a catalog DataFrame into records
///
/// `id` and `name` are required; every other column is optional.
pub fn records_from_frame(df: &DataFrame) -> Result<Vec<FertilizerRecord>> {
    let ids = string_column(df, "id")?
        .with_context(|| "Catalog is missing required column 'id'")?;
    let names = string_column(df, "name")?
        .with_context(|| "Catalog is missing required column 'name'")?;
    let descriptions = string_column(df, "description")?;
    let prices = float_column(df, "price_per_unit")?;
    let solubilities = float_column(df, "max_solubility")?;
    let active = bool_column(df, "is_active")?;

    let mut percentage_columns = Vec::new();
    for &(name, nutrient) in PERCENTAGE_COLUMNS {
        if let Some(values) = float_column(df, name)? {
            percentage_columns.push((nutrient, values));
        }
    }

    let mut records = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        let (Some(id), Some(name)) = (ids[idx].clone(), names[idx].clone()) else {
            tracing::warn!("Skipping catalog row {} without id or name", idx);
            continue;
        };

        let percentages = if percentage_columns.is_empty() {
            None
        } else {
            let mut fields = NutrientFields::default();
            for (nutrient, values) in &percentage_columns {
                fields.set(*nutrient, values[idx]);
            }
            Some(fields)
        };

        records.push(FertilizerRecord {
            id,
            name,
            description: descriptions.as_ref().and_then(|d| d[idx].clone()),
            composition: None,
            percentages,
            flat_percentages: FlatPercentages::default(),
            analysis: None,
            price_per_unit: prices.as_ref().and_then(|p| p[idx]),
            max_solubility: solubilities.as_ref().and_then(|s| s[idx]),
            is_active: active.as_ref().and_then(|a| a[idx]).unwrap_or(true),
        });
    }

    tracing::debug!("Loaded {} fertilizer records from {} catalog rows", records.len(), df.height());
    Ok(records)
}

fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

fn string_column(df: &DataFrame, name: &str) -> Result<Option<Vec<Option<String>>>> {
    if !has_column(df, name) {
        return Ok(None);
    }
    let column = df
        .column(name)?
        .cast(&DataType::String)
        .with_context(|| format!("Column '{}' cannot be read as text", name))?;
    let values = column
        .str()
        .with_context(|| format!("Column '{}' is not string type", name))?
        .into_iter()
        .map(|v| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
        .collect();
    Ok(Some(values))
}

fn float_column(df: &DataFrame, name: &str) -> Result<Option<Vec<Option<f64>>>> {
    if !has_column(df, name) {
        return Ok(None);
    }
    let column = df
        .column(name)?
        .cast(&DataType::Float64)
        .with_context(|| format!("Column '{}' cannot be read as a number", name))?;
    let values = column
        .f64()
        .with_context(|| format!("Column '{}' is not numeric", name))?
        .into_iter()
        .collect();
    Ok(Some(values))
}

fn bool_column(df: &DataFrame, name: &str) -> Result<Option<Vec<Option<bool>>>> {
    if !has_column(df, name) {
        return Ok(None);
    }
    let column = df
        .column(name)?
        .cast(&DataType::Boolean)
        .with_context(|| format!("Column '{}' cannot be read as a boolean", name))?;
    let values = column
        .bool()
        .with_context(|| format!("Column '{}' is not boolean", name))?
        .into_iter()
        .collect();
    Ok(Some(values))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_from_frame() {
        let df = df! {
            "id" => &["f1", "f2"],
            "name" => &["Calcium nitrate", "Potassium nitrate"],
            "nitrogen_percentage" => &[Some(15.5), Some(13.0)],
            "calcium_percentage" => &[Some(19.0), None],
            "price_per_unit" => &[1.2, 1.8],
            "is_active" => &[true, false]
        }
        .unwrap();

        let records = records_from_frame(&df).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "f1");
        let pct = records[0].percentages.as_ref().unwrap();
        assert_eq!(pct.nitrogen, Some(15.5));
        assert_eq!(pct.calcium, Some(19.0));
        assert_eq!(records[1].percentages.as_ref().unwrap().calcium, None);
        assert!(records[0].is_active);
        assert!(!records[1].is_active);
        assert_eq!(records[1].price_per_unit, Some(1.8));
        assert_eq!(records[0].max_solubility, None);
    }

    #[test]
    fn test_records_from_frame_requires_id() {
        let df = df! {
            "name" => &["Urea"]
        }
        .unwrap();

        assert!(records_from_frame(&df).is_err());
    }

    #[test]
    fn test_record_json_defaults() {
        let json = r#"{ "id": "7", "name": "Potassium sulfate", "composition": { "potassium": 44.9, "sulfur": 18.4 } }"#;
        let record: FertilizerRecord = serde_json::from_str(json).unwrap();
        assert!(record.is_active);
        assert_eq!(record.composition.unwrap().potassium, Some(44.9));
        assert_eq!(record.price_per_unit, None);
    }

    #[test]
    fn test_record_flat_percentage_fields() {
        let json = r#"{ "id": "cn", "name": "Producto A", "nitrogenPercentage": 15.5, "calciumPercentage": 19.0, "pricePerUnit": 1.2 }"#;
        let record: FertilizerRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.percentages, None);

        let fields = record.flat_percentages.to_fields().unwrap();
        assert_eq!(fields.nitrogen, Some(15.5));
        assert_eq!(fields.calcium, Some(19.0));
        assert_eq!(fields.potassium, None);
        assert_eq!(record.price_per_unit, Some(1.2));

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["nitrogenPercentage"], 15.5);
        assert!(back.get("potassiumPercentage").is_none());
    }

    #[test]
    fn test_texture_parse() {
        assert_eq!(TextureClass::parse("Sandy Loam"), Some(TextureClass::SandyLoam));
        assert_eq!(TextureClass::parse("silty_clay_loam"), Some(TextureClass::SiltyClayLoam));
        assert_eq!(TextureClass::parse("peat"), None);
    }
}
