//! Known agronomic compounds
//!
//! Percent-by-weight compositions of common soluble fertilizers, matched by
//! English or Spanish name, common abbreviation, or chemical formula.
//! Compositions are commercial-grade where a grade is standard (calcium
//! nitrate 15.5-0-0 + 19 Ca), stoichiometric otherwise.

use crate::nutrients::{Nutrient, NutrientComposition};
use Nutrient::{Ca, Cu, Fe, Mg, Mn, Mo, Zn, B, K, N, P, S};

/// One dictionary entry
#[derive(Debug, Clone)]
pub struct KnownCompound {
    pub key: &'static str,
    pub formula: &'static str,
    /// Normalized (lowercase, unaccented) names and formulas
    pub patterns: &'static [&'static str],
    pub percentages: &'static [(Nutrient, f64)],
}

impl KnownCompound {
    pub fn composition(&self) -> NutrientComposition {
        NutrientComposition::from_pairs(self.percentages.iter().copied())
    }
}

// ============================================================================
// Compound table (first match wins)
// ============================================================================

pub static KNOWN_COMPOUNDS: &[KnownCompound] = &[
    // Nitrates
    KnownCompound {
        key: "calcium_nitrate",
        formula: "Ca(NO3)2",
        patterns: &["calcium nitrate", "nitrato de calcio", "nitrato calcio", "ca(no3)2"],
        percentages: &[(N, 15.5), (Ca, 19.0)],
    },
    KnownCompound {
        key: "potassium_nitrate",
        formula: "KNO3",
        patterns: &["potassium nitrate", "nitrato de potasio", "nitrato potasio", "kno3"],
        percentages: &[(N, 13.85), (K, 38.67)],
    },
    KnownCompound {
        key: "ammonium_nitrate",
        formula: "NH4NO3",
        patterns: &["ammonium nitrate", "nitrato de amonio", "nitrato amonio", "nh4no3"],
        percentages: &[(N, 35.0)],
    },
    KnownCompound {
        key: "magnesium_nitrate",
        formula: "Mg(NO3)2.6H2O",
        patterns: &["magnesium nitrate", "nitrato de magnesio", "nitrato magnesio", "mg(no3)2"],
        percentages: &[(N, 10.93), (Mg, 9.48)],
    },
    // Sulfates
    KnownCompound {
        key: "ammonium_sulfate",
        formula: "(NH4)2SO4",
        patterns: &["ammonium sulfate", "ammonium sulphate", "sulfato de amonio", "sulfato amonio", "(nh4)2so4"],
        percentages: &[(N, 21.21), (S, 24.26)],
    },
    KnownCompound {
        key: "potassium_sulfate",
        formula: "K2SO4",
        patterns: &["potassium sulfate", "potassium sulphate", "sulfato de potasio", "sulfato potasio", "k2so4"],
        percentages: &[(K, 44.87), (S, 18.39)],
    },
    KnownCompound {
        key: "magnesium_sulfate",
        formula: "MgSO4.7H2O",
        patterns: &["magnesium sulfate", "magnesium sulphate", "sulfato de magnesio", "sulfato magnesio", "epsom salt", "sal de epsom", "mgso4"],
        percentages: &[(Mg, 9.87), (S, 13.01)],
    },
    KnownCompound {
        key: "calcium_sulfate",
        formula: "CaSO4.2H2O",
        patterns: &["calcium sulfate", "calcium sulphate", "sulfato de calcio", "sulfato calcio", "gypsum", "yeso", "caso4"],
        percentages: &[(Ca, 23.28), (S, 18.62)],
    },
    KnownCompound {
        key: "iron_sulfate",
        formula: "FeSO4.7H2O",
        patterns: &["iron sulfate", "ferrous sulfate", "sulfato de hierro", "sulfato ferroso", "feso4"],
        percentages: &[(Fe, 20.09), (S, 11.53)],
    },
    KnownCompound {
        key: "manganese_sulfate",
        formula: "MnSO4.H2O",
        patterns: &["manganese sulfate", "sulfato de manganeso", "mnso4"],
        percentages: &[(Mn, 32.5), (S, 18.97)],
    },
    KnownCompound {
        key: "zinc_sulfate",
        formula: "ZnSO4.7H2O",
        patterns: &["zinc sulfate", "sulfato de zinc", "znso4"],
        percentages: &[(Zn, 22.74), (S, 11.15)],
    },
    KnownCompound {
        key: "copper_sulfate",
        formula: "CuSO4.5H2O",
        patterns: &["copper sulfate", "sulfato de cobre", "cuso4"],
        percentages: &[(Cu, 25.45), (S, 12.84)],
    },
    // Phosphates
    KnownCompound {
        key: "monopotassium_phosphate",
        formula: "KH2PO4",
        patterns: &["monopotassium phosphate", "fosfato monopotasico", "kh2po4", "mkp"],
        percentages: &[(P, 22.76), (K, 28.73)],
    },
    KnownCompound {
        key: "dipotassium_phosphate",
        formula: "K2HPO4",
        patterns: &["dipotassium phosphate", "fosfato dipotasico", "k2hpo4", "dkp"],
        percentages: &[(P, 17.79), (K, 44.93)],
    },
    KnownCompound {
        key: "monoammonium_phosphate",
        formula: "NH4H2PO4",
        patterns: &["monoammonium phosphate", "fosfato monoamonico", "nh4h2po4", "map"],
        percentages: &[(N, 12.18), (P, 26.93)],
    },
    KnownCompound {
        key: "diammonium_phosphate",
        formula: "(NH4)2HPO4",
        patterns: &["diammonium phosphate", "fosfato diamonico", "(nh4)2hpo4", "dap"],
        percentages: &[(N, 21.22), (P, 23.47)],
    },
    // Chlorides
    KnownCompound {
        key: "potassium_chloride",
        formula: "KCl",
        patterns: &["potassium chloride", "cloruro de potasio", "cloruro potasio", "muriate of potash", "muriato de potasio", "kcl"],
        percentages: &[(K, 52.44)],
    },
    KnownCompound {
        key: "calcium_chloride",
        formula: "CaCl2.2H2O",
        patterns: &["calcium chloride", "cloruro de calcio", "cloruro calcio", "cacl2"],
        percentages: &[(Ca, 27.26)],
    },
    KnownCompound {
        key: "magnesium_chloride",
        formula: "MgCl2.6H2O",
        patterns: &["magnesium chloride", "cloruro de magnesio", "cloruro magnesio", "mgcl2"],
        percentages: &[(Mg, 11.96)],
    },
    // Acids
    KnownCompound {
        key: "nitric_acid",
        formula: "HNO3",
        patterns: &["nitric acid", "acido nitrico", "hno3"],
        percentages: &[(N, 22.23)],
    },
    KnownCompound {
        key: "phosphoric_acid",
        formula: "H3PO4",
        patterns: &["phosphoric acid", "acido fosforico", "h3po4"],
        percentages: &[(P, 31.61)],
    },
    // Others
    KnownCompound {
        key: "urea",
        formula: "CO(NH2)2",
        patterns: &["urea", "co(nh2)2"],
        percentages: &[(N, 46.0)],
    },
    KnownCompound {
        key: "iron_edta",
        formula: "Fe-EDTA",
        patterns: &["fe edta", "iron chelate", "quelato de hierro", "hierro quelatado"],
        percentages: &[(Fe, 13.0)],
    },
    KnownCompound {
        key: "boric_acid",
        formula: "H3BO3",
        patterns: &["boric acid", "acido borico", "h3bo3"],
        percentages: &[(B, 17.48)],
    },
    KnownCompound {
        key: "sodium_molybdate",
        formula: "Na2MoO4.2H2O",
        patterns: &["sodium molybdate", "molibdato de sodio", "na2moo4"],
        percentages: &[(Mo, 39.65)],
    },
];

/// Lowercase, strip Spanish accents, split on anything that is not a letter or digit
pub fn normalize_tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'ä' => 'a',
            'é' | 'è' | 'ë' => 'e',
            'í' | 'ì' | 'ï' => 'i',
            'ó' | 'ò' | 'ö' => 'o',
            'ú' | 'ù' | 'ü' => 'u',
            'ñ' => 'n',
            c if c.is_ascii_alphanumeric() => c,
            _ => ' ',
        })
        .collect::<String>()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn contains_sequence(haystack: &[String], needle: &[String]) -> bool {
    !needle.is_empty()
        && haystack.len() >= needle.len()
        && haystack.windows(needle.len()).any(|w| w == needle)
}

/// Find the first compound whose pattern appears as a whole-word sequence in `text`
pub fn match_compound(text: &str) -> Option<&'static KnownCompound> {
    let tokens = normalize_tokens(text);
    if tokens.is_empty() {
        return None;
    }

    KNOWN_COMPOUNDS.iter().find(|compound| {
        compound
            .patterns
            .iter()
            .any(|pattern| contains_sequence(&tokens, &normalize_tokens(pattern)))
    })
}
