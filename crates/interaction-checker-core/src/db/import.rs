//! Bulk catalog import from JSON.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::interactions::upsert_interaction;
use super::substances::upsert_substance;
use super::{Database, DbResult};
use crate::models::{Interaction, Substance};

/// Catalog document accepted by [`Database::import_catalog`].
///
/// ```json
/// {
///   "substances": [{"substance_id": "S_WARF", "display_name": "Warfarin",
///                   "canonical_name": "warfarin", "type": "drug", "aliases": ["Coumadin"]}],
///   "interactions": [{"interaction_id": "I_1",
///                     "substance_a": {"id": "S_VITK"}, "substance_b": {"id": "S_WARF"},
///                     "severity_norm": "major", "summary_short": "..."}],
///   "brand_aliases": {"Jantoven": "S_WARF"}
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub substances: Vec<Substance>,
    #[serde(default)]
    pub interactions: Vec<Interaction>,
    /// Brand name → substance id
    #[serde(default)]
    pub brand_aliases: HashMap<String, String>,
}

/// Row counts written by an import.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportSummary {
    pub substances: usize,
    pub interactions: usize,
    pub brand_aliases: usize,
}

impl Database {
    /// Import a catalog document in one transaction. Any bad row rolls
    /// the whole import back.
    pub fn import_catalog(&mut self, doc: &CatalogDocument) -> DbResult<ImportSummary> {
        let tx = self.transaction()?;

        for substance in &doc.substances {
            upsert_substance(&tx, substance)?;
        }
        for interaction in &doc.interactions {
            upsert_interaction(&tx, interaction)?;
        }
        let mut brand_aliases = 0;
        for (brand, substance_id) in &doc.brand_aliases {
            let brand = crate::resolver::normalize_token(brand);
            if brand.is_empty() {
                continue;
            }
            brand_aliases += tx.execute(
                r#"
                INSERT INTO alias_packs (brand_name, substance_id, is_active)
                VALUES (?1, ?2, 1)
                ON CONFLICT(brand_name, substance_id) DO UPDATE SET is_active = 1
                "#,
                rusqlite::params![brand.as_str(), substance_id],
            )?;
        }

        tx.commit()?;

        Ok(ImportSummary {
            substances: doc.substances.len(),
            interactions: doc.interactions.len(),
            brand_aliases,
        })
    }

    /// Parse and import a JSON catalog document.
    pub fn import_catalog_json(&mut self, json: &str) -> DbResult<ImportSummary> {
        let doc: CatalogDocument = serde_json::from_str(json)?;
        self.import_catalog(&doc)
    }
}
