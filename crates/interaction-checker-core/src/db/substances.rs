//! Substance catalog database operations.

use rusqlite::{params, Connection, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::{Substance, SubstanceType};
use crate::resolver::{autocomplete_prefix, normalize_token, LookupToken, Normalizer};

/// Upper bound on autocomplete results, whatever the caller asks for.
pub const MAX_AUTOCOMPLETE_LIMIT: usize = 50;

/// Shortest normalized prefix autocomplete will search for.
pub const MIN_AUTOCOMPLETE_PREFIX: usize = 2;

const SUBSTANCE_COLUMNS: &str = "s.substance_id, s.display_name, s.canonical_name, s.type, s.aliases";

impl Database {
    /// Insert or update a substance and rebuild its token rows.
    pub fn upsert_substance(&self, substance: &Substance) -> DbResult<()> {
        upsert_substance(&self.conn, substance)
    }

    /// Get a substance by id, active or not.
    pub fn get_substance(&self, substance_id: &str) -> DbResult<Option<Substance>> {
        let sql = format!("SELECT {SUBSTANCE_COLUMNS} FROM checker_substances s WHERE s.substance_id = ?");
        let row = self
            .conn
            .query_row(&sql, [substance_id], SubstanceRow::from_row)
            .optional()?;

        row.map(Substance::try_from).transpose()
    }

    /// All active substances, optionally of one kind, ordered by display name.
    pub fn list_substances(&self, kind: Option<SubstanceType>) -> DbResult<Vec<Substance>> {
        let sql = format!(
            r#"
            SELECT {SUBSTANCE_COLUMNS}
            FROM checker_substances s
            WHERE s.is_active = 1
            AND (?1 IS NULL OR s.type = ?1)
            ORDER BY s.display_name COLLATE NOCASE
            "#
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![kind.map(|k| k.as_str())], SubstanceRow::from_row)?;

        let mut substances = Vec::new();
        for row in rows {
            substances.push(row?.try_into()?);
        }
        Ok(substances)
    }

    /// Prefix search over tokens and brand names.
    ///
    /// Queries whose alphanumeric form is shorter than two characters
    /// return nothing.
    pub fn search_substances(
        &self,
        query: &str,
        kind: Option<SubstanceType>,
        limit: usize,
    ) -> DbResult<Vec<Substance>> {
        let prefix = autocomplete_prefix(query);
        if prefix.chars().count() < MIN_AUTOCOMPLETE_PREFIX {
            return Ok(Vec::new());
        }
        let brand_prefix = escape_like(normalize_token(query).as_str());
        let limit = limit.min(MAX_AUTOCOMPLETE_LIMIT);

        let sql = format!(
            r#"
            SELECT {SUBSTANCE_COLUMNS}
            FROM checker_substances s
            WHERE s.is_active = 1
            AND (?1 IS NULL OR s.type = ?1)
            AND s.substance_id IN (
                SELECT substance_id FROM checker_substance_tokens
                WHERE search_key LIKE ?2 || '%'
                UNION
                SELECT substance_id FROM alias_packs
                WHERE is_active = 1 AND brand_name LIKE ?3 || '%' ESCAPE '\'
            )
            ORDER BY
                CASE WHEN lower(s.display_name) LIKE ?3 || '%' ESCAPE '\' THEN 0 ELSE 1 END,
                s.display_name COLLATE NOCASE
            LIMIT ?4
            "#
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![kind.map(|k| k.as_str()), prefix, brand_prefix, limit as i64],
            SubstanceRow::from_row,
        )?;

        let mut substances = Vec::new();
        for row in rows {
            substances.push(row?.try_into()?);
        }
        Ok(substances)
    }

    /// Active substances answering to a lookup token.
    pub fn substances_by_token(&self, token: &LookupToken) -> DbResult<Vec<Substance>> {
        let sql = format!(
            r#"
            SELECT {SUBSTANCE_COLUMNS}
            FROM checker_substances s
            JOIN checker_substance_tokens t ON t.substance_id = s.substance_id
            WHERE t.token = ? AND s.is_active = 1
            ORDER BY s.substance_id
            "#
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([token.as_str()], SubstanceRow::from_row)?;

        let mut substances = Vec::new();
        for row in rows {
            substances.push(row?.try_into()?);
        }
        Ok(substances)
    }

    /// Register a brand name for a substance.
    pub fn add_brand_alias(&self, brand_name: &str, substance_id: &str) -> DbResult<()> {
        let brand = normalize_token(brand_name);
        if brand.is_empty() {
            return Err(DbError::Constraint("brand name is empty".into()));
        }
        self.conn.execute(
            r#"
            INSERT INTO alias_packs (brand_name, substance_id, is_active)
            VALUES (?1, ?2, 1)
            ON CONFLICT(brand_name, substance_id) DO UPDATE SET is_active = 1
            "#,
            params![brand.as_str(), substance_id],
        )?;
        Ok(())
    }

    /// Load the normalizer's brand packs for every brand whose canonical
    /// name matches a stored substance. Returns the number of rows written.
    pub fn seed_alias_packs(&self, normalizer: &Normalizer) -> DbResult<usize> {
        let mut written = 0;
        for (brand, canonical) in normalizer.brands() {
            let token = normalize_token(canonical);
            for substance in self.substances_by_token(&token)? {
                self.add_brand_alias(brand, &substance.substance_id)?;
                written += 1;
            }
        }
        Ok(written)
    }

    /// Soft delete: hide from search, lists and token lookups.
    pub fn deactivate_substance(&self, substance_id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE checker_substances SET is_active = 0, updated_at = datetime('now') WHERE substance_id = ?",
            [substance_id],
        )?;
        Ok(rows_affected > 0)
    }

    /// Active substance count, optionally of one kind.
    pub fn count_substances(&self, kind: Option<SubstanceType>) -> DbResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM checker_substances WHERE is_active = 1 AND (?1 IS NULL OR type = ?1)",
            params![kind.map(|k| k.as_str())],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Distinct lookup tokens.
    pub fn count_tokens(&self) -> DbResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT token) FROM checker_substance_tokens",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

pub(super) fn upsert_substance(conn: &Connection, substance: &Substance) -> DbResult<()> {
    let aliases_json = serde_json::to_string(&substance.aliases)?;

    conn.execute(
        r#"
        INSERT INTO checker_substances (
            substance_id, display_name, canonical_name, type, aliases, is_active, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, 1, datetime('now'))
        ON CONFLICT(substance_id) DO UPDATE SET
            display_name = excluded.display_name,
            canonical_name = excluded.canonical_name,
            type = excluded.type,
            aliases = excluded.aliases,
            is_active = 1,
            updated_at = datetime('now')
        "#,
        params![
            substance.substance_id,
            substance.display_name,
            substance.canonical_name,
            substance.kind.as_str(),
            aliases_json,
        ],
    )?;

    conn.execute(
        "DELETE FROM checker_substance_tokens WHERE substance_id = ?",
        [&substance.substance_id],
    )?;

    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO checker_substance_tokens (token, search_key, substance_id) VALUES (?1, ?2, ?3)",
    )?;
    for name in substance.names() {
        let token = normalize_token(name);
        if token.is_empty() {
            continue;
        }
        stmt.execute(params![token.as_str(), autocomplete_prefix(name), substance.substance_id])?;
    }
    Ok(())
}

/// Escape LIKE wildcards so user text matches literally.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Intermediate row struct for database mapping.
struct SubstanceRow {
    substance_id: String,
    display_name: String,
    canonical_name: String,
    kind: String,
    aliases: String,
}

impl SubstanceRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            substance_id: row.get(0)?,
            display_name: row.get(1)?,
            canonical_name: row.get(2)?,
            kind: row.get(3)?,
            aliases: row.get(4)?,
        })
    }
}

impl TryFrom<SubstanceRow> for Substance {
    type Error = DbError;

    fn try_from(row: SubstanceRow) -> Result<Self, Self::Error> {
        Ok(Substance {
            kind: row.kind.parse().map_err(DbError::Constraint)?,
            substance_id: row.substance_id,
            display_name: row.display_name,
            canonical_name: row.canonical_name,
            aliases: serde_json::from_str(&row.aliases)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        let db = Database::open_in_memory().unwrap();

        let mut warfarin = Substance::new("S_WARF", "Warfarin", "warfarin", SubstanceType::Drug);
        warfarin.aliases = vec!["Coumadin".into()];
        db.upsert_substance(&warfarin).unwrap();
        db.upsert_substance(&Substance::new("S_VITK", "Vitamin K", "vitamin k", SubstanceType::Supplement))
            .unwrap();
        db.upsert_substance(&Substance::new("S_ACET", "Acetaminophen", "acetaminophen", SubstanceType::Drug))
            .unwrap();
        db
    }

    #[test]
    fn test_upsert_and_get() {
        let db = setup_db();

        let retrieved = db.get_substance("S_WARF").unwrap().unwrap();
        assert_eq!(retrieved.display_name, "Warfarin");
        assert_eq!(retrieved.kind, SubstanceType::Drug);
        assert_eq!(retrieved.aliases, vec!["Coumadin"]);

        assert!(db.get_substance("S_NOPE").unwrap().is_none());
    }

    #[test]
    fn test_upsert_replaces_tokens() {
        let db = setup_db();

        let mut warfarin = db.get_substance("S_WARF").unwrap().unwrap();
        warfarin.aliases = vec!["Jantoven".into()];
        db.upsert_substance(&warfarin).unwrap();

        assert!(db.substances_by_token(&normalize_token("coumadin")).unwrap().is_empty());
        assert_eq!(db.substances_by_token(&normalize_token("Jantoven")).unwrap().len(), 1);
    }

    #[test]
    fn test_search_by_prefix_and_alias() {
        let db = setup_db();

        let results = db.search_substances("warf", None, 12).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].substance_id, "S_WARF");

        // Alias token
        let results = db.search_substances("couma", None, 12).unwrap();
        assert_eq!(results[0].substance_id, "S_WARF");

        // Punctuation is ignored in the prefix
        let results = db.search_substances("Vita-min", None, 12).unwrap();
        assert_eq!(results[0].substance_id, "S_VITK");
    }

    #[test]
    fn test_search_filters_kind_and_short_queries() {
        let db = setup_db();

        assert!(db.search_substances("warf", Some(SubstanceType::Supplement), 12).unwrap().is_empty());
        assert!(db.search_substances("w", None, 12).unwrap().is_empty());
        assert!(db.search_substances("%%", None, 12).unwrap().is_empty());
    }

    #[test]
    fn test_brand_packs() {
        let db = setup_db();
        let written = db.seed_alias_packs(&Normalizer::new()).unwrap();
        assert!(written >= 3); // tylenol, panadol, paracetamol, coumadin, jantoven

        let results = db.search_substances("Tyle", None, 12).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].substance_id, "S_ACET");
    }

    #[test]
    fn test_deactivate_hides_substance() {
        let db = setup_db();
        assert!(db.deactivate_substance("S_VITK").unwrap());

        assert!(db.search_substances("vitamin", None, 12).unwrap().is_empty());
        assert_eq!(db.count_substances(Some(SubstanceType::Supplement)).unwrap(), 0);
        assert!(db.get_substance("S_VITK").unwrap().is_some());
    }

    #[test]
    fn test_counts() {
        let db = setup_db();
        assert_eq!(db.count_substances(None).unwrap(), 3);
        assert_eq!(db.count_substances(Some(SubstanceType::Drug)).unwrap(), 2);
        // warfarin, coumadin, vitamin k, acetaminophen
        assert_eq!(db.count_tokens().unwrap(), 4);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("a_b%c"), "a\\_b\\%c");
    }
}
