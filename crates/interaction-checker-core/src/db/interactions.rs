//! Interaction database operations.

use rusqlite::{params, Connection, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::Interaction;
use crate::resolver::LookupToken;

impl Database {
    /// Insert or update an interaction. Both sides must exist.
    pub fn upsert_interaction(&self, interaction: &Interaction) -> DbResult<()> {
        upsert_interaction(&self.conn, interaction)
    }

    /// Get an interaction by id.
    pub fn get_interaction(&self, interaction_id: &str) -> DbResult<Option<Interaction>> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM checker_interactions WHERE interaction_id = ?",
                [interaction_id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(payload.map(|p| serde_json::from_str(&p)).transpose()?)
    }

    /// Interactions between any substance answering to `token_a` and any
    /// answering to `token_b`, in either stored order.
    pub fn interactions_by_tokens(
        &self,
        token_a: &LookupToken,
        token_b: &LookupToken,
    ) -> DbResult<Vec<Interaction>> {
        let mut stmt = self.conn.prepare(
            r#"
            WITH a AS (
                SELECT t.substance_id FROM checker_substance_tokens t
                JOIN checker_substances s ON s.substance_id = t.substance_id
                WHERE t.token = ?1 AND s.is_active = 1
            ),
            b AS (
                SELECT t.substance_id FROM checker_substance_tokens t
                JOIN checker_substances s ON s.substance_id = t.substance_id
                WHERE t.token = ?2 AND s.is_active = 1
            )
            SELECT i.payload
            FROM checker_interactions i
            WHERE (i.substance_a_id IN (SELECT substance_id FROM a)
                   AND i.substance_b_id IN (SELECT substance_id FROM b))
               OR (i.substance_a_id IN (SELECT substance_id FROM b)
                   AND i.substance_b_id IN (SELECT substance_id FROM a))
            ORDER BY i.interaction_id
            "#,
        )?;

        let rows = stmt.query_map(params![token_a.as_str(), token_b.as_str()], |row| {
            row.get::<_, String>(0)
        })?;

        let mut interactions = Vec::new();
        for payload in rows {
            interactions.push(serde_json::from_str(&payload?)?);
        }
        Ok(interactions)
    }

    /// Total stored interactions.
    pub fn count_interactions(&self) -> DbResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM checker_interactions", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

pub(super) fn upsert_interaction(conn: &Connection, interaction: &Interaction) -> DbResult<()> {
    let a = &interaction.substance_a.id;
    let b = &interaction.substance_b.id;
    if a.is_empty() || b.is_empty() {
        return Err(DbError::Constraint(format!(
            "interaction {} is missing a substance id",
            interaction.interaction_id
        )));
    }
    if a == b {
        return Err(DbError::Constraint(format!(
            "interaction {} pairs {a} with itself",
            interaction.interaction_id
        )));
    }

    let payload = serde_json::to_string(interaction)?;
    conn.execute(
        r#"
        INSERT INTO checker_interactions (
            interaction_id, substance_a_id, substance_b_id, severity, payload
        ) VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT(interaction_id) DO UPDATE SET
            substance_a_id = excluded.substance_a_id,
            substance_b_id = excluded.substance_b_id,
            severity = excluded.severity,
            payload = excluded.payload
        "#,
        params![
            interaction.interaction_id,
            a,
            b,
            interaction.severity.to_string(),
            payload,
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Severity, Substance, SubstanceType};
    use crate::resolver::normalize_token;

    fn setup_db() -> Database {
        let db = Database::open_in_memory().unwrap();

        let mut warfarin = Substance::new("S_WARF", "Warfarin", "warfarin", SubstanceType::Drug);
        warfarin.aliases = vec!["Coumadin".into()];
        let vit_k = Substance::new("S_VITK", "Vitamin K", "vitamin k", SubstanceType::Supplement);
        let fish_oil = Substance::new("S_FISH", "Fish Oil", "omega-3 fatty acids", SubstanceType::Supplement);
        db.upsert_substance(&warfarin).unwrap();
        db.upsert_substance(&vit_k).unwrap();
        db.upsert_substance(&fish_oil).unwrap();

        let mut major = Interaction::new("I_1", vit_k.to_ref(), warfarin.to_ref(), Severity::Major)
            .with_confidence("high");
        major.summary = "Vitamin K reduces the anticoagulant effect of warfarin.".into();
        db.upsert_interaction(&major).unwrap();

        let moderate = Interaction::new("I_2", warfarin.to_ref(), fish_oil.to_ref(), Severity::Moderate);
        db.upsert_interaction(&moderate).unwrap();
        db
    }

    #[test]
    fn test_lookup_is_symmetric() {
        let db = setup_db();
        let warf = normalize_token("Warfarin");
        let vitk = normalize_token("Vitamin K");

        let forward = db.interactions_by_tokens(&vitk, &warf).unwrap();
        let backward = db.interactions_by_tokens(&warf, &vitk).unwrap();

        assert_eq!(forward.len(), 1);
        assert_eq!(forward, backward);
        assert_eq!(forward[0].severity, Severity::Major);
        assert!(forward[0].summary.starts_with("Vitamin K"));
    }

    #[test]
    fn test_lookup_through_alias_token() {
        let db = setup_db();
        let results = db
            .interactions_by_tokens(&normalize_token("coumadin"), &normalize_token("omega-3 fatty acids"))
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].interaction_id, "I_2");
    }

    #[test]
    fn test_no_interaction() {
        let db = setup_db();
        let results = db
            .interactions_by_tokens(&normalize_token("vitamin k"), &normalize_token("fish oil"))
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_rejects_self_pair() {
        let db = setup_db();
        let warfarin = db.get_substance("S_WARF").unwrap().unwrap();
        let bad = Interaction::new("I_X", warfarin.to_ref(), warfarin.to_ref(), Severity::Minor);
        assert!(matches!(db.upsert_interaction(&bad), Err(DbError::Constraint(_))));
    }

    #[test]
    fn test_get_and_count() {
        let db = setup_db();
        assert_eq!(db.count_interactions().unwrap(), 2);
        assert_eq!(db.get_interaction("I_1").unwrap().unwrap().substance_a.id, "S_VITK");
        assert!(db.get_interaction("I_404").unwrap().is_none());
    }
}
