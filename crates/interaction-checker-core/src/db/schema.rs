//! SQLite schema definition.

/// Complete database schema for the local interaction store.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Substances
-- ============================================================================

CREATE TABLE IF NOT EXISTS checker_substances (
    substance_id TEXT PRIMARY KEY,
    display_name TEXT NOT NULL,
    canonical_name TEXT NOT NULL,
    type TEXT NOT NULL CHECK (type IN ('drug', 'supplement')),
    aliases TEXT NOT NULL DEFAULT '[]',           -- JSON array of strings
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_substances_type ON checker_substances(type);
CREATE INDEX IF NOT EXISTS idx_substances_display ON checker_substances(display_name);

-- One row per name a substance answers to. `token` is the lookup token
-- (normalize_token); `search_key` is the autocomplete form (alphanumerics only).
CREATE TABLE IF NOT EXISTS checker_substance_tokens (
    token TEXT NOT NULL,
    search_key TEXT NOT NULL,
    substance_id TEXT NOT NULL REFERENCES checker_substances(substance_id) ON DELETE CASCADE,
    PRIMARY KEY (token, substance_id)
);

CREATE INDEX IF NOT EXISTS idx_tokens_search_key ON checker_substance_tokens(search_key);
CREATE INDEX IF NOT EXISTS idx_tokens_substance ON checker_substance_tokens(substance_id);

-- Brand names searched by autocomplete
CREATE TABLE IF NOT EXISTS alias_packs (
    brand_name TEXT NOT NULL,
    substance_id TEXT NOT NULL REFERENCES checker_substances(substance_id) ON DELETE CASCADE,
    is_active INTEGER NOT NULL DEFAULT 1,
    PRIMARY KEY (brand_name, substance_id)
);

-- ============================================================================
-- Interactions
-- ============================================================================

CREATE TABLE IF NOT EXISTS checker_interactions (
    interaction_id TEXT PRIMARY KEY,
    substance_a_id TEXT NOT NULL REFERENCES checker_substances(substance_id),
    substance_b_id TEXT NOT NULL REFERENCES checker_substances(substance_id),
    severity TEXT NOT NULL,
    payload TEXT NOT NULL,                        -- JSON interaction record
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    CHECK (substance_a_id <> substance_b_id)
);

CREATE INDEX IF NOT EXISTS idx_interactions_a ON checker_interactions(substance_a_id);
CREATE INDEX IF NOT EXISTS idx_interactions_b ON checker_interactions(substance_b_id);

-- ============================================================================
-- Requests and Lookup Logs (Append-Mostly)
-- ============================================================================

-- Duplicate requests for the same normalized name bump request_count
CREATE TABLE IF NOT EXISTS interaction_requests (
    request_id TEXT PRIMARY KEY,
    substance_name TEXT NOT NULL,
    normalized_name TEXT NOT NULL UNIQUE,
    kind TEXT NOT NULL DEFAULT 'unknown' CHECK (kind IN ('supplement', 'medication', 'unknown')),
    request_count INTEGER NOT NULL DEFAULT 1,
    status TEXT NOT NULL DEFAULT 'pending',
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS lookup_logs (
    log_id INTEGER PRIMARY KEY AUTOINCREMENT,
    mode TEXT NOT NULL,
    inputs TEXT NOT NULL,                         -- JSON array
    normalized_inputs TEXT NOT NULL,              -- JSON array
    resolved_substance_ids TEXT NOT NULL,         -- JSON array
    unresolved_inputs TEXT NOT NULL,              -- JSON array
    results_summary TEXT NOT NULL,                -- JSON object
    has_results INTEGER NOT NULL,
    logged_at TEXT NOT NULL
);
"#;
