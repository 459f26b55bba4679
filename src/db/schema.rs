//! SQL schema definitions

pub const SCHEMA: &str = r#"
-- Chat transcript, one row per completed turn
CREATE TABLE IF NOT EXISTS transcripts (
    id TEXT PRIMARY KEY,
    bot_name TEXT NOT NULL,
    user_input TEXT NOT NULL,
    reply TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_transcripts_created_at ON transcripts(created_at);
"#;
