//! SQL schema for the certchain SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS identities (
    user_id       TEXT PRIMARY KEY,
    email         TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,   -- argon2 PHC string
    name          TEXT NOT NULL,
    surname       TEXT NOT NULL,
    iin           TEXT NOT NULL UNIQUE CHECK (length(iin) = 12),
    is_admin      INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL    -- RFC 3339 UTC, microseconds
);

-- Rows are only ever inserted, or deleted by issuance compensation.
-- Name columns are the identity snapshot taken at issuance and are the
-- hash inputs on verification.
CREATE TABLE IF NOT EXISTS certificates (
    certificate_id    TEXT PRIMARY KEY,
    recipient_iin     TEXT NOT NULL REFERENCES identities(iin),
    recipient_name    TEXT NOT NULL,
    recipient_surname TEXT NOT NULL,
    issuer_iin        TEXT NOT NULL REFERENCES identities(iin),
    issuer_name       TEXT NOT NULL,
    issuer_surname    TEXT NOT NULL,
    issuer_type       TEXT NOT NULL,   -- 'PERSON' | 'ORGANIZATION'
    organisation_name TEXT,
    bin               TEXT,
    certificate_theme TEXT NOT NULL,
    certificate_body  TEXT NOT NULL,
    date_of_issue     TEXT NOT NULL,   -- RFC 3339 UTC, microseconds
    CHECK (
      (issuer_type = 'PERSON'
        AND organisation_name IS NULL AND bin IS NULL)
      OR (issuer_type = 'ORGANIZATION'
        AND organisation_name IS NOT NULL AND bin IS NOT NULL)
    )
);

CREATE INDEX IF NOT EXISTS certificates_recipient_idx ON certificates(recipient_iin);
CREATE INDEX IF NOT EXISTS certificates_issuer_idx    ON certificates(issuer_iin);
CREATE INDEX IF NOT EXISTS certificates_issued_idx    ON certificates(date_of_issue);

PRAGMA user_version = 1;
";
