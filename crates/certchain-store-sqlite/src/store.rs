//! [`SqliteStore`]: the SQLite implementation of [`CertificateStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use certchain_core::{
  certificate::{Certificate, NewCertificate},
  identity::{Identity, NewIdentity},
  store::{
    CertificateFilter, CertificateStore, IssuerCount, IssuerTypeCount, MonthlyCount,
    Statistics,
  },
};

use crate::{
  Error, Result,
  encode::{
    CERTIFICATE_COLUMNS, IDENTITY_COLUMNS, RawCertificate, RawIdentity, decode_issuer_type,
    encode_dt, encode_issuer_kind, encode_uuid, now,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A certchain store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  #[cfg(test)]
  pub(crate) fn connection(&self) -> &tokio_rusqlite::Connection { &self.conn }

  async fn find_identity_where(
    &self,
    column: &'static str,
    value: String,
  ) -> Result<Option<Identity>> {
    let raw: Option<RawIdentity> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {IDENTITY_COLUMNS} FROM identities WHERE {column} = ?1"),
            rusqlite::params![value],
            RawIdentity::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawIdentity::into_identity).transpose()
  }
}

// ─── CertificateStore impl ───────────────────────────────────────────────────

impl CertificateStore for SqliteStore {
  type Error = Error;

  // ── Identities ────────────────────────────────────────────────────────────

  async fn register(&self, input: NewIdentity) -> Result<Identity> {
    let identity = Identity {
      user_id:    Uuid::new_v4(),
      email:      input.email,
      name:       input.name,
      surname:    input.surname,
      iin:        input.iin,
      is_admin:   false,
      created_at: now(),
    };

    let id_str        = encode_uuid(identity.user_id);
    let email         = identity.email.clone();
    let password_hash = input.password_hash;
    let name          = identity.name.clone();
    let surname       = identity.surname.clone();
    let iin           = identity.iin.clone();
    let at_str        = encode_dt(identity.created_at);

    // Duplicate check and insert share one transaction so the reported field
    // is accurate.
    let taken: Option<(&'static str, String)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let iin_taken = tx
          .query_row("SELECT 1 FROM identities WHERE iin = ?1", [&iin], |_| Ok(()))
          .optional()?
          .is_some();
        if iin_taken {
          return Ok(Some(("iin", iin)));
        }
        let email_taken = tx
          .query_row("SELECT 1 FROM identities WHERE email = ?1", [&email], |_| Ok(()))
          .optional()?
          .is_some();
        if email_taken {
          return Ok(Some(("email", email)));
        }

        tx.execute(
          "INSERT INTO identities (
             user_id, email, password_hash, name, surname, iin, is_admin, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
          rusqlite::params![id_str, email, password_hash, name, surname, iin, at_str],
        )?;
        tx.commit()?;
        Ok(None)
      })
      .await?;

    match taken {
      Some((field, value)) => Err(Error::Duplicate { field, value }),
      None => Ok(identity),
    }
  }

  fn is_duplicate(&self, error: &Error) -> bool {
    matches!(error, Error::Duplicate { .. })
  }

  async fn find_identity_by_iin(&self, iin: &str) -> Result<Option<Identity>> {
    self.find_identity_where("iin", iin.to_owned()).await
  }

  async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>> {
    self.find_identity_where("email", email.to_owned()).await
  }

  async fn credentials(&self, email: &str) -> Result<Option<(Identity, String)>> {
    let email = email.to_owned();

    let raw: Option<(RawIdentity, String)> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {IDENTITY_COLUMNS}, password_hash FROM identities WHERE email = ?1"
            ),
            rusqlite::params![email],
            |row| Ok((RawIdentity::from_row(row)?, row.get(7)?)),
          )
          .optional()?)
      })
      .await?;

    raw
      .map(|(raw, hash)| Ok((raw.into_identity()?, hash)))
      .transpose()
  }

  async fn list_identities(&self) -> Result<Vec<Identity>> {
    let raws: Vec<RawIdentity> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {IDENTITY_COLUMNS} FROM identities ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt
          .query_map([], RawIdentity::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawIdentity::into_identity).collect()
  }

  async fn set_admin(&self, user_id: Uuid, is_admin: bool) -> Result<Option<Identity>> {
    let id_str = encode_uuid(user_id);

    let raw: Option<RawIdentity> = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE identities SET is_admin = ?2 WHERE user_id = ?1",
          rusqlite::params![id_str, is_admin],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(Some(conn.query_row(
          &format!("SELECT {IDENTITY_COLUMNS} FROM identities WHERE user_id = ?1"),
          rusqlite::params![id_str],
          RawIdentity::from_row,
        )?))
      })
      .await?;

    raw.map(RawIdentity::into_identity).transpose()
  }

  // ── Certificates ──────────────────────────────────────────────────────────

  async fn create_certificate(&self, input: NewCertificate) -> Result<Certificate> {
    let certificate = Certificate {
      id:                Uuid::new_v4(),
      recipient:         input.recipient,
      issuer:            input.issuer,
      issuer_kind:       input.issuer_kind,
      certificate_theme: input.certificate_theme,
      certificate_body:  input.certificate_body,
      date_of_issue:     now(),
    };

    let (issuer_type, org_name, bin) = encode_issuer_kind(&certificate.issuer_kind);
    let id_str     = encode_uuid(certificate.id);
    let recipient  = certificate.recipient.clone();
    let issuer     = certificate.issuer.clone();
    let theme      = certificate.certificate_theme.clone();
    let body       = certificate.certificate_body.clone();
    let issued_str = encode_dt(certificate.date_of_issue);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO certificates (
             certificate_id,
             recipient_iin, recipient_name, recipient_surname,
             issuer_iin, issuer_name, issuer_surname,
             issuer_type, organisation_name, bin,
             certificate_theme, certificate_body, date_of_issue
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
          rusqlite::params![
            id_str,
            recipient.iin,
            recipient.name,
            recipient.surname,
            issuer.iin,
            issuer.name,
            issuer.surname,
            issuer_type,
            org_name,
            bin,
            theme,
            body,
            issued_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(certificate)
  }

  async fn get_certificate(&self, id: Uuid) -> Result<Option<Certificate>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawCertificate> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {CERTIFICATE_COLUMNS} FROM certificates WHERE certificate_id = ?1"
            ),
            rusqlite::params![id_str],
            RawCertificate::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawCertificate::into_certificate).transpose()
  }

  async fn delete_certificate(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);

    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM certificates WHERE certificate_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;

    Ok(deleted > 0)
  }

  async fn list_certificates(&self, filter: &CertificateFilter) -> Result<Vec<Certificate>> {
    let party_iin = filter.party_iin.clone();

    let raws: Vec<RawCertificate> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CERTIFICATE_COLUMNS} FROM certificates
           WHERE ?1 IS NULL OR recipient_iin = ?1 OR issuer_iin = ?1
           ORDER BY date_of_issue DESC, rowid DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![party_iin], RawCertificate::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCertificate::into_certificate).collect()
  }

  async fn statistics(&self, since: DateTime<Utc>) -> Result<Statistics> {
    let since_str = encode_dt(since);

    let (total_users, total_certificates, by_month, top, by_type) = self
      .conn
      .call(move |conn| {
        let total_users: i64 =
          conn.query_row("SELECT COUNT(*) FROM identities", [], |r| r.get(0))?;
        let total_certificates: i64 =
          conn.query_row("SELECT COUNT(*) FROM certificates", [], |r| r.get(0))?;

        // The first seven characters of a stored timestamp are `YYYY-MM`.
        let mut stmt = conn.prepare(
          "SELECT substr(date_of_issue, 1, 7) AS month, COUNT(*)
           FROM certificates
           WHERE date_of_issue >= ?1
           GROUP BY month
           ORDER BY month",
        )?;
        let by_month = stmt
          .query_map(rusqlite::params![since_str], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
          "SELECT c.issuer_iin, i.name, i.surname, COUNT(*) AS n
           FROM certificates c
           JOIN identities i ON i.iin = c.issuer_iin
           GROUP BY c.issuer_iin, i.name, i.surname
           ORDER BY n DESC, c.issuer_iin
           LIMIT 5",
        )?;
        let top = stmt
          .query_map([], |r| {
            Ok(IssuerCount {
              iin:     r.get(0)?,
              name:    r.get(1)?,
              surname: r.get(2)?,
              count:   r.get::<_, i64>(3)? as u64,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
          "SELECT issuer_type, COUNT(*) FROM certificates
           GROUP BY issuer_type
           ORDER BY issuer_type DESC",
        )?;
        let by_type = stmt
          .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((total_users, total_certificates, by_month, top, by_type))
      })
      .await?;

    let issuer_type_distribution = by_type
      .into_iter()
      .map(|(t, n)| {
        Ok(IssuerTypeCount { issuer_type: decode_issuer_type(&t)?, count: n as u64 })
      })
      .collect::<Result<_>>()?;

    Ok(Statistics {
      total_users: total_users as u64,
      total_certificates: total_certificates as u64,
      certificates_by_month: by_month
        .into_iter()
        .map(|(month, n)| MonthlyCount { month, count: n as u64 })
        .collect(),
      top_issuers: top,
      issuer_type_distribution,
    })
  }
}
