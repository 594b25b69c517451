use crate::models::{
    AdminRow, ClientRow, ClientWizardRow, ConsumeOutcome, LeadRow, ResetTokenRow,
    WizardResponseRow,
};
use crate::{Database, format_timestamp, parse_timestamp};
use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use rusqlite::Connection;

/// How long used tokens are kept around before the cleanup pass drops them.
const USED_TOKEN_RETENTION_DAYS: i64 = 7;

impl Database {
    // -- Clients --

    pub fn create_client(
        &self,
        id: &str,
        name: &str,
        email: &str,
        password_hash: &str,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO clients (id, name, email, password, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, name, email, password_hash, format_timestamp(created_at)],
            )?;
            Ok(())
        })
    }

    pub fn get_client_by_email(&self, email: &str) -> Result<Option<ClientRow>> {
        self.with_conn(|conn| query_client(conn, "email", email))
    }

    pub fn get_client_by_id(&self, id: &str) -> Result<Option<ClientRow>> {
        self.with_conn(|conn| query_client(conn, "id", id))
    }

    pub fn list_clients(&self) -> Result<Vec<ClientRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, email, password, is_validated, created_at
                 FROM clients ORDER BY created_at DESC, id",
            )?;
            let rows = stmt
                .query_map([], client_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Flip the admin-approval flag. Returns false if no such client.
    pub fn set_client_validated(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed =
                conn.execute("UPDATE clients SET is_validated = 1 WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    /// (total, validated) client counts for the dashboard.
    pub fn client_counts(&self) -> Result<(usize, usize)> {
        self.with_conn(|conn| {
            let (total, validated): (i64, i64) = conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(is_validated), 0) FROM clients",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            Ok((total as usize, validated as usize))
        })
    }

    // -- Admins --

    pub fn create_admin(
        &self,
        id: &str,
        name: &str,
        email: &str,
        password_hash: &str,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO admins (id, name, email, password, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, name, email, password_hash, format_timestamp(created_at)],
            )?;
            Ok(())
        })
    }

    pub fn get_admin_by_email(&self, email: &str) -> Result<Option<AdminRow>> {
        self.with_conn(|conn| query_admin(conn, "email", email))
    }

    pub fn get_admin_by_id(&self, id: &str) -> Result<Option<AdminRow>> {
        self.with_conn(|conn| query_admin(conn, "id", id))
    }

    pub fn count_admins(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM admins", [], |r| r.get(0))?;
            Ok(count as usize)
        })
    }

    // -- Password reset tokens --

    pub fn create_reset_token(
        &self,
        token: &str,
        user_id: &str,
        user_type: &str,
        email: &str,
        expires_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO password_reset_tokens (token, user_id, user_type, email, expires_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    token,
                    user_id,
                    user_type,
                    email,
                    format_timestamp(expires_at),
                    format_timestamp(created_at)
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_reset_token(&self, token: &str) -> Result<Option<ResetTokenRow>> {
        self.with_conn(|conn| query_reset_token(conn, token))
    }

    /// Consume a reset token: verify it is unused and unexpired, write the new
    /// credential into the matching partition, and mark the token used — all
    /// in one transaction, so a crash cannot leave the password changed with
    /// the token still live.
    pub fn consume_reset_token(
        &self,
        token: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<ConsumeOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let row = match query_reset_token(&tx, token)? {
                Some(row) => row,
                None => return Ok(ConsumeOutcome::NotFound),
            };
            if row.used {
                return Ok(ConsumeOutcome::AlreadyUsed);
            }
            if now > parse_timestamp(&row.expires_at) {
                return Ok(ConsumeOutcome::Expired);
            }

            let table = match row.user_type.as_str() {
                "client" => "clients",
                "admin" => "admins",
                other => return Err(anyhow!("Corrupt user_type '{}' on reset token", other)),
            };
            let changed = tx.execute(
                &format!("UPDATE {} SET password = ?1 WHERE id = ?2", table),
                rusqlite::params![new_password_hash, row.user_id],
            )?;
            if changed == 0 {
                // Account deleted since the token was issued; the dropped
                // transaction leaves the token untouched for cleanup.
                return Ok(ConsumeOutcome::NotFound);
            }

            tx.execute(
                "UPDATE password_reset_tokens SET used = 1, used_at = ?1 WHERE token = ?2",
                rusqlite::params![format_timestamp(now), token],
            )?;
            tx.commit()?;

            Ok(ConsumeOutcome::Consumed {
                user_id: row.user_id,
                user_type: row.user_type,
            })
        })
    }

    /// Drop tokens that are expired, or were consumed more than the retention
    /// window ago. Idempotent; returns the number of rows deleted.
    pub fn delete_stale_tokens(&self, now: DateTime<Utc>) -> Result<usize> {
        let used_cutoff = now - chrono::Duration::days(USED_TOKEN_RETENTION_DAYS);
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM password_reset_tokens
                 WHERE expires_at < ?1
                    OR (used = 1 AND used_at IS NOT NULL AND used_at < ?2)",
                rusqlite::params![format_timestamp(now), format_timestamp(used_cutoff)],
            )?;
            Ok(deleted)
        })
    }

    // -- Wizard responses --

    /// Upsert one step. The composite primary key guarantees at most one row
    /// per (client, step); repeated saves overwrite payload, draft flag, and
    /// timestamp. Returns the stored row.
    pub fn upsert_wizard_response(
        &self,
        client_id: &str,
        step: u8,
        data: &str,
        is_draft: bool,
        now: DateTime<Utc>,
    ) -> Result<WizardResponseRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO wizard_responses (client_id, step, data, is_draft, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(client_id, step) DO UPDATE SET
                    data = excluded.data,
                    is_draft = excluded.is_draft,
                    updated_at = excluded.updated_at",
                rusqlite::params![client_id, step, data, is_draft, format_timestamp(now)],
            )?;
            query_wizard_step(conn, client_id, step)?
                .ok_or_else(|| anyhow!("Wizard row missing after upsert"))
        })
    }

    /// Flip every draft row for the client to final and return the post-flip
    /// response list, step-ascending. Flip and read share one transaction so
    /// the returned rows always reflect the submitted state.
    pub fn submit_wizard(
        &self,
        client_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(usize, Vec<WizardResponseRow>)> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let flipped = tx.execute(
                "UPDATE wizard_responses SET is_draft = 0, updated_at = ?2
                 WHERE client_id = ?1 AND is_draft = 1",
                rusqlite::params![client_id, format_timestamp(now)],
            )?;
            let rows = query_wizard_steps(&tx, client_id)?;
            tx.commit()?;
            Ok((flipped, rows))
        })
    }

    pub fn wizard_responses(&self, client_id: &str) -> Result<Vec<WizardResponseRow>> {
        self.with_conn(|conn| query_wizard_steps(conn, client_id))
    }

    /// Every wizard row joined with its owning client, ordered so rows for
    /// one client are contiguous and step-ascending. Clients with no wizard
    /// activity do not appear.
    pub fn all_client_wizard_rows(&self) -> Result<Vec<ClientWizardRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.name, c.email, c.is_validated, c.created_at,
                        w.step, w.data, w.is_draft, w.updated_at
                 FROM wizard_responses w
                 JOIN clients c ON w.client_id = c.id
                 ORDER BY c.created_at, c.id, w.step",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(ClientWizardRow {
                        client_id: row.get(0)?,
                        client_name: row.get(1)?,
                        client_email: row.get(2)?,
                        is_validated: row.get(3)?,
                        client_created_at: row.get(4)?,
                        step: row.get(5)?,
                        data: row.get(6)?,
                        is_draft: row.get(7)?,
                        updated_at: row.get(8)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Leads --

    pub fn insert_lead(&self, lead: &LeadRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO leads (id, name, email, phone, service, message, source, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    lead.id,
                    lead.name,
                    lead.email,
                    lead.phone,
                    lead.service,
                    lead.message,
                    lead.source,
                    lead.status,
                    lead.created_at,
                    lead.updated_at
                ],
            )?;
            Ok(())
        })
    }

    pub fn list_leads(&self) -> Result<Vec<LeadRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, email, phone, service, message, source, status, created_at, updated_at
                 FROM leads ORDER BY created_at DESC, id",
            )?;
            let rows = stmt
                .query_map([], lead_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Advance a lead's status. Returns the updated row, or None if the lead
    /// does not exist.
    pub fn update_lead_status(
        &self,
        id: &str,
        status: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<LeadRow>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE leads SET status = ?2, updated_at = ?3 WHERE id = ?1",
                rusqlite::params![id, status, format_timestamp(now)],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            let mut stmt = conn.prepare(
                "SELECT id, name, email, phone, service, message, source, status, created_at, updated_at
                 FROM leads WHERE id = ?1",
            )?;
            stmt.query_row([id], lead_from_row).optional()
        })
    }

    /// (total, new) lead counts for the dashboard.
    pub fn lead_counts(&self) -> Result<(usize, usize)> {
        self.with_conn(|conn| {
            let (total, fresh): (i64, i64) = conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(status = 'new'), 0) FROM leads",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            Ok((total as usize, fresh as usize))
        })
    }
}

fn query_client(conn: &Connection, column: &str, value: &str) -> Result<Option<ClientRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, name, email, password, is_validated, created_at FROM clients WHERE {} = ?1",
        column
    ))?;
    stmt.query_row([value], client_from_row).optional()
}

fn client_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ClientRow> {
    Ok(ClientRow {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        is_validated: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn query_admin(conn: &Connection, column: &str, value: &str) -> Result<Option<AdminRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, name, email, password, created_at FROM admins WHERE {} = ?1",
        column
    ))?;
    stmt.query_row([value], |row| {
        Ok(AdminRow {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            password: row.get(3)?,
            created_at: row.get(4)?,
        })
    })
    .optional()
}

fn query_reset_token(conn: &Connection, token: &str) -> Result<Option<ResetTokenRow>> {
    let mut stmt = conn.prepare(
        "SELECT token, user_id, user_type, email, expires_at, used, used_at, created_at
         FROM password_reset_tokens WHERE token = ?1",
    )?;
    stmt.query_row([token], |row| {
        Ok(ResetTokenRow {
            token: row.get(0)?,
            user_id: row.get(1)?,
            user_type: row.get(2)?,
            email: row.get(3)?,
            expires_at: row.get(4)?,
            used: row.get(5)?,
            used_at: row.get(6)?,
            created_at: row.get(7)?,
        })
    })
    .optional()
}

fn query_wizard_step(
    conn: &Connection,
    client_id: &str,
    step: u8,
) -> Result<Option<WizardResponseRow>> {
    let mut stmt = conn.prepare(
        "SELECT client_id, step, data, is_draft, updated_at
         FROM wizard_responses WHERE client_id = ?1 AND step = ?2",
    )?;
    stmt.query_row(rusqlite::params![client_id, step], wizard_from_row)
        .optional()
}

fn query_wizard_steps(conn: &Connection, client_id: &str) -> Result<Vec<WizardResponseRow>> {
    let mut stmt = conn.prepare(
        "SELECT client_id, step, data, is_draft, updated_at
         FROM wizard_responses WHERE client_id = ?1 ORDER BY step",
    )?;
    let rows = stmt
        .query_map([client_id], wizard_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn wizard_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<WizardResponseRow> {
    Ok(WizardResponseRow {
        client_id: row.get(0)?,
        step: row.get(1)?,
        data: row.get(2)?,
        is_draft: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn lead_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LeadRow> {
    Ok(LeadRow {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        service: row.get(4)?,
        message: row.get(5)?,
        source: row.get(6)?,
        status: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
