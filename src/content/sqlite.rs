/*!
 * SQLite-backed content repository.
 *
 * All translatable tables share the `records` table; a record is addressed
 * by its table name and uid. Field values are stored as a JSON object.
 */

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use rusqlite::types::{Type, Value};
use rusqlite::{OptionalExtension, params, params_from_iter};
use std::collections::{BTreeMap, HashSet};

use super::{ContentRecord, ContentRepository, PAGES_TABLE, SlugScope};
use crate::database::DatabaseConnection;
use crate::database::models::timestamp_to_datetime;

/// Rootline walks stop after this many levels
const MAX_ROOTLINE_DEPTH: usize = 100;

const RECORD_COLUMNS: &str = "tablename, uid, pid, sys_language_uid, l10n_parent, hidden, deleted, \
     tstamp, autotranslate_last, autotranslate_exclude, autotranslate_languages, fields";

fn parse_languages(raw: &str) -> Vec<i64> {
    raw.split(',')
        .filter_map(|id| id.trim().parse().ok())
        .collect()
}

fn format_languages(languages: &[i64]) -> String {
    languages
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn parse_record_row(row: &rusqlite::Row) -> rusqlite::Result<ContentRecord> {
    let raw_fields: String = row.get(11)?;
    let fields: BTreeMap<String, String> = serde_json::from_str(&raw_fields)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(11, Type::Text, Box::new(e)))?;

    Ok(ContentRecord {
        table: row.get(0)?,
        uid: row.get(1)?,
        pid: row.get(2)?,
        language_id: row.get(3)?,
        l10n_parent: row.get(4)?,
        hidden: row.get::<_, i64>(5)? != 0,
        deleted: row.get::<_, i64>(6)? != 0,
        modified_at: timestamp_to_datetime(row.get(7)?),
        last_autotranslated_at: row.get::<_, Option<i64>>(8)?.map(timestamp_to_datetime),
        exclude_autotranslate: row.get::<_, i64>(9)? != 0,
        autotranslate_languages: parse_languages(&row.get::<_, String>(10)?),
        fields,
    })
}

/// Content repository on the shared database
#[derive(Clone)]
pub struct SqliteContentRepository {
    db: DatabaseConnection,
}

impl SqliteContentRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Insert or replace a record (content import and fixtures)
    pub async fn insert_record(&self, record: &ContentRecord) -> Result<()> {
        let record = record.clone();
        let fields = serde_json::to_string(&record.fields)?;

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    &format!(
                        "INSERT OR REPLACE INTO records ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                        RECORD_COLUMNS
                    ),
                    params![
                        record.table,
                        record.uid,
                        record.pid,
                        record.language_id,
                        record.l10n_parent,
                        record.hidden as i64,
                        record.deleted as i64,
                        record.modified_at.timestamp(),
                        record.last_autotranslated_at.map(|t| t.timestamp()),
                        record.exclude_autotranslate as i64,
                        format_languages(&record.autotranslate_languages),
                        fields,
                    ],
                )?;
                Ok(())
            })
            .await
    }

    async fn query_one(&self, condition: &'static str, args: Vec<Value>) -> Result<Option<ContentRecord>> {
        self.db
            .execute_async(move |conn| {
                let record = conn
                    .query_row(
                        &format!("SELECT {} FROM records WHERE {}", RECORD_COLUMNS, condition),
                        params_from_iter(args),
                        parse_record_row,
                    )
                    .optional()?;
                Ok(record)
            })
            .await
    }
}

#[async_trait]
impl ContentRepository for SqliteContentRepository {
    async fn find_page(&self, page_id: i64) -> Result<Option<ContentRecord>> {
        self.query_one(
            "tablename = ?1 AND uid = ?2 AND l10n_parent = 0 AND deleted = 0",
            vec![Value::Text(PAGES_TABLE.to_string()), Value::Integer(page_id)],
        )
        .await
    }

    async fn find_record(&self, table: &str, uid: i64) -> Result<Option<ContentRecord>> {
        self.query_one(
            "tablename = ?1 AND uid = ?2 AND deleted = 0",
            vec![Value::Text(table.to_string()), Value::Integer(uid)],
        )
        .await
    }

    async fn records_on_page(&self, table: &str, page_id: i64) -> Result<Vec<ContentRecord>> {
        let table = table.to_string();

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM records WHERE tablename = ?1 AND pid = ?2 \
                     AND l10n_parent = 0 AND deleted = 0 ORDER BY uid",
                    RECORD_COLUMNS
                ))?;
                let records = stmt
                    .query_map(params![table, page_id], parse_record_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(records)
            })
            .await
    }

    async fn find_translation(&self, table: &str, source_uid: i64, language_id: i64) -> Result<Option<ContentRecord>> {
        self.query_one(
            "tablename = ?1 AND l10n_parent = ?2 AND sys_language_uid = ?3 AND deleted = 0",
            vec![
                Value::Text(table.to_string()),
                Value::Integer(source_uid),
                Value::Integer(language_id),
            ],
        )
        .await
    }

    async fn localize(&self, table_name: &str, source_uid: i64, language_id: i64) -> Result<i64> {
        let table = table_name.to_string();
        let now = Utc::now().timestamp();

        let uid = self
            .db
            .transaction_async(move |tx| {
                let source = tx
                    .query_row(
                        &format!(
                            "SELECT {} FROM records WHERE tablename = ?1 AND uid = ?2 AND deleted = 0",
                            RECORD_COLUMNS
                        ),
                        params![table, source_uid],
                        parse_record_row,
                    )
                    .optional()?
                    .ok_or_else(|| anyhow!("Record {}:{} does not exist", table, source_uid))?;

                if !source.is_original() {
                    return Err(anyhow!("Record {}:{} is itself a translation", table, source_uid));
                }

                let existing: Option<i64> = tx
                    .query_row(
                        "SELECT uid FROM records WHERE tablename = ?1 AND l10n_parent = ?2 \
                         AND sys_language_uid = ?3 AND deleted = 0",
                        params![table, source_uid, language_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                if let Some(uid) = existing {
                    return Err(anyhow!(
                        "Record {}:{} is already localized in language {} as {}",
                        table,
                        source_uid,
                        language_id,
                        uid
                    ));
                }

                let uid: i64 = tx.query_row(
                    "SELECT COALESCE(MAX(uid), 0) + 1 FROM records WHERE tablename = ?1",
                    [&table],
                    |row| row.get(0),
                )?;

                tx.execute(
                    &format!(
                        "INSERT INTO records ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, NULL, 0, '', ?8)",
                        RECORD_COLUMNS
                    ),
                    params![
                        table,
                        uid,
                        source.pid,
                        language_id,
                        source_uid,
                        source.hidden as i64,
                        now,
                        serde_json::to_string(&source.fields)?,
                    ],
                )?;

                Ok(uid)
            })
            .await
            .context("Failed to localize record")?;

        debug!("Localized {}:{} into language {} as {}", table_name, source_uid, language_id, uid);
        Ok(uid)
    }

    async fn update_record(&self, record: &ContentRecord) -> Result<()> {
        let record = record.clone();
        let fields = serde_json::to_string(&record.fields)?;

        self.db
            .execute_async(move |conn| {
                let changed = conn.execute(
                    r#"
                    UPDATE records
                    SET hidden = ?1, deleted = ?2, tstamp = ?3, autotranslate_last = ?4,
                        autotranslate_exclude = ?5, autotranslate_languages = ?6, fields = ?7
                    WHERE tablename = ?8 AND uid = ?9
                    "#,
                    params![
                        record.hidden as i64,
                        record.deleted as i64,
                        record.modified_at.timestamp(),
                        record.last_autotranslated_at.map(|t| t.timestamp()),
                        record.exclude_autotranslate as i64,
                        format_languages(&record.autotranslate_languages),
                        fields,
                        record.table,
                        record.uid,
                    ],
                )?;
                if changed == 0 {
                    return Err(anyhow!("Record {}:{} does not exist", record.table, record.uid));
                }
                Ok(())
            })
            .await
    }

    async fn slug_exists(
        &self,
        record: &ContentRecord,
        field: &str,
        value: &str,
        scope: SlugScope,
    ) -> Result<bool> {
        let mut args = vec![
            Value::Text(record.table.clone()),
            Value::Integer(record.language_id),
            Value::Integer(record.uid),
            Value::Text(format!("$.\"{}\"", field)),
            Value::Text(value.to_string()),
        ];

        let (prefix, condition) = match scope {
            SlugScope::Site { root_page_id } => {
                args.push(Value::Integer(root_page_id));
                (
                    "WITH RECURSIVE tree(uid) AS (\
                         SELECT ?6 \
                         UNION SELECT r.uid FROM records r JOIN tree t ON r.pid = t.uid \
                         WHERE r.tablename = 'pages' AND r.l10n_parent = 0) ",
                    " AND (pid IN (SELECT uid FROM tree) \
                      OR (tablename = 'pages' AND (uid = ?6 OR l10n_parent = ?6)))",
                )
            }
            SlugScope::Parent { pid } => {
                args.push(Value::Integer(pid));
                ("", " AND pid = ?6")
            }
            SlugScope::Table => ("", ""),
        };

        let sql = format!(
            "{}SELECT COUNT(*) FROM records WHERE tablename = ?1 AND deleted = 0 \
             AND sys_language_uid = ?2 AND uid != ?3 AND json_extract(fields, ?4) = ?5{}",
            prefix, condition
        );

        self.db
            .execute_async(move |conn| {
                let count: i64 = conn.query_row(&sql, params_from_iter(args), |row| row.get(0))?;
                Ok(count > 0)
            })
            .await
    }

    async fn rootline(&self, page_id: i64) -> Result<Vec<i64>> {
        self.db
            .execute_async(move |conn| {
                let mut rootline = Vec::new();
                let mut visited = HashSet::new();
                let mut current = page_id;

                while visited.insert(current) && rootline.len() < MAX_ROOTLINE_DEPTH {
                    rootline.push(current);
                    let parent: Option<i64> = conn
                        .query_row(
                            "SELECT pid FROM records WHERE tablename = 'pages' AND uid = ?1 AND deleted = 0",
                            [current],
                            |row| row.get(0),
                        )
                        .optional()?;
                    match parent {
                        Some(pid) if pid > 0 => current = pid,
                        _ => break,
                    }
                }

                Ok(rootline)
            })
            .await
    }
}
