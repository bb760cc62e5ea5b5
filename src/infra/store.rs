// ============================================================
// Layer 6 — SQLite Store
// ============================================================
// Durable storage for every record kind the pipeline produces.
//
// Tables:
//   batches        — one row per uploaded CSV (column order kept)
//   surveys        — one row per uploaded CSV row (JSON values)
//   models         — TrainedModel summary + artifact (JSON)
//   current_model  — a single-row slot naming the current model
//   predictions    — per-row output of a scoring run (training
//                    scores its own rows; later runs add more)
//   insights       — suggestion text tied to a model run
//
// Saving a model, its predictions and moving the current slot
// happen in one transaction: a reader sees either the previous
// model or the new one, never a half-written run. Two processes
// saving at the same time are serialised by SQLite; whichever
// commits last owns the slot.
//
// Reference: rusqlite crate documentation
//            SQLite "UPSERT" (INSERT ... ON CONFLICT DO UPDATE)

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde::Serialize;
use uuid::Uuid;

use crate::data::loader::CsvLoader;
use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::records::{Insight, ModelSummary, Prediction, SurveyRecord, UploadBatch};
use crate::domain::table::Table;
use crate::domain::traits::TableSource;
use crate::ml::model::{ModelArtifact, TrainedModel};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS batches (
    id          TEXT PRIMARY KEY,
    source      TEXT NOT NULL,
    columns     TEXT NOT NULL,
    row_count   INTEGER NOT NULL,
    created_at  TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS surveys (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    batch_id    TEXT NOT NULL REFERENCES batches(id),
    row_index   INTEGER NOT NULL,
    data        TEXT NOT NULL,
    created_at  TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS models (
    id          TEXT PRIMARY KEY,
    summary     TEXT NOT NULL,
    artifact    TEXT NOT NULL,
    accuracy    REAL NOT NULL,
    created_at  TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS current_model (
    slot        INTEGER PRIMARY KEY CHECK (slot = 1),
    model_id    TEXT NOT NULL REFERENCES models(id)
);
CREATE TABLE IF NOT EXISTS predictions (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    model_id        TEXT NOT NULL REFERENCES models(id),
    run_id          TEXT NOT NULL,
    row_index       INTEGER NOT NULL,
    features        TEXT NOT NULL,
    predicted_label TEXT NOT NULL,
    confidence      REAL NOT NULL,
    created_at      TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS insights (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    model_id    TEXT NOT NULL REFERENCES models(id),
    category    TEXT NOT NULL,
    text        TEXT NOT NULL,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_surveys_batch     ON surveys(batch_id, row_index);
CREATE INDEX IF NOT EXISTS idx_predictions_model ON predictions(model_id, run_id);
CREATE INDEX IF NOT EXISTS idx_insights_model    ON insights(model_id);
";

impl From<rusqlite::Error> for PipelineError {
    fn from(e: rusqlite::Error) -> Self {
        PipelineError::persistence(e.to_string())
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> PipelineResult<String> {
    serde_json::to_string(value)
        .map_err(|e| PipelineError::persistence(format!("cannot encode record: {e}")))
}

fn from_json<T: serde::de::DeserializeOwned>(json: &str) -> PipelineResult<T> {
    serde_json::from_str(json)
        .map_err(|e| PipelineError::persistence(format!("corrupt stored record: {e}")))
}

/// SQLite-backed persistence for surveys, models, predictions and insights.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database file and apply the schema
    pub fn open(path: &Path) -> PipelineResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                PipelineError::persistence(format!("cannot create '{}': {e}", parent.display()))
            })?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;

        tracing::info!("Opened database '{}'", path.display());
        Self::init(conn)
    }

    /// Private in-memory database, used by tests
    pub fn open_in_memory() -> PipelineResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> PipelineResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    // ─── Survey rows ──────────────────────────────────────────────────────────

    /// Store an uploaded table as a new batch; returns the batch header
    pub fn save_batch(&mut self, source: &str, table: &Table) -> PipelineResult<UploadBatch> {
        let batch = UploadBatch {
            id:         Uuid::new_v4().to_string(),
            source:     source.to_string(),
            columns:    table.schema.names().map(str::to_string).collect(),
            row_count:  table.row_count(),
            created_at: Utc::now(),
        };

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO batches (id, source, columns, row_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                batch.id,
                batch.source,
                to_json(&batch.columns)?,
                batch.row_count as i64,
                batch.created_at,
            ],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO surveys (batch_id, row_index, data, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for i in 0..table.row_count() {
                stmt.execute(params![
                    batch.id,
                    i as i64,
                    to_json(&table.row_map(i))?,
                    batch.created_at,
                ])?;
            }
        }
        tx.commit()?;

        tracing::info!("Stored batch {} ({} rows from '{}')", batch.id, batch.row_count, source);
        Ok(batch)
    }

    /// Most recently uploaded batch, if any
    pub fn latest_batch(&self) -> PipelineResult<Option<UploadBatch>> {
        Ok(self.batches(Some(1))?.into_iter().next())
    }

    /// Upload batches, newest first
    pub fn batches(&self, limit: Option<usize>) -> PipelineResult<Vec<UploadBatch>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, source, columns, row_count, created_at
             FROM batches ORDER BY rowid DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![sql_limit(limit)], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, DateTime<Utc>>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, source, columns, row_count, created_at)| {
                Ok(UploadBatch {
                    id,
                    source,
                    columns: from_json(&columns)?,
                    row_count: row_count as usize,
                    created_at,
                })
            })
            .collect()
    }

    /// Raw grid of a batch in upload order, ready for `CsvLoader::build_table`
    pub fn batch_rows(&self, batch: &UploadBatch) -> PipelineResult<Vec<Vec<Option<String>>>> {
        let records = self.surveys(Some(&batch.id), None)?;
        Ok(records
            .into_iter()
            .map(|mut r| {
                batch
                    .columns
                    .iter()
                    .map(|c| r.values.remove(c).flatten())
                    .collect()
            })
            .collect())
    }

    /// Survey rows, optionally restricted to one batch, in upload order
    pub fn surveys(
        &self,
        batch_id: Option<&str>,
        limit:    Option<usize>,
    ) -> PipelineResult<Vec<SurveyRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, batch_id, row_index, data, created_at FROM surveys
             WHERE (?1 IS NULL OR batch_id = ?1)
             ORDER BY id ASC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![batch_id, sql_limit(limit)], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, DateTime<Utc>>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, batch_id, row_index, data, created_at)| {
                Ok(SurveyRecord {
                    id,
                    batch_id,
                    row_index: row_index as usize,
                    values: from_json::<BTreeMap<String, Option<String>>>(&data)?,
                    created_at,
                })
            })
            .collect()
    }

    /// Administrative purge of every survey row and batch; returns rows deleted
    pub fn purge_surveys(&mut self) -> PipelineResult<usize> {
        let tx      = self.conn.transaction()?;
        let deleted = tx.execute("DELETE FROM surveys", [])?;
        tx.execute("DELETE FROM batches", [])?;
        tx.commit()?;

        tracing::warn!("Purged {} survey rows", deleted);
        Ok(deleted)
    }

    // ─── Models ───────────────────────────────────────────────────────────────

    /// Persist a model with its predictions and make it current
    pub fn save_trained_model(
        &mut self,
        model:       &TrainedModel,
        predictions: &[Prediction],
    ) -> PipelineResult<()> {
        let summary_json  = to_json(&model.summary)?;
        let artifact_json = model.artifact.to_json()?;

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO models (id, summary, artifact, accuracy, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                model.id(),
                summary_json,
                artifact_json,
                model.summary.accuracy,
                model.summary.created_at,
            ],
        )?;
        insert_predictions(&tx, predictions)?;
        tx.execute(
            "INSERT INTO current_model (slot, model_id) VALUES (1, ?1)
             ON CONFLICT(slot) DO UPDATE SET model_id = excluded.model_id",
            params![model.id()],
        )?;
        tx.commit()?;

        tracing::info!(
            "Stored model {} with {} predictions; it is now current",
            model.id(),
            predictions.len()
        );
        Ok(())
    }

    /// The model in the current slot, with its artifact
    pub fn current_model(&self) -> PipelineResult<Option<TrainedModel>> {
        let row = self
            .conn
            .query_row(
                "SELECT m.summary, m.artifact FROM current_model c
                 JOIN models m ON m.id = c.model_id WHERE c.slot = 1",
                [],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        row.map(|(summary, artifact)| {
            Ok(TrainedModel {
                summary:  from_json(&summary)?,
                artifact: ModelArtifact::from_json(&artifact)?,
            })
        })
        .transpose()
    }

    /// Summary of the current model without loading the forest
    pub fn current_summary(&self) -> PipelineResult<Option<ModelSummary>> {
        let json = self
            .conn
            .query_row(
                "SELECT m.summary FROM current_model c
                 JOIN models m ON m.id = c.model_id WHERE c.slot = 1",
                [],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        json.map(|j| from_json(&j)).transpose()
    }

    /// Every stored model summary, newest first
    pub fn model_history(&self, limit: Option<usize>) -> PipelineResult<Vec<ModelSummary>> {
        let mut stmt = self
            .conn
            .prepare("SELECT summary FROM models ORDER BY rowid DESC LIMIT ?1")?;
        let rows = stmt
            .query_map(params![sql_limit(limit)], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        rows.iter().map(|j| from_json(j)).collect()
    }

    // ─── Predictions ──────────────────────────────────────────────────────────

    /// Append the output of a scoring run against an already stored model
    pub fn save_predictions(&mut self, predictions: &[Prediction]) -> PipelineResult<()> {
        let tx = self.conn.transaction()?;
        insert_predictions(&tx, predictions)?;
        tx.commit()?;

        tracing::info!("Stored {} predictions", predictions.len());
        Ok(())
    }

    /// Predictions of one model (or of all models), in insertion order
    pub fn predictions(&self, model_id: Option<&str>) -> PipelineResult<Vec<Prediction>> {
        self.query_predictions(
            "SELECT model_id, run_id, row_index, features, predicted_label, confidence, created_at
             FROM predictions WHERE (?1 IS NULL OR model_id = ?1)
             ORDER BY id ASC",
            model_id,
        )
    }

    /// The most recent scoring run of a model, in row order
    pub fn latest_predictions(&self, model_id: &str) -> PipelineResult<Vec<Prediction>> {
        self.query_predictions(
            "SELECT model_id, run_id, row_index, features, predicted_label, confidence, created_at
             FROM predictions
             WHERE run_id = (SELECT run_id FROM predictions WHERE model_id = ?1
                             ORDER BY id DESC LIMIT 1)
             ORDER BY id ASC",
            Some(model_id),
        )
    }

    fn query_predictions(&self, sql: &str, model_id: Option<&str>) -> PipelineResult<Vec<Prediction>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params![model_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, f64>(5)?,
                    row.get::<_, DateTime<Utc>>(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(model_id, run_id, row_index, features, predicted_label, confidence, created_at)| {
                Ok(Prediction {
                    model_id,
                    run_id,
                    row_index: row_index as usize,
                    features: from_json(&features)?,
                    predicted_label,
                    confidence,
                    created_at,
                })
            })
            .collect()
    }

    // ─── Insights ─────────────────────────────────────────────────────────────

    /// Store an insight and return its id
    pub fn save_insight(&self, insight: &Insight) -> PipelineResult<i64> {
        self.conn.execute(
            "INSERT INTO insights (model_id, category, text, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![insight.model_id, insight.category, insight.text, insight.created_at],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::info!("Stored insight {} for model {}", id, insight.model_id);
        Ok(id)
    }

    /// Insights of one model (or all), newest first
    pub fn insights(
        &self,
        model_id: Option<&str>,
        limit:    Option<usize>,
    ) -> PipelineResult<Vec<Insight>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, model_id, category, text, created_at FROM insights
             WHERE (?1 IS NULL OR model_id = ?1)
             ORDER BY id DESC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![model_id, sql_limit(limit)], |row| {
                Ok(Insight {
                    id:         Some(row.get(0)?),
                    model_id:   row.get(1)?,
                    category:   row.get(2)?,
                    text:       row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

// ─── StoredBatchSource ────────────────────────────────────────────────────────
/// The most recent upload batch, re-typed through the same loader rules
/// a fresh CSV goes through.
pub struct StoredBatchSource<'a> {
    store:  &'a SqliteStore,
    loader: CsvLoader,
}

impl<'a> StoredBatchSource<'a> {
    pub fn new(store: &'a SqliteStore, loader: CsvLoader) -> Self {
        Self { store, loader }
    }
}

impl TableSource for StoredBatchSource<'_> {
    fn describe(&self) -> String {
        match self.store.latest_batch() {
            Ok(Some(batch)) => format!("{} (batch {})", batch.source, batch.id),
            _ => "latest upload".to_string(),
        }
    }

    fn load_table(&self) -> PipelineResult<Table> {
        let batch = self
            .store
            .latest_batch()?
            .ok_or_else(|| PipelineError::format("no survey data has been uploaded yet"))?;
        let rows = self.store.batch_rows(&batch)?;

        tracing::info!("Loaded {} rows from batch {}", rows.len(), batch.id);
        self.loader.build_table(batch.columns, rows)
    }
}

fn insert_predictions(tx: &Transaction<'_>, predictions: &[Prediction]) -> PipelineResult<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO predictions
           (model_id, run_id, row_index, features, predicted_label, confidence, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    for p in predictions {
        stmt.execute(params![
            p.model_id,
            p.run_id,
            p.row_index as i64,
            to_json(&p.features)?,
            p.predicted_label,
            p.confidence,
            p.created_at,
        ])?;
    }
    Ok(())
}

/// SQLite treats a negative LIMIT as "no limit"
fn sql_limit(limit: Option<usize>) -> i64 {
    limit.map_or(-1, |n| n as i64)
}
