//! In-memory doubles of the engine's database seams
//!
//! Each fake records what the engine asked of it and can be told to fail
//! specific calls, so tests can drive the failure policies without a server.
#![allow(dead_code)]

use async_trait::async_trait;
use pgshift_engine::{
    ChunkPlan, ColumnDescriptor, ErrorSink, Ledger, LedgerEntry, LedgerProgress, MigrationError,
    MigrationResult, RunContext, SourceCatalog, TableStats, TargetDatabase, TypeRuleTable,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub fn db_error(message: &str) -> sqlx::Error {
    sqlx::Error::Protocol(message.to_string())
}

pub fn column(name: &str, data_type: &str) -> ColumnDescriptor {
    ColumnDescriptor {
        name: name.to_string(),
        raw_source_type: data_type.to_string(),
        is_primary_key: false,
        is_auto_increment: false,
    }
}

pub fn id_column() -> ColumnDescriptor {
    ColumnDescriptor {
        name: "id".to_string(),
        raw_source_type: "int(10) unsigned".to_string(),
        is_primary_key: true,
        is_auto_increment: true,
    }
}

pub fn context(chunk_size_mb: f64) -> Arc<RunContext> {
    let rules = TypeRuleTable::builtin().unwrap();
    Arc::new(RunContext::new("public", "shop", chunk_size_mb, rules))
}

// ============================================================================
// Source
// ============================================================================

#[derive(Default)]
pub struct FakeSource {
    columns: Mutex<HashMap<String, Vec<ColumnDescriptor>>>,
    stats: Mutex<HashMap<String, TableStats>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, name: &str, columns: Vec<ColumnDescriptor>, stats: TableStats) -> Self {
        self.columns.lock().unwrap().insert(name.to_string(), columns);
        self.stats.lock().unwrap().insert(name.to_string(), stats);
        self
    }

    /// A table whose columns can be read but whose stats query fails
    pub fn with_unmeasurable_table(self, name: &str, columns: Vec<ColumnDescriptor>) -> Self {
        self.columns.lock().unwrap().insert(name.to_string(), columns);
        self
    }
}

#[async_trait]
impl SourceCatalog for FakeSource {
    async fn columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>, sqlx::Error> {
        self.columns
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .ok_or_else(|| db_error(&format!("Table '{}' doesn't exist", table)))
    }

    async fn stats(&self, table: &str) -> Result<TableStats, sqlx::Error> {
        self.stats
            .lock()
            .unwrap()
            .get(table)
            .copied()
            .ok_or_else(|| db_error("stats unavailable"))
    }

    async fn tables(&self) -> Result<Vec<String>, sqlx::Error> {
        let mut tables: Vec<String> = self.columns.lock().unwrap().keys().cloned().collect();
        tables.sort();
        Ok(tables)
    }
}

// ============================================================================
// Target
// ============================================================================

#[derive(Default)]
pub struct FakeTarget {
    executed: Mutex<Vec<String>>,
    fail_when_contains: Mutex<Vec<String>>,
    loaded_chunks: Mutex<HashSet<i64>>,
    probe_fails: AtomicBool,
}

impl FakeTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every statement containing `fragment`
    pub fn fail_statements_containing(&self, fragment: &str) {
        self.fail_when_contains.lock().unwrap().push(fragment.to_string());
    }

    /// Pretend rows tagged with `chunk_id` were written
    pub fn load_chunk(&self, chunk_id: i64) {
        self.loaded_chunks.lock().unwrap().insert(chunk_id);
    }

    pub fn fail_probes(&self) {
        self.probe_fails.store(true, Ordering::SeqCst);
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl TargetDatabase for FakeTarget {
    async fn execute(&self, sql: &str) -> Result<(), sqlx::Error> {
        let fails = self
            .fail_when_contains
            .lock()
            .unwrap()
            .iter()
            .any(|fragment| sql.contains(fragment.as_str()));

        if fails {
            return Err(db_error("statement rejected"));
        }

        self.executed.lock().unwrap().push(sql.to_string());
        Ok(())
    }

    async fn chunk_rows_exist(
        &self,
        _schema: &str,
        _table: &str,
        _provenance_column: &str,
        chunk_id: i64,
    ) -> Result<bool, sqlx::Error> {
        if self.probe_fails.load(Ordering::SeqCst) {
            return Err(db_error("column does not exist"));
        }
        Ok(self.loaded_chunks.lock().unwrap().contains(&chunk_id))
    }
}

// ============================================================================
// Ledger
// ============================================================================

#[derive(Default)]
pub struct MemoryLedger {
    entries: Mutex<Vec<LedgerEntry>>,
    fail_insert_offsets: Mutex<HashSet<u64>>,
    fail_is_started: AtomicBool,
    fail_mark: AtomicBool,
    created: AtomicBool,
    dropped: AtomicBool,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject inserts of plans starting at `offset`
    pub fn fail_insert_at(&self, offset: u64) {
        self.fail_insert_offsets.lock().unwrap().insert(offset);
    }

    pub fn clear_insert_failures(&self) {
        self.fail_insert_offsets.lock().unwrap().clear();
    }

    pub fn fail_is_started(&self) {
        self.fail_is_started.store(true, Ordering::SeqCst);
    }

    pub fn fail_mark(&self) {
        self.fail_mark.store(true, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> Vec<LedgerEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn entry(&self, id: i64) -> LedgerEntry {
        self.snapshot().into_iter().find(|e| e.id == id).unwrap()
    }

    pub fn was_created(&self) -> bool {
        self.created.load(Ordering::SeqCst)
    }

    pub fn was_dropped(&self) -> bool {
        self.dropped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn create(&self) -> MigrationResult<()> {
        self.created.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn insert(&self, plan: &ChunkPlan) -> MigrationResult<i64> {
        if self.fail_insert_offsets.lock().unwrap().contains(&plan.offset) {
            return Err(MigrationError::Ledger(db_error("insert rejected")));
        }

        let mut entries = self.entries.lock().unwrap();
        let id = entries.len() as i64 + 1;
        entries.push(LedgerEntry {
            id,
            is_started: false,
            plan: plan.clone(),
            size_in_mb: plan.size_in_mb,
        });
        Ok(id)
    }

    async fn is_started(&self, id: i64) -> MigrationResult<bool> {
        if self.fail_is_started.load(Ordering::SeqCst) {
            return Err(MigrationError::Ledger(db_error("connection reset")));
        }

        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .any(|e| e.id == id && e.is_started))
    }

    async fn mark_started(&self, id: i64) -> MigrationResult<()> {
        if self.fail_mark.load(Ordering::SeqCst) {
            return Err(MigrationError::Ledger(db_error("update rejected")));
        }

        for entry in self.entries.lock().unwrap().iter_mut() {
            if entry.id == id {
                entry.is_started = true;
            }
        }
        Ok(())
    }

    async fn entries(&self, table: Option<&str>) -> MigrationResult<Vec<LedgerEntry>> {
        Ok(self
            .snapshot()
            .into_iter()
            .filter(|e| table.map_or(true, |t| e.plan.table_name == t))
            .collect())
    }

    async fn planned_tables(&self) -> MigrationResult<HashSet<String>> {
        Ok(self.snapshot().into_iter().map(|e| e.plan.table_name).collect())
    }

    async fn progress(&self, table: Option<&str>) -> MigrationResult<LedgerProgress> {
        let entries = self.entries(table).await?;
        Ok(LedgerProgress {
            total: entries.len() as i64,
            started: entries.iter().filter(|e| e.is_started).count() as i64,
        })
    }

    async fn drop_table(&self) -> MigrationResult<()> {
        self.dropped.store(true, Ordering::SeqCst);
        self.entries.lock().unwrap().clear();
        Ok(())
    }
}

// ============================================================================
// Error sink
// ============================================================================

#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<(String, Option<String>)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(String, Option<String>)> {
        self.records.lock().unwrap().clone()
    }
}

impl ErrorSink for RecordingSink {
    fn record_error(&self, message: &str, sql: Option<&str>) {
        self.records
            .lock()
            .unwrap()
            .push((message.to_string(), sql.map(str::to_string)));
    }
}
