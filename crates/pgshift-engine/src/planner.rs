//! Chunk planning
//!
//! Splits a source table into row windows sized after the configured chunk
//! size in megabytes and writes one ledger entry per window.

use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::instrument;

use crate::context::RunContext;
use crate::error::{MigrationError, MigrationResult};
use crate::ledger::Ledger;
use crate::select_list::select_field_list;
use crate::sink::ErrorSink;
use crate::source::SourceCatalog;
use crate::types::{ChunkPlan, TableDescriptor, TableStats};

/// One planned row window of a table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkWindow {
    pub offset: u64,
    pub rows_in_chunk: u64,
    pub size_in_mb: f64,
}

/// Number of chunks a table of `size_in_mb` is split into (never below 1)
pub fn chunk_count(size_in_mb: f64, chunk_size_mb: f64) -> f64 {
    let count = size_in_mb / chunk_size_mb;
    if count.is_finite() && count >= 1.0 {
        count
    } else {
        1.0
    }
}

/// Partition a table into windows covering `[0, rows_count)`
///
/// Every window asks for the same number of rows; the last one may ask for
/// more than remain and is clamped when read. With a single chunk its size is
/// the table size. With several, all but the last use the configured chunk
/// size and the last uses `size % chunk_count`, or the configured size when
/// that remainder is zero.
pub fn compute_chunk_windows(stats: TableStats, chunk_size_mb: f64) -> Vec<ChunkWindow> {
    let rows = stats.rows_count;
    if rows == 0 {
        return Vec::new();
    }

    let count = chunk_count(stats.size_in_mb, chunk_size_mb);
    let rows_per_chunk = ((rows as f64 / count).ceil() as u64).max(1);

    let mut windows = Vec::new();
    let mut offset = 0u64;

    while offset < rows {
        let size_in_mb = if count == 1.0 {
            stats.size_in_mb
        } else if offset.saturating_add(rows_per_chunk) >= rows {
            let remainder = stats.size_in_mb % count;
            if remainder == 0.0 {
                chunk_size_mb
            } else {
                remainder
            }
        } else {
            chunk_size_mb
        };

        windows.push(ChunkWindow {
            offset,
            rows_in_chunk: rows_per_chunk,
            size_in_mb,
        });

        offset = offset.saturating_add(rows_per_chunk);
    }

    windows
}

/// Windows of an earlier plan that have no ledger entry
///
/// The grid is rebuilt from the rows per chunk and row count recorded in
/// `existing`, so the result completes that plan even when the source table
/// changed since. Sizes of the rebuilt windows use `chunk_size_mb`.
pub fn missing_windows(existing: &[ChunkPlan], chunk_size_mb: f64) -> Vec<ChunkWindow> {
    let Some(first) = existing.first() else {
        return Vec::new();
    };

    let step = usize::try_from(first.rows_in_chunk.max(1)).unwrap_or(usize::MAX);
    let planned: HashSet<u64> = existing.iter().map(|plan| plan.offset).collect();

    (0..first.total_rows_count)
        .step_by(step)
        .filter(|offset| !planned.contains(offset))
        .map(|offset| ChunkWindow {
            offset,
            rows_in_chunk: first.rows_in_chunk,
            size_in_mb: chunk_size_mb,
        })
        .collect()
}

pub struct ChunkPlanner {
    ctx: Arc<RunContext>,
    source: Arc<dyn SourceCatalog>,
    ledger: Arc<dyn Ledger>,
    errors: Arc<dyn ErrorSink>,
}

impl ChunkPlanner {
    pub fn new(
        ctx: Arc<RunContext>,
        source: Arc<dyn SourceCatalog>,
        ledger: Arc<dyn Ledger>,
        errors: Arc<dyn ErrorSink>,
    ) -> Self {
        Self {
            ctx,
            source,
            ledger,
            errors,
        }
    }

    /// Write the chunk plans of a table to the ledger
    ///
    /// `existing` holds the plans an earlier run already persisted for this
    /// table. When it is empty the table is measured and planned from
    /// scratch; otherwise only the windows missing from it are written and
    /// the source is not queried. Returns the number of entries written.
    ///
    /// All inserts are awaited before returning; if any of them failed, every
    /// failure is recorded and the first one is returned. Entries that were
    /// written are kept.
    #[instrument(skip(self, table, existing), fields(table = %table.target_name, existing = existing.len()))]
    pub async fn plan_chunks(&self, table: &TableDescriptor, existing: &[ChunkPlan]) -> MigrationResult<usize> {
        let (windows, total_rows_count) = match existing.first() {
            Some(first) => {
                let windows = missing_windows(existing, self.ctx.chunk_size_mb);
                if windows.is_empty() {
                    tracing::debug!("Table already planned, skipping");
                    return Ok(0);
                }
                tracing::warn!(missing = windows.len(), "Table is partially planned, filling gaps");
                (windows, first.total_rows_count)
            },
            None => {
                let stats = self
                    .source
                    .stats(&table.source_name)
                    .await
                    .map_err(|e| MigrationError::introspection(&table.source_name, e))?;

                tracing::info!(
                    rows = stats.rows_count,
                    size_in_mb = stats.size_in_mb,
                    "Planning data chunks"
                );
                (compute_chunk_windows(stats, self.ctx.chunk_size_mb), stats.rows_count)
            },
        };

        let select_list = select_field_list(&table.columns);
        let primary_key = table.primary_key().map(|c| c.name.clone());

        let plans: Vec<ChunkPlan> = windows
            .into_iter()
            .map(|window| ChunkPlan {
                table_name: table.target_name.clone(),
                source_table_name: table.source_name.clone(),
                select_field_list: select_list.clone(),
                offset: window.offset,
                rows_in_chunk: window.rows_in_chunk,
                total_rows_count,
                primary_key: primary_key.clone(),
                size_in_mb: window.size_in_mb,
            })
            .collect();

        tracing::debug!(chunks = plans.len(), "Persisting chunk plans");

        let results = join_all(plans.iter().map(|plan| self.ledger.insert(plan))).await;

        let mut first_error = None;
        for (plan, result) in plans.iter().zip(results) {
            if let Err(e) = result {
                self.errors.record_error(
                    &format!(
                        "Failed to persist chunk at offset {} of \"{}\": {}",
                        plan.offset, plan.table_name, e
                    ),
                    None,
                );
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(plans.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_windows_for_fractional_chunk_count() {
        let windows = compute_chunk_windows(
            TableStats {
                size_in_mb: 250.0,
                rows_count: 1000,
            },
            100.0,
        );

        let offsets: Vec<u64> = windows.iter().map(|w| w.offset).collect();
        assert_eq!(offsets, vec![0, 400, 800]);
        assert!(windows.iter().all(|w| w.rows_in_chunk == 400));
        assert_eq!(windows[0].size_in_mb, 100.0);
        assert_eq!(windows[1].size_in_mb, 100.0);
        // 250 % 2.5 == 0, so the last chunk falls back to the chunk size
        assert_eq!(windows[2].size_in_mb, 100.0);
    }

    #[test]
    fn test_last_window_uses_remainder() {
        let windows = compute_chunk_windows(
            TableStats {
                size_in_mb: 10.0,
                rows_count: 100,
            },
            2.5,
        );

        // 10 / 2.5 = 4 chunks of 25 rows, 10 % 4 = 2 MB for the last one
        assert_eq!(windows.len(), 4);
        assert_eq!(windows[3].offset, 75);
        assert_eq!(windows[0].size_in_mb, 2.5);
        assert_eq!(windows[3].size_in_mb, 2.0);
    }

    #[test]
    fn test_small_table_is_one_chunk_with_table_size() {
        let windows = compute_chunk_windows(
            TableStats {
                size_in_mb: 0.5,
                rows_count: 42,
            },
            10.0,
        );

        assert_eq!(
            windows,
            vec![ChunkWindow {
                offset: 0,
                rows_in_chunk: 42,
                size_in_mb: 0.5,
            }]
        );
    }

    #[test]
    fn test_empty_table_has_no_windows() {
        let windows = compute_chunk_windows(
            TableStats {
                size_in_mb: 0.0,
                rows_count: 0,
            },
            10.0,
        );
        assert!(windows.is_empty());
    }

    #[test]
    fn test_chunk_count_never_below_one() {
        assert_eq!(chunk_count(0.0, 10.0), 1.0);
        assert_eq!(chunk_count(5.0, 10.0), 1.0);
        assert_eq!(chunk_count(25.0, 10.0), 2.5);
    }

    fn recorded(offsets: &[u64]) -> Vec<ChunkPlan> {
        offsets
            .iter()
            .map(|&offset| ChunkPlan {
                table_name: "orders".to_string(),
                source_table_name: "orders".to_string(),
                select_field_list: "`id`".to_string(),
                offset,
                rows_in_chunk: 200,
                total_rows_count: 700,
                primary_key: Some("id".to_string()),
                size_in_mb: 10.0,
            })
            .collect()
    }

    #[test]
    fn test_missing_windows_fill_gaps_of_recorded_grid() {
        let missing = missing_windows(&recorded(&[0, 400, 600]), 10.0);
        assert_eq!(
            missing,
            vec![ChunkWindow {
                offset: 200,
                rows_in_chunk: 200,
                size_in_mb: 10.0,
            }]
        );

        let offsets: Vec<u64> = missing_windows(&recorded(&[200]), 10.0)
            .iter()
            .map(|w| w.offset)
            .collect();
        assert_eq!(offsets, vec![0, 400, 600]);
    }

    #[test]
    fn test_complete_plan_has_no_missing_windows() {
        assert!(missing_windows(&recorded(&[0, 200, 400, 600]), 10.0).is_empty());
        assert!(missing_windows(&[], 10.0).is_empty());
    }

    proptest! {
        #[test]
        fn windows_cover_every_row_once(
            rows in 1u64..200_000,
            size in 0.0f64..5_000.0,
            chunk_size in 0.5f64..500.0,
        ) {
            let windows = compute_chunk_windows(
                TableStats { size_in_mb: size, rows_count: rows },
                chunk_size,
            );

            prop_assert!(!windows.is_empty());
            prop_assert_eq!(windows[0].offset, 0);

            let mut expected_offset = 0;
            for window in &windows {
                prop_assert_eq!(window.offset, expected_offset);
                prop_assert!(window.offset < rows);
                expected_offset += window.rows_in_chunk;
            }
            prop_assert!(expected_offset >= rows);

            let last = windows[windows.len() - 1];
            prop_assert!(last.offset + last.rows_in_chunk >= rows);
        }
    }
}
