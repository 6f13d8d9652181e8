//! Scripted map operations.
//!
//! A [`Script`] is a JSON list of steps run against an in-memory table.
//! Every mutating step runs in its own transaction prepared with exactly the
//! credit the step's estimate asks for, so a script doubles as a check that
//! the estimates are upper bounds.
//!
//! ```json
//! {
//!   "steps": [
//!     { "op": "insert", "prefix": 1, "value": 0 },
//!     { "op": "paste", "prefix": 1, "start": 4096, "end": 8192, "value": 7 },
//!     { "op": "dump", "prefix": 1 }
//!   ]
//! }
//! ```

use crate::credit::OpType;
use crate::cursor::Cursor;
use crate::mutate::SplitPiece;
use crate::policy::KeepValues;
use crate::segment::{BINDEX_MAX, Extent, Prefix, Segment};
use crate::{EmapError, ExtMap, ExtMapConfig, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use stratum_be::{MemStore, StoreConfig, Tx, TxCredit};
use tracing::{debug, info, warn};

/// One script step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Create map `prefix` with a single segment of `value`.
    Insert {
        /// Map identifier (low 64 bits of the prefix).
        prefix: u64,
        /// Initial value.
        value: u64,
    },
    /// Delete map `prefix`.
    Delete {
        /// Map identifier (low 64 bits of the prefix).
        prefix: u64,
    },
    /// Split the segment containing `offset`.
    Split {
        /// Map identifier (low 64 bits of the prefix).
        prefix: u64,
        /// Any offset inside the segment.
        offset: u64,
        /// Pieces to split into.
        pieces: Vec<SplitPiece>,
    },
    /// Merge `delta` offsets of the segment containing `offset` into its
    /// successor.
    Merge {
        /// Map identifier (low 64 bits of the prefix).
        prefix: u64,
        /// Any offset inside the segment.
        offset: u64,
        /// Offsets to move.
        delta: u64,
    },
    /// Overwrite `[start, end)` with `value`.
    Paste {
        /// Map identifier (low 64 bits of the prefix).
        prefix: u64,
        /// First offset.
        start: u64,
        /// End offset (exclusive).
        end: u64,
        /// New value.
        value: u64,
    },
    /// Report the segments of `prefix`.
    Dump {
        /// Map identifier (low 64 bits of the prefix).
        prefix: u64,
    },
    /// Report a credit estimate.
    Credit {
        /// Operation kind.
        optype: OpType,
        /// Operation count.
        nr: u64,
    },
}

/// A script: store and map configuration plus steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    /// Backing table configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Map configuration.
    #[serde(default)]
    pub map: ExtMapConfig,
    /// Steps to run in order.
    pub steps: Vec<Step>,
}

impl Script {
    /// Parse a script from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let script: Self = serde_json::from_str(json)?;
        script.store.validate()?;
        Ok(script)
    }

    /// Load a script from a JSON file.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            EmapError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }
}

/// Outcome of one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    /// Step number, from 0.
    pub step: usize,
    /// Credit the step was prepared with (or the estimate asked for).
    pub credit: TxCredit,
    /// Credit the step's writes consumed.
    pub used: TxCredit,
    /// Segments reported by a `dump` step.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub segments: Vec<Segment>,
}

/// Runs scripts against an in-memory table.
#[derive(Debug)]
pub struct Runner {
    map: ExtMap<MemStore>,
}

impl Runner {
    /// Create the table described by `script`.
    pub async fn new(script: &Script) -> Result<Self> {
        let map = ExtMap::with_config(
            MemStore::with_config(script.store.clone()),
            script.map.clone(),
        );
        let credit = map.credit_for(OpType::Create, 1);
        let mut tx = Tx::new();
        tx.prep(&credit);
        map.store().open(&mut tx)?;
        if let Err(e) = map.create(&mut tx).await {
            map.store().abort(&mut tx)?;
            return Err(e);
        }
        map.store().commit(&mut tx)?;
        Ok(Self { map })
    }

    /// Map the runner operates on.
    pub const fn map(&self) -> &ExtMap<MemStore> {
        &self.map
    }

    /// Run every step of `script`, stopping at the first failure.
    pub async fn run(&self, script: &Script) -> Result<Vec<StepReport>> {
        let mut reports = Vec::with_capacity(script.steps.len());
        for (i, step) in script.steps.iter().enumerate() {
            let report = self.step(i, step).await.inspect_err(|e| {
                warn!(step = i, error = %e, "script step failed");
            })?;
            reports.push(report);
        }
        info!(steps = reports.len(), "script complete");
        Ok(reports)
    }

    /// Run one step.
    pub async fn step(&self, index: usize, step: &Step) -> Result<StepReport> {
        let mut report = StepReport {
            step: index,
            credit: TxCredit::ZERO,
            used: TxCredit::ZERO,
            segments: Vec::new(),
        };
        let credit = match step {
            Step::Insert { .. } => self.map.credit_for(OpType::Insert, 1),
            Step::Delete { .. } => self.map.credit_for(OpType::Delete, 1),
            Step::Split { pieces, .. } => {
                self.map.credit_for(OpType::Split, pieces.len() as u64)
            }
            Step::Merge { .. } => self.map.credit_for(OpType::Merge, 1),
            Step::Paste {
                prefix, start, end, ..
            } => {
                let nr = self
                    .map
                    .overlapped(Prefix::from_parts(0, *prefix), Extent::new(*start, *end))
                    .await?;
                self.map.credit_for(OpType::Paste, nr)
            }
            Step::Dump { prefix } => {
                report.segments = self.map.dump(Prefix::from_parts(0, *prefix)).await?;
                return Ok(report);
            }
            Step::Credit { optype, nr } => {
                report.credit = self.map.credit_for(*optype, *nr);
                return Ok(report);
            }
        };
        debug!(step = index, ?step, %credit, "running step");

        let store = self.map.store();
        let mut tx = Tx::new();
        tx.prep(&credit);
        store.open(&mut tx)?;
        match self.apply(&mut tx, step).await {
            Ok(()) => store.commit(&mut tx)?,
            Err(e) => {
                store.abort(&mut tx)?;
                return Err(e);
            }
        }
        report.credit = credit;
        report.used = tx.used();
        Ok(report)
    }

    /// Cursor on the segment of script map `prefix` containing `offset`.
    async fn lookup(&self, prefix: u64, offset: u64) -> Result<Cursor<'_, MemStore>> {
        if offset > BINDEX_MAX {
            return Err(EmapError::Config(format!(
                "offset {offset:#x} is outside the namespace"
            )));
        }
        self.map.lookup(Prefix::from_parts(0, prefix), offset).await
    }

    async fn apply(&self, tx: &mut Tx, step: &Step) -> Result<()> {
        match step {
            Step::Insert { prefix, value } => {
                self.map
                    .obj_insert(tx, Prefix::from_parts(0, *prefix), *value)
                    .await
            }
            Step::Delete { prefix } => {
                let cursor = self.lookup(*prefix, 0).await?;
                if !(cursor.is_first() && cursor.is_last()) {
                    return Err(EmapError::Config(format!(
                        "map {} has more than one segment",
                        cursor.prefix()
                    )));
                }
                drop(cursor);
                self.map.obj_delete(tx, Prefix::from_parts(0, *prefix)).await
            }
            Step::Split {
                prefix,
                offset,
                pieces,
            } => {
                let mut cursor = self.lookup(*prefix, *offset).await?;
                let seg = cursor.segment().ext;
                let total = pieces
                    .iter()
                    .try_fold(0u64, |acc, p| acc.checked_add(p.length));
                if total != Some(seg.length()) {
                    return Err(EmapError::Config(format!(
                        "split pieces do not cover segment {seg}"
                    )));
                }
                cursor.split(tx, pieces).await?;
                cursor.close().await
            }
            Step::Merge {
                prefix,
                offset,
                delta,
            } => {
                let mut cursor = self.lookup(*prefix, *offset).await?;
                let seg = cursor.segment().ext;
                if cursor.is_last() {
                    return Err(EmapError::Config(format!(
                        "cannot merge the last segment {seg}"
                    )));
                }
                if *delta > seg.length() {
                    return Err(EmapError::Config(format!(
                        "merge delta {delta:#x} exceeds segment {seg}"
                    )));
                }
                cursor.merge(tx, *delta).await?;
                cursor.close().await
            }
            Step::Paste {
                prefix,
                start,
                end,
                value,
            } => {
                let ext = Extent::new(*start, *end);
                if ext.is_empty() {
                    return Err(EmapError::Config(format!("empty paste extent {ext}")));
                }
                let mut cursor = self.lookup(*prefix, *start).await?;
                cursor.paste(tx, ext, *value, &mut KeepValues).await?;
                cursor.close().await
            }
            Step::Dump { .. } | Step::Credit { .. } => Ok(()),
        }
    }
}
