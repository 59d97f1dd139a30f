//! Optional per-path diagnostic capture.
//!
//! When enabled, the orchestrator records, for every path and exposure
//! date, the collateralized positive/negative exposure and the collateral
//! received/posted — the fixed four-row key set of the tabular diagnostic
//! export.

use crate::collateral::DateExposure;

/// The fixed diagnostic row kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DiagnosticRow {
    /// Collateralized positive (counterparty-risk) exposure.
    PositiveExposure,
    /// Collateralized negative (booking-entity-risk) exposure.
    NegativeExposure,
    /// Collateral received.
    CollateralReceived,
    /// Collateral posted.
    CollateralPosted,
}

impl DiagnosticRow {
    /// All rows in export order.
    pub const ALL: [DiagnosticRow; 4] = [
        Self::PositiveExposure,
        Self::NegativeExposure,
        Self::CollateralReceived,
        Self::CollateralPosted,
    ];

    /// Short export label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::PositiveExposure => "PE",
            Self::NegativeExposure => "NE",
            Self::CollateralReceived => "Received",
            Self::CollateralPosted => "Posted",
        }
    }
}

/// One exported row: a path, a row kind, and one value per exposure date.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiagnosticRecord {
    /// Path identifier.
    pub path_id: usize,
    /// Row kind.
    pub row: DiagnosticRow,
    /// One value per exposure date.
    pub values: Vec<f64>,
}

/// Tabular capture of per-path exposure and collateral.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExposureDiagnostics {
    n_dates: usize,
    records: Vec<DiagnosticRecord>,
}

impl ExposureDiagnostics {
    /// Creates an empty capture for the given number of exposure dates.
    pub fn new(n_dates: usize) -> Self {
        Self {
            n_dates,
            records: Vec::new(),
        }
    }

    /// Records one (path, date) observation.
    ///
    /// Rows for a path are created on first sight; workers observe their
    /// paths sequentially, so the path's rows are always the most recent.
    pub fn observe(&mut self, path_id: usize, date_idx: usize, exposure: &DateExposure) {
        let needs_rows = self
            .records
            .last()
            .map(|r| r.path_id != path_id)
            .unwrap_or(true);
        if needs_rows {
            for row in DiagnosticRow::ALL {
                self.records.push(DiagnosticRecord {
                    path_id,
                    row,
                    values: vec![0.0; self.n_dates],
                });
            }
        }
        let base = self.records.len() - DiagnosticRow::ALL.len();
        self.records[base].values[date_idx] = exposure.positive;
        self.records[base + 1].values[date_idx] = exposure.negative;
        self.records[base + 2].values[date_idx] = exposure.received_collateral;
        self.records[base + 3].values[date_idx] = exposure.posted_collateral;
    }

    /// Merges another capture (from a parallel worker).
    pub fn merge(&mut self, mut other: ExposureDiagnostics) {
        self.records.append(&mut other.records);
    }

    /// Sorts rows by path id and row kind for stable export.
    pub fn finalize(&mut self) {
        self.records.sort_by_key(|r| (r.path_id, r.row));
    }

    /// Number of exposure dates per row.
    #[inline]
    pub fn n_dates(&self) -> usize {
        self.n_dates
    }

    /// All captured rows.
    #[inline]
    pub fn records(&self) -> &[DiagnosticRecord] {
        &self.records
    }

    /// The four rows of one path, in export order, if captured.
    pub fn rows_for_path(&self, path_id: usize) -> Option<[&DiagnosticRecord; 4]> {
        let start = self
            .records
            .iter()
            .position(|r| r.path_id == path_id && r.row == DiagnosticRow::PositiveExposure)?;
        let rows = &self.records[start..start + 4];
        Some([&rows[0], &rows[1], &rows[2], &rows[3]])
    }
}
