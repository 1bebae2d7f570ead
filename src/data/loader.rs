// ============================================================
// Layer 4 — CSV Loader
// ============================================================
// Reads an evaluation CSV into domain types.
//
// Expected layout (header row required):
//
//   y_true,reader_a,reader_b,...
//   0,0.12,0.08
//   1,0.91,0.85
//   ...
//
// The first column holds the binary labels; every remaining column
// is one reader's predicted scores. A label-only file (single
// column) is valid input for training.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::domain::dataset::{BinaryDataset, EvaluationSet, ReaderPredictions};
use crate::domain::traits::{LabelSource, PredictionSource};

pub struct CsvPredictionLoader {
    path: PathBuf,
}

impl CsvPredictionLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn parse(&self) -> Result<EvaluationSet> {
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("cannot read predictions from '{}'", self.path.display()))?;

        let mut lines = raw.lines().filter(|l| !l.trim().is_empty());
        let header = lines
            .next()
            .with_context(|| format!("'{}' is empty", self.path.display()))?;
        let names: Vec<String> = header.split(',').map(|c| c.trim().to_string()).collect();
        anyhow::ensure!(
            !names.is_empty(),
            "'{}' has no columns",
            self.path.display()
        );

        let mut y_true = Vec::new();
        let mut columns: Vec<Vec<f64>> = vec![Vec::new(); names.len() - 1];

        for (row, line) in lines.enumerate() {
            let cells: Vec<&str> = line.split(',').map(|c| c.trim()).collect();
            anyhow::ensure!(
                cells.len() == names.len(),
                "row {} of '{}' has {} cells, expected {}",
                row + 2,
                self.path.display(),
                cells.len(),
                names.len()
            );
            let mut values = cells.iter().enumerate().map(|(col, cell)| {
                cell.parse::<f64>().with_context(|| {
                    format!(
                        "row {} column '{}' of '{}': '{}' is not a number",
                        row + 2,
                        names[col],
                        self.path.display(),
                        cell
                    )
                })
            });
            y_true.push(values.next().expect("header guarantees one column")?);
            for column in columns.iter_mut() {
                column.push(values.next().expect("cell count checked above")?);
            }
        }

        let readers = names
            .into_iter()
            .skip(1)
            .zip(columns)
            .map(|(name, y_pred)| ReaderPredictions { name, y_pred })
            .collect();

        Ok(EvaluationSet { y_true, readers })
    }
}

impl PredictionSource for CsvPredictionLoader {
    fn load(&self) -> Result<EvaluationSet> {
        let set = self.parse()?;
        anyhow::ensure!(
            !set.is_empty(),
            "'{}' contains a header but no data rows",
            self.path.display()
        );
        tracing::info!(
            "Loaded {} instances and {} reader column(s) from '{}'",
            set.len(),
            set.reader_count(),
            self.path.display()
        );
        Ok(set)
    }
}

impl LabelSource for CsvPredictionLoader {
    /// Training only needs the label column; reader columns, if any,
    /// are ignored here.
    fn load_labels(&self) -> Result<BinaryDataset> {
        let set = self.parse()?;
        BinaryDataset::new(set.y_true)
            .with_context(|| format!("invalid labels in '{}'", self.path.display()))
    }
}
