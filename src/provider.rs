use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::debug;

use crate::error::CckError;
use crate::schema::provider;

/// Opaque handle over a per-realization columnar dataset.
///
/// Column names are stable across realizations of one provider, and
/// `realizations()` is non-empty and sorted ascending. Every
/// `get_column_data` result carries a `realization` column identifying the
/// source member.
pub trait TableProvider: Send + Sync {
    fn column_names(&self) -> &[String];

    fn realizations(&self) -> &[i32];

    /// Rows for the requested columns, concatenated over the requested
    /// realizations (all of them when `realizations` is `None`), in
    /// ascending realization order.
    fn get_column_data(
        &self,
        columns: &[&str],
        realizations: Option<&[i32]>,
    ) -> Result<DataFrame, CckError>;
}

/// Shared storage for the concrete providers: one frame per realization,
/// loaded up front, schema checked for stability.
#[derive(Debug)]
struct EnsembleFrames {
    context: String,
    column_names: Vec<String>,
    realizations: Vec<i32>,
    frames: BTreeMap<i32, DataFrame>,
}

impl EnsembleFrames {
    fn new(context: String, frames: Vec<(i32, DataFrame)>) -> Result<Self, CckError> {
        if frames.is_empty() {
            return Err(CckError::InvalidSelection(format!(
                "No realizations found for {context}"
            )));
        }
        let mut sorted: BTreeMap<i32, DataFrame> = BTreeMap::new();
        for (real, df) in frames {
            sorted.insert(real, df);
        }
        let first = sorted.values().next().unwrap();
        let column_names: Vec<String> = first
            .get_column_names_str()
            .iter()
            .map(|c| c.to_string())
            .collect();
        for (real, df) in &sorted {
            let names: Vec<String> = df
                .get_column_names_str()
                .iter()
                .map(|c| c.to_string())
                .collect();
            let missing: Vec<&str> = column_names
                .iter()
                .filter(|c| !names.contains(c))
                .map(|c| c.as_str())
                .collect();
            if !missing.is_empty() {
                return Err(CckError::missing_columns(
                    &format!("realization {real} of {context}"),
                    &missing,
                    &names,
                ));
            }
        }
        let realizations: Vec<i32> = sorted.keys().copied().collect();
        Ok(Self {
            context,
            column_names,
            realizations,
            frames: sorted,
        })
    }

    fn get_column_data(
        &self,
        columns: &[&str],
        realizations: Option<&[i32]>,
    ) -> Result<DataFrame, CckError> {
        let missing: Vec<&str> = columns
            .iter()
            .filter(|c| **c != provider::REALIZATION && !self.column_names.iter().any(|n| n == *c))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(CckError::missing_columns(
                &self.context,
                &missing,
                &self.column_names,
            ));
        }
        let selected: Vec<&str> = columns
            .iter()
            .filter(|c| **c != provider::REALIZATION)
            .copied()
            .collect();

        let requested: Vec<i32> = match realizations {
            Some(reals) => {
                for real in reals {
                    if !self.frames.contains_key(real) {
                        return Err(CckError::InvalidSelection(format!(
                            "Realization {real} not present in {}",
                            self.context
                        )));
                    }
                }
                let mut reals = reals.to_vec();
                reals.sort_unstable();
                reals
            }
            None => self.realizations.clone(),
        };

        let mut out: Option<DataFrame> = None;
        for real in requested {
            let df = &self.frames[&real];
            let mut part = df.select(selected.iter().copied())?;
            part.with_column(Series::new(
                provider::REALIZATION.into(),
                vec![real; part.height()],
            ))?;
            out = Some(match out {
                Some(acc) => acc.vstack(&part)?,
                None => part,
            });
        }
        // An explicitly empty realization slice yields an empty frame with
        // the provider schema.
        match out {
            Some(df) => Ok(df),
            None => {
                let mut empty = self.frames[&self.realizations[0]]
                    .select(selected.iter().copied())?
                    .clear();
                empty.with_column(Series::new(provider::REALIZATION.into(), Vec::<i32>::new()))?;
                Ok(empty)
            }
        }
    }
}

/// Table provider over per-realization CSV or Parquet files laid out as
/// `<ensemble_root>/realization-<N>/<table_relpath>`.
///
/// Files are read eagerly at construction; a realization directory without
/// the table file is skipped.
pub struct CsvEnsembleTableProvider {
    inner: EnsembleFrames,
}

impl CsvEnsembleTableProvider {
    pub fn new(ensemble_root: &Path, table_relpath: &str) -> Result<Self, CckError> {
        let context = format!("{} ({})", ensemble_root.display(), table_relpath);
        let mut frames = Vec::new();
        for (real, root) in realization_roots(ensemble_root)? {
            let path = root.join(table_relpath);
            if !path.is_file() {
                debug!(realization = real, path = %path.display(), "table file absent, skipping realization");
                continue;
            }
            frames.push((real, read_table(&path)?));
        }
        let inner = EnsembleFrames::new(context, frames)?;
        Ok(Self { inner })
    }
}

impl TableProvider for CsvEnsembleTableProvider {
    fn column_names(&self) -> &[String] {
        &self.inner.column_names
    }

    fn realizations(&self) -> &[i32] {
        &self.inner.realizations
    }

    fn get_column_data(
        &self,
        columns: &[&str],
        realizations: Option<&[i32]>,
    ) -> Result<DataFrame, CckError> {
        self.inner.get_column_data(columns, realizations)
    }
}

/// Table provider over frames already in memory. Used by host adapters and
/// tests.
#[derive(Debug)]
pub struct InMemoryTableProvider {
    inner: EnsembleFrames,
}

impl InMemoryTableProvider {
    pub fn new(context: &str, frames: Vec<(i32, DataFrame)>) -> Result<Self, CckError> {
        let inner = EnsembleFrames::new(context.to_string(), frames)?;
        Ok(Self { inner })
    }
}

impl TableProvider for InMemoryTableProvider {
    fn column_names(&self) -> &[String] {
        &self.inner.column_names
    }

    fn realizations(&self) -> &[i32] {
        &self.inner.realizations
    }

    fn get_column_data(
        &self,
        columns: &[&str],
        realizations: Option<&[i32]>,
    ) -> Result<DataFrame, CckError> {
        self.inner.get_column_data(columns, realizations)
    }
}

/// Map realization id to its root directory, from `realization-<N>`
/// subdirectories of the ensemble root.
pub fn realization_roots(ensemble_root: &Path) -> Result<BTreeMap<i32, PathBuf>, CckError> {
    let mut roots = BTreeMap::new();
    for entry in std::fs::read_dir(ensemble_root)? {
        let entry = entry?;
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if let Some(num) = name.strip_prefix("realization-") {
            if let Ok(real) = num.parse::<i32>() {
                roots.insert(real, entry.path());
            }
        }
    }
    Ok(roots)
}

fn read_table(path: &Path) -> Result<DataFrame, CckError> {
    let is_parquet = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("parquet"));
    let mut df = if is_parquet {
        ParquetReader::new(File::open(path)?).finish()?
    } else {
        CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?
    };

    // Trim whitespace from column names
    let trimmed: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|c| c.trim().to_string())
        .collect();
    df.set_column_names(trimmed.as_slice())?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    fn containment_frame(amount: f64) -> DataFrame {
        df!(
            "date" => ["2020-01-01", "2030-01-01"],
            "amount" => [amount / 2.0, amount],
            "phase" => ["total", "total"],
        )
        .unwrap()
    }

    #[test]
    fn in_memory_provider_appends_realization_column() {
        let provider = InMemoryTableProvider::new(
            "test table",
            vec![(3, containment_frame(2.0)), (1, containment_frame(1.0))],
        )
        .unwrap();
        assert_eq!(provider.realizations(), &[1, 3]);

        let df = provider.get_column_data(&["date", "amount"], None).unwrap();
        assert_eq!(df.height(), 4);
        let reals: Vec<i32> = df
            .column("realization")
            .unwrap()
            .i32()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(reals, vec![1, 1, 3, 3]);
    }

    #[test]
    fn selection_of_unknown_realization_is_rejected() {
        let provider =
            InMemoryTableProvider::new("test table", vec![(0, containment_frame(1.0))]).unwrap();
        let err = provider
            .get_column_data(&["amount"], Some(&[7]))
            .unwrap_err();
        assert!(matches!(err, CckError::InvalidSelection(_)));
    }

    #[test]
    fn missing_column_is_a_schema_mismatch() {
        let provider =
            InMemoryTableProvider::new("test table", vec![(0, containment_frame(1.0))]).unwrap();
        let err = provider
            .get_column_data(&["amount", "no_such_column"], None)
            .unwrap_err();
        match err {
            CckError::SchemaMismatch { missing, .. } => {
                assert_eq!(missing, vec!["no_such_column".to_string()]);
            }
            other => panic!("expected SchemaMismatch, got {other:?}"),
        }
    }

    #[test]
    fn unstable_schema_across_realizations_is_rejected() {
        let other = df!("date" => ["2020-01-01"], "volume" => [1.0]).unwrap();
        let err = InMemoryTableProvider::new(
            "test table",
            vec![(0, containment_frame(1.0)), (1, other)],
        )
        .unwrap_err();
        assert!(matches!(err, CckError::SchemaMismatch { .. }));
    }

    #[test]
    fn csv_ensemble_provider_reads_realization_dirs() {
        let root = std::env::temp_dir().join(format!("cck-provider-{}", std::process::id()));
        for real in [0, 1] {
            let dir = root.join(format!("realization-{real}")).join("tables");
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(
                dir.join("co2_volumes.csv"),
                "date,amount,phase\n2020-01-01,1.5,total\n",
            )
            .unwrap();
        }
        // A directory without the table file is skipped, not an error.
        std::fs::create_dir_all(root.join("realization-2")).unwrap();

        let provider =
            CsvEnsembleTableProvider::new(&root, "tables/co2_volumes.csv").unwrap();
        assert_eq!(provider.realizations(), &[0, 1]);
        assert_eq!(
            provider.column_names(),
            &["date".to_string(), "amount".to_string(), "phase".to_string()]
        );
        let df = provider.get_column_data(&["amount"], Some(&[1])).unwrap();
        assert_eq!(df.height(), 1);

        std::fs::remove_dir_all(&root).ok();
    }
}
