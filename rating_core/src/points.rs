//! Point sources for lazily loaded rating tables.
//!
//! Ratings parsed without `<rating-points>` fetch their table on first use
//! from a [`PointSource`]. [`CsvPointStore`] keeps one CSV file per rating in a
//! directory, named `<spec-id>@<YYYYMMDDTHHMMSSZ>.csv`, with rows of
//! `ind_1,...,ind_k,dep`.

use crate::table::RatingTable;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// Supplies rating points for a specification and effective time
pub trait PointSource: Send + Sync {
    fn fetch_points(&self, spec_id: &str, effective_time: DateTime<Utc>) -> Result<RatingTable>;
}

const FILE_TIME_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Directory of CSV point files
#[derive(Clone, Debug)]
pub struct CsvPointStore {
    dir: PathBuf,
}

impl CsvPointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the points of one rating
    pub fn path_for(&self, spec_id: &str, effective_time: DateTime<Utc>) -> PathBuf {
        self.dir.join(format!(
            "{}@{}.csv",
            spec_id,
            effective_time.format(FILE_TIME_FORMAT)
        ))
    }

    /// Write a table's points, replacing any existing file
    pub fn store(
        &self,
        spec_id: &str,
        effective_time: DateTime<Utc>,
        table: &RatingTable,
    ) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(spec_id, effective_time);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        for row in table.points() {
            writer.serialize(row)?;
        }
        writer.flush()?;
        let file = writer
            .into_inner()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        file.sync_all()?;

        tracing::debug!("Stored {} points to {:?}", table.len(), path);
        Ok(path)
    }
}

impl PointSource for CsvPointStore {
    fn fetch_points(&self, spec_id: &str, effective_time: DateTime<Utc>) -> Result<RatingTable> {
        let path = self.path_for(spec_id, effective_time);
        if !path.exists() {
            return Err(Error::PointSource(format!(
                "No points for {} effective {} (expected {:?})",
                spec_id,
                effective_time.to_rfc3339(),
                path
            )));
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .from_path(&path)?;
        let mut rows: Vec<Vec<f64>> = Vec::new();
        for record in reader.deserialize() {
            rows.push(record?);
        }
        let width = rows.first().map(Vec::len).unwrap_or_default();
        if width < 2 {
            return Err(Error::PointSource(format!(
                "{:?} must hold rows of at least one independent and one dependent value",
                path
            )));
        }
        tracing::info!("Loaded {} points from {:?}", rows.len(), path);
        RatingTable::from_points(width - 1, &rows)
            .map_err(|e| Error::PointSource(format!("{:?}: {}", path, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn effective() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2009, 1, 14, 6, 0, 0).unwrap()
    }

    #[test]
    fn test_file_naming() {
        let store = CsvPointStore::new("/data/points");
        let path = store.path_for("KEYS.Elev;Stor.Linear.Production", effective());
        assert_eq!(
            path,
            PathBuf::from("/data/points/KEYS.Elev;Stor.Linear.Production@20090114T060000Z.csv")
        );
    }

    #[test]
    fn test_store_then_fetch() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = CsvPointStore::new(temp_dir.path());
        let table = RatingTable::from_points(
            2,
            &[
                vec![1.0, 10.0, 100.0],
                vec![1.0, 20.0, 200.0],
                vec![2.0, 10.0, 300.0],
            ],
        )
        .unwrap();
        store.store("LOC.A,B;C.T.S", effective(), &table).unwrap();
        let fetched = store.fetch_points("LOC.A,B;C.T.S", effective()).unwrap();
        assert_eq!(fetched, table);
    }

    #[test]
    fn test_comments_and_whitespace() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = CsvPointStore::new(temp_dir.path());
        let path = store.path_for("LOC.A;B.T.S", effective());
        std::fs::write(&path, "# elev,stor\n 1.0, 5.0\n2.0 ,7.5\n").unwrap();
        let table = store.fetch_points("LOC.A;B.T.S", effective()).unwrap();
        assert_eq!(table.points(), vec![vec![1.0, 5.0], vec![2.0, 7.5]]);
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = CsvPointStore::new(temp_dir.path());
        let result = store.fetch_points("LOC.A;B.T.S", effective());
        assert!(matches!(result, Err(Error::PointSource(_))));
    }

    #[test]
    fn test_unordered_points_are_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = CsvPointStore::new(temp_dir.path());
        let path = store.path_for("LOC.A;B.T.S", effective());
        std::fs::write(&path, "2.0,5.0\n1.0,7.5\n").unwrap();
        assert!(store.fetch_points("LOC.A;B.T.S", effective()).is_err());
    }
}
