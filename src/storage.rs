//! Small serde-backed CSV tables kept next to the bookmark file.

use crate::app::errors::AppError;
use serde::{de::DeserializeOwned, Serialize};
use std::{
    path::{Path, PathBuf},
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard},
};

pub fn read_records<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for record in reader.deserialize() {
        records.push(record?);
    }
    Ok(records)
}

/// Write to a sibling temp file, then rename over `path`
pub fn write_records<'a, T: Serialize + 'a>(
    path: &Path,
    records: impl IntoIterator<Item = &'a T>,
) -> Result<(), AppError> {
    let mut temp_path = path.to_path_buf().into_os_string();
    temp_path.push("-tmp");

    let mut writer = csv::Writer::from_path(&temp_path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    std::fs::rename(&temp_path, path)?;

    Ok(())
}

/// A row that belongs to one user
pub trait OwnedRecord: Clone + Serialize + DeserializeOwned + Send + Sync {
    fn id(&self) -> u64;
    fn owner_id(&self) -> u64;
}

/// Whole-file CSV table. Every mutation is applied to a copy and only
/// becomes visible once the copy is on disk.
#[derive(Debug)]
pub struct CsvTable<T> {
    rows: Arc<RwLock<Vec<T>>>,
    path: PathBuf,
}

impl<T> Clone for CsvTable<T> {
    fn clone(&self) -> Self {
        Self {
            rows: self.rows.clone(),
            path: self.path.clone(),
        }
    }
}

impl<T: OwnedRecord> CsvTable<T> {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let rows = read_records::<T>(&path)?;

        log::debug!("loaded {} rows from {}", rows.len(), path.display());

        Ok(Self {
            rows: Arc::new(RwLock::new(rows)),
            path,
        })
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Vec<T>> {
        self.rows.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rows of one owner, in storage order
    pub fn owned_by(&self, owner: u64) -> Vec<T> {
        self.read()
            .iter()
            .filter(|row| row.owner_id() == owner)
            .cloned()
            .collect()
    }

    pub fn get(&self, owner: u64, id: u64) -> Result<T, AppError> {
        let rows = self.read();
        let idx = position(&rows, owner, id)?;
        Ok(rows[idx].clone())
    }

    pub fn next_id(rows: &[T]) -> u64 {
        rows.iter().map(OwnedRecord::id).max().unwrap_or(0) + 1
    }

    pub fn mutate<R>(
        &self,
        f: impl FnOnce(&mut Vec<T>) -> Result<R, AppError>,
    ) -> Result<R, AppError> {
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);

        let mut next = rows.clone();
        let result = f(&mut next)?;
        write_records(&self.path, &next)?;
        *rows = next;

        Ok(result)
    }
}

/// Find an owned row. Unknown id is `NotFound`, someone else's row is `Forbidden`.
pub fn position<T: OwnedRecord>(rows: &[T], owner: u64, id: u64) -> Result<usize, AppError> {
    let idx = rows
        .iter()
        .position(|row| row.id() == id)
        .ok_or(AppError::NotFound)?;

    if rows[idx].owner_id() != owner {
        log::warn!("owner {owner} attempted to access row {id}");
        return Err(AppError::Forbidden);
    }

    Ok(idx)
}
