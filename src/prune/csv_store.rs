use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::{Account, AccountStore, MemoryAccountStore};

#[derive(Debug, Error)]
pub enum CsvStoreError {
    #[error("csv error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CsvStoreError {
    fn csv(path: &Path, source: csv::Error) -> Self {
        Self::Csv {
            path: path.to_path_buf(),
            source,
        }
    }

    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Row {
    user_id: u64,
    email: String,
    last_seen: i64,
    #[serde(default, with = "yes_no")]
    banned: bool,
}

/// File-backed [`AccountStore`] over a CSV table with the header
/// `user_id,email,last_seen,banned`. Flags live in memory until
/// [`commit`](AccountStore::commit) rewrites the file.
#[derive(Debug)]
pub struct CsvAccountStore {
    path: PathBuf,
    inner: MemoryAccountStore,
}

impl CsvAccountStore {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CsvStoreError> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|err| CsvStoreError::csv(path, err))?;

        let mut inner = MemoryAccountStore::new();
        for row in reader.deserialize::<Row>() {
            let row = row.map_err(|err| CsvStoreError::csv(path, err))?;
            inner.insert(Account::new(row.user_id, row.email, row.last_seen), row.banned);
        }
        debug!(path = %path.display(), accounts = inner.len(), "account table loaded");

        Ok(Self {
            path: path.to_path_buf(),
            inner,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn accounts(&self) -> &MemoryAccountStore {
        &self.inner
    }

    /// Rewrites the whole table through a temporary file and a rename.
    pub fn save(&self) -> Result<(), CsvStoreError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for (account, banned) in self.inner.iter() {
            writer
                .serialize(Row {
                    user_id: account.user_id,
                    email: account.email.clone(),
                    last_seen: account.last_seen,
                    banned,
                })
                .map_err(|err| CsvStoreError::csv(&self.path, err))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|err| CsvStoreError::io(&self.path, err.into_error()))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        {
            let mut file = File::create(&tmp).map_err(|err| CsvStoreError::io(&tmp, err))?;
            file.write_all(&bytes)
                .map_err(|err| CsvStoreError::io(&tmp, err))?;
            file.sync_all().map_err(|err| CsvStoreError::io(&tmp, err))?;
        }
        fs::rename(&tmp, &self.path).map_err(|err| CsvStoreError::io(&self.path, err))?;
        debug!(path = %self.path.display(), "account table saved");
        Ok(())
    }
}

impl AccountStore for CsvAccountStore {
    type Error = CsvStoreError;

    fn count_inactive(&self, cutoff: i64) -> Result<u64, CsvStoreError> {
        let Ok(count) = self.inner.count_inactive(cutoff);
        Ok(count)
    }

    fn inactive_accounts(
        &self,
        cutoff: i64,
        after: Option<u64>,
        limit: usize,
    ) -> Result<Vec<Account>, CsvStoreError> {
        let Ok(page) = self.inner.inactive_accounts(cutoff, after, limit);
        Ok(page)
    }

    fn mark_invalid(&mut self, user_id: u64) -> Result<bool, CsvStoreError> {
        let Ok(changed) = self.inner.mark_invalid(user_id);
        Ok(changed)
    }

    fn commit(&mut self) -> Result<(), CsvStoreError> {
        self.save()
    }
}

mod yes_no {
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "yes" } else { "no" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.trim().to_ascii_lowercase().as_str() {
            "yes" | "true" | "1" => Ok(true),
            "no" | "false" | "0" | "" => Ok(false),
            other => Err(de::Error::custom(format!("expected yes/no, got '{other}'"))),
        }
    }
}
