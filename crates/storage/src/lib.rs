//! Flat-file persistence for the courier, order and business collections.
//!
//! Every collection lives in its own pretty-printed JSON file and is always
//! read and written whole. Writers go through [`JsonCollection::lock`], which
//! serializes load-mutate-save cycles per collection; readers may call
//! [`JsonCollection::load`] at any time because saves replace the file with a
//! rename.
//!
//! Lock order across collections is couriers, orders, business.

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::{
    io::ErrorKind,
    marker::PhantomData,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{
    fs,
    io::AsyncWriteExt,
    sync::{Mutex, MutexGuard},
};
use tracing::{debug, warn};

use shared::domain::{Business, Courier, Order};

pub const COURIERS_FILE: &str = "Cadetes.json";
pub const ORDERS_FILE: &str = "Pedidos.json";
pub const BUSINESS_FILE: &str = "Cadeteria.json";

#[derive(Clone)]
pub struct Storage {
    data_dir: PathBuf,
    couriers: JsonCollection<Vec<Courier>>,
    orders: JsonCollection<Vec<Order>>,
    business: JsonCollection<Business>,
}

impl Storage {
    pub async fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir).await.with_context(|| {
            format!("failed to create data directory '{}'", data_dir.display())
        })?;

        Ok(Self {
            couriers: JsonCollection::new(data_dir.join(COURIERS_FILE)),
            orders: JsonCollection::new(data_dir.join(ORDERS_FILE)),
            business: JsonCollection::new(data_dir.join(BUSINESS_FILE)),
            data_dir,
        })
    }

    pub fn couriers(&self) -> &JsonCollection<Vec<Courier>> {
        &self.couriers
    }

    pub fn orders(&self) -> &JsonCollection<Vec<Order>> {
        &self.orders
    }

    pub fn business(&self) -> &JsonCollection<Business> {
        &self.business
    }

    /// Confirms the data directory still accepts writes.
    pub async fn health_check(&self) -> Result<()> {
        let probe = self.data_dir.join(".healthz");
        fs::write(&probe, b"ok").await.with_context(|| {
            format!("data directory '{}' is not writable", self.data_dir.display())
        })?;
        fs::remove_file(&probe)
            .await
            .context("failed to remove health probe")?;
        Ok(())
    }
}

/// One JSON file holding a whole collection of `T`.
pub struct JsonCollection<T> {
    path: PathBuf,
    writer: Arc<Mutex<()>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for JsonCollection<T> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            writer: Arc::clone(&self.writer),
            _marker: PhantomData,
        }
    }
}

impl<T> JsonCollection<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Arc::new(Mutex::new(())),
            _marker: PhantomData,
        }
    }

    /// Reads the collection, falling back to `T::default()` when the file is
    /// missing, blank or unreadable.
    pub async fn load(&self) -> T {
        match read_json(&self.path).await {
            Ok(Some(value)) => value,
            Ok(None) => T::default(),
            Err(error) => {
                warn!(
                    path = %self.path.display(),
                    error = %format!("{error:#}"),
                    "ignoring unreadable collection file"
                );
                T::default()
            }
        }
    }

    /// Takes the single-writer lock for this collection.
    pub async fn lock(&self) -> CollectionGuard<'_, T> {
        let writer = self.writer.lock().await;
        CollectionGuard {
            collection: self,
            _writer: writer,
        }
    }
}

/// Exclusive write access to a collection for one load-mutate-save cycle.
pub struct CollectionGuard<'a, T> {
    collection: &'a JsonCollection<T>,
    _writer: MutexGuard<'a, ()>,
}

impl<T> CollectionGuard<'_, T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub async fn load(&self) -> T {
        self.collection.load().await
    }

    pub async fn save(&self, value: &T) -> Result<()> {
        let path = &self.collection.path;
        let json = serde_json::to_string_pretty(value)
            .with_context(|| format!("failed to serialize '{}'", path.display()))?;
        write_replacing(path, json.as_bytes()).await?;
        debug!(path = %path.display(), bytes = json.len(), "collection saved");
        Ok(())
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let raw = match fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
        Err(error) => {
            return Err(error).with_context(|| format!("failed to read '{}'", path.display()))
        }
    };

    let raw = raw.trim_start_matches('\u{feff}');
    if raw.trim().is_empty() {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(raw)
        .with_context(|| format!("'{}' is not valid JSON", path.display()))?;
    let parsed = serde_json::from_value(lowercase_keys(value))
        .with_context(|| format!("'{}' does not match the expected shape", path.display()))?;
    Ok(Some(parsed))
}

/// Lower-cases every object key so field names match regardless of case.
fn lowercase_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (key.to_lowercase(), lowercase_keys(value)))
                .collect::<Map<_, _>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(lowercase_keys).collect()),
        other => other,
    }
}

async fn write_replacing(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.with_context(|| {
            format!("failed to create parent directory '{}'", parent.display())
        })?;
    }

    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    let staging = PathBuf::from(staging);

    let mut file = fs::File::create(&staging)
        .await
        .with_context(|| format!("failed to create '{}'", staging.display()))?;
    file.write_all(bytes)
        .await
        .with_context(|| format!("failed to write '{}'", staging.display()))?;
    file.sync_all()
        .await
        .with_context(|| format!("failed to flush '{}'", staging.display()))?;
    drop(file);

    fs::rename(&staging, path).await.with_context(|| {
        format!(
            "failed to move '{}' over '{}'",
            staging.display(),
            path.display()
        )
    })?;
    Ok(())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
