// src/cache/parquet_store.rs

use arrow::{
    array::{Array, ArrayRef, Date32Array, Float64Array, StringArray, TimestampMicrosecondArray},
    datatypes::{DataType, Field, Schema, TimeUnit},
    record_batch::RecordBatch,
};
use chrono::{DateTime, Datelike, Duration, NaiveDate, SubsecRound, Utc};
use glob::glob;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use std::{
    collections::HashMap,
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tracing::{debug, info};

use super::{cache_key, CachedStats, StatsCache};
use crate::error::{HubError, Result};
use crate::fetch::Coordinates;

const TABLE: &str = "location_stats";
const CONSOLIDATED: &str = "consolidated.parquet";
/// Days from 0001-01-01 to 1970-01-01, for Date32 conversion.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Hive-partitioned Parquet cache of statistics payloads.
///
/// Layout: `<base>/location_stats/date=YYYYMMDD/<key>---<ts>.parquet`,
/// partitioned by processing date. Every entry is loaded into memory on open.
pub struct ParquetStatsCache {
    base_dir: PathBuf,
    schema: Arc<Schema>,
    freshness: Duration,
    entries: Mutex<HashMap<String, Vec<CachedStats>>>,
}

impl ParquetStatsCache {
    /// Open (or create) the cache under `base_dir` and load existing entries.
    pub fn open(base_dir: impl Into<PathBuf>, freshness_days: i64) -> Result<Self> {
        let base_dir = base_dir.into();
        let table_dir = base_dir.join(TABLE);
        fs::create_dir_all(&table_dir)?;

        let schema = Arc::new(schema());
        let mut entries: HashMap<String, Vec<CachedStats>> = HashMap::new();
        let mut files = 0usize;

        for part in fs::read_dir(&table_dir)? {
            let part = part?;
            if !part.file_type()?.is_dir() {
                continue;
            }
            for path in parquet_files(&part.path())? {
                files += 1;
                for entry in read_entries(&path)? {
                    entries.entry(entry.key()).or_default().push(entry);
                }
            }
        }
        info!(
            dir = %table_dir.display(),
            files,
            locations = entries.len(),
            "opened stats cache"
        );

        Ok(Self {
            base_dir,
            schema,
            freshness: Duration::days(freshness_days),
            entries: Mutex::new(entries),
        })
    }

    fn table_dir(&self) -> PathBuf {
        self.base_dir.join(TABLE)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<CachedStats>>>> {
        self.entries
            .lock()
            .map_err(|_| HubError::Cache("cache index lock poisoned".into()))
    }

    /// Number of cached entries across all locations.
    pub fn len(&self) -> usize {
        self.lock().map(|m| m.values().map(Vec::len).sum()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consolidate each partition into a single file.
    pub fn vacuum(&self) -> Result<()> {
        for part in fs::read_dir(self.table_dir())? {
            let part = part?;
            if !part.file_type()?.is_dir() {
                continue;
            }
            let dir = part.path();
            let files = parquet_files(&dir)?;
            if files.len() < 2 {
                continue;
            }

            let tmp = dir.join(format!("{}.tmp", CONSOLIDATED));
            let file = File::create(&tmp)?;
            let mut writer = ArrowWriter::try_new(BufWriter::new(file), self.schema.clone(), None)?;
            for p in &files {
                let f = File::open(p)?;
                let mut reader = ParquetRecordBatchReaderBuilder::try_new(f)?
                    .with_batch_size(1024)
                    .build()?;
                while let Some(batch) = reader.next().transpose()? {
                    writer.write(&batch)?;
                }
            }
            writer.close()?;
            fs::rename(&tmp, dir.join(CONSOLIDATED))?;

            for p in files {
                if p.file_name().and_then(|n| n.to_str()) != Some(CONSOLIDATED) {
                    fs::remove_file(p)?;
                }
            }
            debug!(partition = %dir.display(), "vacuumed");
        }
        Ok(())
    }
}

impl StatsCache for ParquetStatsCache {
    fn lookup(&self, location: &str, now: DateTime<Utc>) -> Result<Option<CachedStats>> {
        let key = cache_key(location);
        let cutoff = now - self.freshness;
        let entries = self.lock()?;
        let hit = entries.get(&key).and_then(|list| {
            list.iter()
                .filter(|e| e.processed_at >= cutoff)
                .max_by_key(|e| (e.as_of_date, e.processed_at))
                .cloned()
        });
        debug!(%key, hit = hit.is_some(), "cache lookup");
        Ok(hit)
    }

    fn store(&self, entry: &CachedStats) -> Result<()> {
        let key = entry.key();
        let partition = format!("date={}", entry.processed_at.date_naive().format("%Y%m%d"));
        let dir = self.table_dir().join(partition);
        fs::create_dir_all(&dir)?;

        let fname = format!(
            "{}---{}.parquet",
            file_stem(&key),
            entry.processed_at.timestamp_micros()
        );
        let tmp = dir.join(format!("{}.tmp", fname));
        let final_path = dir.join(&fname);

        let batch = RecordBatch::try_new(self.schema.clone(), to_arrays(entry)?)?;
        let file = File::create(&tmp)?;
        let mut writer = ArrowWriter::try_new(BufWriter::new(file), self.schema.clone(), None)?;
        writer.write(&batch)?;
        writer.close()?;
        fs::rename(&tmp, &final_path)?;

        // parquet keeps microseconds; the index must match what a reopen reads
        let mut indexed = entry.clone();
        indexed.processed_at = indexed.processed_at.trunc_subsecs(6);
        self.lock()?.entry(key).or_default().push(indexed);
        info!(path = %final_path.display(), "cached stats");
        Ok(())
    }
}

fn schema() -> Schema {
    Schema::new(vec![
        Field::new("location", DataType::Utf8, false),
        Field::new("latitude", DataType::Float64, false),
        Field::new("longitude", DataType::Float64, false),
        Field::new("as_of_date", DataType::Date32, true),
        Field::new(
            "processed_at",
            DataType::Timestamp(TimeUnit::Microsecond, None),
            false,
        ),
        Field::new("payload", DataType::Utf8, false),
        Field::new("nearby_places", DataType::Utf8, false),
        Field::new("driving_commute", DataType::Utf8, true),
        Field::new("transit_commute", DataType::Utf8, true),
    ])
}

fn to_arrays(e: &CachedStats) -> Result<Vec<ArrayRef>> {
    Ok(vec![
        Arc::new(StringArray::from(vec![e.location.clone()])),
        Arc::new(Float64Array::from(vec![e.coordinates.latitude])),
        Arc::new(Float64Array::from(vec![e.coordinates.longitude])),
        Arc::new(Date32Array::from(vec![e.as_of_date.map(to_date32)])),
        Arc::new(TimestampMicrosecondArray::from(vec![e
            .processed_at
            .timestamp_micros()])),
        Arc::new(StringArray::from(vec![serde_json::to_string(&e.payload)?])),
        Arc::new(StringArray::from(vec![serde_json::to_string(
            &e.nearby_places,
        )?])),
        Arc::new(StringArray::from(vec![e.driving_commute.clone()])),
        Arc::new(StringArray::from(vec![e.transit_commute.clone()])),
    ])
}

fn read_entries(path: &Path) -> Result<Vec<CachedStats>> {
    let file = File::open(path)?;
    let mut reader = ParquetRecordBatchReaderBuilder::try_new(file)?
        .with_batch_size(1024)
        .build()?;
    let mut out = Vec::new();
    while let Some(batch) = reader.next().transpose()? {
        let location = column::<StringArray>(&batch, "location")?;
        let lat = column::<Float64Array>(&batch, "latitude")?;
        let lng = column::<Float64Array>(&batch, "longitude")?;
        let as_of = column::<Date32Array>(&batch, "as_of_date")?;
        let processed = column::<TimestampMicrosecondArray>(&batch, "processed_at")?;
        let payload = column::<StringArray>(&batch, "payload")?;
        let nearby = column::<StringArray>(&batch, "nearby_places")?;
        let driving = column::<StringArray>(&batch, "driving_commute")?;
        let transit = column::<StringArray>(&batch, "transit_commute")?;

        for i in 0..batch.num_rows() {
            let processed_at = DateTime::from_timestamp_micros(processed.value(i)).ok_or_else(
                || HubError::Cache(format!("bad processed_at in {}", path.display())),
            )?;
            out.push(CachedStats {
                location: location.value(i).to_string(),
                coordinates: Coordinates {
                    latitude: lat.value(i),
                    longitude: lng.value(i),
                },
                as_of_date: if as_of.is_null(i) {
                    None
                } else {
                    from_date32(as_of.value(i))
                },
                processed_at,
                payload: serde_json::from_str(payload.value(i))?,
                nearby_places: serde_json::from_str(nearby.value(i))?,
                driving_commute: optional(driving, i),
                transit_commute: optional(transit, i),
            });
        }
    }
    Ok(out)
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| HubError::Cache(format!("column `{}` missing or mistyped", name)))
}

fn optional(arr: &StringArray, i: usize) -> Option<String> {
    if arr.is_null(i) {
        None
    } else {
        Some(arr.value(i).to_string())
    }
}

fn parquet_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in glob(&format!("{}/*.parquet", dir.display()))? {
        files.push(entry?);
    }
    Ok(files)
}

fn to_date32(d: NaiveDate) -> i32 {
    d.num_days_from_ce() - EPOCH_DAYS_FROM_CE
}

fn from_date32(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days + EPOCH_DAYS_FROM_CE)
}

/// Keep file names portable whatever the location text holds.
fn file_stem(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}
