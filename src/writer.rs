//! Partitioned Parquet output writer.
//!
//! Owns the output dataset lifecycle (`open` / `write` / `close`), derives
//! Hive-style `year=/month=/day=` partition paths from record timestamps,
//! and keeps running counters for the close-time status report. One writer
//! instance owns the dataset exclusively for its Open-state lifetime.

use ahash::AHashMap;
use arrow::array::{ArrayRef, StringBuilder, TimestampMillisecondBuilder, UInt16Builder};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Datelike, Utc};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::collections::hash_map::Entry;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::enrich::CacheStats;
use crate::error::{Error, Result};
use crate::record::AssembledRecord;

/// Rows buffered per partition before a record batch is cut.
pub const DEFAULT_BATCH_ROWS: usize = 4096;

/// Partition keys derived from a record's timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartitionKey {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl PartitionKey {
    pub fn from_timestamp(ts: DateTime<Utc>) -> Self {
        Self {
            year: ts.year(),
            month: ts.month(),
            day: ts.day(),
        }
    }

    /// Sub-path under the dataset root for this partition.
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(format!("year={}", self.year))
            .join(format!("month={}", self.month))
            .join(format!("day={}", self.day))
    }
}

/// Arrow schema of the output records.
pub fn output_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(
            "ts",
            DataType::Timestamp(TimeUnit::Millisecond, None),
            false,
        ),
        Field::new("src", DataType::Utf8, false),
        Field::new("dst", DataType::Utf8, false),
        Field::new("src_port", DataType::UInt16, false),
        Field::new("dst_port", DataType::UInt16, false),
        Field::new("proto", DataType::Utf8, false),
        Field::new("dns_id", DataType::UInt16, false),
        Field::new("qname", DataType::Utf8, false),
        Field::new("qtype", DataType::UInt16, false),
        Field::new("rcode", DataType::UInt16, true),
        Field::new("ancount", DataType::UInt16, true),
        Field::new("resolver", DataType::Utf8, true),
        Field::new("country", DataType::Utf8, true),
        Field::new("asn", DataType::Utf8, true),
    ]))
}

/// Column builders for one pending record batch.
struct BatchBuilder {
    schema: SchemaRef,
    ts: TimestampMillisecondBuilder,
    src: StringBuilder,
    dst: StringBuilder,
    src_port: UInt16Builder,
    dst_port: UInt16Builder,
    proto: StringBuilder,
    dns_id: UInt16Builder,
    qname: StringBuilder,
    qtype: UInt16Builder,
    rcode: UInt16Builder,
    ancount: UInt16Builder,
    resolver: StringBuilder,
    country: StringBuilder,
    asn: StringBuilder,
    rows: usize,
}

impl BatchBuilder {
    fn new(schema: SchemaRef) -> Self {
        Self {
            schema,
            ts: TimestampMillisecondBuilder::new(),
            src: StringBuilder::new(),
            dst: StringBuilder::new(),
            src_port: UInt16Builder::new(),
            dst_port: UInt16Builder::new(),
            proto: StringBuilder::new(),
            dns_id: UInt16Builder::new(),
            qname: StringBuilder::new(),
            qtype: UInt16Builder::new(),
            rcode: UInt16Builder::new(),
            ancount: UInt16Builder::new(),
            resolver: StringBuilder::new(),
            country: StringBuilder::new(),
            asn: StringBuilder::new(),
            rows: 0,
        }
    }

    fn append(&mut self, record: &AssembledRecord) {
        self.ts.append_value(record.timestamp.timestamp_millis());
        self.src.append_value(record.src.to_string());
        self.dst.append_value(record.dst.to_string());
        self.src_port.append_value(record.src_port);
        self.dst_port.append_value(record.dst_port);
        self.proto.append_value(record.protocol.as_str());
        self.dns_id.append_value(record.dns_id);
        self.qname.append_value(&record.qname);
        self.qtype.append_value(record.qtype);
        self.rcode.append_option(record.rcode);
        self.ancount.append_option(record.answer_count);
        self.resolver.append_option(record.resolver.as_deref());
        self.country.append_option(record.country.as_deref());
        self.asn.append_option(record.asn.as_deref());
        self.rows += 1;
    }

    fn len(&self) -> usize {
        self.rows
    }

    /// Cut the pending rows into a record batch, resetting the builders.
    fn finish(&mut self) -> Result<RecordBatch> {
        let columns: Vec<ArrayRef> = vec![
            Arc::new(self.ts.finish()),
            Arc::new(self.src.finish()),
            Arc::new(self.dst.finish()),
            Arc::new(self.src_port.finish()),
            Arc::new(self.dst_port.finish()),
            Arc::new(self.proto.finish()),
            Arc::new(self.dns_id.finish()),
            Arc::new(self.qname.finish()),
            Arc::new(self.qtype.finish()),
            Arc::new(self.rcode.finish()),
            Arc::new(self.ancount.finish()),
            Arc::new(self.resolver.finish()),
            Arc::new(self.country.finish()),
            Arc::new(self.asn.finish()),
        ];
        self.rows = 0;
        Ok(RecordBatch::try_new(self.schema.clone(), columns)?)
    }
}

/// One open partition: pending rows plus its Parquet file writer.
struct PartitionSink {
    builder: BatchBuilder,
    writer: ArrowWriter<File>,
}

impl PartitionSink {
    fn create(root: &Path, key: PartitionKey, schema: SchemaRef) -> Result<Self> {
        let dir = root.join(key.relative_path());
        fs::create_dir_all(&dir)
            .map_err(|e| Error::DatasetCreationFailure(format!("{}: {}", dir.display(), e)))?;

        let path = dir.join("part-00000.parquet");
        let file = File::create(&path)
            .map_err(|e| Error::DatasetCreationFailure(format!("{}: {}", path.display(), e)))?;

        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let writer = ArrowWriter::try_new(file, schema.clone(), Some(props))
            .map_err(|e| Error::DatasetCreationFailure(e.to_string()))?;

        log::info!("opened partition file {}", path.display());
        Ok(Self {
            builder: BatchBuilder::new(schema),
            writer,
        })
    }

    fn flush(&mut self) -> Result<()> {
        if self.builder.len() == 0 {
            return Ok(());
        }
        let batch = self.builder.finish()?;
        self.writer.write(&batch)?;
        Ok(())
    }

    fn finish(mut self) -> Result<()> {
        self.flush()?;
        self.writer.close()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    /// Initial state, nothing created yet
    Closed,
    Open,
    /// Terminal: reopening requires a new instance
    Finished,
}

/// Writer for the partitioned output dataset.
///
/// State machine: `Closed → Open → Finished`. `write` outside the Open
/// state is a programming error and fails with `InvalidState`; `close` is
/// idempotent.
pub struct PartitionedWriter {
    root: PathBuf,
    schema: SchemaRef,
    state: WriterState,
    batch_rows: usize,
    partitions: AHashMap<PartitionKey, PartitionSink>,
    partitions_opened: usize,
    records_written: u64,
}

impl PartitionedWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            schema: output_schema(),
            state: WriterState::Closed,
            batch_rows: DEFAULT_BATCH_ROWS,
            partitions: AHashMap::new(),
            partitions_opened: 0,
            records_written: 0,
        }
    }

    /// Override the per-partition row-buffer size.
    pub fn with_batch_rows(mut self, rows: usize) -> Self {
        self.batch_rows = rows.max(1);
        self
    }

    /// Create/open the destination dataset.
    ///
    /// A stale `.metadata` sidecar left by an aborted run is removed first;
    /// failing to remove it aborts the open, as does any creation error.
    /// Creation failures are not retried here.
    pub fn open(&mut self) -> Result<()> {
        if self.state != WriterState::Closed {
            return Err(Error::InvalidState);
        }

        let metadata_dir = self.root.join(".metadata");
        if metadata_dir.exists() {
            fs::remove_dir_all(&metadata_dir).map_err(|e| Error::DatasetStaleState {
                path: metadata_dir.clone(),
                source: e,
            })?;
            log::info!("removed stale metadata sidecar {}", metadata_dir.display());
        }

        fs::create_dir_all(&self.root).map_err(|e| {
            Error::DatasetCreationFailure(format!("{}: {}", self.root.display(), e))
        })?;

        log::info!("created dataset at {}", self.root.display());
        self.state = WriterState::Open;
        Ok(())
    }

    /// Append one record under its timestamp-derived partition.
    pub fn write(&mut self, record: &AssembledRecord) -> Result<()> {
        if self.state != WriterState::Open {
            return Err(Error::InvalidState);
        }

        let key = PartitionKey::from_timestamp(record.timestamp);
        let sink = match self.partitions.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                self.partitions_opened += 1;
                entry.insert(PartitionSink::create(
                    &self.root,
                    key,
                    self.schema.clone(),
                )?)
            }
        };

        sink.builder.append(record);
        if sink.builder.len() >= self.batch_rows {
            sink.flush()?;
        }

        self.records_written += 1;
        Ok(())
    }

    /// Emit final status, then flush and release the dataset.
    ///
    /// Calling close on a writer that is not open is a no-op.
    pub fn close(&mut self, stats: &CacheStats) -> Result<()> {
        if self.state != WriterState::Open {
            return Ok(());
        }

        for (_, sink) in self.partitions.drain() {
            sink.finish()?;
        }
        self.state = WriterState::Finished;
        self.show_status(stats);
        Ok(())
    }

    fn show_status(&self, stats: &CacheStats) {
        log::info!("---------- Parquet writer status ----------");
        log::info!("{} records written", self.records_written);
        log::info!("partitions: {}", self.partitions_opened);
        log::info!("countries: {}", stats.distinct_countries);
        log::info!("geo_ip_cache: {}", stats.geo_entries);
        log::info!("asn_cache: {}", stats.asn_entries);
        log::info!("--------------------------------------------");
    }

    pub fn is_open(&self) -> bool {
        self.state == WriterState::Open
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    pub fn partitions_opened(&self) -> usize {
        self.partitions_opened
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
