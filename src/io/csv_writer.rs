use std::borrow::Cow;

use async_trait::async_trait;
use csv_async::AsyncSerializer;
use serde::Serialize;
use tokio::io::AsyncWrite;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use super::error::IoError;
use super::writer::RecordWriter;
use crate::domain::Record;

/// CSV row for one record; the header is derived from the field names
#[derive(Debug, Serialize)]
struct CsvRecordRow<'a> {
    shard_id: &'a str,
    sequence_number: &'a str,
    partition_key: &'a str,
    approximate_arrival: Option<String>,
    data: Cow<'a, str>,
}

impl<'a> From<&'a Record> for CsvRecordRow<'a> {
    fn from(record: &'a Record) -> Self {
        Self {
            shard_id: record.shard_id.as_str(),
            sequence_number: &record.sequence_number,
            partition_key: &record.partition_key,
            approximate_arrival: record.approximate_arrival.map(|ts| ts.to_rfc3339()),
            data: record.payload_text(),
        }
    }
}

/// Writes records as CSV rows with a header line
pub struct CsvRecordWriter<W: AsyncWrite + Unpin + Send> {
    serializer: AsyncSerializer<Compat<W>>,
}

impl<W: AsyncWrite + Unpin + Send> CsvRecordWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            serializer: AsyncSerializer::from_writer(writer.compat_write()),
        }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> RecordWriter for CsvRecordWriter<W> {
    async fn write_record(&mut self, record: &Record) -> Result<(), IoError> {
        self.serializer.serialize(CsvRecordRow::from(record)).await?;
        self.serializer.flush().await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), IoError> {
        self.serializer.flush().await?;
        Ok(())
    }
}
