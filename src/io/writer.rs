use async_trait::async_trait;
use clap::ValueEnum;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::csv_writer::CsvRecordWriter;
use super::error::IoError;
use crate::domain::Record;

/// Destination for tailed records
#[async_trait]
pub trait RecordWriter: Send {
    async fn write_record(&mut self, record: &Record) -> Result<(), IoError>;

    async fn flush(&mut self) -> Result<(), IoError>;
}

/// How records are rendered on the output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One payload per line, decoded as text
    #[default]
    Lines,
    /// One CSV row per record, with shard and sequence metadata
    Csv,
}

impl OutputFormat {
    /// Build the writer for this format on top of `writer`
    pub fn writer<W>(self, writer: W) -> Box<dyn RecordWriter>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        match self {
            Self::Lines => Box::new(LineWriter::new(writer)),
            Self::Csv => Box::new(CsvRecordWriter::new(writer)),
        }
    }
}

/// Writes each payload as one newline-terminated line
///
/// Flushes after every record so output keeps up with the stream.
pub struct LineWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin + Send> LineWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> RecordWriter for LineWriter<W> {
    async fn write_record(&mut self, record: &Record) -> Result<(), IoError> {
        self.inner
            .write_all(record.payload_text().as_bytes())
            .await?;
        self.inner.write_all(b"\n").await?;
        self.inner.flush().await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), IoError> {
        self.inner.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl<W: RecordWriter + ?Sized> RecordWriter for Box<W> {
    async fn write_record(&mut self, record: &Record) -> Result<(), IoError> {
        (**self).write_record(record).await
    }

    async fn flush(&mut self) -> Result<(), IoError> {
        (**self).flush().await
    }
}
