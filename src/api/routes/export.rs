//! Export Routes
//!
//! Data export endpoint for backup and analysis.
//!
//! - GET /api/v1/export/ - Export readings as a streamed CSV download

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::stream;
use std::io::{self, Write};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::export::{LevelCsvWriter, EXPORT_FILENAME};
use crate::query::{ListParams, QueryEngine};
use crate::storage::{LevelFilter, StorageError, StorageResult};

/// Bytes buffered before a chunk is handed to the response body
const CHUNK_SIZE: usize = 64 * 1024;

/// Chunks in flight between the scan and the client
const CHANNEL_DEPTH: usize = 8;

type Chunk = Result<Vec<u8>, io::Error>;

/// GET /api/v1/export/
///
/// Every matching reading as `user_id,timestamp,value` rows ordered by
/// timestamp. With no parameters the whole store is exported. Rows are
/// produced by a blocking store scan and streamed as they are written.
pub async fn export_levels(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Response> {
    let filter = ListParams::from_pairs(pairs).to_filter();
    let engine = Arc::clone(&state.engine);
    let (tx, rx) = mpsc::channel::<Chunk>(CHANNEL_DEPTH);

    tokio::task::spawn_blocking(move || {
        match write_export(&engine, &filter, ChannelWriter::new(tx.clone())) {
            Ok(rows) => tracing::info!(rows, ?filter, "Export finished"),
            Err(e) => {
                tracing::error!(error = %e, ?filter, "Export aborted");
                let _ = tx.blocking_send(Err(io::Error::new(io::ErrorKind::Other, e.to_string())));
            }
        }
    });

    let body = stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (chunk, rx))
    });

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", EXPORT_FILENAME),
            ),
        ],
        Body::from_stream(body),
    )
        .into_response())
}

/// Scan the store into a CSV writer, returning the number of rows
fn write_export<W: Write>(engine: &QueryEngine, filter: &LevelFilter, out: W) -> StorageResult<usize> {
    let mut writer = LevelCsvWriter::new(out).map_err(csv_to_storage)?;
    engine.scan(filter, |level| writer.write(&level).map_err(csv_to_storage))?;
    let rows = writer.rows();
    writer.finish().map_err(csv_to_storage)?;
    Ok(rows)
}

fn csv_to_storage(e: csv::Error) -> StorageError {
    StorageError::Io(e.into())
}

/// `io::Write` adapter that forwards fixed-size chunks over a channel
///
/// Fails with `BrokenPipe` once the response body is dropped, which stops
/// the scan early when a client disconnects.
struct ChannelWriter {
    tx: mpsc::Sender<Chunk>,
    buf: Vec<u8>,
}

impl ChannelWriter {
    fn new(tx: mpsc::Sender<Chunk>) -> Self {
        Self {
            tx,
            buf: Vec::with_capacity(CHUNK_SIZE),
        }
    }

    fn send_buffered(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let chunk = std::mem::replace(&mut self.buf, Vec::with_capacity(CHUNK_SIZE));
        self.tx
            .blocking_send(Ok(chunk))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "export client went away"))
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        if self.buf.len() >= CHUNK_SIZE {
            self.send_buffered()?;
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send_buffered()
    }
}
