use bytes::Bytes;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use super::{ByteStream, ZipEncoder};
use crate::config::ZipCompression;
use crate::error::StorageError;
use crate::store::{ByteReader, ObjectStore};

/// One object to put into an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipItem {
    /// Full object key
    pub key: String,
    /// Entry name inside the archive
    pub name: String,
}

struct ZipState {
    store: Arc<dyn ObjectStore>,
    pending: VecDeque<ZipItem>,
    encoder: Option<ZipEncoder>,
    /// Content of the entry being written
    current: Option<ReaderStream<ByteReader>>,
    chunk_size: usize,
}

impl ZipState {
    /// Produce the next piece of the archive, or `None` when it is complete
    async fn advance(&mut self) -> Result<Option<Bytes>, StorageError> {
        let Some(encoder) = self.encoder.as_mut() else {
            return Ok(None);
        };

        if let Some(reader) = self.current.as_mut() {
            return match reader.next().await {
                Some(chunk) => encoder.write(&chunk?).map(Some),
                None => {
                    self.current = None;
                    encoder.finish_entry().map(Some)
                }
            };
        }

        if let Some(item) = self.pending.pop_front() {
            let body = self
                .store
                .get(&item.key)
                .await
                .map_err(|e| StorageError::from_probe(e, &item.name))?;
            let header = encoder.begin_entry(&item.name)?;
            self.current = Some(ReaderStream::with_capacity(body.reader, self.chunk_size));
            return Ok(Some(header));
        }

        match self.encoder.take() {
            Some(encoder) => {
                let entries = encoder.entry_count();
                let trailer = encoder.finish()?;
                tracing::debug!(entries, "archive complete");
                Ok(Some(trailer))
            }
            None => Ok(None),
        }
    }
}

/// Stream a ZIP archive of `items`, in order.
///
/// Nothing happens until the stream is polled. Objects are opened one at a
/// time and read in `chunk_size` pieces, so at most one store handle is
/// open; dropping the stream drops that handle. The first failure ends the
/// stream.
pub fn zip_stream(
    store: Arc<dyn ObjectStore>,
    items: Vec<ZipItem>,
    compression: ZipCompression,
    chunk_size: usize,
) -> ByteStream {
    let total = items.len();
    let state = ZipState {
        store,
        pending: items.into(),
        encoder: Some(ZipEncoder::new(compression)),
        current: None,
        chunk_size,
    };

    futures::stream::try_unfold(state, move |mut state| async move {
        loop {
            match state.advance().await {
                Ok(Some(bytes)) if bytes.is_empty() => continue,
                Ok(Some(bytes)) => return Ok(Some((bytes, state))),
                Ok(None) => return Ok(None),
                Err(e) => {
                    let done = total - state.pending.len();
                    tracing::warn!(error = %e, entries = done, total, "aborting archive");
                    return Err(e);
                }
            }
        }
    })
    .boxed()
}
