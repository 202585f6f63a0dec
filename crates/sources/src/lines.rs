//! Line source - one message per line of an async reader
//!
//! Payloads are `String`s without the trailing `\n` / `\r\n`. Empty lines
//! are skipped. Reads race the cancellation token so a silent reader (an
//! idle stdin) never blocks shutdown.

use async_trait::async_trait;
use parking_lot::Mutex;
use sluice_protocol::{CancellationToken, StageError};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::extractor::ExtractHandler;
use crate::sender::ExtractSender;

/// Extract handler reading lines from `R`
///
/// The reader is consumed by the first `extract` call; later calls send
/// nothing.
pub struct LineSource<R> {
    reader: Mutex<Option<R>>,
}

impl<R> LineSource<R> {
    /// Create a line source over a buffered reader
    pub fn new(reader: R) -> Self {
        Self {
            reader: Mutex::new(Some(reader)),
        }
    }
}

#[async_trait]
impl<R> ExtractHandler for LineSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    async fn extract(
        &self,
        cancel: &CancellationToken,
        sender: &ExtractSender<'_>,
    ) -> Result<(), StageError> {
        let Some(reader) = self.reader.lock().take() else {
            return Ok(());
        };
        let mut lines = reader.lines();

        loop {
            let line = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(StageError::Cancelled),
                line = lines.next_line() => line.map_err(StageError::handler)?,
            };

            match line {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => sender.send(line).await?,
                None => return Ok(()),
            }
        }
    }
}

impl<R> std::fmt::Debug for LineSource<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineSource").finish_non_exhaustive()
    }
}
