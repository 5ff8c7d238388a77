//! # Barcode Sources
//!
//! Where scans come from. The engine only ever sees "a barcode string plus a
//! capture timestamp"; how that string was produced is the source's business.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Event Sources                                     │
//! │                                                                         │
//! │  scanner.mode = "keyboard"   KeyboardWedgeSource                       │
//! │    USB scanner types the code + Enter into stdin / an input path       │
//! │                                                                         │
//! │  scanner.mode = "simulated"  SimulatedSource                           │
//! │    fixed list of codes (or SIM-<n>) every simulated_interval_ms        │
//! │                                                                         │
//! │  scanner.mode = "disabled"   no source, codes only via the CLI         │
//! │                                                                         │
//! │            next_scan() ──► ScanEvent { code, captured_at }             │
//! │                                  │                                      │
//! │                                  ▼                                      │
//! │                        SyncEngine::add_code                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::{debug, info, warn};

use scanpoint_core::{Clock, ScanEvent};

use crate::config::{ScannerMode, ScannerSettings};

/// A stream of scans.
#[async_trait]
pub trait BarcodeSource: Send {
    /// Waits for the next scan. `None` means the source is exhausted.
    async fn next_scan(&mut self) -> Option<ScanEvent>;
}

// =============================================================================
// Keyboard Wedge
// =============================================================================

/// Keyboard-emulation scanner: one code per line.
pub struct KeyboardWedgeSource<R> {
    lines: Lines<R>,
    max_code_length: usize,
    clock: Arc<dyn Clock>,
}

impl<R> KeyboardWedgeSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(reader: R, max_code_length: usize, clock: Arc<dyn Clock>) -> Self {
        KeyboardWedgeSource {
            lines: reader.lines(),
            max_code_length,
            clock,
        }
    }
}

impl KeyboardWedgeSource<BufReader<tokio::io::Stdin>> {
    /// Reads scans from standard input.
    pub fn stdin(max_code_length: usize, clock: Arc<dyn Clock>) -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), max_code_length, clock)
    }
}

impl KeyboardWedgeSource<BufReader<tokio::fs::File>> {
    /// Reads scans from a file or character device.
    pub async fn open(
        path: &Path,
        max_code_length: usize,
        clock: Arc<dyn Clock>,
    ) -> std::io::Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Self::new(BufReader::new(file), max_code_length, clock))
    }
}

#[async_trait]
impl<R> BarcodeSource for KeyboardWedgeSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_scan(&mut self) -> Option<ScanEvent> {
        loop {
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return None,
                Err(e) => {
                    warn!(error = %e, "Scanner input failed");
                    return None;
                }
            };

            let code = line.trim();
            if code.is_empty() {
                continue;
            }
            if code.chars().count() > self.max_code_length {
                warn!(
                    length = code.chars().count(),
                    max = self.max_code_length,
                    "Dropping over-long scan"
                );
                continue;
            }

            debug!(code = %code, "Scan received");
            return Some(ScanEvent::new(code, self.clock.now()));
        }
    }
}

// =============================================================================
// Simulated
// =============================================================================

/// Emits synthetic scans on a timer.
pub struct SimulatedSource {
    codes: Vec<String>,
    interval: Duration,
    emitted: u64,
    limit: Option<u64>,
    clock: Arc<dyn Clock>,
}

impl SimulatedSource {
    /// Cycles through `codes`, or generates `SIM-<n>` when empty.
    pub fn new(codes: Vec<String>, interval: Duration, clock: Arc<dyn Clock>) -> Self {
        SimulatedSource {
            codes,
            interval,
            emitted: 0,
            limit: None,
            clock,
        }
    }

    /// Stops after `limit` scans.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    fn code_at(&self, n: u64) -> String {
        if self.codes.is_empty() {
            format!("SIM-{}", n + 1)
        } else {
            self.codes[(n % self.codes.len() as u64) as usize].clone()
        }
    }
}

#[async_trait]
impl BarcodeSource for SimulatedSource {
    async fn next_scan(&mut self) -> Option<ScanEvent> {
        if self.limit.is_some_and(|limit| self.emitted >= limit) {
            return None;
        }

        tokio::time::sleep(self.interval).await;

        let code = self.code_at(self.emitted);
        self.emitted += 1;
        Some(ScanEvent::new(code, self.clock.now()))
    }
}

/// Opens the source selected by `scanner.mode`.
///
/// Returns `Ok(None)` when scanning is disabled.
pub async fn open_source(
    settings: &ScannerSettings,
    clock: Arc<dyn Clock>,
) -> std::io::Result<Option<Box<dyn BarcodeSource>>> {
    let source: Box<dyn BarcodeSource> = match settings.mode {
        ScannerMode::Disabled => {
            info!("Scanner disabled");
            return Ok(None);
        }
        ScannerMode::Keyboard => match settings.input_path {
            Some(ref path) => {
                info!(path = %path.display(), "Reading scans from input path");
                Box::new(KeyboardWedgeSource::open(path, settings.max_code_length, clock).await?)
            }
            None => {
                info!("Reading scans from stdin");
                Box::new(KeyboardWedgeSource::stdin(settings.max_code_length, clock))
            }
        },
        ScannerMode::Simulated => {
            info!(
                interval_ms = settings.simulated_interval_ms,
                codes = settings.simulated_codes.len(),
                "Simulated scanner"
            );
            Box::new(SimulatedSource::new(
                settings.simulated_codes.clone(),
                settings.simulated_interval(),
                clock,
            ))
        }
    };
    Ok(Some(source))
}
