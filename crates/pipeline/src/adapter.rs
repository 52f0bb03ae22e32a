//! Processing-entry dispatch: bridges the two module contract styles
//! and arbitrates buffer access around one processing period.
//!
//! For source/sink modules the adapter passes the capability objects
//! straight through and derives consumed/produced counts from the
//! buffer levels. For stream modules it borrows regions from every
//! attached buffer, hands the module wrap-aware views, then releases
//! and commits exactly the counts the module reported. Nothing is
//! released on error, so a failed period can be retried next tick.

use heapless::Vec;

use crate::module::{Domain, ModuleOps, ProcessingMode, MAX_PINS};
use stream::{CoreError, Sink, Source};

/// Staged input view for stream-style processing.
///
/// `buf`/`pos` describe a circular region exactly like
/// [`stream::DataRegion`]; `size` is the byte count staged for this
/// period and `consumed` is written back by the module.
#[derive(Debug)]
pub struct InputStreamBuffer<'a> {
    /// Entire backing store of the source buffer.
    pub buf: &'a [u8],
    /// Index of the first readable byte.
    pub pos: usize,
    /// Bytes staged for this invocation.
    pub size: usize,
    /// Bytes the module actually consumed; reported by the module.
    pub consumed: usize,
}

/// Staged output view for stream-style processing.
#[derive(Debug)]
pub struct OutputStreamBuffer<'a> {
    /// Entire backing store of the sink buffer.
    pub buf: &'a mut [u8],
    /// Index of the first writable byte.
    pub pos: usize,
    /// Free bytes staged for this invocation.
    pub free: usize,
    /// Bytes the module actually produced; reported by the module.
    pub size: usize,
}

/// Byte counts a processing period moved per attached buffer.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcessStats {
    /// Bytes consumed from each source, in attachment order.
    pub consumed: Vec<usize, MAX_PINS>,
    /// Bytes produced into each sink, in attachment order.
    pub produced: Vec<usize, MAX_PINS>,
    /// The period was skipped because the module was not ready.
    pub skipped: bool,
}

impl ProcessStats {
    fn skipped() -> Self {
        ProcessStats {
            skipped: true,
            ..ProcessStats::default()
        }
    }
}

/// Run one processing period of `module` against the attached buffers.
///
/// Low-latency instances always run; data-processing instances are
/// skipped (successfully) until their watermarks are met.
///
/// # Errors
///
/// [`CoreError::XRun`] when a stream-style module cannot stage a full
/// period; buffer offsets are untouched so the next tick retries.
/// Module-reported errors propagate unchanged.
pub fn process_period(
    module: &mut dyn ModuleOps,
    domain: Domain,
    period_bytes: usize,
    sources: &mut [&mut dyn Source],
    sinks: &mut [&mut dyn Sink],
) -> Result<ProcessStats, CoreError> {
    if sources.len() > MAX_PINS || sinks.len() > MAX_PINS {
        return Err(CoreError::InvalidArg);
    }

    // LL modules must always answer ready; only DP instances may skip.
    if domain == Domain::DataProcessing && !module.is_ready_to_process(sources, sinks) {
        return Ok(ProcessStats::skipped());
    }

    match module.processing_mode() {
        ProcessingMode::SourceSink => process_source_sink(module, sources, sinks),
        ProcessingMode::Stream => process_stream_staged(module, period_bytes, sources, sinks),
    }
}

fn process_source_sink(
    module: &mut dyn ModuleOps,
    sources: &mut [&mut dyn Source],
    sinks: &mut [&mut dyn Sink],
) -> Result<ProcessStats, CoreError> {
    let mut avail_before: Vec<usize, MAX_PINS> = Vec::new();
    let mut free_before: Vec<usize, MAX_PINS> = Vec::new();
    for src in sources.iter() {
        let _ = avail_before.push(src.available());
    }
    for snk in sinks.iter() {
        let _ = free_before.push(snk.free());
    }

    module.process(sources, sinks)?;

    let mut stats = ProcessStats::default();
    for (src, before) in sources.iter().zip(avail_before) {
        let _ = stats.consumed.push(before - src.available());
    }
    for (snk, before) in sinks.iter().zip(free_before) {
        let _ = stats.produced.push(before - snk.free());
    }
    Ok(stats)
}

fn process_stream_staged(
    module: &mut dyn ModuleOps,
    period_bytes: usize,
    sources: &mut [&mut dyn Source],
    sinks: &mut [&mut dyn Sink],
) -> Result<ProcessStats, CoreError> {
    let (consumed, produced) = {
        let mut inputs: Vec<InputStreamBuffer<'_>, MAX_PINS> = Vec::new();
        for src in sources.iter_mut() {
            // Insufficient data for a full period is an xrun, not NoData:
            // the caller distinguishes "retry next tick" from transport
            // misuse.
            let region = src.get_data(period_bytes).map_err(|_| CoreError::XRun)?;
            let _ = inputs.push(InputStreamBuffer {
                buf: region.buf,
                pos: region.pos,
                size: period_bytes,
                consumed: 0,
            });
        }

        let mut outputs: Vec<OutputStreamBuffer<'_>, MAX_PINS> = Vec::new();
        for snk in sinks.iter_mut() {
            let region = snk.get_buffer(period_bytes).map_err(|_| CoreError::XRun)?;
            let _ = outputs.push(OutputStreamBuffer {
                buf: region.buf,
                pos: region.pos,
                free: period_bytes,
                size: 0,
            });
        }

        module.process_stream(&mut inputs, &mut outputs)?;

        let mut consumed: Vec<usize, MAX_PINS> = Vec::new();
        let mut produced: Vec<usize, MAX_PINS> = Vec::new();
        for input in &inputs {
            let _ = consumed.push(input.consumed.min(input.size));
        }
        for output in &outputs {
            let _ = produced.push(output.size.min(output.free));
        }
        (consumed, produced)
    };

    for (src, &n) in sources.iter_mut().zip(consumed.iter()) {
        src.release(n);
    }
    for (snk, &n) in sinks.iter_mut().zip(produced.iter()) {
        snk.commit(n);
    }

    Ok(ProcessStats {
        consumed,
        produced,
        skipped: false,
    })
}
