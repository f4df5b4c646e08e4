//! Output queue over a cpal stream
//!
//! cpal streams are not `Send`, so every queue runs a dedicated device
//! thread that opens the stream, owns it, and serves control requests.
//! Buffers travel to the real-time callback through one SPSC ring and come
//! back through a second; the device thread runs the completion handler for
//! each returned buffer and pushes resubmitted buffers onto the first ring.
//! The real-time callback only moves buffers and touches atomics.

use crate::audio::output::{ErrorHandler, OutputDevice, OutputQueue, QueueCallbacks, QueueSpec};
use crate::audio::types::{AudioBuffer, OutputFormat, STEREO};
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// How often the device thread checks for finished buffers when idle
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Output device backed by the default cpal host
#[derive(Debug, Clone, Default)]
pub struct CpalDevice {
    device_name: Option<String>,
}

impl CpalDevice {
    /// Output device by name (None = host default)
    pub fn new(device_name: Option<String>) -> Self {
        Self { device_name }
    }

    /// List available audio output devices.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();

        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| Error::QueueInit(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();

        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }
}

impl OutputDevice for CpalDevice {
    fn create_queue(&mut self, spec: QueueSpec, callbacks: QueueCallbacks) -> Result<Box<dyn OutputQueue>> {
        let queue = CpalQueue::open(self.device_name.clone(), spec, callbacks)?;
        Ok(Box::new(queue))
    }
}

/// Requests served by the device thread
enum Control {
    Enqueue(AudioBuffer, mpsc::Sender<Result<()>>),
    Play(mpsc::Sender<Result<()>>),
    Pause(mpsc::Sender<Result<()>>),
    Shutdown,
}

/// Live cpal output queue
pub struct CpalQueue {
    control: Option<mpsc::Sender<Control>>,
    thread: Option<JoinHandle<()>>,
    format: OutputFormat,
    volume: Arc<AtomicU32>,
    underruns: Arc<AtomicU64>,
}

impl CpalQueue {
    /// Open the device on a new device thread and build a paused stream.
    pub fn open(device_name: Option<String>, spec: QueueSpec, callbacks: QueueCallbacks) -> Result<Self> {
        let volume = Arc::new(AtomicU32::new(1.0f32.to_bits()));
        let underruns = Arc::new(AtomicU64::new(0));

        let (control_tx, control_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();

        let thread = {
            let volume = Arc::clone(&volume);
            let underruns = Arc::clone(&underruns);
            std::thread::Builder::new()
                .name("spindle-audio".to_string())
                .spawn(move || {
                    run_device_thread(device_name, spec, callbacks, volume, underruns, ready_tx, control_rx)
                })
                .map_err(|e| Error::QueueInit(format!("Failed to spawn audio thread: {}", e)))?
        };

        let format = match ready_rx.recv() {
            Ok(Ok(format)) => format,
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = thread.join();
                return Err(Error::QueueInit("Audio thread exited during setup".to_string()));
            }
        };

        info!(
            "Audio queue open: {}Hz, {} channels, {} buffers",
            format.sample_rate, format.channels, spec.buffers
        );

        Ok(Self {
            control: Some(control_tx),
            thread: Some(thread),
            format,
            volume,
            underruns,
        })
    }

    /// Callbacks that found no buffer ready
    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }

    fn request<F>(&self, make: F, lost: fn(String) -> Error) -> Result<()>
    where
        F: FnOnce(mpsc::Sender<Result<()>>) -> Control,
    {
        let control = self
            .control
            .as_ref()
            .ok_or_else(|| lost("queue disposed".to_string()))?;
        let (reply_tx, reply_rx) = mpsc::channel();
        control
            .send(make(reply_tx))
            .map_err(|_| lost("audio thread exited".to_string()))?;
        reply_rx
            .recv()
            .map_err(|_| lost("audio thread exited".to_string()))?
    }
}

impl OutputQueue for CpalQueue {
    fn format(&self) -> OutputFormat {
        self.format
    }

    fn enqueue(&mut self, buffer: AudioBuffer) -> Result<()> {
        self.request(|reply| Control::Enqueue(buffer, reply), Error::Enqueue)
    }

    fn start(&mut self) -> Result<()> {
        info!("Starting audio stream");
        self.request(Control::Play, Error::StartFailed)
    }

    fn pause(&mut self) -> Result<()> {
        self.request(Control::Pause, Error::PauseFailed)
    }

    fn resume(&mut self) -> Result<()> {
        self.request(Control::Play, Error::StartFailed)
    }

    fn set_volume(&mut self, volume: f32) {
        let clamped = volume.clamp(0.0, 1.0);
        self.volume.store(clamped.to_bits(), Ordering::Relaxed);
        debug!("Volume set to {:.2}", clamped);
    }

    fn dispose(&mut self) {
        if let Some(control) = self.control.take() {
            let _ = control.send(Control::Shutdown);
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Audio thread panicked during shutdown");
            }
            info!("Audio queue disposed ({} underruns)", self.underruns());
        }
    }
}

impl Drop for CpalQueue {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Device thread body: owns the stream until shutdown
fn run_device_thread(
    device_name: Option<String>,
    spec: QueueSpec,
    callbacks: QueueCallbacks,
    volume: Arc<AtomicU32>,
    underruns: Arc<AtomicU64>,
    ready: mpsc::Sender<Result<OutputFormat>>,
    control: mpsc::Receiver<Control>,
) {
    let QueueCallbacks {
        mut on_complete,
        on_error,
    } = callbacks;
    let on_error: Arc<ErrorHandler> = Arc::new(on_error);

    let capacity = spec.buffers.max(1);
    let (mut submit_tx, submit_rx) = HeapRb::<AudioBuffer>::new(capacity).split();
    let (done_tx, mut done_rx) = HeapRb::<AudioBuffer>::new(capacity).split();

    let playhead = Playhead {
        current: None,
        cursor: 0,
        pending: submit_rx,
        finished: done_tx,
    };

    let stream = match open_stream(device_name, spec.format, playhead, volume, underruns, on_error) {
        Ok((stream, format)) => {
            if ready.send(Ok(format)).is_err() {
                return;
            }
            stream
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    loop {
        match control.recv_timeout(POLL_INTERVAL) {
            Ok(Control::Enqueue(buffer, reply)) => {
                let result = submit_tx
                    .try_push(buffer)
                    .map_err(|_| Error::Enqueue("queue full".to_string()));
                let _ = reply.send(result);
            }
            Ok(Control::Play(reply)) => {
                let result = stream.play().map_err(|e| Error::StartFailed(e.to_string()));
                let _ = reply.send(result);
            }
            Ok(Control::Pause(reply)) => {
                let result = stream.pause().map_err(|e| Error::PauseFailed(e.to_string()));
                let _ = reply.send(result);
            }
            Ok(Control::Shutdown) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => {}
        }

        while let Some(finished) = done_rx.try_pop() {
            if let Some(refilled) = on_complete(finished) {
                if submit_tx.try_push(refilled).is_err() {
                    warn!("Submit ring full, dropping refilled buffer");
                }
            }
        }
    }

    if let Err(e) = stream.pause() {
        debug!("Pause on shutdown failed: {}", e);
    }
    // Dropping the stream drops the callback, its current buffer and both
    // ring halves it owns; the halves held here drop with this frame.
    drop(stream);
}

/// Open the output device and build a paused stream for `requested`.
fn open_stream(
    device_name: Option<String>,
    requested: OutputFormat,
    playhead: Playhead,
    volume: Arc<AtomicU32>,
    underruns: Arc<AtomicU64>,
    on_error: Arc<ErrorHandler>,
) -> Result<(Stream, OutputFormat)> {
    let device = find_device(device_name.as_deref())?;
    let (config, sample_format) = get_best_config(&device, requested)?;

    debug!(
        "Audio config: sample_rate={}, channels={}, format={:?}",
        config.sample_rate.0, config.channels, sample_format
    );

    let stream = match sample_format {
        SampleFormat::I16 => build_stream::<i16>(&device, &config, playhead, volume, underruns, on_error),
        SampleFormat::U16 => build_stream::<u16>(&device, &config, playhead, volume, underruns, on_error),
        SampleFormat::F32 => build_stream::<f32>(&device, &config, playhead, volume, underruns, on_error),
        other => {
            return Err(Error::QueueInit(format!("Unsupported sample format: {:?}", other)));
        }
    }
    .map_err(|e| Error::QueueInit(format!("Failed to build stream: {}", e)))?;

    // Some hosts start streams on creation; completions must not run
    // before the queue is started
    stream
        .pause()
        .map_err(|e| Error::QueueInit(format!("Stream cannot start paused: {}", e)))?;

    let format = OutputFormat::new(config.sample_rate.0, config.channels);
    Ok((stream, format))
}

fn find_device(device_name: Option<&str>) -> Result<Device> {
    let host = cpal::default_host();

    if let Some(name) = device_name {
        let mut devices = host
            .output_devices()
            .map_err(|e| Error::QueueInit(format!("Failed to enumerate devices: {}", e)))?;

        if let Some(device) = devices.find(|d| d.name().ok().as_deref() == Some(name)) {
            info!("Using requested audio device: {}", name);
            return Ok(device);
        }
        warn!("Requested device '{}' not found, falling back to default device", name);
    }

    let device = host
        .default_output_device()
        .ok_or_else(|| Error::QueueInit("No default output device found".to_string()))?;
    info!(
        "Using default audio device: {}",
        device.name().unwrap_or_else(|_| "Unknown".to_string())
    );
    Ok(device)
}

/// Prefer the requested rate in stereo, 16-bit first; otherwise the
/// device's default configuration.
fn get_best_config(device: &Device, requested: OutputFormat) -> Result<(StreamConfig, SampleFormat)> {
    let supported: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| Error::QueueInit(format!("Failed to get device configs: {}", e)))?
        .filter(|config| {
            config.channels() == requested.channels
                && config.min_sample_rate().0 <= requested.sample_rate
                && config.max_sample_rate().0 >= requested.sample_rate
        })
        .collect();

    for wanted in [SampleFormat::I16, SampleFormat::F32, SampleFormat::U16] {
        if let Some(config) = supported.iter().find(|c| c.sample_format() == wanted) {
            let config = config
                .clone()
                .with_sample_rate(cpal::SampleRate(requested.sample_rate));
            return Ok((config.config(), wanted));
        }
    }

    let default = device
        .default_output_config()
        .map_err(|e| Error::QueueInit(format!("Failed to get default config: {}", e)))?;
    warn!(
        "Device cannot play {}Hz stereo, using its default {}Hz/{}ch",
        requested.sample_rate,
        default.sample_rate().0,
        default.channels()
    );
    let sample_format = default.sample_format();
    Ok((default.config(), sample_format))
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    mut playhead: Playhead,
    volume: Arc<AtomicU32>,
    underruns: Arc<AtomicU64>,
    on_error: Arc<ErrorHandler>,
) -> std::result::Result<Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = config.channels as usize;

    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let gain = f32::from_bits(volume.load(Ordering::Relaxed));
            let mut starved = false;

            for frame in data.chunks_mut(channels) {
                let (left, right) = playhead.next_frame().unwrap_or_else(|| {
                    starved = true;
                    (0, 0)
                });
                write_frame(frame, left, right, gain);
            }

            if starved {
                underruns.fetch_add(1, Ordering::Relaxed);
            }
        },
        move |err| {
            error!("Audio stream error: {}", err);
            on_error(err.to_string());
        },
        None,
    )
}

/// Map one stereo i16 frame onto a device frame of any width
fn write_frame<T>(frame: &mut [T], left: i16, right: i16, gain: f32)
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let left = left as f32 / 32768.0 * gain;
    let right = right as f32 / 32768.0 * gain;

    match frame {
        [mono] => *mono = T::from_sample((left + right) * 0.5),
        [l, r, rest @ ..] => {
            *l = T::from_sample(left);
            *r = T::from_sample(right);
            for sample in rest {
                *sample = T::from_sample(0.0f32);
            }
        }
        [] => {}
    }
}

/// Callback-side cursor over the submitted buffers
struct Playhead {
    current: Option<AudioBuffer>,
    cursor: usize,
    pending: HeapCons<AudioBuffer>,
    finished: HeapProd<AudioBuffer>,
}

impl Playhead {
    /// Next stereo frame, moving exhausted buffers to the finished ring.
    ///
    /// `None` means nothing is queued.
    fn next_frame(&mut self) -> Option<(i16, i16)> {
        loop {
            if let Some(buffer) = &self.current {
                if self.cursor < buffer.frames() {
                    let frame = buffer.frame(self.cursor);
                    self.cursor += 1;
                    return Some(frame);
                }
            }

            if let Some(done) = self.current.take() {
                // Cannot fail: both rings hold every buffer of the queue
                let _ = self.finished.try_push(done);
            }
            self.cursor = 0;
            self.current = Some(self.pending.try_pop()?);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::types::BufferGauge;

    fn playhead(capacity: usize) -> (Playhead, HeapProd<AudioBuffer>, HeapCons<AudioBuffer>) {
        let (submit_tx, submit_rx) = HeapRb::<AudioBuffer>::new(capacity).split();
        let (done_tx, done_rx) = HeapRb::<AudioBuffer>::new(capacity).split();
        let playhead = Playhead {
            current: None,
            cursor: 0,
            pending: submit_rx,
            finished: done_tx,
        };
        (playhead, submit_tx, done_rx)
    }

    fn filled(index: usize, frames: &[(i16, i16)], gauge: &BufferGauge) -> AudioBuffer {
        let mut samples = vec![0; 8];
        for (i, (l, r)) in frames.iter().enumerate() {
            samples[i * 2] = *l;
            samples[i * 2 + 1] = *r;
        }
        let mut buffer = AudioBuffer::new(index, 1, STEREO, samples, gauge);
        buffer.set_frames(frames.len());
        buffer
    }

    #[test]
    fn test_list_devices_failure_is_queue_init() {
        // Hosts without audio hardware may fail enumeration
        match CpalDevice::list_devices() {
            Ok(_) => {}
            Err(e) => assert!(matches!(e, Error::QueueInit(_)), "unexpected error: {}", e),
        }
    }

    #[test]
    fn test_playhead_plays_in_order_and_returns_buffers() {
        let gauge = BufferGauge::new();
        let (mut playhead, mut submit, mut done) = playhead(3);

        submit.try_push(filled(0, &[(1, -1), (2, -2)], &gauge)).unwrap();
        submit.try_push(filled(1, &[(3, -3)], &gauge)).unwrap();

        assert_eq!(playhead.next_frame(), Some((1, -1)));
        assert_eq!(playhead.next_frame(), Some((2, -2)));
        assert!(done.try_pop().is_none(), "buffer 0 still playing");

        assert_eq!(playhead.next_frame(), Some((3, -3)));
        assert_eq!(done.try_pop().map(|b| b.index()), Some(0));

        assert_eq!(playhead.next_frame(), None);
        assert_eq!(done.try_pop().map(|b| b.index()), Some(1));
    }

    #[test]
    fn test_write_frame_layouts() {
        let mut stereo = [0.0f32; 2];
        write_frame(&mut stereo, 16384, -16384, 1.0);
        assert_eq!(stereo, [0.5, -0.5]);

        let mut quiet = [0.0f32; 2];
        write_frame(&mut quiet, 16384, 16384, 0.5);
        assert_eq!(quiet, [0.25, 0.25]);

        let mut mono = [0.0f32; 1];
        write_frame(&mut mono, 16384, 0, 1.0);
        assert_eq!(mono, [0.25]);

        let mut surround = [1.0f32; 4];
        write_frame(&mut surround, 0, 0, 1.0);
        assert_eq!(surround, [0.0; 4]);
    }
}
