//! Microphone capture.
//!
//! `Recorder` is the toggle the panel drives; the device itself sits behind `AudioSource`.
//! `CommandSource` records through an external program (ffmpeg by default) that writes
//! WebM/Opus to stdout. No shell is used; arguments are passed as a list.

use super::upload::Attachment;
use crate::config::CaptureConfig;
use std::io::{BufRead, Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Notice when the input device cannot be opened.
pub const MIC_UNAVAILABLE_NOTICE: &str = "No se pudo acceder al micrófono.";

pub const RECORDING_MIME: &str = "audio/webm";

const READ_CHUNK_SIZE: usize = 16 * 1024;
/// How long `stop` waits for the recorder to finalize after `q` before killing it.
const STOP_GRACE: Duration = Duration::from_millis(500);
/// A recorder that exits within this window after spawning never opened its device.
const OPEN_CHECK: Duration = Duration::from_millis(250);
const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("could not open audio input: {0}")]
    Open(String),
    #[error("recorder io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A capture device. `stop` must release the device even when it returns an error.
pub trait AudioSource: Send {
    fn start(&mut self) -> Result<(), CaptureError>;
    /// Stop capturing and return the encoded chunks in arrival order.
    fn stop(&mut self) -> Result<Vec<Vec<u8>>, CaptureError>;
}

/// Start/stop toggle around one `AudioSource`. At most one session is active.
pub struct Recorder {
    source: Box<dyn AudioSource>,
    active: bool,
    /// Where finished clips are written so they can be replayed. None = keep in memory only.
    clip_dir: Option<PathBuf>,
}

impl Recorder {
    pub fn new(source: Box<dyn AudioSource>) -> Self {
        Self {
            source,
            active: false,
            clip_dir: None,
        }
    }

    pub fn with_clip_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.clip_dir = Some(dir.into());
        self
    }

    pub fn is_recording(&self) -> bool {
        self.active
    }

    /// Open the device. No-op while a session is already active.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.active {
            return Ok(());
        }
        self.source.start()?;
        self.active = true;
        log::info!("recording started");
        Ok(())
    }

    /// Close the device and wrap the captured audio as an attachment. None when not recording.
    pub fn stop(&mut self) -> Result<Option<Attachment>, CaptureError> {
        if !self.active {
            return Ok(None);
        }
        self.active = false;
        let chunks = self.source.stop()?;
        let bytes: Vec<u8> = chunks.concat();
        if bytes.is_empty() {
            log::warn!("recording stopped with no audio data");
        }
        let name = format!("grabacion_{}.webm", chrono::Utc::now().timestamp_millis());
        log::info!("recording stopped: {} ({} bytes)", name, bytes.len());
        let mut attachment = Attachment::new(name, RECORDING_MIME, bytes);
        if let Some(ref dir) = self.clip_dir {
            let path = dir.join(&attachment.name);
            match std::fs::create_dir_all(dir).and_then(|_| std::fs::write(&path, &attachment.bytes)) {
                Ok(()) => attachment.source = Some(path),
                Err(e) => log::warn!("could not keep clip at {}: {}", path.display(), e),
            }
        }
        Ok(Some(attachment))
    }

    /// Start when idle, stop when recording. Returns the clip on stop.
    pub fn toggle(&mut self) -> Result<Option<Attachment>, CaptureError> {
        if self.active {
            self.stop()
        } else {
            self.start().map(|_| None)
        }
    }
}

/// Records by running an external program and collecting its stdout.
pub struct CommandSource {
    program: String,
    args: Vec<String>,
    child: Option<Child>,
    reader: Option<JoinHandle<std::io::Result<Vec<Vec<u8>>>>>,
    stderr: Option<JoinHandle<Vec<String>>>,
}

impl CommandSource {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            child: None,
            reader: None,
            stderr: None,
        }
    }

    /// ffmpeg reading `input_format`/`device` and encoding Opus into a WebM stream on stdout.
    pub fn ffmpeg(config: &CaptureConfig) -> Self {
        let args = [
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            config.input_format.as_str(),
            "-i",
            config.device.as_str(),
            "-c:a",
            "libopus",
            "-f",
            "webm",
            "pipe:1",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        Self::new(config.program.clone(), args)
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Ask the recorder to finish, killing it after `STOP_GRACE`. None when nothing was running.
    fn shutdown(&mut self) -> std::io::Result<Option<ExitStatus>> {
        let Some(mut child) = self.child.take() else {
            return Ok(None);
        };
        // ffmpeg finalizes the container when it reads `q`.
        if let Some(mut stdin) = child.stdin.take() {
            let _ = stdin.write_all(b"q\n");
        }
        if !matches!(wait_until(&mut child, STOP_GRACE), Ok(Some(_))) {
            log::warn!("{} did not stop within {:?}, killing it", self.program, STOP_GRACE);
            let _ = child.kill();
        }
        child.wait().map(Some)
    }

    /// Join the output readers. Both end once the child's pipes close.
    fn join_readers(&mut self) -> (std::io::Result<Vec<Vec<u8>>>, Vec<String>) {
        let chunks = match self.reader.take() {
            Some(handle) => handle.join().unwrap_or_else(|_| {
                Err(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "recorder reader panicked",
                ))
            }),
            None => Ok(Vec::new()),
        };
        let stderr = self
            .stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        (chunks, stderr)
    }

    /// Describe an early or failed exit, preferring the recorder's last stderr line.
    fn exit_message(&self, status: ExitStatus, stderr: &[String]) -> String {
        match stderr.iter().rev().find(|l| !l.trim().is_empty()) {
            Some(line) => format!("{}: {}", self.program, line.trim()),
            None => format!("{} exited with {}", self.program, status),
        }
    }
}

/// Poll `child` until it exits or `limit` elapses. None when it is still running.
fn wait_until(child: &mut Child, limit: Duration) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + limit;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

impl AudioSource for CommandSource {
    fn start(&mut self) -> Result<(), CaptureError> {
        if self.child.is_some() {
            return Ok(());
        }
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CaptureError::Open(format!("{}: {}", self.program, e)))?;
        let Some(mut stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(CaptureError::Open("recorder stdout unavailable".to_string()));
        };
        self.reader = Some(std::thread::spawn(move || {
            let mut chunks = Vec::new();
            let mut buf = vec![0u8; READ_CHUNK_SIZE];
            loop {
                let n = stdout.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                chunks.push(buf[..n].to_vec());
            }
            Ok(chunks)
        }));
        if let Some(stderr) = child.stderr.take() {
            let program = self.program.clone();
            self.stderr = Some(std::thread::spawn(move || {
                let reader = std::io::BufReader::new(stderr);
                let mut lines = Vec::new();
                for line in reader.lines().map_while(Result::ok) {
                    log::warn!("[{}] {}", program, line);
                    lines.push(line);
                }
                lines
            }));
        }

        match wait_until(&mut child, OPEN_CHECK) {
            Ok(None) => {
                self.child = Some(child);
                Ok(())
            }
            Ok(Some(status)) => {
                let (_, stderr) = self.join_readers();
                Err(CaptureError::Open(self.exit_message(status, &stderr)))
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                let _ = self.join_readers();
                Err(CaptureError::Io(e))
            }
        }
    }

    fn stop(&mut self) -> Result<Vec<Vec<u8>>, CaptureError> {
        let status = self.shutdown();
        let (chunks, stderr) = self.join_readers();
        let status = status?;
        let chunks = chunks?;
        match status {
            Some(status) if !status.success() && chunks.is_empty() => {
                Err(CaptureError::Open(self.exit_message(status, &stderr)))
            }
            _ => Ok(chunks),
        }
    }
}

impl Drop for CommandSource {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        let _ = self.join_readers();
    }
}
