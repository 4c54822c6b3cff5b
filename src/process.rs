//! Bounded subprocess execution.
//!
//! Every external process the pipeline starts goes through [`run_bounded`]:
//! stdout and stderr are drained on their own threads, stdin is either fed
//! from a buffer and closed or set to null, and the wait is capped by a wall
//! clock deadline after which the child is killed and reaped.
//!
//! Captured output is capped. A reader keeps consuming its pipe past the cap
//! so the child never blocks on a full pipe, but the excess is discarded and
//! the capture is flagged as truncated.

use std::io::{self, Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(10);
/// How long to keep draining pipes once the child itself is gone. A
/// grandchild that inherited the pipes could otherwise hold them open forever.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Bytes of stdout kept per process.
pub const STDOUT_CAP: usize = 1024 * 1024;
/// Bytes of stderr kept per process.
pub const STDERR_CAP: usize = 256 * 1024;

/// What a finished (or killed) child left behind.
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
    pub timed_out: bool,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.status.success()
    }

    /// Exit code, or `128 + signal` for a signalled child on unix.
    pub fn exit_code(&self) -> Option<i32> {
        if let Some(code) = self.status.code() {
            return Some(code);
        }
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt as _;
            self.status.signal()
        };
        #[cfg(not(unix))]
        let signal: Option<i32> = None;
        signal.map(|s| 128 + s)
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Spawns `cmd`, feeds it `stdin` (or nothing), and waits at most `timeout`.
///
/// Spawn and pipe errors are returned; a timeout is not an error, it is
/// reported through [`ProcessOutput::timed_out`].
pub fn run_bounded(
    cmd: &mut Command,
    stdin: Option<Vec<u8>>,
    timeout: Duration,
) -> io::Result<ProcessOutput> {
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    debug!("spawn {:?}", cmd);
    let mut child = cmd.spawn()?;

    let stdin_thread = match (child.stdin.take(), stdin) {
        (Some(mut pipe), Some(bytes)) => Some(thread::spawn(move || -> io::Result<()> {
            pipe.write_all(&bytes)?;
            pipe.flush()
        })),
        _ => None,
    };
    // Set once draining gives up, so readers held open by a grandchild stop
    // and drop their pipe instead of running on in the background.
    let abandoned = Arc::new(AtomicBool::new(false));
    let stdout_thread = child
        .stdout
        .take()
        .map(|pipe| spawn_reader(pipe, STDOUT_CAP, Arc::clone(&abandoned)));
    let stderr_thread = child
        .stderr
        .take()
        .map(|pipe| spawn_reader(pipe, STDERR_CAP, Arc::clone(&abandoned)));

    let (status, timed_out) = wait_with_deadline(&mut child, timeout)?;
    if timed_out {
        warn!("process exceeded {:?} and was killed", timeout);
    }

    if let Some(handle) = stdin_thread {
        // A child that exits without reading its input closes the pipe early.
        if let Ok(Err(e)) = handle.join() {
            if e.kind() != io::ErrorKind::BrokenPipe {
                debug!("stdin writer failed: {e}");
            }
        }
    }
    let (stdout, stdout_truncated) = drain(stdout_thread, &abandoned)?;
    let (stderr, stderr_truncated) = drain(stderr_thread, &abandoned)?;
    if stdout_truncated || stderr_truncated {
        debug!("output exceeded the capture limit and was truncated");
    }

    Ok(ProcessOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

type Capture = io::Result<(Vec<u8>, bool)>;

fn spawn_reader<R: Read + Send + 'static>(
    pipe: R,
    cap: usize,
    abandoned: Arc<AtomicBool>,
) -> Receiver<Capture> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(read_to_end_capped(pipe, cap, &abandoned));
    });
    rx
}

/// Reads until EOF, keeping at most `cap` bytes. Returns early, dropping the
/// pipe, once `abandoned` is set.
fn read_to_end_capped<R: Read>(mut reader: R, cap: usize, abandoned: &AtomicBool) -> Capture {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    let mut truncated = false;

    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if abandoned.load(Ordering::Relaxed) {
            break;
        }
        if truncated {
            continue;
        }
        let room = cap.saturating_sub(buf.len());
        if n <= room {
            buf.extend_from_slice(&chunk[..n]);
        } else {
            buf.extend_from_slice(&chunk[..room]);
            truncated = true;
        }
    }
    Ok((buf, truncated))
}

fn drain(reader: Option<Receiver<Capture>>, abandoned: &AtomicBool) -> Capture {
    let Some(rx) = reader else {
        return Ok((Vec::new(), false));
    };
    match rx.recv_timeout(DRAIN_GRACE) {
        Ok(result) => result,
        Err(_) => {
            warn!("output pipe still open {:?} after exit, dropping it", DRAIN_GRACE);
            abandoned.store(true, Ordering::Relaxed);
            Ok((Vec::new(), true))
        }
    }
}

fn wait_with_deadline(
    child: &mut std::process::Child,
    timeout: Duration,
) -> io::Result<(ExitStatus, bool)> {
    let deadline = Instant::now().checked_add(timeout);
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok((status, false));
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            let _ = child.kill();
            let status = child.wait()?;
            return Ok((status, true));
        }
        thread::sleep(POLL_INTERVAL);
    }
}
