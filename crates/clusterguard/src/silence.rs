//! Scoped silencing of the process output streams
//!
//! Native engines print progress straight to file descriptors 1 and 2,
//! bypassing anything Rust-level. Silencing therefore works on descriptors:
//! each stream is duplicated, the null device is `dup2`ed over it, and the
//! duplicate is `dup2`ed back when the scope ends. Restoration lives in a
//! guard's `Drop`, so it runs on normal return, on an error value returned by
//! the body and on panic unwind alike.
//!
//! Descriptors are process-wide. Scopes are serialised through one re-entrant
//! lock: nested scopes on a thread unwind in stack order, other threads wait.

use crate::verbosity;
use std::io;

/// A standard output stream that can be silenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    /// Both standard output streams
    pub const BOTH: [Stream; 2] = [Stream::Stdout, Stream::Stderr];

    #[cfg(unix)]
    pub fn raw_fd(&self) -> std::os::unix::io::RawFd {
        match self {
            Self::Stdout => libc::STDOUT_FILENO,
            Self::Stderr => libc::STDERR_FILENO,
        }
    }
}

/// Run `body` with `streams` redirected to the null device.
///
/// The streams are restored before this returns, whatever `body` does.
/// Fails without running `body` if the redirection cannot be set up.
pub fn with_silenced<T, F>(streams: &[Stream], body: F) -> io::Result<T>
where
    F: FnOnce() -> T,
{
    let _scope = imp::Silenced::enter(streams)?;
    Ok(body())
}

/// Run `body`, silencing both streams unless the process is verbose.
///
/// The verbosity flag is read on every call.
pub fn maybe_silence<T, F>(body: F) -> io::Result<T>
where
    F: FnOnce() -> T,
{
    scoped(verbosity::global().is_verbose(), body)
}

/// Run `body` directly when `verbose`, otherwise with both streams silenced.
pub fn scoped<T, F>(verbose: bool, body: F) -> io::Result<T>
where
    F: FnOnce() -> T,
{
    if verbose {
        Ok(body())
    } else {
        with_silenced(&Stream::BOTH, body)
    }
}

#[cfg(unix)]
mod imp {
    use super::Stream;
    use lazy_static::lazy_static;
    use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
    use std::fs::{File, OpenOptions};
    use std::io::{self, Write};
    use std::os::unix::io::{AsRawFd, BorrowedFd, OwnedFd, RawFd};
    use tracing::error;

    const NULL_DEVICE: &str = "/dev/null";

    lazy_static! {
        static ref STREAM_LOCK: ReentrantMutex<()> = ReentrantMutex::new(());
    }

    /// Active redirection. Dropping it restores the saved descriptors.
    pub(super) struct Silenced {
        saved: Vec<(Stream, OwnedFd)>,
        _lock: ReentrantMutexGuard<'static, ()>,
    }

    impl Silenced {
        pub(super) fn enter(streams: &[Stream]) -> io::Result<Self> {
            let lock = STREAM_LOCK.lock();
            flush_all();

            let null: File = OpenOptions::new().write(true).open(NULL_DEVICE)?;
            let mut scope = Self {
                saved: Vec::with_capacity(streams.len()),
                _lock: lock,
            };

            for &stream in streams {
                if scope.saved.iter().any(|(s, _)| *s == stream) {
                    continue;
                }
                // On error, `scope` drops and rolls back the streams already redirected
                let original = duplicate(stream.raw_fd())?;
                redirect(null.as_raw_fd(), stream.raw_fd())?;
                scope.saved.push((stream, original));
            }

            Ok(scope)
        }
    }

    impl Drop for Silenced {
        fn drop(&mut self) {
            flush_all();
            while let Some((stream, original)) = self.saved.pop() {
                if let Err(e) = redirect(original.as_raw_fd(), stream.raw_fd()) {
                    error!("failed to restore {:?} after silenced call: {}", stream, e);
                }
            }
        }
    }

    fn duplicate(fd: RawFd) -> io::Result<OwnedFd> {
        // SAFETY: fd is one of the standard descriptors, open for the process lifetime
        unsafe { BorrowedFd::borrow_raw(fd) }.try_clone_to_owned()
    }

    fn redirect(src: RawFd, dst: RawFd) -> io::Result<()> {
        loop {
            // SAFETY: dup2 on descriptors we own or that are always open
            if unsafe { libc::dup2(src, dst) } >= 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    /// Push buffered bytes out so none cross the redirection boundary.
    fn flush_all() {
        let _ = io::stdout().flush();
        let _ = io::stderr().flush();
        // SAFETY: fflush(NULL) flushes every open C output stream
        unsafe {
            libc::fflush(std::ptr::null_mut());
        }
    }
}

#[cfg(not(unix))]
mod imp {
    use super::Stream;
    use std::io;

    /// Descriptor redirection is only implemented for Unix targets.
    pub(super) struct Silenced;

    impl Silenced {
        pub(super) fn enter(_streams: &[Stream]) -> io::Result<Self> {
            Ok(Self)
        }
    }
}
