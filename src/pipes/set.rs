/*!
 * Pipe Set
 * Per-process non-blocking buffered I/O across all configured descriptors
 */

use super::types::{DescriptorSpec, Direction};
use crate::core::errors::{PipeError, PipeResult};
use crate::core::limits::{READ_CHUNK_SIZE, WRITE_CHUNK_SIZE};
use crate::core::types::Descriptor;
use bytes::{Buf, Bytes, BytesMut};
use log::{debug, warn};
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::os::fd::{AsFd, AsRawFd, IntoRawFd};

/// Buffered, non-blocking view of one process's pipe descriptors
///
/// Buffers exist from construction so a queued process can already accept
/// stdin data; the fds arrive later via [`PipeSet::attach`] once the process
/// actually spawns. Buffers outlive their fds, which is what makes output
/// readable after the process has exited and its pipes were closed.
#[derive(Debug)]
pub(crate) struct PipeSet {
    entries: BTreeMap<Descriptor, PipeEntry>,
}

#[derive(Debug)]
struct PipeEntry {
    direction: Direction,
    buffer: BytesMut,
    file: Option<File>,
    /// Write side only: caller asked for EOF, drop the fd once the buffer
    /// has fully flushed
    closing: bool,
}

impl PipeSet {
    pub fn new(spec: &DescriptorSpec) -> Self {
        let entries = spec
            .pipes()
            .map(|(descriptor, direction)| {
                (
                    descriptor,
                    PipeEntry {
                        direction,
                        buffer: BytesMut::new(),
                        file: None,
                        closing: false,
                    },
                )
            })
            .collect();

        Self { entries }
    }

    /// Adopt the pipe fds of a freshly spawned child, switching them to
    /// non-blocking mode
    pub fn attach(&mut self, files: Vec<(Descriptor, File)>) -> PipeResult<()> {
        for (descriptor, file) in files {
            set_nonblocking(&file, descriptor)?;
            let entry = self
                .entries
                .get_mut(&descriptor)
                .ok_or(PipeError::UnknownDescriptor(descriptor))?;
            // closed before spawn with nothing buffered: immediate EOF
            if !(entry.closing && entry.buffer.is_empty()) {
                entry.file = Some(file);
            }
        }
        Ok(())
    }

    /// Append to a write buffer, then attempt an immediate non-blocking flush
    ///
    /// Zero-length writes are legal no-ops. Flushes every ready write
    /// descriptor, not just this one.
    pub fn write_to_buffer(&mut self, descriptor: Descriptor, data: &[u8]) -> PipeResult<()> {
        let entry = self
            .entries
            .get_mut(&descriptor)
            .ok_or(PipeError::UnknownDescriptor(descriptor))?;
        if entry.direction != Direction::Write || entry.closing {
            return Err(PipeError::NotWritable(descriptor));
        }
        entry.buffer.extend_from_slice(data);

        let (_, writable) = self.poll_ready(false, true)?;
        for descriptor in writable {
            self.flush_write(descriptor)?;
        }
        Ok(())
    }

    /// Poll all readable descriptors, fill their buffers, then atomically
    /// drain and return this descriptor's buffer
    pub fn read_from_buffer(&mut self, descriptor: Descriptor) -> PipeResult<Bytes> {
        {
            let entry = self
                .entries
                .get(&descriptor)
                .ok_or(PipeError::UnknownDescriptor(descriptor))?;
            if entry.direction != Direction::Read {
                return Err(PipeError::NotReadable(descriptor));
            }
        }

        let (readable, _) = self.poll_ready(true, false)?;
        for descriptor in readable {
            self.fill_read(descriptor)?;
        }

        let entry = self
            .entries
            .get_mut(&descriptor)
            .ok_or(PipeError::UnknownDescriptor(descriptor))?;
        Ok(entry.buffer.split().freeze())
    }

    /// One zero-timeout readiness poll across both directions: flush ready
    /// write buffers, fill ready read buffers
    pub fn drain(&mut self) -> PipeResult<()> {
        let (readable, writable) = self.poll_ready(true, true)?;
        for descriptor in writable {
            self.flush_write(descriptor)?;
        }
        for descriptor in readable {
            self.fill_read(descriptor)?;
        }
        Ok(())
    }

    /// Close one descriptor from the caller's side
    ///
    /// A read fd is drained once and dropped. A write fd is marked closing
    /// and only dropped once its buffer has fully flushed, so the child sees
    /// EOF after all buffered data, never instead of it.
    pub fn close_descriptor(&mut self, descriptor: Descriptor) -> PipeResult<()> {
        let entry = self
            .entries
            .get_mut(&descriptor)
            .ok_or(PipeError::UnknownDescriptor(descriptor))?;

        match entry.direction {
            Direction::Write => {
                entry.closing = true;
                self.flush_write(descriptor)?;
            }
            Direction::Read => {
                self.fill_read(descriptor)?;
                if let Some(entry) = self.entries.get_mut(&descriptor) {
                    entry.file = None;
                }
            }
        }
        Ok(())
    }

    /// One final read drain, then close every fd; buffers stay readable
    pub fn close(&mut self) {
        self.final_read_drain();
        for entry in self.entries.values_mut() {
            entry.file = None;
        }
    }

    /// Hand the fds over to the detached process's lifetime without closing
    /// them
    pub fn release(&mut self) {
        for entry in self.entries.values_mut() {
            if let Some(file) = entry.file.take() {
                let _ = file.into_raw_fd();
            }
        }
    }

    fn final_read_drain(&mut self) {
        let descriptors: Vec<Descriptor> = self
            .entries
            .iter()
            .filter(|(_, e)| e.direction == Direction::Read && e.file.is_some())
            .map(|(d, _)| *d)
            .collect();
        for descriptor in descriptors {
            if let Err(e) = self.fill_read(descriptor) {
                warn!("final drain of descriptor {} failed: {}", descriptor, e);
            }
        }
    }

    /// Zero-timeout `poll(2)` across the attached fds
    ///
    /// Results are re-associated to descriptors by index into the fd list
    /// built here, never by assuming the poll call preserves ordering of
    /// anything else. Write fds with empty buffers are not polled at all, so
    /// an idle stdin never reports ready in a busy loop.
    fn poll_ready(
        &self,
        read: bool,
        write: bool,
    ) -> PipeResult<(Vec<Descriptor>, Vec<Descriptor>)> {
        let mut poll_fds = Vec::new();
        let mut index_map: Vec<(Descriptor, Direction)> = Vec::new();

        for (descriptor, entry) in &self.entries {
            let Some(file) = &entry.file else { continue };
            let events = match entry.direction {
                Direction::Read if read => PollFlags::POLLIN,
                Direction::Write if write && !entry.buffer.is_empty() => PollFlags::POLLOUT,
                _ => continue,
            };
            poll_fds.push(PollFd::new(file.as_fd(), events));
            index_map.push((*descriptor, entry.direction));
        }

        if poll_fds.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }

        let ready = poll(&mut poll_fds, PollTimeout::ZERO)
            .map_err(|e| PipeError::PollFailed(e.to_string()))?;
        if ready == 0 {
            return Ok((Vec::new(), Vec::new()));
        }

        let mut readable = Vec::new();
        let mut writable = Vec::new();
        for (poll_fd, (descriptor, direction)) in poll_fds.iter().zip(&index_map) {
            let revents = poll_fd.revents().unwrap_or_else(PollFlags::empty);
            match direction {
                Direction::Read
                    if revents.intersects(PollFlags::POLLIN | PollFlags::POLLHUP) =>
                {
                    readable.push(*descriptor);
                }
                Direction::Write
                    if revents.intersects(PollFlags::POLLOUT | PollFlags::POLLERR) =>
                {
                    writable.push(*descriptor);
                }
                _ => {}
            }
        }
        Ok((readable, writable))
    }

    /// Read everything immediately available from one descriptor
    fn fill_read(&mut self, descriptor: Descriptor) -> PipeResult<()> {
        let Some(entry) = self.entries.get_mut(&descriptor) else {
            return Ok(());
        };
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            let read_result = match entry.file.as_ref() {
                Some(mut file) => file.read(&mut chunk),
                None => break,
            };
            match read_result {
                Ok(0) => {
                    // EOF: the write end is gone, stop polling this fd
                    entry.file = None;
                    break;
                }
                Ok(n) => entry.buffer.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(PipeError::Io {
                        descriptor,
                        reason: e.to_string(),
                    })
                }
            }
        }
        Ok(())
    }

    /// Write as much buffered data as the pipe accepts, chunked, honoring
    /// partial writes
    fn flush_write(&mut self, descriptor: Descriptor) -> PipeResult<()> {
        let Some(entry) = self.entries.get_mut(&descriptor) else {
            return Ok(());
        };
        loop {
            if entry.buffer.is_empty() {
                break;
            }
            let chunk = entry.buffer.len().min(WRITE_CHUNK_SIZE);
            let write_result = match entry.file.as_ref() {
                Some(mut file) => file.write(&entry.buffer[..chunk]),
                None => break,
            };
            match write_result {
                Ok(0) => break,
                Ok(n) => entry.buffer.advance(n),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                    // Child closed its end; nothing more can be delivered
                    debug!("descriptor {} closed by peer, discarding buffer", descriptor);
                    entry.file = None;
                    entry.buffer.clear();
                    break;
                }
                Err(e) => {
                    return Err(PipeError::Io {
                        descriptor,
                        reason: e.to_string(),
                    })
                }
            }
        }
        if entry.closing && entry.buffer.is_empty() {
            entry.file = None;
        }
        Ok(())
    }
}

fn set_nonblocking(file: &File, descriptor: Descriptor) -> PipeResult<()> {
    let fd = file.as_raw_fd();
    let flags = fcntl(fd, FcntlArg::F_GETFL).map_err(|e| PipeError::Io {
        descriptor,
        reason: e.to_string(),
    })?;
    let flags = OFlag::from_bits_retain(flags) | OFlag::O_NONBLOCK;
    fcntl(fd, FcntlArg::F_SETFL(flags)).map_err(|e| PipeError::Io {
        descriptor,
        reason: e.to_string(),
    })?;
    Ok(())
}
