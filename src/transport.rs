//! Byte-sink transports.
//!
//! A transport is whatever carries the stream off the device: a UART, a USB
//! CDC endpoint, a socket on a hosted build. The tracer only needs a
//! non-blocking `write`.

use crate::drain::{DrainSignal, Pending};
use crate::kernel::Kernel;
use crate::tracer::Tracer;

/// Bytes pulled from the trace buffer per notify.
pub const FORWARD_CHUNK: usize = 512;

/// Physical transport for the trace stream.
pub trait Transport {
    /// Write as much of `bytes` as the device accepts right now, returning
    /// the count.
    fn write(&mut self, bytes: &[u8]) -> usize;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(&mut self, bytes: &[u8]) -> usize {
        (**self).write(bytes)
    }
}

/// Notify hook that forwards buffered bytes to a [`Transport`].
///
/// Bytes leave the ring buffer before the transport sees them, so whatever
/// the transport refuses is gone; it is counted in [`Forwarder::refused`].
pub struct Forwarder<T> {
    transport: T,
    chunk: [u8; FORWARD_CHUNK],
    forwarded: u64,
    refused: u64,
}

impl<T: Transport> Forwarder<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            chunk: [0; FORWARD_CHUNK],
            forwarded: 0,
            refused: 0,
        }
    }

    /// Move one chunk from the buffer to the transport.
    pub fn pump(&mut self, pending: &Pending<'_>) -> usize {
        let n = pending.get(&mut self.chunk);
        if n == 0 {
            return 0;
        }
        let written = self.transport.write(&self.chunk[..n]);
        self.forwarded += written as u64;
        self.refused += (n - written.min(n)) as u64;
        written
    }

    /// Bytes the transport accepted.
    pub fn forwarded(&self) -> u64 {
        self.forwarded
    }

    /// Bytes dropped because the transport did not accept them.
    pub fn refused(&self) -> u64 {
        self.refused
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }
}

/// Route the drain task's output into `transport` and start recording.
///
/// Call this from the transport's receive indication, i.e. once the host
/// side has opened the connection.
pub fn connect<K, S, T>(tracer: &Tracer<K, S>, transport: T)
where
    K: Kernel,
    S: DrainSignal,
    T: Transport + Send + 'static,
{
    let mut forwarder = Forwarder::new(transport);
    tracer.set_notify_hook(move |pending| {
        forwarder.pump(pending);
    });
    tracer.start();
}
