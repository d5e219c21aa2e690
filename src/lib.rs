//! RTI: kernel event tracer.
//!
//! Records scheduler, interrupt, timer and IPC activity of a preemptive RTOS
//! as a SystemView-compatible packet stream. Events are encoded on the
//! producer's stack, admitted into a ring buffer under the interrupt mask,
//! and forwarded off-device by a low-priority drain task.
//!
//! ```text
//! kernel hook -> TraceHooks -> Packet -> Tracer::send -> RingBuffer
//!                                                          |
//!                            Transport <- notify hook <- drain task
//! ```
//!
//! Typical bring-up:
//!
//! ```ignore
//! let tracer = Arc::new(Tracer::new(kernel, TraceConfig::new().with_clocks(72_000_000, 72_000_000))?);
//! rti::spawn_drain(tracer.clone())?;
//! kernel.set_trace_hooks(tracer.clone());
//! // once the host side is listening:
//! rti::connect(&*tracer, uart);
//! ```

#![no_std]

extern crate alloc;

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod arch;
pub mod buffer;
pub mod codec;
pub mod config;
pub mod drain;
pub mod error;
pub mod hooks;
pub mod kernel;
pub mod logger;
mod macros;
pub mod packet;
pub mod print;
pub mod status;
pub mod timestamp;
pub mod tracer;
pub mod transport;

pub use config::TraceConfig;
pub use drain::{DefaultSignal, DrainSignal, Pending, SpinSignal};
#[cfg(feature = "std")]
pub use drain::{spawn_drain, CondvarSignal};
pub use error::TraceError;
pub use hooks::TraceHooks;
pub use kernel::{object_id, Kernel, KernelObject, ObjectClass, ThreadInfo};
pub use logger::TraceLogger;
pub use packet::EventId;
pub use print::PrintLevel;
pub use status::{TraceMask, TraceState, TraceStatus};
pub use tracer::{NotifyHook, Tracer};
pub use transport::{connect, Forwarder, Transport};
