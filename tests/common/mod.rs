//! Shared fixtures for the tracer integration tests: a scriptable kernel
//! and a decoder that parses the produced stream back into frames.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use rti::codec::{decode_string, decode_value};
use rti::{EventId, Kernel, SpinSignal, ThreadInfo, TraceConfig, Tracer};

pub const RAM_BASE: usize = 0x2000_0000;
pub const IDLE: usize = RAM_BASE + 0x100;
pub const MAIN: usize = RAM_BASE + 0x200;
pub const WORKER: usize = RAM_BASE + 0x300;

/// Object id of an address under the default id compression.
pub fn id(addr: usize) -> u32 {
    rti::object_id(addr, RAM_BASE, 2)
}

#[derive(Clone)]
pub struct MockThread {
    pub addr: usize,
    pub name: &'static str,
    pub priority: u32,
    pub stack_addr: usize,
    pub stack_size: u32,
}

/// Kernel stand-in with a manual clock.
///
/// Every timestamp read advances the clock by `step` and returns the new
/// value, so the delta of the next packet is exactly `step`.
pub struct MockKernel {
    pub clock: AtomicU32,
    pub step: AtomicU32,
    pub nest: AtomicU32,
    pub vector: AtomicU32,
    pub current: AtomicUsize,
    pub time_ms: u64,
    pub threads: Vec<MockThread>,
}

impl MockKernel {
    pub fn new() -> Self {
        Self {
            clock: AtomicU32::new(0),
            step: AtomicU32::new(0x10),
            nest: AtomicU32::new(0),
            vector: AtomicU32::new(15),
            current: AtomicUsize::new(MAIN),
            time_ms: 1234,
            threads: vec![
                MockThread {
                    addr: IDLE,
                    name: "tidle0",
                    priority: 31,
                    stack_addr: 0x2000_8000,
                    stack_size: 256,
                },
                MockThread {
                    addr: MAIN,
                    name: "main",
                    priority: 10,
                    stack_addr: 0x2000_9000,
                    stack_size: 2048,
                },
                MockThread {
                    addr: WORKER,
                    name: "worker",
                    priority: 20,
                    stack_addr: 0x2000_A000,
                    stack_size: 1024,
                },
            ],
        }
    }

    pub fn set_step(&self, step: u32) {
        self.step.store(step, Ordering::SeqCst);
    }

    pub fn set_nest(&self, nest: u32) {
        self.nest.store(nest, Ordering::SeqCst);
    }

    pub fn set_current(&self, thread: usize) {
        self.current.store(thread, Ordering::SeqCst);
    }
}

impl Kernel for MockKernel {
    fn timestamp(&self) -> u32 {
        let step = self.step.load(Ordering::SeqCst);
        self.clock.fetch_add(step, Ordering::SeqCst).wrapping_add(step)
    }

    fn active_interrupt(&self) -> u32 {
        self.vector.load(Ordering::SeqCst)
    }

    fn interrupt_nest(&self) -> u32 {
        self.nest.load(Ordering::SeqCst)
    }

    fn current_thread(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    fn idle_thread(&self) -> usize {
        IDLE
    }

    fn system_time_ms(&self) -> u64 {
        self.time_ms
    }

    fn for_each_thread(&self, f: &mut dyn FnMut(&ThreadInfo<'_>)) {
        for t in &self.threads {
            f(&ThreadInfo {
                addr: t.addr,
                name: t.name,
                priority: t.priority,
                stack_addr: t.stack_addr,
                stack_size: t.stack_size,
            });
        }
    }
}

pub fn config(buffer_size: usize) -> TraceConfig {
    TraceConfig::new()
        .with_buffer_size(buffer_size)
        .with_drain_threshold(buffer_size / 2)
        .with_clocks(72_000_000, 72_000_000)
}

pub type TestTracer = Tracer<MockKernel, SpinSignal>;

pub fn tracer(buffer_size: usize) -> TestTracer {
    tracer_with(MockKernel::new(), buffer_size)
}

pub fn tracer_with(kernel: MockKernel, buffer_size: usize) -> TestTracer {
    Tracer::with_signal(kernel, config(buffer_size), SpinSignal::new()).unwrap()
}

/// Pull everything buffered.
pub fn drain<K: Kernel, D: rti::DrainSignal>(tracer: &Tracer<K, D>) -> Vec<u8> {
    let mut out = Vec::new();
    let mut chunk = [0u8; 256];
    loop {
        let n = tracer.get(&mut chunk);
        if n == 0 {
            return out;
        }
        out.extend_from_slice(&chunk[..n]);
    }
}

// =============================================================================
// Stream decoder
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Value(u32),
    Str(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub id: u16,
    pub fields: Vec<Field>,
    /// Trailing timestamp delta; the overflow record has none.
    pub delta: Option<u32>,
}

impl Frame {
    pub fn value(&self, i: usize) -> u32 {
        match &self.fields[i] {
            Field::Value(v) => *v,
            other => panic!("field {} of id {} is {:?}", i, self.id, other),
        }
    }

    pub fn text(&self, i: usize) -> &str {
        match &self.fields[i] {
            Field::Str(s) => s,
            other => panic!("field {} of id {} is {:?}", i, self.id, other),
        }
    }
}

#[derive(Clone, Copy)]
enum Kind {
    Val,
    Str,
}

const V: Kind = Kind::Val;
const S: Kind = Kind::Str;

/// Payload layout of the ids the tracer emits.
fn shape(id: u16) -> &'static [Kind] {
    match id {
        EventId::OVERFLOW => &[V, V],
        EventId::ISR_ENTER => &[V],
        EventId::THREAD_START_EXEC => &[V],
        EventId::THREAD_START_READY => &[V],
        EventId::THREAD_STOP_READY => &[V, V],
        EventId::THREAD_CREATE => &[V],
        EventId::THREAD_INFO => &[V, V, S],
        EventId::SYSTIME_CYCLES => &[V, V],
        EventId::SYSDESC => &[S],
        EventId::TIMER_ENTER => &[V],
        EventId::STACK_INFO => &[V, V, V, V],
        EventId::INIT => &[V, V, V, V],
        EventId::PRINT_FORMATTED => &[S, V, V],
        61..=63 => &[S, V],
        41..=43 | 51..=53 | 71..=73 | 81..=83 => &[S],
        _ => &[],
    }
}

fn parse_fields(id: u16, mut bytes: &[u8]) -> (Vec<Field>, usize) {
    let mut fields = Vec::new();
    let mut used = 0;
    for kind in shape(id) {
        match kind {
            Kind::Val => {
                let (v, n) = decode_value(bytes).expect("truncated value");
                fields.push(Field::Value(v));
                bytes = &bytes[n..];
                used += n;
            }
            Kind::Str => {
                let (s, n) = decode_string(bytes).expect("truncated string");
                fields.push(Field::Str(String::from_utf8_lossy(s).into_owned()));
                bytes = &bytes[n..];
                used += n;
            }
        }
    }
    (fields, used)
}

fn read_short(bytes: &[u8]) -> (usize, usize) {
    if bytes[0] & 0x80 != 0 {
        (((bytes[0] & 0x7F) as usize) | ((bytes[1] as usize) << 7), 2)
    } else {
        (bytes[0] as usize, 1)
    }
}

/// Decoded stream: whether it began with the sync preamble, then frames.
pub struct Stream {
    pub synced: bool,
    pub frames: Vec<Frame>,
}

impl Stream {
    pub fn ids(&self) -> Vec<u16> {
        self.frames.iter().map(|f| f.id).collect()
    }
}

pub fn decode(mut bytes: &[u8]) -> Stream {
    let synced = bytes.len() >= 10 && bytes[..10].iter().all(|&b| b == 0);
    if synced {
        bytes = &bytes[10..];
    }

    let mut frames = Vec::new();
    while !bytes.is_empty() {
        let (id, payload_len, header_len) = if (bytes[0] as u16) < EventId::FIRST_LENGTH_PREFIXED {
            (bytes[0] as u16, None, 1)
        } else {
            let (id, n) = read_short(bytes);
            let (len, m) = read_short(&bytes[n..]);
            (id as u16, Some(len), n + m)
        };
        bytes = &bytes[header_len..];

        let (fields, parsed) = parse_fields(id, bytes);
        let body = payload_len.unwrap_or(parsed);
        assert_eq!(parsed, body, "payload length mismatch for id {}", id);
        bytes = &bytes[body..];

        let delta = if id == EventId::OVERFLOW {
            None
        } else {
            let (d, n) = decode_value(bytes).expect("missing timestamp delta");
            bytes = &bytes[n..];
            Some(d)
        };
        frames.push(Frame { id, fields, delta });
    }
    Stream { synced, frames }
}
