//! Tracer configuration.
//!
//! All values are fixed at construction. The defaults match a Cortex-M part
//! with RAM at `0x2000_0000` and word-aligned kernel objects; the clock
//! frequencies have no sensible default and must be supplied by the board.

/// Tracer settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceConfig {
    /// Ring buffer size in bytes. Must be a power of two.
    pub buffer_size: usize,

    /// The drain task keeps pulling while more than this many bytes are
    /// pending.
    pub drain_threshold: usize,

    /// Lowest address an object id is computed from.
    pub ram_base: usize,

    /// Right shift applied to object offsets (2 for word-aligned objects).
    pub id_shift: u32,

    /// Timestamp clock frequency in Hz.
    pub sys_freq: u32,

    /// CPU clock frequency in Hz.
    pub cpu_freq: u32,

    pub app_name: &'static str,
    pub os_name: &'static str,

    /// Free-form description records, e.g. interrupt names (`"I#15=SysTick"`).
    pub sys_desc: [&'static str; 2],

    /// Longest description or print string sent, in bytes.
    pub max_string_len: usize,

    pub thread_name_max: usize,
    pub object_name_max: usize,
}

impl TraceConfig {
    pub const DEFAULT_BUFFER_SIZE: usize = 2048;
    pub const DEFAULT_DRAIN_THRESHOLD: usize = 1024;
    pub const DEFAULT_RAM_BASE: usize = 0x2000_0000;
    pub const DEFAULT_ID_SHIFT: u32 = 2;

    pub const fn new() -> Self {
        Self {
            buffer_size: Self::DEFAULT_BUFFER_SIZE,
            drain_threshold: Self::DEFAULT_DRAIN_THRESHOLD,
            ram_base: Self::DEFAULT_RAM_BASE,
            id_shift: Self::DEFAULT_ID_SHIFT,
            sys_freq: 0,
            cpu_freq: 0,
            app_name: "RT-Thread RTI",
            os_name: "RT-Thread",
            sys_desc: ["I#15=SysTick", ""],
            max_string_len: 128,
            thread_name_max: 32,
            object_name_max: 8,
        }
    }

    pub const fn with_buffer_size(mut self, bytes: usize) -> Self {
        self.buffer_size = bytes;
        self
    }

    pub const fn with_drain_threshold(mut self, bytes: usize) -> Self {
        self.drain_threshold = bytes;
        self
    }

    /// Set the object id compression parameters.
    pub const fn with_ids(mut self, ram_base: usize, id_shift: u32) -> Self {
        self.ram_base = ram_base;
        self.id_shift = id_shift;
        self
    }

    pub const fn with_clocks(mut self, sys_freq: u32, cpu_freq: u32) -> Self {
        self.sys_freq = sys_freq;
        self.cpu_freq = cpu_freq;
        self
    }

    pub const fn with_app_name(mut self, name: &'static str) -> Self {
        self.app_name = name;
        self
    }

    pub const fn with_os_name(mut self, name: &'static str) -> Self {
        self.os_name = name;
        self
    }

    pub const fn with_sys_desc(mut self, desc: [&'static str; 2]) -> Self {
        self.sys_desc = desc;
        self
    }

    /// Limit for print and system-description strings. Records with fields
    /// after the string cap it further so those fields still fit.
    pub const fn with_max_string_len(mut self, len: usize) -> Self {
        self.max_string_len = len;
        self
    }

    pub const fn with_name_limits(mut self, thread: usize, object: usize) -> Self {
        self.thread_name_max = thread;
        self.object_name_max = object;
        self
    }

    /// Fill level above which a parked drain task is woken.
    #[inline]
    pub const fn watermark(&self) -> usize {
        self.buffer_size / 2
    }
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self::new()
    }
}
