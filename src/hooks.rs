//! Kernel lifecycle hooks.
//!
//! The kernel calls these from its scheduler, interrupt entry/exit, timer
//! and IPC paths. Every hook first checks that recording is on and that its
//! category is not disabled, then records a single event (two for thread
//! creation and interrupt return).
//!
//! Hooks run in whatever context the kernel is in, including interrupt
//! handlers. They never block and never allocate.

use crate::drain::DrainSignal;
use crate::kernel::{Kernel, KernelObject, ObjectClass, ThreadInfo};
use crate::packet::{string_room, EventId, Packet};
use crate::status::TraceMask;
use crate::tracer::Tracer;

/// Callbacks a kernel invokes on lifecycle events.
///
/// Thread and timer identities are their control-block addresses.
pub trait TraceHooks {
    /// Interrupt entry; the number is read from the CPU.
    fn on_interrupt_enter(&self);

    /// Interrupt entry for controllers whose handler knows the number
    /// (e.g. a GIC dispatcher after acknowledging the IRQ).
    fn on_interrupt_enter_irq(&self, irq: u32);

    /// Interrupt exit, after the kernel decremented its nesting count.
    fn on_interrupt_leave(&self);

    fn on_timer_enter(&self, timer: usize);
    fn on_timer_exit(&self, timer: usize);

    /// A thread was initialized.
    fn on_thread_inited(&self, thread: &ThreadInfo<'_>);
    fn on_thread_suspend(&self, thread: usize);
    fn on_thread_resume(&self, thread: usize);

    /// Context switch from `from` to `to`.
    fn on_scheduler(&self, from: usize, to: usize);

    fn on_object_detach(&self, object: &KernelObject<'_>);
    fn on_object_try_take(&self, object: &KernelObject<'_>);
    fn on_object_take(&self, object: &KernelObject<'_>);
    fn on_object_put(&self, object: &KernelObject<'_>);
}

/// Category and id block of a synchronization object class.
fn sync_class(class: ObjectClass) -> Option<(TraceMask, u16)> {
    match class {
        ObjectClass::Semaphore => Some((TraceMask::SEMAPHORE, EventId::SEM_BASE)),
        ObjectClass::Mutex => Some((TraceMask::MUTEX, EventId::MUTEX_BASE)),
        ObjectClass::Event => Some((TraceMask::EVENT, EventId::EVENT_BASE)),
        ObjectClass::MailBox => Some((TraceMask::MAILBOX, EventId::MAILBOX_BASE)),
        ObjectClass::MessageQueue => Some((TraceMask::QUEUE, EventId::QUEUE_BASE)),
        _ => None,
    }
}

impl<K: Kernel, S: DrainSignal> Tracer<K, S> {
    /// Thread `id` starts executing, or idle if it is the idle thread.
    fn record_running(&self, thread: usize) {
        if thread == self.kernel.idle_thread() {
            self.send_void(EventId::IDLE);
        } else {
            self.send_value(EventId::THREAD_START_EXEC, self.object_id(thread));
        }
    }

    fn record_stop_ready(&self, thread: usize) {
        let mut packet = Packet::new();
        packet.value(self.object_id(thread)).value(0);
        self.send(&mut packet, EventId::THREAD_STOP_READY);
    }

    /// Object name, plus the flag set for event objects.
    fn record_object(&self, object: &KernelObject<'_>, offset: u16) {
        let Some((category, base)) = sync_class(object.class) else {
            return;
        };
        if !self.recording(category) {
            return;
        }

        let mut packet = Packet::new();
        let name_max = self.config.object_name_max.min(string_room(1));
        packet.string(object.name, name_max);
        if object.class == ObjectClass::Event {
            packet.value(object.event_set);
        }
        self.send(&mut packet, base + offset);
    }
}

impl<K: Kernel, S: DrainSignal> TraceHooks for Tracer<K, S> {
    fn on_interrupt_enter(&self) {
        if !self.recording(TraceMask::INTERRUPT) {
            return;
        }
        self.send_value(EventId::ISR_ENTER, self.kernel.active_interrupt());
    }

    fn on_interrupt_enter_irq(&self, irq: u32) {
        if !self.recording(TraceMask::INTERRUPT) {
            return;
        }
        self.send_value(EventId::ISR_ENTER, irq);
    }

    fn on_interrupt_leave(&self) {
        if !self.recording(TraceMask::INTERRUPT) {
            return;
        }
        if self.kernel.interrupt_nest() > 0 {
            self.send_void(EventId::ISR_EXIT);
            return;
        }
        self.send_void(EventId::ISR_TO_SCHEDULER);
        self.record_running(self.kernel.current_thread());
    }

    fn on_timer_enter(&self, timer: usize) {
        if !self.recording(TraceMask::TIMER) {
            return;
        }
        self.send_value(EventId::TIMER_ENTER, self.object_id(timer));
    }

    fn on_timer_exit(&self, _timer: usize) {
        if !self.recording(TraceMask::TIMER) {
            return;
        }
        self.send_void(EventId::TIMER_EXIT);
    }

    fn on_thread_inited(&self, thread: &ThreadInfo<'_>) {
        if !self.recording(TraceMask::THREAD) {
            return;
        }
        self.send_value(EventId::THREAD_CREATE, self.object_id(thread.addr));
        self.send_thread_info(thread);
    }

    fn on_thread_suspend(&self, thread: usize) {
        if !self.recording(TraceMask::THREAD) {
            return;
        }
        self.record_stop_ready(thread);
    }

    fn on_thread_resume(&self, thread: usize) {
        if !self.recording(TraceMask::THREAD) {
            return;
        }
        self.send_value(EventId::THREAD_START_READY, self.object_id(thread));
    }

    fn on_scheduler(&self, from: usize, to: usize) {
        if !self.recording(TraceMask::SCHEDULER) {
            return;
        }
        self.record_stop_ready(from);
        self.record_running(to);
    }

    fn on_object_detach(&self, object: &KernelObject<'_>) {
        if object.class != ObjectClass::Thread || !self.recording(TraceMask::THREAD) {
            return;
        }
        self.send_void(EventId::THREAD_STOP_EXEC);
    }

    fn on_object_try_take(&self, object: &KernelObject<'_>) {
        self.record_object(object, EventId::TRY_TAKE);
    }

    fn on_object_take(&self, object: &KernelObject<'_>) {
        self.record_object(object, EventId::TAKEN);
    }

    fn on_object_put(&self, object: &KernelObject<'_>) {
        self.record_object(object, EventId::RELEASE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_class_blocks() {
        assert_eq!(
            sync_class(ObjectClass::Semaphore),
            Some((TraceMask::SEMAPHORE, 40))
        );
        assert_eq!(sync_class(ObjectClass::Event), Some((TraceMask::EVENT, 60)));
        assert_eq!(
            sync_class(ObjectClass::MessageQueue),
            Some((TraceMask::QUEUE, 80))
        );
        assert_eq!(sync_class(ObjectClass::Thread), None);
        assert_eq!(sync_class(ObjectClass::Timer), None);
        assert_eq!(sync_class(ObjectClass::Other), None);
    }
}
