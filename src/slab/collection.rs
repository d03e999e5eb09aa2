//! A lock-free, hazard-pointer protected stack of descriptors.
//!
//! Both the descriptor pool's free list and each size class's
//! partial-descriptor stack are one of these, linked through a descriptor's
//! own intrusive [`next`](crate::slab::descriptor::Descriptor) pointer rather
//! than a separate wrapper node - there is exactly one stack a live
//! descriptor can be a member of at any time, so the intrusive link is never
//! shared between two stacks.
//!
//! This is a standard Treiber stack; what's added is hazard-pointer
//! protection of the head read in `pop`, so a thread that loses the removal
//! race can't be left dereferencing a descriptor some other thread has
//! already returned to the OS.

use std::sync::atomic::{AtomicPtr, Ordering};

use crate::slab::descriptor::Descriptor;

crate::create_hazard_domain!(descriptor_stack_domain);
pub(crate) use descriptor_stack_domain as stack_domain;

/// An intrusive, hazard-protected Treiber stack of `*mut Descriptor`.
pub(crate) struct DescriptorStack {
    head: AtomicPtr<Descriptor>,
}

impl DescriptorStack {
    pub(crate) const fn new() -> Self {
        Self {
            head: AtomicPtr::new(std::ptr::null_mut()),
        }
    }

    /// Pushes `desc` onto the stack. The caller must own `desc` exclusively -
    /// it must not already be reachable from this or any other stack.
    pub(crate) fn push(&self, desc: *mut Descriptor) {
        debug_assert!(!desc.is_null());
        let desc_ref = unsafe { &*desc };

        let mut head = self.head.load(Ordering::Acquire);
        loop {
            desc_ref.next.store(head, Ordering::Release);
            match self
                .head
                .compare_exchange_weak(head, desc, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return,
                Err(current) => head = current,
            }
        }
    }

    /// Atomically installs `chain` as the head of the stack, but only if the
    /// stack is currently empty. Used by the descriptor pool to publish a
    /// freshly OS-allocated batch: if this fails, some other thread beat us
    /// to it and the caller's batch must be freed instead.
    pub(crate) fn try_install_chain_if_empty(&self, chain: *mut Descriptor) -> bool {
        self.head
            .compare_exchange(
                std::ptr::null_mut(),
                chain,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Pops every descriptor currently on the stack, in LIFO order. Only
    /// used by the offline consistency checker, which must inspect every
    /// partial descriptor and then restore them; draining the whole stack is
    /// acceptable only for that offline diagnostic role, never a hot path.
    #[cfg(any(test, feature = "testing"))]
    pub(crate) fn drain_all(&self) -> Vec<*mut Descriptor> {
        let mut drained = Vec::new();
        while let Some(desc) = self.pop() {
            drained.push(desc);
        }
        drained
    }

    /// Pops the top descriptor, or `None` if the stack is empty.
    ///
    /// The returned pointer is guaranteed to still point at a live
    /// descriptor by the time this returns - a hazard guard protects it for
    /// the duration of the removal CAS, so a concurrent popper that wins the
    /// race against us can't free it out from under our read of `next`.
    pub(crate) fn pop(&self) -> Option<*mut Descriptor> {
        loop {
            let guard = descriptor_stack_domain::protect(&self.head, Ordering::Acquire, Ordering::Acquire);
            let head = guard.raw() as *mut Descriptor;
            if head.is_null() {
                return None;
            }

            let next = unsafe { &*head }.next.load(Ordering::Acquire);
            if self
                .head
                .compare_exchange_weak(head, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Some(head);
            }
        }
    }
}
