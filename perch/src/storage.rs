//! Single-allocation layout: control block first, payload at a fixed offset.
//!
//! The control block is padded to `CACHE_LINE_SIZE` so that converting
//! between block and payload addresses is a constant offset for every actor
//! type, and no cross pointer has to be stored.

use std::alloc::{self, Layout};
use std::mem;
use std::ptr::{self, NonNull};
use std::sync::Weak;
use std::sync::atomic::Ordering;

use perch_api::identity::ActorAddress;

use crate::actor::AbstractActor;
use crate::control_block::{ActorControlBlock, ActorVTable, CACHE_LINE_SIZE};
use crate::system::SystemInner;

#[cfg_attr(
    any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "powerpc64"),
    repr(C, align(128))
)]
#[cfg_attr(target_arch = "s390x", repr(C, align(256)))]
#[cfg_attr(
    not(any(
        target_arch = "x86_64",
        target_arch = "aarch64",
        target_arch = "powerpc64",
        target_arch = "s390x",
    )),
    repr(C, align(64))
)]
struct CacheAligned<T>(T);

#[repr(C)]
pub(crate) struct ActorStorage<T> {
    ctrl: CacheAligned<ActorControlBlock>,
    data: T,
}

impl<T: AbstractActor> ActorStorage<T> {
    const LAYOUT_CHECK: () = {
        assert!(mem::size_of::<ActorControlBlock>() <= CACHE_LINE_SIZE);
        assert!(mem::size_of::<CacheAligned<ActorControlBlock>>() == CACHE_LINE_SIZE);
        assert!(
            mem::align_of::<T>() <= CACHE_LINE_SIZE,
            "actor payload alignment exceeds the cache line size"
        );
    };

    const VTABLE: ActorVTable = ActorVTable {
        data_dtor: Self::drop_data,
        block_dtor: Self::free_block,
        data: Self::data,
    };

    /// Allocates storage for `payload` and returns its control block. The
    /// returned pointer owns the initial strong reference.
    pub(crate) fn allocate(
        address: ActorAddress,
        home_system: Weak<SystemInner>,
        payload: T,
    ) -> NonNull<ActorControlBlock> {
        #[allow(clippy::let_unit_value)]
        let () = Self::LAYOUT_CHECK;
        let layout = Layout::new::<Self>();
        unsafe {
            let raw = alloc::alloc(layout).cast::<Self>();
            if raw.is_null() {
                alloc::handle_alloc_error(layout);
            }
            ptr::addr_of_mut!((*raw).ctrl).write(CacheAligned(ActorControlBlock::new(
                address,
                home_system,
                &Self::VTABLE,
            )));
            ptr::addr_of_mut!((*raw).data).write(payload);
            NonNull::new_unchecked(raw).cast()
        }
    }

    unsafe fn drop_data(this: NonNull<ActorControlBlock>) {
        // The weak unit of the strong references is still held, so the block
        // outlives this call.
        let block = unsafe { this.as_ref() };
        let _span = crate::actor_span!(block.address()).entered();

        let storage = this.cast::<Self>().as_ptr();
        unsafe { ptr::drop_in_place(ptr::addr_of_mut!((*storage).data)) };

        if let Some(system) = block.home_system_weak().upgrade() {
            if system.node == block.node() {
                system.registry.erase(block.id());
            }
        }
    }

    unsafe fn free_block(this: NonNull<ActorControlBlock>) {
        let storage = this.cast::<Self>().as_ptr();
        let home_system = unsafe { this.as_ref() }.home_system_weak().upgrade();
        unsafe {
            ptr::drop_in_place(ptr::addr_of_mut!((*storage).ctrl));
            alloc::dealloc(storage.cast(), Layout::new::<Self>());
        }
        if let Some(system) = home_system {
            system.live_blocks.fetch_sub(1, Ordering::Relaxed);
        }
    }

    unsafe fn data(this: NonNull<ActorControlBlock>) -> NonNull<dyn AbstractActor> {
        let data = ActorControlBlock::data_ptr(this.as_ptr()).cast::<T>().cast_mut();
        // SAFETY: `this` is the start of a live storage allocation, so the
        // payload address is in bounds and non-null.
        let data: NonNull<T> = unsafe { NonNull::new_unchecked(data) };
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::{EnqueueResult, Mailbox, MailboxElement};

    #[repr(align(64))]
    struct WideActor;

    impl AbstractActor for WideActor {
        fn enqueue(&self, _element: MailboxElement) -> EnqueueResult {
            EnqueueResult::Success
        }
    }

    #[test]
    fn test_mailbox_payload_fits_behind_block() {
        assert!(mem::align_of::<Mailbox>() <= CACHE_LINE_SIZE);
        assert_eq!(mem::offset_of!(ActorStorage<Mailbox>, data), CACHE_LINE_SIZE);
        assert_eq!(mem::align_of::<CacheAligned<ActorControlBlock>>(), CACHE_LINE_SIZE);
    }

    #[test]
    fn test_payload_starts_at_cache_line() {
        assert_eq!(mem::offset_of!(ActorStorage<u8>, data), CACHE_LINE_SIZE);
        assert_eq!(mem::offset_of!(ActorStorage<WideActor>, data), CACHE_LINE_SIZE);
        assert_eq!(mem::offset_of!(ActorStorage<[u64; 32]>, data), CACHE_LINE_SIZE);
    }
}
