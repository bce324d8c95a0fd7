#[cfg(feature = "loom")]
mod imp {
    pub(crate) use loom::sync::atomic::{AtomicUsize, Ordering, fence};
}

#[cfg(not(feature = "loom"))]
mod imp {
    pub(crate) use core::sync::atomic::{AtomicUsize, Ordering, fence};
}

pub(crate) use imp::*;
