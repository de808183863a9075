//! Process memory statistics.
//!
//! `getrusage` through `libc` is the only `unsafe` in the crate, and it
//! stays in this file.

/// Peak resident set size of this process in bytes, or `None` when the
/// platform cannot report it.
#[cfg(unix)]
pub fn peak_usage() -> Option<u64> {
    let mut usage = std::mem::MaybeUninit::<libc::rusage>::zeroed();
    // SAFETY: getrusage only writes into the provided struct.
    let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, usage.as_mut_ptr()) };
    if rc != 0 {
        return None;
    }
    // SAFETY: zero-initialised and filled by a successful getrusage call.
    let usage = unsafe { usage.assume_init() };
    let max_rss = u64::try_from(usage.ru_maxrss).ok()?;

    // ru_maxrss is bytes on Apple platforms, kilobytes elsewhere.
    if cfg!(target_vendor = "apple") {
        Some(max_rss)
    } else {
        Some(max_rss.saturating_mul(1024))
    }
}

#[cfg(not(unix))]
pub fn peak_usage() -> Option<u64> {
    None
}

#[cfg(all(test, unix))]
mod tests {
    #[test]
    fn peak_usage_is_reported_and_grows_monotonically() {
        let before = super::peak_usage().unwrap();
        assert!(before > 0);
        let buf = vec![1u8; 8 << 20];
        std::hint::black_box(&buf);
        assert!(super::peak_usage().unwrap() >= before);
    }
}
