use std::thread;

/// Join a background thread unless it is the calling thread.
///
/// Listener callbacks run on these threads and may call back into the
/// component that owns them; such a thread is left to finish on its own.
/// Returns `false` if the thread panicked.
pub(crate) fn join_worker(handle: thread::JoinHandle<()>) -> bool {
    if handle.thread().id() == thread::current().id() {
        return true;
    }
    handle.join().is_ok()
}
