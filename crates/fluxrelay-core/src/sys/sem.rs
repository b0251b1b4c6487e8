use std::cell::UnsafeCell;
use std::io;
use std::mem;

/// Unnamed, process-private POSIX counting semaphore.
///
/// The `sem_t` is boxed so its address stays fixed for the lifetime of
/// the semaphore.
pub struct Semaphore {
    inner: Box<UnsafeCell<libc::sem_t>>,
}

// sem_t is designed for concurrent access through its address.
unsafe impl Send for Semaphore {}
unsafe impl Sync for Semaphore {}

impl Semaphore {
    pub fn new(initial: u32) -> io::Result<Self> {
        let inner = Box::new(UnsafeCell::new(unsafe { mem::zeroed::<libc::sem_t>() }));
        let ret = unsafe { libc::sem_init(inner.get(), 0, initial) };
        if ret != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { inner })
    }

    pub fn post(&self) -> io::Result<()> {
        let ret = unsafe { libc::sem_post(self.inner.get()) };
        if ret != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Block until the count is positive, then decrement it.
    pub fn wait(&self) -> io::Result<()> {
        loop {
            let ret = unsafe { libc::sem_wait(self.inner.get()) };
            if ret == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    /// Decrement without blocking. Returns `false` if the count was zero.
    pub fn try_wait(&self) -> bool {
        unsafe { libc::sem_trywait(self.inner.get()) == 0 }
    }

    pub fn value(&self) -> io::Result<u32> {
        let mut value: libc::c_int = 0;
        let ret = unsafe { libc::sem_getvalue(self.inner.get(), &mut value) };
        if ret != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(value.max(0) as u32)
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe { libc::sem_destroy(self.inner.get()) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_post_then_wait() {
        let sem = Semaphore::new(0).unwrap();
        assert!(!sem.try_wait());
        sem.post().unwrap();
        sem.post().unwrap();
        assert_eq!(sem.value().unwrap(), 2);
        sem.wait().unwrap();
        assert!(sem.try_wait());
        assert_eq!(sem.value().unwrap(), 0);
    }

    #[test]
    fn test_wait_blocks_until_post() {
        let sem = Arc::new(Semaphore::new(0).unwrap());
        let waiter = {
            let sem = sem.clone();
            thread::spawn(move || sem.wait())
        };
        thread::sleep(std::time::Duration::from_millis(20));
        assert!(!waiter.is_finished());
        sem.post().unwrap();
        waiter.join().unwrap().unwrap();
    }
}
