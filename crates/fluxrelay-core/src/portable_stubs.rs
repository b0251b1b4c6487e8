// Portable stand-ins for the Linux `sys` module.

pub mod sys {
    pub mod affinity {
        use lazy_static::lazy_static;
        use std::io;

        lazy_static! {
            static ref ALLOWED_CORES: Vec<usize> = {
                let n = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
                (0..n).collect()
            };
        }

        pub fn allowed_cores() -> &'static [usize] {
            &ALLOWED_CORES
        }

        pub fn is_allowed(core: usize) -> bool {
            ALLOWED_CORES.binary_search(&core).is_ok()
        }

        /// Validates the core only; thread affinity is not portable.
        pub fn pin_current(core: usize) -> io::Result<()> {
            if !is_allowed(core) {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("core {} is not available", core),
                ));
            }
            Ok(())
        }

        pub fn current_core() -> Option<usize> {
            None
        }
    }

    pub mod sem {
        use std::io;
        use std::sync::{Condvar, Mutex, PoisonError};

        pub struct Semaphore {
            count: Mutex<u32>,
            cond: Condvar,
        }

        impl Semaphore {
            pub fn new(initial: u32) -> io::Result<Self> {
                Ok(Self { count: Mutex::new(initial), cond: Condvar::new() })
            }

            pub fn post(&self) -> io::Result<()> {
                let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
                *count += 1;
                self.cond.notify_one();
                Ok(())
            }

            pub fn wait(&self) -> io::Result<()> {
                let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
                while *count == 0 {
                    count = self.cond.wait(count).unwrap_or_else(PoisonError::into_inner);
                }
                *count -= 1;
                Ok(())
            }

            pub fn try_wait(&self) -> bool {
                let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
                if *count == 0 {
                    return false;
                }
                *count -= 1;
                true
            }

            pub fn value(&self) -> io::Result<u32> {
                Ok(*self.count.lock().unwrap_or_else(PoisonError::into_inner))
            }
        }
    }
}
