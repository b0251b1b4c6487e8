use lazy_static::lazy_static;
use std::io;
use std::mem;

lazy_static! {
    /// Cores in the process affinity mask, read once.
    static ref ALLOWED_CORES: Vec<usize> = read_allowed_cores();
}

fn read_allowed_cores() -> Vec<usize> {
    let mut set: libc::cpu_set_t = unsafe { mem::zeroed() };
    let ret = unsafe { libc::sched_getaffinity(0, mem::size_of::<libc::cpu_set_t>(), &mut set) };
    if ret != 0 {
        let n = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        return (0..n).collect();
    }
    (0..libc::CPU_SETSIZE as usize)
        .filter(|&cpu| unsafe { libc::CPU_ISSET(cpu, &set) })
        .collect()
}

/// Sorted list of cores the process may be scheduled on.
pub fn allowed_cores() -> &'static [usize] {
    &ALLOWED_CORES
}

pub fn is_allowed(core: usize) -> bool {
    ALLOWED_CORES.binary_search(&core).is_ok()
}

/// Bind the calling thread to a single core.
pub fn pin_current(core: usize) -> io::Result<()> {
    if !is_allowed(core) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("core {} is not in the process affinity mask", core),
        ));
    }

    let mut set: libc::cpu_set_t = unsafe { mem::zeroed() };
    unsafe { libc::CPU_SET(core, &mut set) };

    let ret = unsafe { libc::sched_setaffinity(0, mem::size_of::<libc::cpu_set_t>(), &set) };
    if ret != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Core the calling thread is running on right now.
pub fn current_core() -> Option<usize> {
    let cpu = unsafe { libc::sched_getcpu() };
    if cpu < 0 {
        None
    } else {
        Some(cpu as usize)
    }
}
