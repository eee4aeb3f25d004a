//! macOS and iOS: Mach host and thread facilities.
//!
//! Every buffer the kernel hands out (processor load array, thread list,
//! thread ports) is owned by a guard that returns it on drop.

use std::mem;
use std::path::PathBuf;

use libc::{integer_t, kern_return_t, mach_msg_type_number_t, mach_port_t, natural_t};

use super::{resident_with_fallback, sysinfo_host_memory};
use crate::SampleError;
use crate::system::cpu::ThreadUsage;
use crate::system::memory::HostMemory;
use crate::system::source::CounterSource;
use crate::system::ticks::TickSnapshot;

const PROCESSOR_INFO: &str = "host_processor_info";
const TASK_THREADS: &str = "task_threads";

// <mach/processor_info.h>, <mach/machine.h>
const PROCESSOR_CPU_LOAD_INFO: libc::c_int = 2;
const CPU_STATE_USER: usize = 0;
const CPU_STATE_SYSTEM: usize = 1;
const CPU_STATE_IDLE: usize = 2;
const CPU_STATE_NICE: usize = 3;
const CPU_STATE_MAX: usize = 4;

// <mach/thread_info.h>
const THREAD_BASIC_INFO: libc::c_uint = 3;
const TH_USAGE_SCALE: f64 = 1000.0;
const TH_FLAGS_IDLE: integer_t = 0x2;

unsafe extern "C" {
    fn vm_deallocate(target_task: mach_port_t, address: usize, size: usize) -> kern_return_t;
    fn mach_port_deallocate(task: mach_port_t, name: mach_port_t) -> kern_return_t;
}

#[allow(deprecated)]
fn task_self() -> mach_port_t {
    // SAFETY: returns the caller's task port; no preconditions.
    unsafe { libc::mach_task_self() }
}

#[derive(Debug, Clone, Default)]
pub struct NativeSource;

impl NativeSource {
    pub fn new(_procfs_root: PathBuf) -> Self {
        NativeSource
    }
}

impl CounterSource for NativeSource {
    fn read_per_core_ticks(&self) -> Result<Vec<TickSnapshot>, SampleError> {
        let load = ProcessorLoad::query()?;
        Ok(load.cores())
    }

    fn read_aggregate_ticks(&self) -> Result<TickSnapshot, SampleError> {
        let cores = ProcessorLoad::query()?.cores();
        if cores.is_empty() {
            return Err(SampleError::unavailable(PROCESSOR_INFO, "no processors reported"));
        }
        Ok(cores
            .iter()
            .fold(TickSnapshot::default(), |acc, core| acc.saturating_add(core)))
    }

    fn read_thread_usage(&self) -> Result<ThreadUsage, SampleError> {
        let threads = ThreadList::query()?;
        let mut usage = ThreadUsage {
            total_percent: 0.0,
            active_threads: 0,
        };
        for &thread in threads.ports() {
            let Some(info) = basic_info(thread) else {
                continue;
            };
            if info.flags & TH_FLAGS_IDLE != 0 {
                continue;
            }
            usage.total_percent += f64::from(info.cpu_usage) / TH_USAGE_SCALE * 100.0;
            usage.active_threads += 1;
        }
        Ok(usage)
    }

    fn read_host_memory(&self) -> Result<HostMemory, SampleError> {
        sysinfo_host_memory()
    }

    fn read_process_resident(&self) -> Result<u64, SampleError> {
        resident_with_fallback(native_resident())
    }
}

/// Per-processor tick counters returned by `host_processor_info`.
struct ProcessorLoad {
    host: mach_port_t,
    info: *mut integer_t,
    info_count: mach_msg_type_number_t,
    processors: natural_t,
}

impl ProcessorLoad {
    fn query() -> Result<Self, SampleError> {
        #[allow(deprecated)]
        // SAFETY: returns a send right for the host port, released in Drop.
        let host = unsafe { libc::mach_host_self() };
        let mut processors: natural_t = 0;
        let mut info: *mut integer_t = std::ptr::null_mut();
        let mut info_count: mach_msg_type_number_t = 0;
        // SAFETY: out-pointers are valid; on success the kernel allocates
        // `info` in our address space.
        let kr = unsafe {
            libc::host_processor_info(
                host,
                PROCESSOR_CPU_LOAD_INFO,
                &mut processors,
                &mut info,
                &mut info_count,
            )
        };
        let load = ProcessorLoad {
            host,
            info,
            info_count,
            processors,
        };
        if kr != libc::KERN_SUCCESS || load.info.is_null() {
            return Err(SampleError::unavailable(
                PROCESSOR_INFO,
                format!("kern_return {kr}"),
            ));
        }
        Ok(load)
    }

    fn cores(&self) -> Vec<TickSnapshot> {
        let len = (self.processors as usize * CPU_STATE_MAX).min(self.info_count as usize);
        // SAFETY: the kernel returned `info_count` integers at `info`.
        let raw = unsafe { std::slice::from_raw_parts(self.info, len) };
        raw.chunks_exact(CPU_STATE_MAX)
            .map(|ticks| {
                // Counters are unsigned 32-bit values stored in integer_t.
                let at = |i: usize| u64::from(ticks[i] as u32);
                TickSnapshot::new(
                    at(CPU_STATE_USER),
                    at(CPU_STATE_NICE),
                    at(CPU_STATE_SYSTEM),
                    at(CPU_STATE_IDLE),
                )
            })
            .collect()
    }
}

impl Drop for ProcessorLoad {
    fn drop(&mut self) {
        // SAFETY: `info` was allocated by host_processor_info with this size,
        // and `host` is the right obtained in `query`.
        unsafe {
            if !self.info.is_null() {
                vm_deallocate(
                    task_self(),
                    self.info as usize,
                    self.info_count as usize * mem::size_of::<integer_t>(),
                );
            }
            mach_port_deallocate(task_self(), self.host);
        }
    }
}

/// Thread ports of the current task from `task_threads`.
struct ThreadList {
    threads: *mut mach_port_t,
    count: mach_msg_type_number_t,
}

impl ThreadList {
    fn query() -> Result<Self, SampleError> {
        let mut threads: *mut mach_port_t = std::ptr::null_mut();
        let mut count: mach_msg_type_number_t = 0;
        // SAFETY: out-pointers are valid; on success the kernel allocates the
        // port array in our address space.
        let kr = unsafe { libc::task_threads(task_self(), &mut threads, &mut count) };
        let list = ThreadList { threads, count };
        if kr != libc::KERN_SUCCESS {
            return Err(SampleError::unavailable(TASK_THREADS, format!("kern_return {kr}")));
        }
        Ok(list)
    }

    fn ports(&self) -> &[mach_port_t] {
        if self.threads.is_null() {
            return &[];
        }
        // SAFETY: task_threads returned `count` ports at `threads`.
        unsafe { std::slice::from_raw_parts(self.threads, self.count as usize) }
    }
}

impl Drop for ThreadList {
    fn drop(&mut self) {
        if self.threads.is_null() {
            return;
        }
        // SAFETY: each port right and the array itself were handed to us by
        // task_threads and are released exactly once here.
        unsafe {
            for &port in self.ports() {
                mach_port_deallocate(task_self(), port);
            }
            vm_deallocate(
                task_self(),
                self.threads as usize,
                self.count as usize * mem::size_of::<mach_port_t>(),
            );
        }
    }
}

fn basic_info(thread: mach_port_t) -> Option<libc::thread_basic_info> {
    // SAFETY: thread_basic_info is plain data; zeroed is a valid value.
    let mut info: libc::thread_basic_info = unsafe { mem::zeroed() };
    let mut count = (mem::size_of::<libc::thread_basic_info>() / mem::size_of::<natural_t>())
        as mach_msg_type_number_t;
    // SAFETY: `info` is large enough for `count` integers.
    let kr = unsafe {
        libc::thread_info(
            thread,
            THREAD_BASIC_INFO,
            &mut info as *mut libc::thread_basic_info as *mut integer_t,
            &mut count,
        )
    };
    (kr == libc::KERN_SUCCESS).then_some(info)
}

#[cfg(target_os = "macos")]
fn native_resident() -> Result<u64, SampleError> {
    use libproc::libproc::proc_pid::pidinfo;
    use libproc::libproc::task_info::TaskInfo;

    pidinfo::<TaskInfo>(std::process::id() as i32, 0)
        .map(|info| info.pti_resident_size)
        .map_err(|e| SampleError::unavailable("proc_pidinfo", e))
}

#[cfg(target_os = "ios")]
fn native_resident() -> Result<u64, SampleError> {
    // <mach/task_info.h>
    const MACH_TASK_BASIC_INFO: libc::c_uint = 20;

    // SAFETY: mach_task_basic_info is plain data; zeroed is a valid value.
    let mut info: libc::mach_task_basic_info = unsafe { mem::zeroed() };
    let mut count = (mem::size_of::<libc::mach_task_basic_info>() / mem::size_of::<natural_t>())
        as mach_msg_type_number_t;
    // SAFETY: `info` is large enough for `count` integers.
    let kr = unsafe {
        libc::task_info(
            task_self(),
            MACH_TASK_BASIC_INFO,
            &mut info as *mut libc::mach_task_basic_info as *mut integer_t,
            &mut count,
        )
    };
    if kr != libc::KERN_SUCCESS {
        return Err(SampleError::unavailable("task_info", format!("kern_return {kr}")));
    }
    Ok(info.resident_size)
}
