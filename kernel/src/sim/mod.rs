//! An in-process host kernel.
//!
//! [`SimKernel`] implements [`Host`] the way the real primitives behave as
//! far as a character device driver can observe: dynamic major allocation,
//! a table of live device nodes, file descriptors that dispatch into the
//! registered [`FileOperationsTable`], and a user address space made of
//! protected mappings. Each table sits behind its own lock and no lock is
//! held while a driver callback runs.

mod memory;

pub use memory::{Prot, PAGE_SIZE};

use alloc::{sync::Arc, vec::Vec};
use core::{fmt, ops::Range};

use hashbrown::HashMap;
use spin::Mutex;

use crate::{
    buf::UserSlice,
    code::{EBADF, EBUSY, EINVAL, ENOENT, ENXIO},
    error::{Error, KernelResult as Result},
    fs::file_operations::{File, FileOperationsTable},
    host::{Cdev, Host, UserAccess, UserPtr},
    module::{LoadedModule, Module, ThisModule},
    pr_debug, DevT,
};
use memory::UserMemory;

/// Tunables of the simulated host.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Majors handed out by `alloc_chrdev_region`, highest first.
    pub dynamic_majors: Range<u32>,
    /// Address of the first user mapping.
    pub user_base: UserPtr,
}

impl Default for SimConfig {
    fn default() -> Self {
        // CHRDEV_MAJOR_DYN_END..=CHRDEV_MAJOR_DYN_START in fs/char_dev.c
        SimConfig {
            dynamic_majors: 234..255,
            user_base: 0x1000_0000,
        }
    }
}

/// A file descriptor of the simulated calling process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fd(u32);

struct Region {
    name: &'static str,
    first_minor: u32,
    count: u32,
}

#[derive(Default)]
struct DeviceTable {
    regions: HashMap<u32, Region>,
    nodes: HashMap<DevT, Cdev>,
}

struct OpenFile {
    file: File,
    ops: &'static FileOperationsTable,
}

impl Drop for OpenFile {
    fn drop(&mut self) {
        if let Some(release) = self.ops.release {
            release(&mut self.file);
        }
    }
}

#[derive(Default)]
struct FileTable {
    next_fd: u32,
    open: HashMap<Fd, Arc<OpenFile>>,
}

#[derive(Default)]
struct FaultPlan {
    region_alloc: Option<Error>,
    cdev_add: Option<Error>,
    cdev_del: Option<Error>,
}

pub struct SimKernel {
    config: SimConfig,
    devices: Mutex<DeviceTable>,
    files: Mutex<FileTable>,
    memory: Mutex<UserMemory>,
    faults: Mutex<FaultPlan>,
}

impl SimKernel {
    pub fn new() -> Arc<Self> {
        Self::with_config(SimConfig::default())
    }

    pub fn with_config(config: SimConfig) -> Arc<Self> {
        Arc::new(SimKernel {
            memory: Mutex::new(UserMemory::new(config.user_base)),
            config,
            devices: Mutex::new(DeviceTable::default()),
            files: Mutex::new(FileTable::default()),
            faults: Mutex::new(FaultPlan::default()),
        })
    }

    /// Loads module `T` under `name`, the equivalent of `insmod`.
    pub fn load<T: Module>(self: &Arc<Self>, name: &'static str) -> Result<LoadedModule<T>> {
        let host: Arc<dyn Host> = self.clone();
        LoadedModule::load(ThisModule::new(name, host))
    }

    // Fault injection. Each armed fault fires on the next matching call only.

    pub fn fail_next_region_alloc(&self, error: Error) {
        self.faults.lock().region_alloc = Some(error);
    }

    pub fn fail_next_cdev_add(&self, error: Error) {
        self.faults.lock().cdev_add = Some(error);
    }

    pub fn fail_next_cdev_del(&self, error: Error) {
        self.faults.lock().cdev_del = Some(error);
    }

    // Device table inspection.

    pub fn has_node(&self, dev: DevT) -> bool {
        self.devices.lock().nodes.contains_key(&dev)
    }

    pub fn node_count(&self) -> usize {
        self.devices.lock().nodes.len()
    }

    /// Name of the module owning the node at `dev`.
    pub fn node_owner(&self, dev: DevT) -> Option<&'static str> {
        self.devices.lock().nodes.get(&dev).map(|cdev| cdev.owner)
    }

    pub fn region_count(&self) -> usize {
        self.devices.lock().regions.len()
    }

    /// Name the region containing `dev` was allocated under.
    pub fn region_name(&self, dev: DevT) -> Option<&'static str> {
        let devices = self.devices.lock();
        let region = devices.regions.get(&dev.major())?;
        (region.first_minor..region.first_minor + region.count)
            .contains(&dev.minor())
            .then_some(region.name)
    }

    // The calling process: file descriptors.

    /// Opens the device node at `dev`.
    pub fn open(&self, dev: DevT) -> Result<Fd> {
        let cdev = self.devices.lock().nodes.get(&dev).cloned().ok_or(ENXIO)?;
        let mut file = File::new(dev);
        if let Some(open) = cdev.ops.open {
            open(&cdev.context, &mut file)?;
        }
        let open_file = Arc::new(OpenFile {
            file,
            ops: cdev.ops,
        });

        let mut files = self.files.lock();
        let fd = Fd(files.next_fd);
        files.next_fd += 1;
        files.open.insert(fd, open_file);
        pr_debug!("sim: opened {} as {:?}", dev, fd);
        Ok(fd)
    }

    /// Reads up to `len` bytes into user memory at `buf`.
    pub fn read(&self, fd: Fd, buf: UserPtr, len: usize) -> Result<usize> {
        let open_file = self.files.lock().open.get(&fd).cloned().ok_or(EBADF)?;
        let read = open_file.ops.read.ok_or(EINVAL)?;
        let mut writer = UserSlice::new(self, buf, len).writer();
        let count = read(&open_file.file, &mut writer, open_file.file.pos())?;
        open_file.file.advance_pos(count as u64);
        Ok(count)
    }

    /// Closes `fd`. The driver's release runs once the last in-flight call
    /// on the file has returned.
    pub fn close(&self, fd: Fd) -> Result {
        let open_file = self.files.lock().open.remove(&fd).ok_or(EBADF)?;
        drop(open_file);
        Ok(())
    }

    /// Current position of `fd`.
    pub fn position(&self, fd: Fd) -> Result<u64> {
        let files = self.files.lock();
        files.open.get(&fd).map(|f| f.file.pos()).ok_or(EBADF)
    }

    pub fn open_files(&self) -> usize {
        self.files.lock().open.len()
    }

    // The calling process: memory.

    pub fn map_user(&self, len: usize, prot: Prot) -> Result<UserPtr> {
        self.memory.lock().map(len, prot)
    }

    pub fn unmap_user(&self, base: UserPtr) -> Result {
        self.memory.lock().unmap(base)
    }

    pub fn protect_user(&self, base: UserPtr, prot: Prot) -> Result {
        self.memory.lock().protect(base, prot)
    }

    /// Reads back user memory, as the calling process would see it.
    pub fn user_bytes(&self, ptr: UserPtr, len: usize) -> Result<Vec<u8>> {
        self.memory.lock().read(ptr, len)
    }
}

impl fmt::Debug for SimKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimKernel")
            .field("config", &self.config)
            .field("regions", &self.region_count())
            .field("nodes", &self.node_count())
            .field("open_files", &self.open_files())
            .finish()
    }
}

impl UserAccess for SimKernel {
    fn access_ok(&self, ptr: UserPtr, len: usize) -> bool {
        self.memory.lock().check(ptr, len, Prot::WRITE)
    }

    fn raw_copy_to_user(&self, to: UserPtr, from: &[u8]) -> usize {
        self.memory.lock().write(to, from)
    }
}

impl Host for SimKernel {
    fn alloc_chrdev_region(
        &self,
        first_minor: u32,
        count: u32,
        name: &'static str,
    ) -> Result<DevT> {
        if let Some(error) = self.faults.lock().region_alloc.take() {
            return Err(error);
        }
        if count == 0 {
            return Err(EINVAL);
        }
        let mut devices = self.devices.lock();
        let major = self
            .config
            .dynamic_majors
            .clone()
            .rev()
            .find(|major| !devices.regions.contains_key(major))
            .ok_or(EBUSY)?;
        devices.regions.insert(
            major,
            Region {
                name,
                first_minor,
                count,
            },
        );
        Ok(DevT::new(major, first_minor))
    }

    fn unregister_chrdev_region(&self, first: DevT, count: u32) -> Result {
        let mut devices = self.devices.lock();
        let matches = devices
            .regions
            .get(&first.major())
            .is_some_and(|region| region.first_minor == first.minor() && region.count == count);
        if !matches {
            return Err(ENOENT);
        }
        devices.regions.remove(&first.major());
        Ok(())
    }

    fn cdev_add(&self, cdev: Cdev, dev: DevT, count: u32) -> Result {
        if let Some(error) = self.faults.lock().cdev_add.take() {
            return Err(error);
        }
        let mut devices = self.devices.lock();
        let region = devices.regions.get(&dev.major()).ok_or(EINVAL)?;
        let minors = region.first_minor..region.first_minor + region.count;
        if count == 0 || !minors.contains(&dev.minor()) || !minors.contains(&(dev.minor() + count - 1))
        {
            return Err(EINVAL);
        }
        if (0..count).any(|i| devices.nodes.contains_key(&dev.offset(i))) {
            return Err(EBUSY);
        }
        for i in 0..count {
            devices.nodes.insert(dev.offset(i), cdev.clone());
        }
        Ok(())
    }

    fn cdev_del(&self, dev: DevT) -> Result {
        if let Some(error) = self.faults.lock().cdev_del.take() {
            return Err(error);
        }
        let mut devices = self.devices.lock();
        devices.nodes.remove(&dev).map(|_| ()).ok_or(ENOENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buf::UserSliceWriter;
    use crate::chrdev::{self, BuildError};
    use crate::code::{EFAULT, ENOMEM};
    use crate::fs::file_operations::{FileOperations, ReadFn};
    use crate::print::dmesg_contains;
    use core::sync::atomic::{AtomicUsize, Ordering};

    struct Letters;

    impl FileOperations for Letters {
        type OpenData = &'static [u8];

        fn open(_context: &&'static [u8], _file: &File) -> Result<Self> {
            Ok(Letters)
        }

        const READ: ReadFn<Self> = Some(
            |_this: &Self, _file: &File, buf: &mut UserSliceWriter<'_>, offset: u64| -> Result<usize> {
                let data = &b"abcdef"[(offset as usize).min(6)..];
                let n = data.len().min(buf.len());
                buf.write_slice(&data[..n])?;
                Ok(n)
            },
        );
    }

    static RELEASED: AtomicUsize = AtomicUsize::new(0);

    struct Tracked;

    impl FileOperations for Tracked {
        type OpenData = ();

        fn open(_context: &(), _file: &File) -> Result<Self> {
            Ok(Tracked)
        }

        fn release(self, _file: &File) {
            RELEASED.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn module(sim: &Arc<SimKernel>, name: &'static str) -> ThisModule {
        ThisModule::new(name, sim.clone())
    }

    #[test]
    fn majors_are_allocated_from_the_top() {
        let sim = SimKernel::new();
        let a = sim.alloc_chrdev_region(0, 1, "a").unwrap();
        let b = sim.alloc_chrdev_region(0, 2, "b").unwrap();
        assert_eq!(a, DevT::new(254, 0));
        assert_eq!(b, DevT::new(253, 0));
        assert_eq!(sim.region_name(DevT::new(253, 1)), Some("b"));
        assert_eq!(sim.region_name(DevT::new(253, 2)), None);
    }

    #[test]
    fn exhausted_majors_report_ebusy() {
        let sim = SimKernel::with_config(SimConfig {
            dynamic_majors: 240..241,
            ..SimConfig::default()
        });
        sim.alloc_chrdev_region(0, 1, "a").unwrap();
        assert_eq!(sim.alloc_chrdev_region(0, 1, "b"), Err(EBUSY));
    }

    #[test]
    fn chrdev_registration_publishes_and_removes_nodes() {
        let sim = SimKernel::new();
        let reg = chrdev::builder(&module(&sim, "letters"), "letters", 0..2)
            .unwrap()
            .register_device::<Letters>(b"")
            .register_device::<Letters>(b"")
            .build()
            .unwrap();
        let first = reg.dev();
        assert_eq!(reg.devices(), &[first, first.offset(1)]);
        assert_eq!(sim.node_count(), 2);
        assert_eq!(sim.node_owner(first), Some("letters"));

        drop(reg);
        assert_eq!(sim.node_count(), 0);
        assert_eq!(sim.region_count(), 0);
    }

    #[test]
    fn failed_cdev_add_rolls_back_everything() {
        let sim = SimKernel::new();
        let builder = chrdev::builder(&module(&sim, "letters"), "letters", 0..1)
            .unwrap()
            .register_device::<Letters>(b"");
        sim.fail_next_cdev_add(ENOMEM);
        let err = builder.build().err().unwrap();
        assert_eq!(
            err,
            BuildError::Cdev {
                minor: 0,
                error: ENOMEM
            }
        );
        assert_eq!(sim.node_count(), 0);
        assert_eq!(sim.region_count(), 0);
    }

    #[test]
    fn too_many_devices_allocate_nothing() {
        let sim = SimKernel::new();
        let err = chrdev::builder(&module(&sim, "letters"), "letters", 0..1)
            .unwrap()
            .register_device::<Letters>(b"")
            .register_device::<Letters>(b"")
            .build()
            .err()
            .unwrap();
        assert_eq!(err, BuildError::TooManyDevices);
        assert_eq!(sim.region_count(), 0);
        assert!(chrdev::builder(&module(&sim, "letters"), "letters", 0..0).is_err());
    }

    #[test]
    fn teardown_keeps_going_after_a_failed_cdev_del() {
        let sim = SimKernel::new();
        let reg = chrdev::builder(&module(&sim, "stubborn"), "stubborn", 0..1)
            .unwrap()
            .register_device::<Letters>(b"")
            .build()
            .unwrap();
        sim.fail_next_cdev_del(EBUSY);
        drop(reg);
        assert_eq!(sim.region_count(), 0);
        assert!(dmesg_contains("stubborn: failed to delete char dev"));
    }

    #[test]
    fn reads_dispatch_and_track_position() {
        let sim = SimKernel::new();
        let reg = chrdev::builder(&module(&sim, "letters"), "letters", 0..1)
            .unwrap()
            .register_device::<Letters>(b"")
            .build()
            .unwrap();
        let fd = sim.open(reg.dev()).unwrap();
        let buf = sim.map_user(16, Prot::READ | Prot::WRITE).unwrap();

        assert_eq!(sim.read(fd, buf, 4), Ok(4));
        assert_eq!(sim.position(fd), Ok(4));
        assert_eq!(sim.read(fd, buf + PAGE_SIZE, 2), Err(EFAULT));
        assert_eq!(sim.position(fd), Ok(4));
        assert_eq!(sim.read(fd, buf + 4, 12), Ok(2));
        assert_eq!(sim.user_bytes(buf, 6).unwrap(), b"abcdef");

        sim.close(fd).unwrap();
        assert_eq!(sim.read(fd, buf, 1), Err(EBADF));
        assert_eq!(sim.close(fd), Err(EBADF));
    }

    #[test]
    fn release_runs_on_close_and_read_slot_may_be_empty() {
        let sim = SimKernel::new();
        let reg = chrdev::builder(&module(&sim, "tracked"), "tracked", 0..1)
            .unwrap()
            .register_device::<Tracked>(())
            .build()
            .unwrap();
        let before = RELEASED.load(Ordering::SeqCst);
        let fd = sim.open(reg.dev()).unwrap();
        let buf = sim.map_user(1, Prot::WRITE).unwrap();
        assert_eq!(sim.read(fd, buf, 1), Err(EINVAL));
        sim.close(fd).unwrap();
        assert_eq!(RELEASED.load(Ordering::SeqCst), before + 1);
        assert_eq!(sim.open_files(), 0);
    }

    #[test]
    fn opening_a_missing_node_fails() {
        let sim = SimKernel::new();
        assert_eq!(sim.open(DevT::new(254, 0)), Err(ENXIO));
    }
}
