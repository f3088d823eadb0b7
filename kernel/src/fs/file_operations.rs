//! File operations.
//!
//! C header: `include/linux/fs.h`
//!
//! A driver describes what its device node does by implementing
//! [`FileOperations`]. [`OperationsVtable::build`] turns the impl into the
//! constant [`FileOperationsTable`] the host dispatches through; slots the
//! driver leaves as `None` stay empty in the table.

use alloc::boxed::Box;
use core::{
    any::Any,
    marker::PhantomData,
    sync::atomic::{AtomicU64, Ordering},
};

use crate::{
    buf::UserSliceWriter,
    code::{EBADF, EINVAL},
    error::KernelResult,
    host::OpenContext,
    DevT,
};

/// An open file, the equivalent of `struct file`.
///
/// Owned by the host; the driver sees it through its callbacks.
pub struct File {
    dev: DevT,
    pos: AtomicU64,
    private_data: Option<Box<dyn Any + Send + Sync>>,
}

impl File {
    /// Creates the file the host is about to pass to `open`.
    pub fn new(dev: DevT) -> Self {
        File {
            dev,
            pos: AtomicU64::new(0),
            private_data: None,
        }
    }

    /// The device number this file was opened through.
    pub fn dev(&self) -> DevT {
        self.dev
    }

    /// Current file position, the `f_pos` the host maintains.
    pub fn pos(&self) -> u64 {
        self.pos.load(Ordering::Acquire)
    }

    /// Moves the file position forward after a successful read.
    pub fn advance_pos(&self, count: u64) {
        self.pos.fetch_add(count, Ordering::AcqRel);
    }

    fn private<T: 'static>(&self) -> Option<&T> {
        self.private_data.as_ref()?.downcast_ref::<T>()
    }

    fn take_private<T: 'static>(&mut self) -> Option<Box<T>> {
        self.private_data.take()?.downcast::<T>().ok()
    }
}

pub type ReadFn<T> = Option<
    fn(this: &T, file: &File, buf: &mut UserSliceWriter<'_>, offset: u64) -> KernelResult<usize>,
>;

/// Corresponds to the kernel's `struct file_operations`.
///
/// The implementing type is the per-open state: [`FileOperations::open`]
/// creates one for every open file and [`FileOperations::release`] consumes
/// it when the last reference to the file goes away.
pub trait FileOperations: Sized + Send + Sync + 'static {
    /// Data shared by every open of the device, handed over at registration.
    type OpenData: Send + Sync + 'static;

    /// Creates the per-file state.
    fn open(context: &Self::OpenData, file: &File) -> KernelResult<Self>;

    /// Reads data from this file into the caller's buffer, returning the
    /// number of bytes written. Zero signals end of data.
    const READ: ReadFn<Self> = None;

    /// Cleans up after the last reference to the file goes away.
    fn release(self, _file: &File) {}
}

/// The callback table a device is published with.
///
/// The fourth slot of the kernel's table, `owner`, travels next to it in
/// [`Cdev`](crate::host::Cdev).
pub struct FileOperationsTable {
    pub open: Option<fn(&OpenContext, &mut File) -> KernelResult>,
    pub read: Option<fn(&File, &mut UserSliceWriter<'_>, u64) -> KernelResult<usize>>,
    pub release: Option<fn(&mut File)>,
}

pub struct OperationsVtable<T>(PhantomData<T>);

impl<T: FileOperations> OperationsVtable<T> {
    fn open_callback(context: &OpenContext, file: &mut File) -> KernelResult {
        let context: &(dyn Any + Send + Sync) = &**context;
        let context = context.downcast_ref::<T::OpenData>().ok_or(EINVAL)?;
        let data = T::open(context, file)?;
        file.private_data = Some(Box::new(data));
        Ok(())
    }

    fn read_callback(
        file: &File,
        buf: &mut UserSliceWriter<'_>,
        offset: u64,
    ) -> KernelResult<usize> {
        let read = T::READ.ok_or(EINVAL)?;
        let this = file.private::<T>().ok_or(EBADF)?;
        read(this, file, buf, offset)
    }

    fn release_callback(file: &mut File) {
        if let Some(data) = file.take_private::<T>() {
            (*data).release(file);
        }
    }

    const VTABLE: FileOperationsTable = FileOperationsTable {
        open: Some(Self::open_callback),
        read: if T::READ.is_some() {
            Some(Self::read_callback)
        } else {
            None
        },
        release: Some(Self::release_callback),
    };

    /// Builds an instance of [`FileOperationsTable`].
    pub const fn build() -> &'static FileOperationsTable {
        &Self::VTABLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buf::UserSlice;
    use crate::host::{UserAccess, UserPtr};
    use alloc::sync::Arc;
    use core::sync::atomic::AtomicUsize;

    struct Nothing;

    impl UserAccess for Nothing {
        fn access_ok(&self, _ptr: UserPtr, _len: usize) -> bool {
            false
        }

        fn raw_copy_to_user(&self, _to: UserPtr, from: &[u8]) -> usize {
            from.len()
        }
    }

    struct Counting {
        opens: Arc<AtomicUsize>,
    }

    impl FileOperations for Counting {
        type OpenData = Arc<AtomicUsize>;

        fn open(context: &Arc<AtomicUsize>, _file: &File) -> KernelResult<Self> {
            context.fetch_add(1, Ordering::SeqCst);
            Ok(Counting {
                opens: context.clone(),
            })
        }

        const READ: ReadFn<Self> = Some(
            |this: &Self,
             _file: &File,
             _buf: &mut UserSliceWriter<'_>,
             offset: u64|
             -> KernelResult<usize> { Ok(this.opens.load(Ordering::SeqCst) + offset as usize) },
        );

        fn release(self, _file: &File) {
            self.opens.fetch_sub(1, Ordering::SeqCst);
        }
    }

    struct OpenOnly;

    impl FileOperations for OpenOnly {
        type OpenData = ();

        fn open(_context: &(), _file: &File) -> KernelResult<Self> {
            Ok(OpenOnly)
        }
    }

    #[test]
    fn table_dispatches_to_the_impl() {
        let table = OperationsVtable::<Counting>::build();
        let opens = Arc::new(AtomicUsize::new(0));
        let context: OpenContext = Arc::new(opens.clone());

        let mut file = File::new(DevT::new(250, 0));
        (table.open.unwrap())(&context, &mut file).unwrap();
        assert_eq!(opens.load(Ordering::SeqCst), 1);

        let mut writer = UserSlice::new(&Nothing, 0, 0).writer();
        assert_eq!((table.read.unwrap())(&file, &mut writer, 10), Ok(11));

        (table.release.unwrap())(&mut file);
        assert_eq!(opens.load(Ordering::SeqCst), 0);
        assert_eq!((table.read.unwrap())(&file, &mut writer, 0), Err(EBADF));
    }

    #[test]
    fn open_needs_the_context_wrapped_once() {
        let table = OperationsVtable::<Counting>::build();
        let opens = Arc::new(AtomicUsize::new(0));
        let mut file = File::new(DevT::new(250, 0));

        // The bare shared value is not an `OpenContext` for `Counting`.
        let bare: OpenContext = opens.clone();
        assert_eq!((table.open.unwrap())(&bare, &mut file), Err(EINVAL));
        assert_eq!(opens.load(Ordering::SeqCst), 0);

        let wrapped: OpenContext = Arc::new(opens.clone());
        assert_eq!((table.open.unwrap())(&wrapped, &mut file), Ok(()));
        assert_eq!(opens.load(Ordering::SeqCst), 1);
        (table.release.unwrap())(&mut file);
    }

    #[test]
    fn unimplemented_slots_stay_empty() {
        let table = OperationsVtable::<OpenOnly>::build();
        assert!(table.open.is_some());
        assert!(table.read.is_none());
        assert!(table.release.is_some());
    }

    #[test]
    fn open_with_foreign_context_is_rejected() {
        let table = OperationsVtable::<Counting>::build();
        let context: OpenContext = Arc::new(5u32);
        let mut file = File::new(DevT::new(250, 0));
        assert_eq!((table.open.unwrap())(&context, &mut file), Err(EINVAL));
    }
}
