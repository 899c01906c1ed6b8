use std::ffi::OsStr;
use std::io::Write;
use std::time::SystemTime;

use tracing::{debug, error, info, instrument};

use super::r#trait::{FileAttr, Fs};
use super::{INodeType, OpenFlags};

/// Trait abstracting the `.error(errno)` method common to all fuser reply types.
trait FuseReply {
    fn error(self, errno: i32);
}

macro_rules! impl_fuse_reply {
    ($($ty:ty),* $(,)?) => {
        $(impl FuseReply for $ty {
            fn error(self, errno: i32) {
                // Calls the inherent fuser method (not this trait method).
                self.error(errno);
            }
        })*
    };
}

impl_fuse_reply!(
    fuser::ReplyEntry,
    fuser::ReplyAttr,
    fuser::ReplyDirectory,
    fuser::ReplyOpen,
    fuser::ReplyData,
    fuser::ReplyEmpty,
    fuser::ReplyWrite,
    fuser::ReplyStatfs,
);

/// Extension trait on filesystem results for FUSE reply handling.
///
/// Centralizes the error-logging + errno-reply path so each FUSE callback
/// only has to express its success path.
trait FuseResultExt<T> {
    fn fuse_reply<R: FuseReply>(self, reply: R, on_ok: impl FnOnce(T, R));
}

impl<T, E> FuseResultExt<T> for Result<T, E>
where
    E: std::error::Error + Into<i32>,
{
    fn fuse_reply<R: FuseReply>(self, reply: R, on_ok: impl FnOnce(T, R)) {
        match self {
            Ok(val) => on_ok(val, reply),
            Err(e) => {
                debug!(error = %e, "replying error");
                reply.error(e.into());
            }
        }
    }
}

fn to_fuser_kind(kind: INodeType) -> fuser::FileType {
    match kind {
        INodeType::File => fuser::FileType::RegularFile,
        INodeType::Directory => fuser::FileType::Directory,
        INodeType::Symlink => fuser::FileType::Symlink,
    }
}

fn to_fuser_attr(attr: &FileAttr) -> fuser::FileAttr {
    fuser::FileAttr {
        ino: attr.ino,
        size: attr.size,
        blocks: attr.blocks,
        atime: attr.mtime,
        mtime: attr.mtime,
        ctime: attr.mtime,
        crtime: attr.mtime,
        kind: to_fuser_kind(attr.kind),
        perm: attr.perm.bits(),
        nlink: attr.nlink,
        uid: attr.uid,
        gid: attr.gid,
        rdev: 0,
        blksize: BLOCK_SIZE,
        flags: 0,
    }
}

const BLOCK_SIZE: u32 = 4096;

/// Line written once the kernel has completed the mount handshake.
pub const READY_LINE: &str = "file system initialized";

fn announce_ready(out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "{READY_LINE}")?;
    out.flush()
}

/// Bridges an [`Fs`] to the [`fuser::Filesystem`] trait.
///
/// fuser dispatches callbacks from a single session thread; each one blocks on the runtime
/// until the filesystem answers.
pub struct FuserAdapter<F: Fs> {
    fs: F,
    runtime: tokio::runtime::Handle,
    announce: bool,
}

impl<F: Fs> FuserAdapter<F> {
    // TODO: replace the short TTL with notify_inval_entry/notify_inval_inode once triggers can
    // reach the kernel notifier.
    const SHAMEFUL_TTL: std::time::Duration = std::time::Duration::from_secs(1);

    /// Serve `fs`, blocking on `runtime` for each callback.
    pub fn new(fs: F, runtime: tokio::runtime::Handle) -> Self {
        Self {
            fs,
            runtime,
            announce: false,
        }
    }

    /// Also print [`READY_LINE`] on stdout when the mount comes up, for scripts waiting on a
    /// foreground mount.
    #[must_use]
    pub fn announcing_ready(mut self, announce: bool) -> Self {
        self.announce = announce;
        self
    }
}

impl<F: Fs> fuser::Filesystem for FuserAdapter<F> {
    fn init(
        &mut self,
        _req: &fuser::Request<'_>,
        _config: &mut fuser::KernelConfig,
    ) -> Result<(), libc::c_int> {
        info!("file system initialized");
        if self.announce {
            if let Err(e) = announce_ready(&mut std::io::stdout().lock()) {
                error!(error = %e, "failed to announce the mount on stdout");
            }
        }
        Ok(())
    }

    #[instrument(name = "FuserAdapter::lookup", skip(self, _req, reply))]
    fn lookup(
        &mut self,
        _req: &fuser::Request<'_>,
        parent: u64,
        name: &OsStr,
        reply: fuser::ReplyEntry,
    ) {
        let Some(name) = name.to_str() else {
            debug!("non UTF-8 name, replying ENOENT");
            reply.error(libc::ENOENT);
            return;
        };
        self.runtime
            .block_on(self.fs.lookup(parent, name))
            .fuse_reply(reply, |attr, reply| {
                let f_attr = to_fuser_attr(&attr);
                debug!(?f_attr, "replying...");
                reply.entry(&Self::SHAMEFUL_TTL, &f_attr, 0);
            });
    }

    #[instrument(name = "FuserAdapter::getattr", skip(self, _req, _fh, reply))]
    fn getattr(
        &mut self,
        _req: &fuser::Request<'_>,
        ino: u64,
        _fh: Option<u64>,
        reply: fuser::ReplyAttr,
    ) {
        self.runtime
            .block_on(self.fs.getattr(ino))
            .fuse_reply(reply, |attr, reply| {
                let f_attr = to_fuser_attr(&attr);
                debug!(?f_attr, "replying...");
                reply.attr(&Self::SHAMEFUL_TTL, &f_attr);
            });
    }

    #[instrument(
        name = "FuserAdapter::setattr",
        skip(
            self, _req, _mode, _uid, _gid, _atime, _mtime, _ctime, _fh, _crtime, _chgtime,
            _bkuptime, _flags, reply
        )
    )]
    fn setattr(
        &mut self,
        _req: &fuser::Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<fuser::TimeOrNow>,
        _mtime: Option<fuser::TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: fuser::ReplyAttr,
    ) {
        let Some(size) = size else {
            debug!("only size changes are supported, replying EPERM");
            reply.error(libc::EPERM);
            return;
        };
        self.runtime
            .block_on(self.fs.truncate(ino, size))
            .fuse_reply(reply, |attr, reply| {
                reply.attr(&Self::SHAMEFUL_TTL, &to_fuser_attr(&attr));
            });
    }

    #[instrument(name = "FuserAdapter::readlink", skip(self, _req, reply))]
    fn readlink(&mut self, _req: &fuser::Request<'_>, ino: u64, reply: fuser::ReplyData) {
        self.runtime
            .block_on(self.fs.readlink(ino))
            .fuse_reply(reply, |target, reply| {
                debug!(%target, "replying...");
                reply.data(target.as_bytes());
            });
    }

    #[instrument(name = "FuserAdapter::opendir", skip(self, _req, _flags, reply))]
    fn opendir(&mut self, _req: &fuser::Request<'_>, ino: u64, _flags: i32, reply: fuser::ReplyOpen) {
        self.runtime
            .block_on(self.fs.opendir(ino))
            .fuse_reply(reply, |fh, reply| {
                debug!(handle = fh, "replying...");
                reply.opened(fh, 0);
            });
    }

    #[instrument(name = "FuserAdapter::readdir", skip(self, _req, _fh, offset, reply))]
    fn readdir(
        &mut self,
        _req: &fuser::Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: fuser::ReplyDirectory,
    ) {
        let entries = match self.runtime.block_on(self.fs.readdir(ino)) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(error = %e, "replying error");
                reply.error(e.into());
                return;
            }
        };

        let skip = usize::try_from(offset).unwrap_or(0);
        for (i, entry) in entries.iter().enumerate().skip(skip) {
            let Ok(idx): Result<i64, _> = (i + 1).try_into() else {
                error!("Directory entry index {} too large for fuser", i + 1);
                reply.error(libc::EIO);
                return;
            };

            debug!(?entry, "adding entry to reply...");
            if reply.add(entry.ino, idx, to_fuser_kind(entry.kind), &entry.name) {
                debug!("buffer full for now, stopping readdir");
                break;
            }
        }

        debug!("finalizing reply...");
        reply.ok();
    }

    #[instrument(name = "FuserAdapter::releasedir", skip(self, _req, _ino, _flags, reply))]
    fn releasedir(
        &mut self,
        _req: &fuser::Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        reply: fuser::ReplyEmpty,
    ) {
        self.runtime
            .block_on(self.fs.releasedir(fh))
            .fuse_reply(reply, |(), reply| reply.ok());
    }

    #[instrument(name = "FuserAdapter::open", skip(self, _req, flags, reply))]
    fn open(&mut self, _req: &fuser::Request<'_>, ino: u64, flags: i32, reply: fuser::ReplyOpen) {
        let flags = OpenFlags::from_bits_truncate(flags);
        self.runtime
            .block_on(self.fs.open(ino, flags))
            .fuse_reply(reply, |open_file, reply| {
                let fuse_flags = if open_file.direct_io {
                    fuser::consts::FOPEN_DIRECT_IO
                } else {
                    0
                };
                debug!(handle = open_file.handle, "replying...");
                reply.opened(open_file.handle, fuse_flags);
            });
    }

    #[instrument(
        name = "FuserAdapter::read",
        skip(self, _req, _ino, fh, offset, size, _flags, _lock_owner, reply)
    )]
    fn read(
        &mut self,
        _req: &fuser::Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: fuser::ReplyData,
    ) {
        let Ok(offset) = u64::try_from(offset) else {
            reply.error(libc::EINVAL);
            return;
        };
        self.runtime
            .block_on(self.fs.read(fh, offset, size))
            .fuse_reply(reply, |data, reply| {
                debug!(read_bytes = data.len(), "replying...");
                reply.data(&data);
            });
    }

    #[instrument(
        name = "FuserAdapter::write",
        skip(self, _req, _ino, fh, offset, data, _write_flags, _flags, _lock_owner, reply)
    )]
    fn write(
        &mut self,
        _req: &fuser::Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: fuser::ReplyWrite,
    ) {
        let Ok(offset) = u64::try_from(offset) else {
            reply.error(libc::EINVAL);
            return;
        };
        self.runtime
            .block_on(self.fs.write(fh, offset, data))
            .fuse_reply(reply, |written, reply| {
                debug!(written, "replying...");
                reply.written(written);
            });
    }

    #[instrument(
        name = "FuserAdapter::release",
        skip(self, _req, _ino, _flags, _lock_owner, _flush, reply)
    )]
    fn release(
        &mut self,
        _req: &fuser::Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: fuser::ReplyEmpty,
    ) {
        self.runtime
            .block_on(self.fs.release(fh))
            .fuse_reply(reply, |(), reply| {
                debug!("replying ok");
                reply.ok();
            });
    }

    #[instrument(name = "FuserAdapter::statfs", skip(self, _req, _ino, reply))]
    fn statfs(&mut self, _req: &fuser::Request<'_>, _ino: u64, reply: fuser::ReplyStatfs) {
        self.runtime
            .block_on(self.fs.statfs())
            .fuse_reply(reply, |stats, reply| {
                debug!(?stats, "replying...");
                reply.statfs(
                    stats.total_blocks,
                    0,
                    0,
                    stats.total_inodes,
                    stats.free_handles,
                    stats.block_size,
                    stats.max_filename_length,
                    0,
                );
            });
    }
}
