#![allow(clippy::unwrap_used, missing_docs)]

mod common;

use std::time::Duration;

use common::{package_fixture, tree};
use obs_fs::fs::error::FsError;
use obs_fs::fs::handles::HandleTable;
use obs_fs::fs::r#trait::Fs;
use obs_fs::fs::vfs::VirtualFs;
use obs_fs::fs::{FileHandle, InodeAddr, OpenFlags};

async fn fixture(capacity: usize) -> (VirtualFs<common::MockResolver>, InodeAddr) {
    let mut tree = tree(package_fixture(), Duration::from_secs(3600));
    let foo = tree.resolve("/P/A/foo").await.unwrap();
    (VirtualFs::new(tree, HandleTable::with_capacity(capacity)), foo)
}

#[tokio::test]
async fn exhausting_the_table_reports_emfile() {
    let (mut fs, foo) = fixture(HandleTable::<u64>::DEFAULT_CAPACITY).await;

    let mut handles = Vec::new();
    for expected in 0..1024 {
        let opened = fs.open(foo, OpenFlags::RDONLY).await.unwrap();
        assert_eq!(opened.handle, expected as FileHandle);
        handles.push(opened.handle);
    }
    assert_eq!(fs.handles().open_count(foo), 1024);

    let err = fs.open(foo, OpenFlags::RDONLY).await.unwrap_err();
    assert!(matches!(err, FsError::Exhausted));
    assert_eq!(err.errno(), libc::EMFILE);

    fs.release(handles[512]).await.unwrap();
    let reopened = fs.open(foo, OpenFlags::RDONLY).await.unwrap();
    assert_eq!(reopened.handle, 512, "the freed slot is reused");
}

#[tokio::test]
async fn allocation_prefers_the_smallest_free_handle() {
    let (mut fs, foo) = fixture(8).await;

    let handles: Vec<_> = open_many(&mut fs, foo, 5).await;
    assert_eq!(handles, [0, 1, 2, 3, 4]);

    fs.release(3).await.unwrap();
    fs.release(1).await.unwrap();
    assert_eq!(fs.open(foo, OpenFlags::RDONLY).await.unwrap().handle, 1);
    assert_eq!(fs.open(foo, OpenFlags::RDONLY).await.unwrap().handle, 3);
    assert_eq!(fs.open(foo, OpenFlags::RDONLY).await.unwrap().handle, 5);
}

#[tokio::test]
async fn double_release_is_an_inconsistency() {
    let (mut fs, foo) = fixture(4).await;
    let opened = fs.open(foo, OpenFlags::RDONLY).await.unwrap();

    fs.release(opened.handle).await.unwrap();
    let err = fs.release(opened.handle).await.unwrap_err();
    assert!(matches!(err, FsError::Inconsistency(_)), "got {err:?}");
    assert_eq!(err.errno(), libc::EIO);
    assert_eq!(fs.handles().in_use(), 0, "the table is unchanged");
}

#[tokio::test]
async fn released_handles_cannot_be_read() {
    let (mut fs, foo) = fixture(4).await;
    let opened = fs.open(foo, OpenFlags::RDONLY).await.unwrap();
    fs.release(opened.handle).await.unwrap();

    let err = fs.read(opened.handle, 0, 1).await.unwrap_err();
    assert_eq!(err.errno(), libc::EBADF);
    let err = fs.read(u64::MAX, 0, 1).await.unwrap_err();
    assert_eq!(err.errno(), libc::EBADF);
}

#[tokio::test]
async fn open_counts_follow_each_node() {
    let (mut fs, foo) = fixture(4).await;
    let bar = fs.tree_mut().resolve("/P/A/bar").await.unwrap();

    let first = fs.open(foo, OpenFlags::RDONLY).await.unwrap();
    fs.open(foo, OpenFlags::RDONLY).await.unwrap();
    fs.open(bar, OpenFlags::RDONLY).await.unwrap();
    assert_eq!(fs.handles().open_count(foo), 2);
    assert_eq!(fs.handles().open_count(bar), 1);

    fs.release(first.handle).await.unwrap();
    assert_eq!(fs.handles().open_count(foo), 1);
    assert!(fs.handles().is_open(foo));
}

async fn open_many(
    fs: &mut VirtualFs<common::MockResolver>,
    ino: InodeAddr,
    count: usize,
) -> Vec<FileHandle> {
    let mut handles = Vec::with_capacity(count);
    for _ in 0..count {
        handles.push(fs.open(ino, OpenFlags::RDONLY).await.unwrap().handle);
    }
    handles
}
