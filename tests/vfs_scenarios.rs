#![allow(clippy::unwrap_used, missing_docs)]

mod common;

use std::time::Duration;

use bytes::Bytes;

use common::{MockResolver, package_fixture, tree};
use obs_fs::fs::error::FsError;
use obs_fs::fs::handles::HandleTable;
use obs_fs::fs::r#trait::Fs;
use obs_fs::fs::resolver::EntrySpec;
use obs_fs::fs::vfs::VirtualFs;
use obs_fs::fs::{INodeType, InodeAddr, InodePerms, OpenFlags};

const ROOT: InodeAddr = 1;
const TTL: Duration = Duration::from_secs(3600);

fn mount(backend: MockResolver, ttl: Duration) -> VirtualFs<MockResolver> {
    VirtualFs::new(tree(backend, ttl), HandleTable::new())
}

async fn walk(fs: &mut VirtualFs<MockResolver>, path: &str) -> InodeAddr {
    let mut ino = ROOT;
    for name in path.split('/').filter(|c| !c.is_empty()) {
        ino = fs.lookup(ino, name).await.unwrap().ino;
    }
    ino
}

#[tokio::test]
async fn browse_and_read_a_package() {
    let mut fs = mount(package_fixture(), TTL);

    let a = walk(&mut fs, "/P/A").await;
    let names: Vec<_> = fs
        .readdir(a)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, [".", "..", "bar", "foo"]);

    let foo = fs.lookup(a, "foo").await.unwrap();
    assert_eq!(foo.kind, INodeType::File);
    assert_eq!(foo.size, 10);
    assert_eq!(foo.perm, InodePerms::OWNER_READ);

    let opened = fs.open(foo.ino, OpenFlags::RDONLY).await.unwrap();
    assert!(opened.direct_io, "generated sizes are unknown until read");
    assert_eq!(
        fs.read(opened.handle, 0, 4096).await.unwrap(),
        Bytes::from_static(b"0123456789")
    );
    fs.release(opened.handle).await.unwrap();
    assert_eq!(fs.handles().in_use(), 0);
}

#[tokio::test]
async fn directory_handles_round_trip() {
    let mut fs = mount(package_fixture(), TTL);

    let p = walk(&mut fs, "/P").await;
    let fh = fs.opendir(p).await.unwrap();
    assert_eq!(fs.handles().open_count(p), 1);
    fs.releasedir(fh).await.unwrap();
    assert_eq!(fs.handles().open_count(p), 0);

    let foo = walk(&mut fs, "/P/A/foo").await;
    assert!(matches!(fs.opendir(foo).await, Err(FsError::NotADirectory)));
    assert!(matches!(fs.readdir(foo).await, Err(FsError::NotADirectory)));
}

#[tokio::test]
async fn read_only_nodes_refuse_write_access() {
    let mut fs = mount(package_fixture(), TTL);
    let foo = walk(&mut fs, "/P/A/foo").await;
    let a = walk(&mut fs, "/P/A").await;

    for flags in [OpenFlags::WRONLY, OpenFlags::RDWR, OpenFlags::CREAT] {
        let err = fs.open(foo, flags).await.unwrap_err();
        assert_eq!(err.errno(), libc::EPERM, "{flags:?} on a file");
        let err = fs.open(a, flags).await.unwrap_err();
        assert_eq!(err.errno(), libc::EPERM, "{flags:?} on a directory");
    }
    let err = fs.open(a, OpenFlags::RDONLY).await.unwrap_err();
    assert_eq!(err.errno(), libc::EISDIR);
    assert_eq!(fs.handles().in_use(), 0);
}

#[tokio::test]
async fn triggers_are_write_only() {
    let backend = package_fixture();
    let mut fs = mount(backend.clone(), TTL);
    let p = walk(&mut fs, "/P").await;
    let meta = walk(&mut fs, "/P/.oscfs").await;
    let refresh = fs.lookup(meta, "refresh").await.unwrap();
    assert_eq!(refresh.perm, InodePerms::OWNER_WRITE);

    let reader = fs.open(refresh.ino, OpenFlags::RDONLY).await.unwrap();
    let err = fs.read(reader.handle, 0, 16).await.unwrap_err();
    assert_eq!(err.errno(), libc::EBADF);
    fs.release(reader.handle).await.unwrap();

    let writer = fs.open(refresh.ino, OpenFlags::WRONLY).await.unwrap();
    let err = fs.write(writer.handle, 0, b"5").await.unwrap_err();
    assert_eq!(err.errno(), libc::EINVAL);
    assert!(!fs.tree().is_stale(p));

    assert_eq!(fs.write(writer.handle, 0, b"1\n").await.unwrap(), 2);
    assert!(fs.tree().is_stale(p));
    fs.release(writer.handle).await.unwrap();

    walk(&mut fs, "/P/A").await;
    assert_eq!(backend.list_calls("P"), 2);
}

#[tokio::test]
async fn writes_through_a_file_handle_need_write_permission() {
    let mut fs = mount(package_fixture(), TTL);
    let foo = walk(&mut fs, "/P/A/foo").await;

    let opened = fs.open(foo, OpenFlags::RDONLY).await.unwrap();
    let err = fs.write(opened.handle, 0, b"1").await.unwrap_err();
    assert_eq!(err.errno(), libc::EPERM);
}

#[tokio::test]
async fn truncate_is_accepted_on_triggers_only() {
    let mut fs = mount(package_fixture(), TTL);
    let refresh = walk(&mut fs, "/P/.oscfs/refresh").await;
    let foo = walk(&mut fs, "/P/A/foo").await;

    let attr = fs.truncate(refresh, 0).await.unwrap();
    assert_eq!(attr.size, 0);
    let err = fs.truncate(foo, 0).await.unwrap_err();
    assert_eq!(err.errno(), libc::EPERM);
}

#[tokio::test]
async fn zero_ttl_lists_once_per_lookup() {
    let backend = package_fixture();
    let mut fs = mount(backend.clone(), Duration::ZERO);

    fs.lookup(ROOT, "P").await.unwrap();
    let before = backend.list_calls("/");
    fs.lookup(ROOT, "P").await.unwrap();
    assert_eq!(backend.list_calls("/"), before + 1);

    fs.getattr(ROOT).await.unwrap();
    assert_eq!(backend.list_calls("/"), before + 1, "getattr serves what is held");
}

#[tokio::test]
async fn backend_failures_surface_as_io_errors() {
    let backend = package_fixture();
    let mut fs = mount(backend.clone(), TTL);
    let a = walk(&mut fs, "/P/A").await;

    backend.fail("P/A");
    let err = fs.lookup(a, "foo").await.unwrap_err();
    assert_eq!(err.errno(), libc::EIO);

    backend.recover("P/A");
    assert_eq!(fs.lookup(a, "foo").await.unwrap().size, 10);
}

#[tokio::test]
async fn missing_names_and_inodes() {
    let mut fs = mount(package_fixture(), TTL);

    let err = fs.lookup(ROOT, "nope").await.unwrap_err();
    assert_eq!(err.errno(), libc::ENOENT);
    let err = fs.getattr(9999).await.unwrap_err();
    assert_eq!(err.errno(), libc::ENOENT);
}

#[tokio::test]
async fn open_handles_keep_vanished_files_readable() {
    let backend = package_fixture();
    let mut fs = mount(backend.clone(), TTL);
    let a = walk(&mut fs, "/P/A").await;
    let foo = walk(&mut fs, "/P/A/foo").await;
    let opened = fs.open(foo, OpenFlags::RDONLY).await.unwrap();

    backend.set_dir(
        "P/A",
        vec![EntrySpec::file("bar", "P/A/bar".to_owned(), 0, None)],
    );
    fs.tree_mut().invalidate(a);
    let err = fs.lookup(a, "foo").await.unwrap_err();
    assert_eq!(err.errno(), libc::ENOENT);

    assert_eq!(
        fs.read(opened.handle, 0, 3).await.unwrap(),
        Bytes::from_static(b"012")
    );
    assert!(fs.tree().contains(foo));

    fs.release(opened.handle).await.unwrap();
    assert!(!fs.tree().contains(foo), "released vanished nodes are dropped");
    let err = fs.getattr(foo).await.unwrap_err();
    assert_eq!(err.errno(), libc::ENOENT);
}

#[tokio::test]
async fn symlinks_resolve_to_their_target() {
    let backend = MockResolver::new();
    backend.set_dir("/", vec![EntrySpec::symlink("_link", "../../Q/B")]);
    let mut fs = mount(backend, TTL);

    let link = fs.lookup(ROOT, "_link").await.unwrap();
    assert_eq!(link.kind, INodeType::Symlink);
    assert_eq!(fs.readlink(link.ino).await.unwrap(), "../../Q/B");
    let err = fs.readlink(ROOT).await.unwrap_err();
    assert_eq!(err.errno(), libc::EINVAL);
}

#[tokio::test]
async fn statfs_reports_free_handles() {
    let mut fs = mount(package_fixture(), TTL);
    let foo = walk(&mut fs, "/P/A/foo").await;
    fs.open(foo, OpenFlags::RDONLY).await.unwrap();

    let stats = fs.statfs().await.unwrap();
    assert_eq!(stats.free_handles, 1023);
    assert_eq!(stats.max_filename_length, 255);
    assert_eq!(stats.total_inodes, fs.tree().node_count() as u64);
}
