use obs_api::{ClientBuilder, Obs, ObsError};
use obs_fs::catalog::{CatalogOptions, DirKey, ObsCatalog};
use obs_fs::fs::handles::HandleTable;
use obs_fs::fs::policy::CachePolicy;
use obs_fs::fs::stat::Owner;
use obs_fs::fs::tree::{NodeTree, TreeError};
use obs_fs::fs::vfs::VirtualFs;
use thiserror::Error;
use tokio::select;

use crate::app_config;
use tracing::{debug, error, info};

type ObsFs = VirtualFs<ObsCatalog<Obs>>;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("OBS API error: {0}")]
    Api(#[from] ObsError),

    #[error("Authentication against {0} failed. Check the configured user and password.")]
    Unauthorized(String),

    #[error("Listing projects failed: {0}")]
    Startup(String),
}

mod managed_fuse {
    //! fuser will not attempt to fuse unmount the filesystem when the `BackgroundSession` is
    //! dropped, and will only do a regular unmount, but we want to be aggressive and force an
    //! unmount if possible.
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use nix::errno::Errno;

    use super::{ObsFs, debug, error};
    use fuser::BackgroundSession;
    use obs_fs::fs::fuser::FuserAdapter;

    pub struct FuseCoreScope {
        _session: BackgroundSession,
    }

    impl FuseCoreScope {
        fn spawn(
            fs: ObsFs,
            mount_point: &Path,
            handle: tokio::runtime::Handle,
            foreground: bool,
        ) -> Result<Self, std::io::Error> {
            let fuse_adapter = FuserAdapter::new(fs, handle).announcing_ready(foreground);
            let mount_opts = [
                fuser::MountOption::FSName("obs-fs".to_owned()),
                fuser::MountOption::NoDev,
                fuser::MountOption::NoSuid,
                fuser::MountOption::AutoUnmount,
                fuser::MountOption::DefaultPermissions,
            ];

            Ok(Self {
                _session: fuser::spawn_mount2(fuse_adapter, mount_point, &mount_opts)?,
            })
        }
    }

    pub struct ManagedFuse {
        mount_point: PathBuf,
    }

    impl ManagedFuse {
        pub fn new(mount_point: &Path) -> Self {
            Self {
                mount_point: mount_point.to_path_buf(),
            }
        }

        pub fn spawn(
            &self,
            fs: ObsFs,
            handle: tokio::runtime::Handle,
            foreground: bool,
        ) -> Result<FuseCoreScope, std::io::Error> {
            FuseCoreScope::spawn(fs, &self.mount_point, handle, foreground)
        }
    }

    impl Drop for ManagedFuse {
        fn drop(&mut self) {
            const UMOUNT_ATTEMPT_COUNT: usize = 10;
            const UMOUNT_ATTEMPT_DELAY: Duration = Duration::from_millis(10);

            debug!(mount_point = ?self.mount_point, "Confirming unmount of FUSE filesystem...");

            for i in 0..UMOUNT_ATTEMPT_COUNT {
                let result = {
                    #[cfg(target_os = "macos")]
                    {
                        nix::mount::unmount(&self.mount_point, nix::mount::MntFlags::MNT_FORCE)
                    }

                    #[cfg(target_os = "linux")]
                    {
                        nix::mount::umount2(&self.mount_point, nix::mount::MntFlags::MNT_DETACH)
                    }
                };

                match result {
                    Ok(()) => {
                        debug!(
                            "Successfully unmounted FUSE filesystem on attempt {}",
                            i + 1
                        );
                        break;
                    }
                    Err(Errno::EBUSY) => {
                        debug!(
                            "FUSE filesystem still busy on attempt {}. Retrying...",
                            i + 1
                        );
                        std::thread::sleep(UMOUNT_ATTEMPT_DELAY);
                    }
                    Err(Errno::EINVAL | Errno::ENOENT) => {
                        debug!("FUSE filesystem already unmounted (attempt {})", i + 1);
                        break;
                    }
                    Err(e) => {
                        error!(
                            "Failed to unmount FUSE filesystem on attempt {}: {}",
                            i + 1,
                            e
                        );
                        break;
                    }
                }
            }
        }
    }
}

/// Prepares the mount point directory.
///
/// - If the directory exists and is non-empty, returns an error.
/// - If the directory does not exist, creates it (including parents) and logs an info message.
/// - If the directory exists and is empty, does nothing.
async fn prepare_mount_point(mount_point: &std::path::Path) -> Result<(), std::io::Error> {
    match tokio::fs::read_dir(mount_point).await {
        Ok(mut entries) => {
            if entries.next_entry().await?.is_some() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    format!(
                        "Mount point '{}' already exists and is not empty.",
                        mount_point.display()
                    ),
                ));
            }
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tokio::fs::create_dir_all(mount_point).await?;
            info!(path = %mount_point.display(), "Created mount point directory.");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

async fn wait_for_exit() -> Result<(), std::io::Error> {
    use tokio::signal;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    let mut sighup = signal::unix::signal(signal::unix::SignalKind::hangup())?;
    select! {
        _ = signal::ctrl_c() => {
            debug!("Received Ctrl+C signal, shutting down...");
        },
        _ = sigterm.recv() => {
            debug!("Received termination signal, shutting down...");
        },
        _ = sighup.recv() => {
            debug!("Received hangup signal, shutting down...");
        },
    }
    Ok(())
}

/// Builds the filesystem served at the mount point.
fn build_fs(config: &app_config::Config) -> Result<ObsFs, DaemonError> {
    let mut builder = ClientBuilder::new(config.api_url.clone());
    if let (Some(user), Some(password)) =
        (&config.credentials.user, &config.credentials.password)
    {
        builder = builder.credentials(user.clone(), password.clone());
    }
    let client = builder.build()?;

    let options = CatalogOptions {
        include_homes: config.projects.include_homes,
        include_maintenance: config.projects.include_maintenance,
        include_ptf: config.projects.include_ptf,
        cache_binaries: config.cache.cache_binaries,
    };
    let tree = NodeTree::new(
        ObsCatalog::new(client, options),
        DirKey::Root,
        CachePolicy::new(config.cache.ttl()),
        Owner {
            uid: config.uid,
            gid: config.gid,
        },
    );
    Ok(VirtualFs::new(
        tree,
        HandleTable::with_capacity(config.cache.handle_capacity),
    ))
}

/// Lists the root once, so bad credentials or an unreachable server fail the command instead of
/// every later access.
async fn check_access(fs: &mut ObsFs, api_url: &str) -> Result<(), DaemonError> {
    match fs.tree_mut().ensure_fresh(NodeTree::<ObsCatalog<Obs>>::ROOT).await {
        Ok(()) => Ok(()),
        Err(TreeError::Upstream(ObsError::Unauthorized)) => {
            Err(DaemonError::Unauthorized(api_url.to_owned()))
        }
        Err(TreeError::Upstream(err)) => Err(DaemonError::Api(err)),
        Err(err) => Err(DaemonError::Startup(err.to_string())),
    }
}

/// Checks access to the build service on a short-lived runtime.
///
/// Runs before the process detaches so failures reach the invoking shell.
pub fn preflight(config: &app_config::Config) -> Result<(), DaemonError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        let mut fs = build_fs(config)?;
        info!(api_url = %config.api_url, "Checking access to the build service...");
        check_access(&mut fs, &config.api_url).await
    })
}

/// Main entry point for the daemon.
pub async fn run(
    config: app_config::Config,
    handle: tokio::runtime::Handle,
    foreground: bool,
) -> Result<(), DaemonError> {
    let fs = build_fs(&config)?;
    prepare_mount_point(&config.mount_point).await?;

    info!("Mounting filesystem at {}.", config.mount_point.display());

    let fuse = managed_fuse::ManagedFuse::new(&config.mount_point);
    {
        let _session = fuse.spawn(fs, handle.clone(), foreground)?;
        info!("obs-fs is running. Press Ctrl+C to stop.");

        wait_for_exit().await?;
    }
    Ok(())
}

/// Run the daemon on a fresh runtime. `foreground` also prints the mount handshake on stdout.
pub fn spawn(config: app_config::Config, foreground: bool) -> Result<(), DaemonError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(config, runtime.handle().clone(), foreground))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::io::{Read as _, Write as _};
    use std::net::TcpListener;

    use super::*;

    /// Answers every request with `status` and an empty body. Returns the base URL.
    fn serve(status: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else {
                    break;
                };
                let mut request = [0_u8; 4096];
                let _ = stream.read(&mut request);
                let _ = write!(
                    stream,
                    "HTTP/1.1 {status}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                );
            }
        });
        format!("http://127.0.0.1:{port}")
    }

    fn config_for(api_url: String) -> app_config::Config {
        app_config::Config {
            api_url,
            ..app_config::Config::default()
        }
    }

    #[test]
    fn preflight_reports_rejected_credentials() {
        let api_url = serve("401 Unauthorized");
        let result = preflight(&config_for(api_url.clone()));
        assert!(
            matches!(&result, Err(DaemonError::Unauthorized(url)) if *url == api_url),
            "a 401 must fail before detaching, got {result:?}"
        );
    }

    #[test]
    fn preflight_fails_on_other_upstream_errors() {
        let result = preflight(&config_for(serve("500 Internal Server Error")));
        assert!(
            matches!(result, Err(DaemonError::Api(ObsError::Http { .. }))),
            "got {result:?}"
        );
    }

    #[test]
    fn preflight_accepts_a_project_list() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        std::thread::spawn(move || {
            let body = r#"<directory count="1"><entry name="openSUSE:Factory"/></directory>"#;
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else {
                    break;
                };
                let mut request = [0_u8; 4096];
                let _ = stream.read(&mut request);
                let _ = write!(
                    stream,
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
            }
        });

        preflight(&config_for(format!("http://127.0.0.1:{port}"))).unwrap();
    }
}
