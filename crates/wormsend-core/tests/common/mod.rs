//! Common test utilities for `wormsend` integration tests.
//!
//! Tests stand in for `wormhole` with small shell scripts that print the
//! same stderr lines the real tool does.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use wormsend_core::transfer::{send, PendingTransfer, SendRequest};
use wormsend_core::Error;

/// Create a temporary directory for test files.
///
/// The directory will be automatically cleaned up when the returned
/// `TempDir` is dropped.
pub fn create_temp_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

/// Create a test file with the given content.
pub fn create_test_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create parent directories");
    }
    std::fs::write(&path, content).expect("Failed to write test file");
    path
}

/// Write an executable `/bin/sh` script standing in for `wormhole`.
#[cfg(unix)]
pub fn create_fake_tool(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("wormhole");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("Failed to write fake tool");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("Failed to make fake tool executable");
    path
}

/// Start a send, retrying while the freshly written script is still busy.
///
/// Another test thread forking while our script was open for writing can
/// make the first exec fail with ETXTBSY.
pub async fn start_send(request: SendRequest) -> PendingTransfer {
    let mut attempts = 0;
    loop {
        match send(request.clone()).await {
            Ok(pending) => return pending,
            Err(Error::SpawnFailed(msg)) if attempts < 5 => {
                attempts += 1;
                eprintln!("retrying spawn: {msg}");
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            Err(e) => panic!("send failed to start: {e}"),
        }
    }
}

/// Stderr of a complete, successful `wormhole send`.
pub const HAPPY_PATH_SCRIPT: &str = r#"
echo "Sending 7 Bytes file named 'notes.txt'" >&2
echo "Wormhole code is: 7-crossover-clockwork" >&2
echo "On the other computer, please run:" >&2
echo "" >&2
echo "wormhole receive 7-crossover-clockwork" >&2
echo "" >&2
sleep 0.2
echo "Sending (<-192.168.1.5:4321).." >&2
printf '  0%%|          | 0.00/7.00\r 50%%|#####     | 3.50/7.00\r100%%|##########| 7.00/7.00\n' >&2
echo "File sent.. waiting for confirmation" >&2
echo "Confirmation received. Transfer complete." >&2
"#;
