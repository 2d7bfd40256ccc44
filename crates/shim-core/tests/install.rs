//! End-to-end installer runs against a mock release host.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use flate2::Compression;
use flate2::write::GzEncoder;
use mockito::{Mock, Server, ServerGuard};
use sha2::{Digest, Sha256};
use shim_core::reporter::{Level, RecordingReporter};
use shim_core::{InstallConfig, InstallOutcome, Installer, Optimization, Verification};
use shim_schema::PlatformKey;

const VERSION: &str = "2.3.0";
const ARCHIVE: &str = "agent-desktop-v2.3.0-aarch64-apple-darwin.tar.gz";
const ASSET: &str = "agent-desktop-darwin-arm64";
const PAYLOAD: &[u8] = b"#!/bin/sh\necho native\n";

fn release_archive(payload: &[u8]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));

    let mut header = tar::Header::new_gnu();
    header.set_size(payload.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, "agent-desktop", payload)
        .unwrap();

    let readme = b"see https://github.com/lahfir/agent-desktop";
    let mut header = tar::Header::new_gnu();
    header.set_size(readme.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, "README.md", &readme[..])
        .unwrap();

    let mut gz = builder.into_inner().unwrap();
    gz.flush().unwrap();
    gz.finish().unwrap()
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn config(server: &ServerGuard, bin_dir: &Path) -> InstallConfig {
    let mut config = InstallConfig::new(VERSION, bin_dir);
    config.platform = PlatformKey::new("darwin", "arm64");
    config.download_base = server.url();
    config.timeout = Duration::from_secs(10);
    config.retry.unit = Duration::from_millis(1);
    config.optimize_symlink = false;
    config
}

async fn mock_archive(server: &mut ServerGuard, body: &[u8]) -> Mock {
    server
        .mock("GET", format!("/v{VERSION}/{ARCHIVE}").as_str())
        .with_status(200)
        .with_body(body)
        .create_async()
        .await
}

async fn mock_manifest(server: &mut ServerGuard, body: String) -> Mock {
    server
        .mock("GET", format!("/v{VERSION}/checksums.txt").as_str())
        .with_status(200)
        .with_body(body)
        .create_async()
        .await
}

fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn installed_path(outcome: InstallOutcome) -> (PathBuf, Verification) {
    match outcome {
        InstallOutcome::Installed {
            path, verification, ..
        } => (path, verification),
        other => panic!("expected a fresh install, got {other:?}"),
    }
}

#[tokio::test]
async fn verified_install_places_the_executable() {
    let mut server = Server::new_async().await;
    let archive = release_archive(PAYLOAD);
    let manifest = format!(
        "{}  agent-desktop-v2.3.0-x86_64-apple-darwin.tar.gz\n{}  {ARCHIVE}\n",
        "0".repeat(64),
        sha256_hex(&archive)
    );
    let _a = mock_archive(&mut server, &archive).await;
    let _m = mock_manifest(&mut server, manifest).await;

    let dir = tempfile::tempdir().unwrap();
    let rec = RecordingReporter::new();
    let outcome = Installer::new(config(&server, dir.path()), &rec).run().await;

    assert_eq!(outcome.exit_code(true), 0);
    let (path, verification) = installed_path(outcome);
    assert_eq!(verification, Verification::Verified);
    assert_eq!(path, dir.path().join(ASSET));
    assert_eq!(std::fs::read(&path).unwrap(), PAYLOAD);
    assert!(shim_core::io::is_executable(&path).unwrap());
    assert_eq!(dir_entries(dir.path()), vec![ASSET.to_string()]);

    assert!(rec.contains(Level::Info, "Downloading native binary for darwin-arm64"));
    assert!(rec.contains(Level::Success, "Checksum verified"));
}

#[tokio::test]
async fn second_run_does_not_download_again() {
    let mut server = Server::new_async().await;
    let archive = release_archive(PAYLOAD);
    let archive_mock = server
        .mock("GET", format!("/v{VERSION}/{ARCHIVE}").as_str())
        .with_status(200)
        .with_body(&archive)
        .expect(1)
        .create_async()
        .await;
    let manifest_mock = server
        .mock("GET", format!("/v{VERSION}/checksums.txt").as_str())
        .with_status(200)
        .with_body(format!("{}  {ARCHIVE}\n", sha256_hex(&archive)))
        .expect(1)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let installer = Installer::new(config(&server, dir.path()), shim_core::NullReporter);

    assert!(matches!(
        installer.run().await,
        InstallOutcome::Installed { .. }
    ));
    let outcome = installer.run().await;

    assert!(matches!(outcome, InstallOutcome::AlreadyInstalled { .. }));
    archive_mock.assert_async().await;
    manifest_mock.assert_async().await;
    assert_eq!(std::fs::read(dir.path().join(ASSET)).unwrap(), PAYLOAD);
}

#[tokio::test]
async fn checksum_mismatch_discards_everything() {
    let mut server = Server::new_async().await;
    let archive = release_archive(PAYLOAD);
    let _a = mock_archive(&mut server, &archive).await;
    let _m = mock_manifest(&mut server, format!("{}  {ARCHIVE}\n", "ab".repeat(32))).await;

    let dir = tempfile::tempdir().unwrap();
    let rec = RecordingReporter::new();
    let outcome = Installer::new(config(&server, dir.path()), &rec).run().await;

    match &outcome {
        InstallOutcome::IntegrityFailure { expected, actual } => {
            assert_eq!(expected.as_str(), "ab".repeat(32));
            assert_eq!(actual.as_str(), sha256_hex(&archive));
        }
        other => panic!("expected integrity failure, got {other:?}"),
    }
    assert!(!outcome.is_installed());
    assert_eq!(outcome.exit_code(false), 0);
    assert_eq!(outcome.exit_code(true), 1);
    assert!(dir_entries(dir.path()).is_empty());
    assert!(rec.contains(Level::Warning, "Checksum verification failed"));
}

#[tokio::test]
async fn malformed_manifest_digest_is_an_integrity_failure() {
    let mut server = Server::new_async().await;
    let archive = release_archive(PAYLOAD);
    let _a = mock_archive(&mut server, &archive).await;
    // The malformed line comes first, so the valid one after it must not win.
    let manifest = format!("deadbeef  {ARCHIVE}\n{}  {ARCHIVE}\n", sha256_hex(&archive));
    let _m = mock_manifest(&mut server, manifest).await;

    let dir = tempfile::tempdir().unwrap();
    let rec = RecordingReporter::new();
    let outcome = Installer::new(config(&server, dir.path()), &rec).run().await;

    match &outcome {
        InstallOutcome::IntegrityFailure { expected, actual } => {
            assert_eq!(expected, "deadbeef");
            assert_eq!(actual.as_str(), sha256_hex(&archive));
        }
        other => panic!("expected integrity failure, got {other:?}"),
    }
    assert_eq!(outcome.exit_code(true), 1);
    assert!(!dir.path().join(ASSET).exists());
    assert!(dir_entries(dir.path()).is_empty());
    assert!(rec.contains(Level::Warning, "is unusable"));
    assert!(rec.contains(Level::Warning, "Checksum verification failed"));
}

#[tokio::test]
async fn missing_manifest_installs_unverified() {
    let mut server = Server::new_async().await;
    let archive = release_archive(PAYLOAD);
    let _a = mock_archive(&mut server, &archive).await;
    let _m = server
        .mock("GET", format!("/v{VERSION}/checksums.txt").as_str())
        .with_status(404)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let rec = RecordingReporter::new();
    let outcome = Installer::new(config(&server, dir.path()), &rec).run().await;

    let (path, verification) = installed_path(outcome);
    assert!(matches!(verification, Verification::Skipped(_)));
    assert_eq!(std::fs::read(&path).unwrap(), PAYLOAD);
    assert_eq!(dir_entries(dir.path()), vec![ASSET.to_string()]);
    assert!(rec.contains(Level::Warning, "Could not verify checksum"));
}

#[tokio::test]
async fn manifest_without_entry_installs_unverified() {
    let mut server = Server::new_async().await;
    let archive = release_archive(PAYLOAD);
    let _a = mock_archive(&mut server, &archive).await;
    // A longer name that merely contains ours must not count as a match.
    let _m = mock_manifest(
        &mut server,
        format!("{}  {ARCHIVE}.sig\n", sha256_hex(b"signature")),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let rec = RecordingReporter::new();
    let outcome = Installer::new(config(&server, dir.path()), &rec).run().await;

    let (_, verification) = installed_path(outcome);
    assert!(matches!(verification, Verification::Skipped(reason) if reason.contains(ARCHIVE)));
    assert!(rec.contains(Level::Warning, "Checksum not verified"));
}

#[tokio::test]
async fn archive_not_found_degrades_after_retries() {
    let mut server = Server::new_async().await;
    let missing = server
        .mock("GET", format!("/v{VERSION}/{ARCHIVE}").as_str())
        .with_status(404)
        .expect(3)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let rec = RecordingReporter::new();
    let outcome = Installer::new(config(&server, dir.path()), &rec).run().await;

    missing.assert_async().await;
    match &outcome {
        InstallOutcome::Degraded { error } => assert!(error.to_string().contains("HTTP 404")),
        other => panic!("expected degraded outcome, got {other:?}"),
    }
    assert_eq!(outcome.exit_code(false), 0);
    assert!(dir_entries(dir.path()).is_empty());
    assert!(rec.contains(Level::Warning, "attempt 1/3"));
    assert!(rec.contains(Level::Warning, "attempt 2/3"));
    assert!(!rec.contains(Level::Warning, "attempt 3/3"));
    assert!(rec.contains(Level::Info, &format!("/v{VERSION}/{ARCHIVE}")));
}

#[tokio::test]
async fn archive_without_executable_degrades() {
    let mut server = Server::new_async().await;

    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    let mut header = tar::Header::new_gnu();
    header.set_size(2);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, "LICENSE", &b"ok"[..])
        .unwrap();
    let archive = builder.into_inner().unwrap().finish().unwrap();

    let _a = mock_archive(&mut server, &archive).await;
    let _m = mock_manifest(&mut server, format!("{}  {ARCHIVE}\n", sha256_hex(&archive))).await;

    let dir = tempfile::tempdir().unwrap();
    let outcome = Installer::new(config(&server, dir.path()), shim_core::NullReporter)
        .run()
        .await;

    assert!(matches!(
        outcome,
        InstallOutcome::Degraded {
            error: shim_core::InstallError::MissingEntry { .. }
        }
    ));
    assert!(dir_entries(dir.path()).is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn global_symlink_is_repointed_at_the_native_binary() {
    let mut server = Server::new_async().await;
    let archive = release_archive(PAYLOAD);
    let _a = mock_archive(&mut server, &archive).await;
    let _m = mock_manifest(&mut server, format!("{}  {ARCHIVE}\n", sha256_hex(&archive))).await;

    let root = tempfile::tempdir().unwrap();
    let pkg_bin = root.path().join("lib/node_modules/agent-desktop/bin");
    let global_bin = root.path().join("bin");
    std::fs::create_dir_all(&pkg_bin).unwrap();
    std::fs::create_dir_all(&global_bin).unwrap();

    let launcher = pkg_bin.join("agent-desktop");
    std::fs::write(&launcher, b"launcher").unwrap();
    std::os::unix::fs::symlink(&launcher, global_bin.join("agent-desktop")).unwrap();

    let mut cfg = config(&server, &pkg_bin);
    cfg.optimize_symlink = true;
    cfg.global_bin_dir = Some(global_bin.clone());

    let outcome = Installer::new(cfg, shim_core::NullReporter).run().await;

    match outcome {
        InstallOutcome::Installed {
            path, optimization, ..
        } => {
            assert_eq!(optimization, Optimization::Relinked);
            assert_eq!(
                std::fs::read_link(global_bin.join("agent-desktop")).unwrap(),
                std::fs::canonicalize(path).unwrap()
            );
        }
        other => panic!("expected a fresh install, got {other:?}"),
    }
}
