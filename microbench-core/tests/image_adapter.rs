// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Image backend lifecycle against stand-in mkfs and wrapper scripts.

mod common;

use std::fs;

use common::{Tools, MKFS_FAIL, MKFS_OK, WRAPPER_NEVER_READY, WRAPPER_NO_SUMMARY, WRAPPER_OK};
use microbench_core::{AdapterError, FilesystemAdapter, ImageBackend, MountState};
use nix::sys::signal::kill;
use nix::unistd::Pid;

#[test]
fn test_image_is_filled_with_zero_digits() {
    let _guard = common::serial();
    let tools = Tools::new();
    let backend = ImageBackend::create(&tools.image_config(WRAPPER_OK, MKFS_OK)).unwrap();

    let image = fs::read(backend.image_path()).unwrap();
    assert_eq!(image.len(), 1024 * 1024);
    assert!(image.iter().all(|&b| b == b'0'));
    assert!(backend.mount_point().starts_with(std::env::temp_dir()));
}

#[test]
fn test_format_mount_unmount_measures_writes() {
    let _guard = common::serial();
    let tools = Tools::new();
    let mut backend = ImageBackend::create(&tools.image_config(WRAPPER_OK, MKFS_OK)).unwrap();

    backend.format().unwrap();
    assert_eq!(
        tools.read("mkfs.arg").as_deref(),
        Some(backend.image_path().to_str().unwrap())
    );

    backend.mount(None).unwrap();
    assert_eq!(backend.state(), MountState::Mounted);

    let measurement = backend.unmount().unwrap();
    assert_eq!(measurement.bytes_written(), 42);
    assert_eq!(backend.state(), MountState::Unmounted);

    // The same session serves the next case.
    backend.format().unwrap();
    backend.mount(None).unwrap();
    assert_eq!(backend.unmount().unwrap().bytes_written(), 42);
}

#[test]
fn test_trace_options_only_when_tracing() {
    let _guard = common::serial();
    let tools = Tools::new();
    let mut backend = ImageBackend::create(&tools.image_config(WRAPPER_OK, MKFS_OK)).unwrap();

    backend.mount(None).unwrap();
    backend.unmount().unwrap();
    assert_eq!(tools.read("pinopts"), None);

    let trace_log = tools.path().join("pin-create.log");
    backend.mount(Some(&trace_log)).unwrap();
    backend.unmount().unwrap();
    assert_eq!(
        tools.read("pinopts"),
        Some(format!("-b true -o {}", trace_log.display()))
    );

    // The harness's own environment is untouched.
    assert!(std::env::var_os("PINOPTS").is_none());
}

#[test]
fn test_wrapper_exiting_before_ready() {
    let _guard = common::serial();
    let tools = Tools::new();
    let mut backend =
        ImageBackend::create(&tools.image_config(WRAPPER_NEVER_READY, MKFS_OK)).unwrap();

    let err = backend.mount(None).unwrap_err();
    match err {
        AdapterError::StartFailed { backend: name, reason } => {
            assert_eq!(name, "bpfs");
            assert!(reason.contains("bad superblock"), "reason: {}", reason);
        }
        other => panic!("expected StartFailed, got {:?}", other),
    }
    assert_eq!(backend.state(), MountState::Unmounted);

    // Nothing to unmount.
    assert!(matches!(
        backend.unmount(),
        Err(AdapterError::InvalidState(_))
    ));
}

#[test]
fn test_wrapper_without_summary() {
    let _guard = common::serial();
    let tools = Tools::new();
    let mut backend =
        ImageBackend::create(&tools.image_config(WRAPPER_NO_SUMMARY, MKFS_OK)).unwrap();

    backend.mount(None).unwrap();
    assert!(matches!(
        backend.unmount(),
        Err(AdapterError::StopFailed { .. })
    ));
    assert_eq!(backend.state(), MountState::Unmounted);
}

#[test]
fn test_format_failure_carries_tool_output() {
    let _guard = common::serial();
    let tools = Tools::new();
    let mut backend = ImageBackend::create(&tools.image_config(WRAPPER_OK, MKFS_FAIL)).unwrap();

    match backend.format().unwrap_err() {
        AdapterError::FormatFailed { reason, .. } => {
            assert!(reason.contains("image too small"), "reason: {}", reason);
        }
        other => panic!("expected FormatFailed, got {:?}", other),
    }
}

#[test]
fn test_state_machine_guards() {
    let _guard = common::serial();
    let tools = Tools::new();
    let mut backend = ImageBackend::create(&tools.image_config(WRAPPER_OK, MKFS_OK)).unwrap();

    backend.mount(None).unwrap();
    assert!(matches!(
        backend.format(),
        Err(AdapterError::InvalidState(_))
    ));
    assert!(matches!(
        backend.mount(None),
        Err(AdapterError::InvalidState(_))
    ));
    assert_eq!(backend.unmount().unwrap().bytes_written(), 42);
}

#[test]
fn test_drop_while_mounted_stops_wrapper() {
    let _guard = common::serial();
    let tools = Tools::new();
    let mut backend = ImageBackend::create(&tools.image_config(WRAPPER_OK, MKFS_OK)).unwrap();
    let image = backend.image_path().to_path_buf();
    let mount_point = backend.mount_point().to_path_buf();

    backend.mount(None).unwrap();
    let pid: i32 = tools.read("wrapper.pid").unwrap().trim().parse().unwrap();

    drop(backend);

    // Reaped, so the pid no longer exists.
    assert!(kill(Pid::from_raw(pid), None).is_err());
    assert!(!image.exists());
    assert!(!mount_point.exists());
}
