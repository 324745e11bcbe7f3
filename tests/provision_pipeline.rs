//! Integration tests for both provisioning pipelines.
//!
//! The host application and its bundled interpreter are stand-in shell
//! scripts; the release server is a wiremock instance.

#![cfg(unix)]

use bundled_pydev::{
    install_headers, install_module, InstallStage, ParseError, ProvisionError, ProvisionOptions,
    ProvisionProgress, PROBE_SENTINEL,
};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PYCONFIG: &[u8] = b"#define HAVE_FAKE_FEATURE 1\n/* pyconfig */\n";

/// A fake host install: `<root>/host` plus a bundled interpreter at
/// `<root>/python`.
struct FakeHost {
    root: TempDir,
}

impl FakeHost {
    fn new(interpreter_body: &str) -> Self {
        let root = tempfile::tempdir().unwrap();
        let host = Self { root };
        let location = host.location();
        fs::create_dir_all(location.join("bin")).unwrap();

        host.write_script(
            &host.host(),
            &format!(
                "echo 'Read prefs: /home/user/.config/blender/2.80/config/userpref.blend'\n\
                 echo 'found bundled python: {}'\n\
                 echo '{}'\n",
                location.display(),
                PROBE_SENTINEL
            ),
        );
        host.write_script(&location.join("bin/python3.9"), interpreter_body);
        host
    }

    fn host(&self) -> PathBuf {
        self.root.path().join("host")
    }

    fn location(&self) -> PathBuf {
        self.root.path().join("python")
    }

    fn write_script(&self, target: &Path, body: &str) {
        fs::write(target, format!("#!/bin/sh\n{}", body)).unwrap();
        fs::set_permissions(target, fs::Permissions::from_mode(0o755)).unwrap();
    }
}

fn version_only_interpreter() -> &'static str {
    "if [ \"$1\" = \"-V\" ]; then echo 'Python 3.9.1'; exit 0; fi\nexit 3\n"
}

fn release_tgz(version: &str, include: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    let mut entries: Vec<(String, &[u8])> = include
        .iter()
        .map(|(name, data)| (format!("Python-{}/Include/{}", version, name), *data))
        .collect();
    entries.push((format!("Python-{}/Lib/os.py", version), b"import abc\n"));
    for (name, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, data).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

fn options_for(server: &MockServer, scratch: &Path) -> ProvisionOptions {
    ProvisionOptions {
        release_base_url: Some(server.uri()),
        scratch_dir: Some(scratch.to_path_buf()),
        process_timeout: Duration::from_secs(10),
        network_timeout: Duration::from_secs(10),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_headers_installed_from_release_archive() {
    let fake = FakeHost::new(version_only_interpreter());
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/3.9.1/Python-3.9.1.tgz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(release_tgz(
            "3.9.1",
            &[("pyconfig.h", PYCONFIG), ("cpython/object.h", b"struct _object;\n")],
        )))
        .mount(&server)
        .await;

    let scratch = tempfile::tempdir().unwrap();
    let events = Arc::new(Mutex::new(Vec::new()));
    let events_clone = events.clone();

    let installed = install_headers(
        &fake.host(),
        &options_for(&server, scratch.path()),
        move |p| events_clone.lock().unwrap().push(p),
    )
    .await
    .unwrap();

    let destination = fake.location().join("include/python39");
    assert_eq!(installed.path, destination);
    assert_eq!(installed.version.as_str(), "3.9.1");
    assert_eq!(installed.file_count, 2);
    assert_eq!(fs::read(destination.join("pyconfig.h")).unwrap(), PYCONFIG);
    assert!(destination.join("cpython/object.h").is_file());
    assert!(!destination.join("os.py").exists());
    assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);

    let events = events.lock().unwrap();
    assert!(events.contains(&ProvisionProgress::VersionDetected {
        version: "3.9.1".parse().unwrap()
    }));
    assert!(events.last().unwrap().is_complete());
}

#[tokio::test]
async fn test_repeated_header_install_is_idempotent() {
    let fake = FakeHost::new(version_only_interpreter());
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/3.9.1/Python-3.9.1.tgz"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(release_tgz("3.9.1", &[("pyconfig.h", PYCONFIG)])),
        )
        .mount(&server)
        .await;

    let scratch = tempfile::tempdir().unwrap();
    let options = options_for(&server, scratch.path());

    let first = install_headers(&fake.host(), &options, |_| {}).await.unwrap();
    fs::write(first.path.join("leftover.h"), b"stale").unwrap();
    let second = install_headers(&fake.host(), &options, |_| {}).await.unwrap();

    assert_eq!(first, second);
    assert!(!second.path.join("leftover.h").exists());
    assert_eq!(fs::read(second.path.join("pyconfig.h")).unwrap(), PYCONFIG);
}

#[tokio::test]
async fn test_missing_release_leaves_destination_untouched() {
    let fake = FakeHost::new(version_only_interpreter());
    let destination = fake.location().join("include/python39");
    fs::create_dir_all(&destination).unwrap();
    fs::write(destination.join("previous.h"), b"keep me").unwrap();

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let scratch = tempfile::tempdir().unwrap();
    let result = install_headers(&fake.host(), &options_for(&server, scratch.path()), |_| {}).await;

    match result {
        Err(e @ ProvisionError::Fetch { .. }) => {
            assert!(e.fix_suggestion().contains("No source release"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(fs::read(destination.join("previous.h")).unwrap(), b"keep me");
    assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_archive_without_include_dir() {
    let fake = FakeHost::new(version_only_interpreter());
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/3.9.1/Python-3.9.1.tgz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(release_tgz("3.9.1", &[])))
        .mount(&server)
        .await;

    let scratch = tempfile::tempdir().unwrap();
    let result = install_headers(&fake.host(), &options_for(&server, scratch.path()), |_| {}).await;
    assert!(matches!(
        result,
        Err(ProvisionError::Install {
            stage: InstallStage::Extract,
            ..
        })
    ));
    assert!(!fake.location().join("include/python39").exists());
}

#[tokio::test]
async fn test_host_without_sentinel_is_rejected() {
    let fake = FakeHost::new(version_only_interpreter());
    fake.write_script(&fake.host(), "echo 'Blender 2.79 (sub 0)'\n");

    let result = install_headers(&fake.host(), &ProvisionOptions::default(), |_| {}).await;
    match result {
        Err(ProvisionError::ProbeFormat { failure, output, .. }) => {
            assert!(matches!(failure, ParseError::SentinelMissing(_)));
            assert!(output.contains("Blender 2.79"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_hanging_host_times_out() {
    let fake = FakeHost::new(version_only_interpreter());
    fake.write_script(&fake.host(), "sleep 5\n");

    let options = ProvisionOptions {
        process_timeout: Duration::from_millis(300),
        ..Default::default()
    };
    let started = std::time::Instant::now();
    let result = install_headers(&fake.host(), &options, |_| {}).await;

    assert!(matches!(result, Err(ProvisionError::Timeout { .. })));
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn test_module_installed_with_bundled_pip() {
    let fake_dir = tempfile::tempdir().unwrap();
    let argv_log = fake_dir.path().join("argv.log");
    let fake = FakeHost::new(&format!(
        "printf '%s\\n' \"$@\" > '{}'\necho \"Successfully installed $3\"\n",
        argv_log.display()
    ));
    let pip = fake.location().join("lib/python3.9/site-packages/pip");
    fs::create_dir_all(&pip).unwrap();

    let events = Arc::new(Mutex::new(Vec::new()));
    let events_clone = events.clone();
    let module = install_module(
        &fake.host(),
        "requests[socks]==2.31.0",
        &ProvisionOptions::default(),
        move |p| events_clone.lock().unwrap().push(p),
    )
    .await
    .unwrap();

    assert_eq!(module.package, "requests[socks]==2.31.0");
    assert_eq!(module.interpreter, fake.location().join("bin/python3.9"));
    assert!(module.output.contains("Successfully installed requests[socks]==2.31.0"));

    let argv = fs::read_to_string(&argv_log).unwrap();
    let argv: Vec<&str> = argv.lines().collect();
    assert_eq!(
        argv,
        vec![pip.to_str().unwrap(), "install", "requests[socks]==2.31.0"]
    );

    let events = events.lock().unwrap();
    assert!(matches!(
        events.last(),
        Some(ProvisionProgress::ModuleInstalled { package }) if package == "requests[socks]==2.31.0"
    ));
}

#[tokio::test]
async fn test_module_install_failure_reports_output() {
    let fake = FakeHost::new(
        "echo 'Collecting nosuchpkg'\n\
         echo 'ERROR: No matching distribution found for nosuchpkg' >&2\n\
         exit 1\n",
    );

    let result = install_module(&fake.host(), "nosuchpkg", &ProvisionOptions::default(), |_| {}).await;
    match result {
        Err(ProvisionError::ModuleInstall {
            command,
            exit_code,
            stdout,
            stderr,
            ..
        }) => {
            assert_eq!(exit_code, Some(1));
            assert!(command.ends_with("-m pip install nosuchpkg"));
            assert!(stdout.contains("Collecting nosuchpkg"));
            assert!(stderr.contains("No matching distribution"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_invalid_package_never_reaches_host() {
    let fake_dir = tempfile::tempdir().unwrap();
    let marker = fake_dir.path().join("host-ran");
    let fake = FakeHost::new("exit 0\n");
    fake.write_script(&fake.host(), &format!("touch '{}'\n", marker.display()));

    let result = install_module(
        &fake.host(),
        "numpy; touch /tmp/pwned",
        &ProvisionOptions::default(),
        |_| {},
    )
    .await;

    assert!(matches!(result, Err(ProvisionError::InvalidPackage { .. })));
    assert!(!marker.exists());
}
