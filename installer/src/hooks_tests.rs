//! Unit tests for hook manifests and the registry.

use super::*;
use rstest::{fixture, rstest};
use std::cell::RefCell;
use std::rc::Rc;
use tempfile::TempDir;

#[fixture]
fn context() -> HookContext {
    HookContext {
        definition: "3.2.0".to_owned(),
        version_name: "3.2.0".to_owned(),
        prefix: Utf8PathBuf::from("/home/ruby/.rbenv/versions/3.2.0"),
        status: None,
    }
}

fn recorder(registry: &mut HookRegistry, phase: HookPhase, label: &str, log: &Rc<RefCell<Vec<String>>>) {
    let log = Rc::clone(log);
    let name = label.to_owned();
    registry.register(
        phase,
        Hook::callback(label, move |_| {
            log.borrow_mut().push(name.clone());
            Ok(())
        }),
    );
}

fn utf8_dir(dir: &TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 temp path")
}

#[rstest]
fn hooks_run_in_registration_order_per_phase(context: HookContext) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut registry = HookRegistry::new();
    recorder(&mut registry, HookPhase::BeforeInstall, "b1", &log);
    recorder(&mut registry, HookPhase::AfterInstall, "a1", &log);
    recorder(&mut registry, HookPhase::BeforeInstall, "b2", &log);
    recorder(&mut registry, HookPhase::AfterInstall, "a2", &log);

    registry.run(HookPhase::BeforeInstall, &context).expect("before hooks");
    assert_eq!(*log.borrow(), ["b1", "b2"]);

    registry.run(HookPhase::AfterInstall, &context).expect("after hooks");
    assert_eq!(*log.borrow(), ["b1", "b2", "a1", "a2"]);
}

#[rstest]
fn callback_sees_the_context(context: HookContext) {
    let seen = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&seen);
    let mut registry = HookRegistry::new();
    registry.after_install("capture", move |ctx| {
        *sink.borrow_mut() = Some((ctx.version_name.clone(), ctx.status));
        Ok(())
    });

    let after = HookContext {
        status: Some(1),
        ..context
    };
    registry.run(HookPhase::AfterInstall, &after).expect("run");

    assert_eq!(*seen.borrow(), Some(("3.2.0".to_owned(), Some(1))));
}

#[rstest]
fn failing_hook_stops_the_phase(context: HookContext) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut registry = HookRegistry::new();
    registry.before_install("broken", |_| Err(InstallerError::NoDefinition));
    recorder(&mut registry, HookPhase::BeforeInstall, "later", &log);

    let err = registry
        .run(HookPhase::BeforeInstall, &context)
        .expect_err("hook fails");

    match err {
        InstallerError::HookFailed { phase, hook, .. } => {
            assert_eq!(phase, "before_install");
            assert_eq!(hook, "broken");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(log.borrow().is_empty());
}

#[test]
fn manifest_parses_all_fields() {
    let manifest = HookManifest::parse(
        Utf8Path::new("hooks.toml"),
        r#"
            version_name = "3.2.0-custom"
            version_suffix = "-dev"

            [[before_install]]
            command = "fetch"
            args = ["--quiet"]

            [[after_install]]
            command = "notify"
        "#,
    )
    .expect("parse");

    assert_eq!(manifest.version_name.as_deref(), Some("3.2.0-custom"));
    assert_eq!(manifest.version_suffix.as_deref(), Some("-dev"));
    assert_eq!(
        manifest.before_install,
        [CommandHook {
            command: "fetch".to_owned(),
            args: vec!["--quiet".to_owned()],
        }]
    );
    assert_eq!(manifest.after_install[0].args, Vec::<String>::new());
}

#[rstest]
#[case::unknown_key("colour = true")]
#[case::missing_command("[[before_install]]\nargs = []")]
#[case::bad_toml("[[before_install")]
fn malformed_manifests_are_rejected(#[case] contents: &str) {
    let err = HookManifest::parse(Utf8Path::new("bad.toml"), contents).expect_err("rejected");
    assert!(matches!(err, InstallerError::InvalidHookManifest { ref path, .. } if path == "bad.toml"));
}

#[test]
fn later_manifests_override_version_name() {
    let mut registry = HookRegistry::new();
    registry.apply(
        HookManifest {
            version_name: Some("first".to_owned()),
            version_suffix: Some("-a".to_owned()),
            ..HookManifest::default()
        },
        None,
    );
    registry.apply(
        HookManifest {
            version_name: Some("second".to_owned()),
            ..HookManifest::default()
        },
        None,
    );

    assert_eq!(registry.version_name_override(), Some("second"));
    assert_eq!(registry.version_suffix(), Some("-a"));
}

#[test]
fn relative_commands_resolve_against_manifest_directory() {
    assert_eq!(resolve_program("./fetch", Some(Utf8Path::new("/etc/hooks"))), "/etc/hooks/./fetch");
    assert_eq!(resolve_program("notify", Some(Utf8Path::new("/etc/hooks"))), "notify");
    assert_eq!(resolve_program("/bin/true", Some(Utf8Path::new("/etc/hooks"))), "/bin/true");
}

#[test]
fn load_skips_non_manifest_paths() {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = utf8_dir(&dir);
    let manifest = root.join("patches.toml");
    std::fs::write(&manifest, "[[before_install]]\ncommand = \"true\"\n").expect("write manifest");

    let mut registry = HookRegistry::new();
    registry
        .load(&[root.join("legacy.bash"), manifest])
        .expect("load");

    assert_eq!(registry.len(HookPhase::BeforeInstall), 1);
    assert_eq!(registry.len(HookPhase::AfterInstall), 0);
}

#[test]
fn load_reports_unreadable_manifest() {
    let mut registry = HookRegistry::new();
    let err = registry
        .load(&[Utf8PathBuf::from("/nonexistent/rb-install/hooks.toml")])
        .expect_err("missing file");
    assert!(matches!(err, InstallerError::InvalidHookManifest { .. }));
    assert!(registry.is_empty());
}

#[cfg(unix)]
mod commands {
    use super::*;

    #[rstest]
    fn command_hooks_receive_run_environment(context: HookContext) {
        let dir = tempfile::tempdir().expect("temp dir");
        let out = utf8_dir(&dir).join("env.txt");
        let script = format!("echo \"$DEFINITION|$VERSION_NAME|$PREFIX|${{STATUS:-none}}\" >> {out}");
        let mut registry = HookRegistry::new();
        registry.register(
            HookPhase::BeforeInstall,
            Hook::command("sh", vec!["-c".to_owned(), script.clone()]),
        );
        registry.register(
            HookPhase::AfterInstall,
            Hook::command("sh", vec!["-c".to_owned(), script]),
        );

        registry.run(HookPhase::BeforeInstall, &context).expect("before");
        let after = HookContext {
            status: Some(0),
            ..context
        };
        registry.run(HookPhase::AfterInstall, &after).expect("after");

        let written = std::fs::read_to_string(&out).expect("read env dump");
        assert_eq!(
            written,
            "3.2.0|3.2.0|/home/ruby/.rbenv/versions/3.2.0|none\n\
             3.2.0|3.2.0|/home/ruby/.rbenv/versions/3.2.0|0\n"
        );
    }

    #[rstest]
    fn failing_command_hook_is_reported(context: HookContext) {
        let mut registry = HookRegistry::new();
        registry.register(
            HookPhase::AfterInstall,
            Hook::command("sh", vec!["-c".to_owned(), "exit 4".to_owned()]),
        );

        let err = registry
            .run(HookPhase::AfterInstall, &context)
            .expect_err("hook fails");

        match err {
            InstallerError::HookFailed { phase, hook, reason } => {
                assert_eq!(phase, "after_install");
                assert_eq!(hook, "sh");
                assert!(reason.contains('4'), "reason: {reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[rstest]
    fn missing_hook_program_is_reported(context: HookContext) {
        let mut registry = HookRegistry::new();
        registry.register(
            HookPhase::BeforeInstall,
            Hook::command("rb-install-missing-hook", Vec::new()),
        );

        let err = registry
            .run(HookPhase::BeforeInstall, &context)
            .expect_err("spawn fails");
        assert!(matches!(err, InstallerError::HookFailed { .. }));
    }
}
