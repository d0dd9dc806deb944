//! Unit tests for output sinks and the command runner.

use super::*;
use chrono::TimeZone;
use rstest::{fixture, rstest};
use tempfile::TempDir;

#[fixture]
fn log_dir() -> TempDir {
    tempfile::tempdir().expect("create temp dir")
}

fn log_sink(dir: &TempDir) -> OutputSink {
    let path = Utf8PathBuf::from_path_buf(dir.path().join("build.log")).expect("utf8 temp path");
    OutputSink::LogFile(LogFile::create(path).expect("create log"))
}

fn shell(script: &str) -> CommandLine {
    CommandLine {
        program: "sh".to_owned(),
        args: vec!["-c".to_owned(), script.to_owned()],
        env: Vec::new(),
    }
}

fn read_log(sink: &OutputSink) -> String {
    let path = sink.log_path().expect("log-backed sink");
    std::fs::read_to_string(path).expect("read log")
}

#[test]
fn log_file_path_embeds_timestamp_and_pid() {
    let at = Local
        .with_ymd_and_hms(2023, 12, 31, 23, 59, 1)
        .single()
        .expect("unambiguous time");
    let path = log_file_path(Utf8Path::new("/var/tmp"), at, 7);
    assert_eq!(path, "/var/tmp/rb-install.20231231235901.7.log");
}

#[test]
fn terminal_sink_has_no_log_path() {
    assert!(OutputSink::Terminal.log_path().is_none());
}

#[rstest]
fn discard_removes_log_file(log_dir: TempDir) {
    let sink = log_sink(&log_dir);
    let path = sink.log_path().expect("log path").to_path_buf();
    assert!(path.exists());

    sink.discard().expect("discard log");
    assert!(!path.exists());
}

#[rstest]
fn discard_tolerates_missing_log(log_dir: TempDir) {
    let sink = log_sink(&log_dir);
    let path = sink.log_path().expect("log path").to_path_buf();
    std::fs::remove_file(&path).expect("remove log early");

    sink.discard().expect("missing log is fine");
}

#[test]
fn colorizer_leaves_text_plain_when_disabled() {
    let colors = Colorizer::new(false);
    assert_eq!(colors.paint(&Style::new().red(), "BUILD FAILED"), "BUILD FAILED");
}

#[test]
fn colorizer_wraps_text_in_escapes_when_enabled() {
    let painted = Colorizer::new(true).paint(&Style::new().red(), "BUILD FAILED");
    assert!(painted.contains("BUILD FAILED"));
    assert!(painted.starts_with('\u{1b}'));
}

#[test]
fn colorizer_respects_no_color() {
    assert!(!Colorizer::detect(true).enabled());
}

#[test]
fn logger_echoes_command_lines() {
    let mut buffer = Vec::new();
    let mut logger = Logger::new(&mut buffer, Colorizer::new(false));
    let mut command = CommandLine::new("ruby-build");
    command.args = vec!["3.2.0".to_owned(), "/opt/3.2.0".to_owned()];

    logger.command(&command);

    let text = String::from_utf8(buffer).expect("utf8");
    assert_eq!(text, "+ ruby-build 3.2.0 /opt/3.2.0\n");
}

#[cfg(unix)]
mod unix {
    use super::*;

    fn run(command: &CommandLine, sink: &mut OutputSink) -> Result<ExecutionResult> {
        let mut stderr = Vec::new();
        let mut logger = Logger::new(&mut stderr, Colorizer::new(false));
        CommandRunner::new(CancellationToken::new()).capture_command(command, sink, &mut logger)
    }

    #[rstest]
    fn captures_output_in_log(log_dir: TempDir) {
        let mut sink = log_sink(&log_dir);

        let result = run(&shell("echo compiling; echo oops >&2"), &mut sink).expect("run");

        assert!(result.succeeded());
        assert_eq!(result.log_path.as_deref(), sink.log_path());
        let log = read_log(&sink);
        assert!(log.contains("compiling"));
        assert!(log.contains("oops"));
    }

    #[rstest]
    fn passes_extra_environment(log_dir: TempDir) {
        let mut sink = log_sink(&log_dir);
        let mut command = shell("echo \"root=$RBENV_ROOT\"");
        command.env.push(("RBENV_ROOT".to_owned(), "/srv/rbenv".to_owned()));

        run(&command, &mut sink).expect("run");

        assert!(read_log(&sink).contains("root=/srv/rbenv"));
    }

    #[rstest]
    fn reports_failure_status_and_annotates(log_dir: TempDir) {
        let mut sink = log_sink(&log_dir);

        let result = run(&shell("exit 3"), &mut sink).expect("run");

        assert_eq!(result.status, 3);
        assert!(read_log(&sink).contains("sh exited with status 3"));
    }

    #[rstest]
    fn missing_program_reports_127(log_dir: TempDir) {
        let mut sink = log_sink(&log_dir);

        let result = run(&CommandLine::new("rb-install-no-such-builder"), &mut sink).expect("run");

        assert_eq!(result.status, COMMAND_NOT_FOUND);
        assert!(read_log(&sink).contains("rb-install-no-such-builder: command not found"));
    }

    #[rstest]
    fn cancelled_token_never_spawns_the_child(log_dir: TempDir) {
        let mut sink = log_sink(&log_dir);
        let marker = log_dir.path().join("spawned");
        let token = CancellationToken::new();
        token.cancel(libc::SIGINT);
        let mut stderr = Vec::new();
        let mut logger = Logger::new(&mut stderr, Colorizer::new(false));
        let script = format!("touch '{}'", marker.display());

        let err = CommandRunner::new(token)
            .capture_command(&shell(&script), &mut sink, &mut logger)
            .expect_err("interrupted");

        assert!(matches!(err, InstallerError::Interrupted { signal } if signal == libc::SIGINT));
        std::thread::sleep(Duration::from_millis(200));
        assert!(!marker.exists());
        assert!(stderr.is_empty());
    }

    #[rstest]
    fn cancellation_kills_the_child(log_dir: TempDir) {
        let mut sink = log_sink(&log_dir);
        let token = CancellationToken::new();
        let canceller = token.clone();
        let signaller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(300));
            canceller.cancel(libc::SIGINT);
        });
        let mut stderr = Vec::new();
        let mut logger = Logger::new(&mut stderr, Colorizer::new(false));
        let started = std::time::Instant::now();

        let err = CommandRunner::new(token)
            .capture_command(&shell("sleep 30"), &mut sink, &mut logger)
            .expect_err("interrupted");

        signaller.join().expect("signaller thread");
        assert!(matches!(err, InstallerError::Interrupted { signal } if signal == libc::SIGINT));
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
