//! Command-line option table and parser for `rb-install`.
//!
//! Every accepted spelling (short letter, long name or long alias) maps to one
//! [`OptionSpec`] and through it to one [`Action`]. Raw arguments are lexed
//! with `clap_lex` into [`ParsedOption`]s and an [`ArgumentCursor`] of
//! positional tokens, then a single dispatch loop applies the actions in
//! command-line order. Values stay raw until an action uses them, so tokens
//! after an early exit are never decoded. Long-form help is rendered by `clap` from the same
//! table.

use crate::error::{InstallerError, Result};
use camino::Utf8PathBuf;
use clap::{Arg, ArgAction, Command};
use clap_lex::OsStrExt as _;
use std::collections::VecDeque;
use std::ffi::{OsStr, OsString};

/// Name used in messages, the usage line, and the log file stem.
pub const TOOL_NAME: &str = "rb-install";

/// Short usage summary printed with usage errors and `--help`.
pub const USAGE: &str = concat!(
    "rb-install [-f|-s] [-kcvpD] [options] [<version>] [-- <build-args>...]\n",
    "       rb-install [-f|-s] [-kcvpD] [options] <definition-file>\n",
    "       rb-install -l|--list\n",
    "       rb-install -L|-U|--update\n",
    "       rb-install -V|--version",
);

/// What recognising an option does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Show usage and long-form help, exit 0.
    Help,
    /// Hand over to `ruby-build --list`.
    List,
    /// Hand over to `ruby-build --update`.
    Update,
    /// Hand over to `ruby-build --version`.
    ShowVersion,
    /// Overwrite an existing installation without asking.
    Force,
    /// Succeed silently when the version is already installed.
    SkipExisting,
    /// Keep the unpacked sources after installing.
    Keep,
    /// Remove the unpacked sources after installing (the default).
    Cleanup,
    /// Stream build output to the terminal instead of the log file.
    Verbose,
    /// Read a patch for the sources from stdin.
    Patch,
    /// Override the source directory.
    SrcDir,
    /// Forward `--debug` and raise local logging.
    Debug,
    /// Forward the option verbatim to `ruby-build`.
    Forward,
}

/// A row of the option table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionSpec {
    /// Action triggered by every spelling of this option.
    pub action: Action,
    /// Canonical long name, also the forwarded spelling.
    pub long: &'static str,
    /// Additional long spellings.
    pub aliases: &'static [&'static str],
    /// Single-letter spellings.
    pub shorts: &'static [char],
    /// Value placeholder for options that take an argument.
    pub value_name: Option<&'static str>,
    /// One-line description for `--help`.
    pub help: &'static str,
}

impl OptionSpec {
    const fn flag(
        action: Action,
        long: &'static str,
        aliases: &'static [&'static str],
        shorts: &'static [char],
        help: &'static str,
    ) -> Self {
        Self {
            action,
            long,
            aliases,
            shorts,
            value_name: None,
            help,
        }
    }

    const fn valued(
        action: Action,
        long: &'static str,
        shorts: &'static [char],
        value_name: &'static str,
        help: &'static str,
    ) -> Self {
        Self {
            action,
            long,
            aliases: &[],
            shorts,
            value_name: Some(value_name),
            help,
        }
    }

    /// Returns true when the option consumes a value.
    #[must_use]
    pub const fn takes_argument(&self) -> bool {
        self.value_name.is_some()
    }

    /// Returns true when `name` is the canonical long name or an alias.
    #[must_use]
    pub fn matches_long(&self, name: &str) -> bool {
        self.long == name || self.aliases.contains(&name)
    }
}

/// Every option `rb-install` accepts.
pub const OPTIONS: &[OptionSpec] = &[
    OptionSpec::flag(Action::List, "list", &[], &['l'], "List all available versions"),
    OptionSpec::flag(
        Action::Update,
        "update",
        &[],
        &['L', 'U'],
        "Update the list of available definitions",
    ),
    OptionSpec::flag(
        Action::ShowVersion,
        "version",
        &[],
        &['V'],
        "Show the ruby-build version",
    ),
    OptionSpec::flag(
        Action::Force,
        "force",
        &[],
        &['f'],
        "Install even if the version appears to be installed already",
    ),
    OptionSpec::flag(
        Action::SkipExisting,
        "skip-existing",
        &["no-reinstall"],
        &['s'],
        "Skip if the version appears to be installed already",
    ),
    OptionSpec::flag(
        Action::Keep,
        "keep",
        &["no-cleanup"],
        &['k'],
        "Keep source tree after installation",
    ),
    OptionSpec::flag(
        Action::Cleanup,
        "cleanup",
        &[],
        &['c'],
        "Remove source tree after installation (default)",
    ),
    OptionSpec::flag(
        Action::Verbose,
        "verbose",
        &[],
        &['v'],
        "Stream build output instead of logging it",
    ),
    OptionSpec::valued(
        Action::SrcDir,
        "src-dir",
        &[],
        "DIR",
        "Directory to unpack sources into",
    ),
    OptionSpec::flag(
        Action::Debug,
        "debug",
        &[],
        &['D'],
        "Build a debug version and trace this tool",
    ),
    OptionSpec::valued(
        Action::Forward,
        "jobs",
        &['j'],
        "N",
        "Number of parallel make jobs",
    ),
    OptionSpec::flag(
        Action::Patch,
        "patch",
        &[],
        &['p'],
        "Apply a patch from stdin before building",
    ),
    OptionSpec::valued(Action::Forward, "url", &['u'], "URL", "Download sources from URL"),
    OptionSpec::valued(
        Action::Forward,
        "mirror",
        &['M'],
        "URL",
        "Prefer downloads from this mirror",
    ),
    OptionSpec::valued(
        Action::Forward,
        "md5",
        &['m'],
        "DIGEST",
        "Verify the download against an MD5 digest",
    ),
    OptionSpec::valued(
        Action::Forward,
        "sha1",
        &[],
        "DIGEST",
        "Verify the download against a SHA-1 digest",
    ),
    OptionSpec::valued(
        Action::Forward,
        "sha256",
        &[],
        "DIGEST",
        "Verify the download against a SHA-256 digest",
    ),
    OptionSpec::valued(
        Action::Forward,
        "sha512",
        &[],
        "DIGEST",
        "Verify the download against a SHA-512 digest",
    ),
    OptionSpec::valued(
        Action::Forward,
        "package-manager",
        &[],
        "NAME",
        "Install build dependencies with this package manager",
    ),
    OptionSpec::flag(Action::Help, "help", &[], &['h'], "Show this help"),
];

/// Looks up a long spelling in [`OPTIONS`].
#[must_use]
pub fn find_long(name: &str) -> Option<&'static OptionSpec> {
    OPTIONS.iter().find(|spec| spec.matches_long(name))
}

/// Looks up a single-letter spelling in [`OPTIONS`].
#[must_use]
pub fn find_short(flag: char) -> Option<&'static OptionSpec> {
    OPTIONS.iter().find(|spec| spec.shorts.contains(&flag))
}

/// One option occurrence, normalised from a short or long spelling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedOption {
    /// The option as written (`-j`, `--no-cleanup`).
    pub spelling: String,
    /// Table row, or `None` when the spelling is unknown.
    pub spec: Option<&'static OptionSpec>,
    /// Value from `--name=value`, `-jVALUE` or `-j=VALUE`.
    pub inline_value: Option<OsString>,
    position: usize,
}

/// Positional tokens waiting to be claimed.
///
/// An option value that was not written inline is taken from the first
/// positional token after the option, which is then gone from the queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgumentCursor {
    queue: VecDeque<(usize, OsString)>,
}

impl ArgumentCursor {
    fn push(&mut self, position: usize, value: OsString) {
        self.queue.push_back((position, value));
    }

    /// Removes and returns the first positional token after `position`.
    pub fn take_after(&mut self, position: usize) -> Option<OsString> {
        let index = self.queue.iter().position(|(at, _)| *at > position)?;
        self.queue.remove(index).map(|(_, value)| value)
    }

    /// Number of unclaimed positional tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns true when no positional tokens remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Remaining positional tokens in command-line order.
    #[must_use]
    pub fn into_remaining(self) -> Vec<OsString> {
        self.queue.into_iter().map(|(_, value)| value).collect()
    }
}

/// Lexed command line, before any action has been applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lexed {
    /// Options in command-line order.
    pub options: Vec<ParsedOption>,
    /// Positional tokens.
    pub cursor: ArgumentCursor,
    /// Tokens after a literal `--`.
    pub extra_args: Vec<OsString>,
}

/// Paths that bypass the installation entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EarlyExit {
    /// `-l`/`--list`.
    List,
    /// `-L`/`-U`/`--update`.
    Update,
    /// `-V`/`--version`.
    ShowVersion,
}

impl EarlyExit {
    /// Arguments handed to `ruby-build` for this path.
    #[must_use]
    pub const fn builder_args(self) -> &'static [&'static str] {
        match self {
            Self::List => &["--list"],
            Self::Update => &["--update"],
            Self::ShowVersion => &["--version"],
        }
    }
}

/// Settings collected from an install command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOptions {
    /// `-f`: overwrite without prompting.
    pub force: bool,
    /// `-s`: succeed silently when already installed.
    pub skip_existing: bool,
    /// Source cleanup after install; `-k` clears, `-c` sets.
    pub cleanup: bool,
    /// `-v`: stream output to the terminal.
    pub verbose: bool,
    /// `-p`: a patch arrives on stdin.
    pub has_patch: bool,
    /// `-D`: debug build and tracing.
    pub debug: bool,
    /// `--src-dir` value.
    pub src_dir: Option<Utf8PathBuf>,
    /// Options forwarded to `ruby-build`, canonical spelling, in parse order.
    pub passthrough: Vec<String>,
    /// The version or definition file to install.
    pub definition: Option<String>,
    /// Tokens after `--`.
    pub extra_args: Vec<String>,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            force: false,
            skip_existing: false,
            cleanup: true,
            verbose: false,
            has_patch: false,
            debug: false,
            src_dir: None,
            passthrough: Vec::new(),
            definition: None,
            extra_args: Vec::new(),
        }
    }
}

/// Result of parsing a command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// Proceed with an installation.
    Install(InstallOptions),
    /// Hand over to another program path.
    Delegate(EarlyExit),
    /// Print help and exit 0.
    Help,
}

/// Parses the arguments that follow the program name.
///
/// # Errors
///
/// Returns a usage-class [`InstallerError`] for unknown options, missing
/// values, non-UTF-8 arguments, or more than one version argument.
///
/// # Examples
///
/// ```
/// use rb_install::cli::{ParseOutcome, parse};
///
/// let ParseOutcome::Install(options) = parse(["3.2.0", "-f", "-j", "4"])? else {
///     panic!("expected an install");
/// };
/// assert!(options.force);
/// assert_eq!(options.passthrough, ["--jobs", "4"]);
/// assert_eq!(options.definition.as_deref(), Some("3.2.0"));
/// # Ok::<(), rb_install::error::InstallerError>(())
/// ```
pub fn parse<I, T>(args: I) -> Result<ParseOutcome>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    dispatch(lex(args))
}

/// Splits raw arguments into options, positional tokens and extra arguments.
///
/// Option names that are not UTF-8 are kept as unknown options; values are
/// left undecoded.
#[must_use]
pub fn lex<I, T>(args: I) -> Lexed
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let raw = clap_lex::RawArgs::new(args);
    let mut cursor = raw.cursor();
    let mut lexed = Lexed::default();
    let mut position = 0;

    while let Some(arg) = raw.next(&mut cursor) {
        position += 1;
        if arg.is_escape() {
            lexed
                .extra_args
                .extend(raw.remaining(&mut cursor).map(OsStr::to_os_string));
            break;
        }
        if let Some((name, value)) = arg.to_long() {
            let (spelling, spec) = match name {
                Ok(name) => (format!("--{name}"), find_long(name)),
                Err(raw_name) => (format!("--{}", raw_name.to_string_lossy()), None),
            };
            lexed.options.push(ParsedOption {
                spelling,
                spec,
                inline_value: value.map(OsStr::to_os_string),
                position,
            });
        } else if let Some(mut shorts) = arg.to_short() {
            while let Some(flag) = shorts.next() {
                let flag = match flag {
                    Ok(flag) => flag,
                    Err(rest) => {
                        lexed.options.push(ParsedOption {
                            spelling: format!("-{}", rest.to_string_lossy()),
                            spec: None,
                            inline_value: None,
                            position,
                        });
                        break;
                    }
                };
                let spec = find_short(flag);
                let inline_value = if spec.is_some_and(OptionSpec::takes_argument) {
                    shorts.next_value_os().map(short_value)
                } else {
                    None
                };
                lexed.options.push(ParsedOption {
                    spelling: format!("-{flag}"),
                    spec,
                    inline_value,
                    position,
                });
            }
        } else {
            lexed.cursor.push(position, arg.to_value_os().to_os_string());
        }
    }

    lexed
}

/// Applies lexed options in order and checks the positional count.
///
/// # Errors
///
/// Returns a usage-class [`InstallerError`] as described on [`parse`].
pub fn dispatch(lexed: Lexed) -> Result<ParseOutcome> {
    let Lexed {
        options: parsed,
        mut cursor,
        extra_args,
    } = lexed;
    let mut options = InstallOptions::default();

    for option in parsed {
        let Some(spec) = option.spec else {
            return Err(InstallerError::UnknownOption {
                option: option.spelling,
            });
        };
        let value = option_value(spec, &option, &mut cursor)?;
        match spec.action {
            Action::Help => return Ok(ParseOutcome::Help),
            Action::List => return Ok(ParseOutcome::Delegate(EarlyExit::List)),
            Action::Update => return Ok(ParseOutcome::Delegate(EarlyExit::Update)),
            Action::ShowVersion => return Ok(ParseOutcome::Delegate(EarlyExit::ShowVersion)),
            Action::Force => options.force = true,
            Action::SkipExisting => options.skip_existing = true,
            Action::Keep => options.cleanup = false,
            Action::Cleanup => options.cleanup = true,
            Action::Verbose => options.verbose = true,
            Action::Patch => options.has_patch = true,
            Action::SrcDir => options.src_dir = value.map(Utf8PathBuf::from),
            Action::Debug => {
                options.debug = true;
                options.passthrough.push(format!("--{}", spec.long));
            }
            Action::Forward => {
                options.passthrough.push(format!("--{}", spec.long));
                options.passthrough.extend(value);
            }
        }
    }

    if cursor.len() > 1 {
        return Err(InstallerError::TooManyArguments {
            count: cursor.len(),
        });
    }
    options.definition = cursor
        .into_remaining()
        .pop()
        .map(|value| utf8(&value))
        .transpose()?;
    options.extra_args = extra_args
        .iter()
        .map(|value| utf8(value))
        .collect::<Result<_>>()?;
    Ok(ParseOutcome::Install(options))
}

fn option_value(
    spec: &OptionSpec,
    option: &ParsedOption,
    cursor: &mut ArgumentCursor,
) -> Result<Option<String>> {
    if !spec.takes_argument() {
        return match option.inline_value {
            Some(_) => Err(InstallerError::UnexpectedValue {
                option: option.spelling.clone(),
            }),
            None => Ok(None),
        };
    }
    let value = option
        .inline_value
        .clone()
        .or_else(|| cursor.take_after(option.position))
        .ok_or_else(|| InstallerError::MissingValue {
            option: option.spelling.clone(),
        })?;
    utf8(&value).map(Some)
}

fn short_value(raw: &OsStr) -> OsString {
    raw.strip_prefix("=").unwrap_or(raw).to_os_string()
}

fn utf8(value: &OsStr) -> Result<String> {
    value.to_str().map(str::to_owned).ok_or_else(|| invalid_argument(value))
}

fn invalid_argument(value: &OsStr) -> InstallerError {
    InstallerError::InvalidArgument {
        argument: value.to_string_lossy().into_owned(),
    }
}

/// Builds the `clap` command used to render `--help`.
#[must_use]
pub fn help_command() -> Command {
    let command = Command::new(TOOL_NAME)
        .about("Install a Ruby version into the rbenv root using ruby-build")
        .override_usage(USAGE)
        .disable_help_flag(true)
        .disable_version_flag(true)
        .arg(
            Arg::new("definition")
                .value_name("VERSION")
                .help("Version or definition file to install [default: rbenv local]"),
        )
        .after_help(concat!(
            "Arguments after `--` are passed to ruby-build unchanged.\n\n",
            "ENVIRONMENT:\n",
            "  RBENV_ROOT              Install root [default: ~/.rbenv]\n",
            "  RUBY_BUILD_BUILD_PATH   Build directory; keeps sources\n",
            "  RUBY_BUILD_SRC_DIR      Source directory\n",
            "  RBENV_DEBUG             Trace this tool when set\n",
            "  NO_COLOR                Disable coloured output",
        ));

    OPTIONS.iter().fold(command, |command, spec| command.arg(help_arg(spec)))
}

fn help_arg(spec: &'static OptionSpec) -> Arg {
    let mut arg = Arg::new(spec.long).long(spec.long).help(spec.help);
    if let Some((first, rest)) = spec.shorts.split_first() {
        arg = arg.short(*first).visible_short_aliases(rest.iter().copied());
    }
    if !spec.aliases.is_empty() {
        arg = arg.visible_aliases(spec.aliases.iter().copied());
    }
    match spec.value_name {
        Some(value_name) => arg.value_name(value_name).action(ArgAction::Set),
        None => arg.action(ArgAction::SetTrue),
    }
}

/// Renders long-form help from the option table.
#[must_use]
pub fn render_help() -> String {
    help_command().render_help().to_string()
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
