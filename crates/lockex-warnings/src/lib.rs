use std::error::Error;
use std::iter;
use std::sync::atomic::AtomicBool;
use std::sync::{LazyLock, Mutex};

// macro hygiene: The user might not have direct dependencies on those crates
#[doc(hidden)]
pub use anstream;
#[doc(hidden)]
pub use owo_colors;
use owo_colors::DynColor;
use rustc_hash::FxHashSet;

use lockex_static::EnvVars;

/// Whether user-facing warnings are enabled.
pub static ENABLED: AtomicBool = AtomicBool::new(false);

/// Enable user-facing warnings.
pub fn enable() {
    ENABLED.store(true, std::sync::atomic::Ordering::Relaxed);
}

/// Disable user-facing warnings.
pub fn disable() {
    ENABLED.store(false, std::sync::atomic::Ordering::Relaxed);
}

/// Warn a user, if warnings are enabled.
#[macro_export]
macro_rules! warn_user {
    ($($arg:tt)*) => {{
        use $crate::anstream::eprintln;
        use $crate::owo_colors::OwoColorize;

        if $crate::ENABLED.load(std::sync::atomic::Ordering::Relaxed) {
            let message = format!("{}", format_args!($($arg)*));
            let formatted = message.bold();
            eprintln!("{}{} {formatted}", "warning".yellow().bold(), ":".bold());
        }
    }};
}

pub static WARNINGS: LazyLock<Mutex<FxHashSet<String>>> = LazyLock::new(Mutex::default);

/// Warn a user once, if warnings are enabled, with uniqueness determined by the content of the
/// message.
#[macro_export]
macro_rules! warn_user_once {
    ($($arg:tt)*) => {{
        use $crate::anstream::eprintln;
        use $crate::owo_colors::OwoColorize;

        if $crate::ENABLED.load(std::sync::atomic::Ordering::Relaxed) {
            if let Ok(mut states) = $crate::WARNINGS.lock() {
                let message = format!("{}", format_args!($($arg)*));
                if states.insert(message.clone()) {
                    eprintln!("{}{} {}", "warning".yellow().bold(), ":".bold(), message.bold());
                }
            }
        }
    }};
}

/// Returns the width to wrap diagnostics at, if any.
///
/// `LOCKEX_NO_WRAP` disables wrapping; otherwise `COLUMNS` is respected.
fn wrap_width(width_override: Option<usize>) -> Option<usize> {
    if std::env::var_os(EnvVars::LOCKEX_NO_WRAP).is_some() {
        return None;
    }
    if width_override.is_some() {
        return width_override;
    }
    std::env::var(EnvVars::COLUMNS)
        .ok()
        .and_then(|columns| columns.parse::<usize>().ok())
}

/// Wraps text at word boundaries with proper indentation.
fn wrap_text(
    text: &str,
    width: Option<usize>,
    initial_indent: &str,
    subsequent_indent: &str,
) -> String {
    if let Some(width) = width {
        let options = textwrap::Options::new(width)
            .initial_indent(initial_indent)
            .subsequent_indent(subsequent_indent)
            .break_words(false)
            .word_separator(textwrap::WordSeparator::AsciiSpace)
            .word_splitter(textwrap::WordSplitter::NoHyphenation);

        textwrap::fill(text, options)
    } else {
        let mut result = String::with_capacity(2 * text.len());

        for (idx, line) in text.split_terminator('\n').enumerate() {
            if idx == 0 {
                result.push_str(initial_indent);
            } else {
                result.push('\n');
                // Don't add indent to empty lines (avoid trailing whitespace)
                if !line.is_empty() {
                    result.push_str(subsequent_indent);
                }
            }
            result.push_str(line);
        }

        result
    }
}

/// Format an error or warning chain.
///
/// # Example
///
/// ```text
/// error: Failed to export `poetry.lock`
///   Caused by: Dependency walk failed
///   Caused by: cannot resolve `foo` satisfying `>=2`
/// ```
pub fn write_error_chain_with_options(
    err: &dyn Error,
    mut stream: impl std::fmt::Write,
    level: impl AsRef<str>,
    color: impl DynColor + Copy,
    width_override: Option<usize>,
) -> std::fmt::Result {
    use owo_colors::OwoColorize;

    let width = wrap_width(width_override);

    let main_msg = err.to_string();
    let wrapped_main = wrap_text(&main_msg, width, "", "");
    writeln!(
        &mut stream,
        "{}{} {}",
        level.as_ref().color(color).bold(),
        ":".bold(),
        wrapped_main.trim()
    )?;

    for source in iter::successors(err.source(), |&err| err.source()) {
        let msg = source.to_string();
        let padding = "  ";
        let cause = "Caused by";
        let child_padding = " ".repeat(padding.len() + cause.len() + 2);

        let wrapped = wrap_text(&msg, width, "", &child_padding);

        let mut lines = wrapped.lines();
        if let Some(first) = lines.next() {
            writeln!(
                &mut stream,
                "{}{}: {}",
                padding,
                cause.color(color).bold(),
                first.trim()
            )?;
            for line in lines {
                let line = line.trim_end();
                if line.is_empty() {
                    writeln!(&mut stream)?;
                } else {
                    writeln!(&mut stream, "{line}")?;
                }
            }
        }
    }

    Ok(())
}

/// Format an error chain with default options (error level, red color, auto-detected width).
pub fn write_error_chain(err: &dyn Error, stream: impl std::fmt::Write) -> std::fmt::Result {
    write_error_chain_with_options(err, stream, "error", owo_colors::AnsiColors::Red, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use indoc::indoc;
    use insta::assert_snapshot;
    use owo_colors::AnsiColors;

    #[test]
    fn long_urls_not_broken() {
        #[derive(Debug, thiserror::Error)]
        #[error(
            "Failed to parse https://files.example.com/packages/aa/bb/colorama-0.4.6-py2.py3-none-any.whl"
        )]
        struct Inner;

        #[derive(Debug, thiserror::Error)]
        #[error("Dependency walk failed")]
        struct Outer {
            #[source]
            source: Inner,
        }

        let error = Outer { source: Inner };
        let mut output = String::new();
        write_error_chain_with_options(&error, &mut output, "error", AnsiColors::Red, Some(40))
            .unwrap();
        let output = anstream::adapter::strip_str(&output);

        assert_snapshot!(output, @r"
        error: Dependency walk failed
          Caused by: Failed to parse
                     https://files.example.com/packages/aa/bb/colorama-0.4.6-py2.py3-none-any.whl
        ");
    }

    #[test]
    fn multiple_error_sources() {
        #[derive(Debug, thiserror::Error)]
        #[error("cannot resolve `foo` satisfying `>=2`")]
        struct DeepError;

        #[derive(Debug, thiserror::Error)]
        #[error("Dependency walk failed")]
        struct MiddleError {
            #[source]
            source: DeepError,
        }

        #[derive(Debug, thiserror::Error)]
        #[error("Failed to export `poetry.lock`")]
        struct TopError {
            #[source]
            source: MiddleError,
        }

        let error = TopError {
            source: MiddleError { source: DeepError },
        };
        let mut output = String::new();
        write_error_chain_with_options(&error, &mut output, "error", AnsiColors::Red, Some(60))
            .unwrap();
        let output = anstream::adapter::strip_str(&output);
        assert_snapshot!(output, @r"
        error: Failed to export `poetry.lock`
          Caused by: Dependency walk failed
          Caused by: cannot resolve `foo` satisfying `>=2`
        ");
    }

    #[test]
    fn multiline_message() {
        let err_middle = indoc! {"Failed to parse `poetry.lock`
        TOML parse error at line 1, column 1

        expected `[[package]]`"};
        let err = anyhow!("missing field `name`")
            .context(err_middle)
            .context("Failed to read the lock file");

        let mut rendered = String::new();
        write_error_chain_with_options(
            err.as_ref(),
            &mut rendered,
            "error",
            AnsiColors::Red,
            None,
        )
        .unwrap();
        let rendered = anstream::adapter::strip_str(&rendered);

        assert_snapshot!(rendered, @r"
        error: Failed to read the lock file
          Caused by: Failed to parse `poetry.lock`
                     TOML parse error at line 1, column 1

                     expected `[[package]]`
          Caused by: missing field `name`
        ");
    }
}
