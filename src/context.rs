//! Run context and output file naming

use std::{ path::{ Path, PathBuf }, process::Command };
use chrono::{ Local, NaiveDateTime };

pub const DATA_EXTENSION: &str = "mat";

/// Facts about the run captured once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext
{
    pub timestamp: NaiveDateTime,
    pub program_version: String,
}

impl RunContext
{
    pub fn capture() -> Self
    {
        Self {
            timestamp: Local::now().naive_local(),
            program_version: program_version(),
        }
    }

    /// Timestamp recorded in the result file, e.g. `2026-10-16T09:30:05.123456`
    pub fn iso_timestamp(&self) -> String
    {
        self.timestamp.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }

    /// Timestamp used in file names, e.g. `20261016T093005`
    pub fn default_stem(&self) -> String
    {
        self.timestamp.format("%Y%m%dT%H%M%S").to_string()
    }
}

fn git(args: &[&str]) -> Option<String>
{
    let output = Command::new("git")
        .args(args)
        .output()
        .ok()?;

    if output.status.success() {
        String::from_utf8(output.stdout).ok().map(|text| text.trim().to_owned())
    }
    else {
        None
    }
}

/// `git describe` of the checkout the program runs from, suffixed with ` (dirty)` when there
/// are local changes, or the crate version outside of a checkout
pub fn program_version() -> String
{
    if !Path::new(".git").is_dir() {
        return env!("CARGO_PKG_VERSION").to_owned();
    }

    match git(&["describe", "--tags", "--always"]) {
        Some(described) if !described.is_empty() => {
            let dirty = git(&["diff", "--stat"]).map_or(false, |stat| !stat.is_empty());
            if dirty {
                format!("{} (dirty)", described)
            }
            else {
                described
            }
        },
        _ => env!("CARGO_PKG_VERSION").to_owned(),
    }
}

/// Builds the output path from the requested name and the command line switches
///
/// Without a requested name the timestamp is used. `append_datetime` adds the timestamp to the
/// name unless `use_default` is set. The `.mat` extension is added when missing.
pub fn resolve_output_path(requested: Option<&str>, default_stem: &str, append_datetime: bool, use_default: bool)
    -> PathBuf
{
    let mut name = match requested {
        Some(requested) if !requested.trim().is_empty() => requested.trim().to_owned(),
        _ => default_stem.to_owned(),
    };

    let has_extension = Path::new(&name)
        .extension()
        .map_or(false, |extension| extension == DATA_EXTENSION);

    if append_datetime && !use_default {
        if has_extension {
            name.truncate(name.len() - DATA_EXTENSION.len() - 1);
        }
        name = format!("{}-{}.{}", name, default_stem, DATA_EXTENSION);
    }
    else if !has_extension {
        name = format!("{}.{}", name, DATA_EXTENSION);
    }

    PathBuf::from(name)
}

/// Path of the live plot written next to the result file
pub fn plot_path(output: &Path) -> PathBuf
{
    output.with_extension("svg")
}

#[cfg(test)]
mod tests
{
    use super::*;
    use chrono::NaiveDate;

    fn context() -> RunContext
    {
        let timestamp = NaiveDate::from_ymd_opt(2026, 10, 16)
            .and_then(|date| date.and_hms_micro_opt(9, 30, 5, 123_456))
            .unwrap();

        RunContext {
            timestamp: timestamp,
            program_version: "v2.6.0".to_string(),
        }
    }

    #[test]
    fn timestamp_formats()
    {
        let context = context();

        assert_eq!(&context.iso_timestamp(), "2026-10-16T09:30:05.123456");
        assert_eq!(&context.default_stem(), "20261016T093005");
    }

    #[test]
    fn extension_added()
    {
        assert_eq!(resolve_output_path(Some("run1"), "20261016T093005", false, false), PathBuf::from("run1.mat"));
        assert_eq!(resolve_output_path(Some("data/run1.mat"), "20261016T093005", false, false), PathBuf::from("data/run1.mat"));
    }

    #[test]
    fn datetime_appended()
    {
        assert_eq!(
            resolve_output_path(Some("run1.mat"), "20261016T093005", true, false),
            PathBuf::from("run1-20261016T093005.mat")
        );
        assert_eq!(
            resolve_output_path(Some("run1"), "20261016T093005", true, false),
            PathBuf::from("run1-20261016T093005.mat")
        );
    }

    #[test]
    fn default_switch_suppresses_append()
    {
        assert_eq!(
            resolve_output_path(Some("run1"), "20261016T093005", true, true),
            PathBuf::from("run1.mat")
        );
        assert_eq!(
            resolve_output_path(None, "20261016T093005", true, true),
            PathBuf::from("20261016T093005.mat")
        );
        assert_eq!(resolve_output_path(None, "20261016T093005", false, false), PathBuf::from("20261016T093005.mat"));
    }

    #[test]
    fn plot_next_to_output()
    {
        assert_eq!(plot_path(Path::new("data/run1.mat")), PathBuf::from("data/run1.svg"));
    }
}
