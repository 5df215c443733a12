//! Partition directory naming.
//!
//! Names are rendered from a user-configured [upon] template. The syntax
//! follows upon's Mustache-like conventions (`{{ variable }}`,
//! `{{ value|formatter }}`), extended with:
//!
//! - **`slug`**: converts strings to URL-safe slugs, stripping quotation
//!   marks first to avoid artifacts like leading/trailing hyphens.
//! - **`pad`**: zero-pads a number, as `{{ index|pad: 3 }}` (`007`).
//!
//! # Template Variables
//!
//! | Variable | Type     | Description                                   |
//! |----------|----------|-----------------------------------------------|
//! | `root`   | `String` | Name of the source directory                  |
//! | `index`  | `u64`    | 1-based partition index, in creation order    |
//! | `count`  | `u64`    | Number of files in the partition              |
//! | `size`   | `u64`    | Total size of the partition in bytes          |
//!
//! # Example
//!
//! ```
//! use vidsplit_library::PartitionNamer;
//!
//! let namer = PartitionNamer::standard().unwrap();
//! assert_eq!(namer.name("Holiday", 2, 5, 1024).unwrap(), "Holiday_2_5Files");
//!
//! let namer: PartitionNamer = "{{ root|slug }}-{{ index|pad: 3 }}".parse().unwrap();
//! assert_eq!(namer.name("Summer Holiday", 7, 1, 0).unwrap(), "summer-holiday-007");
//! ```

use crate::error::{Error, ErrorKind, Result};
use exn::ResultExt;
use std::str::FromStr;
use tracing::instrument;
use upon::{Engine, Template};
use vidsplit_config::DEFAULT_NAMING;
use vidsplit_storage::validate_name;

/// Renders partition directory names.
///
/// Constructed via [`FromStr`], which compiles the template and renders it
/// once with sample values, so that syntax errors, unknown variables and
/// names that are not a single path segment surface at creation time rather
/// than halfway through a run.
pub struct PartitionNamer {
    engine: Engine<'static>,
    template: Template<'static>,
}
impl FromStr for PartitionNamer {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut engine = Engine::new();
        addons::configure(&mut engine);
        let template = engine.compile(s.to_string()).or_raise(|| ErrorKind::Template)?;
        let namer = Self { engine, template };
        namer.name("Videos", 1, 1, 0)?;
        Ok(namer)
    }
}
impl PartitionNamer {
    /// The built-in `{{ root }}_{{ index }}_{{ count }}Files` template.
    pub fn standard() -> Result<Self> {
        DEFAULT_NAMING.parse()
    }

    /// Renders the name of a closed partition.
    ///
    /// The result is trimmed and must be a single path segment; anything that
    /// would escape the source directory is rejected.
    #[instrument(skip(self))]
    pub fn name(&self, root: &str, index: usize, count: usize, size: u64) -> Result<String> {
        let rendered = self
            .template
            .render(
                &self.engine,
                upon::value! {
                    root: root,
                    index: index as u64,
                    count: count as u64,
                    size: size,
                },
            )
            .to_string()
            .or_raise(|| ErrorKind::Template)?;
        let name = validate_name(&rendered).or_raise(|| ErrorKind::Template)?;
        Ok(name.to_string())
    }
}

/// Custom [`upon`] extensions for path-safe names.
mod addons {
    use rslug::slugify;
    use std::fmt::Write;
    use upon::{Engine, Value, fmt as upon_fmt};

    /// Converts strings to URL-safe slugs, stripping quotation marks first
    /// so `"hello"` does not become `-hello-`.
    fn slug_formatter(f: &mut upon_fmt::Formatter<'_>, value: &Value) -> upon_fmt::Result {
        match value {
            Value::String(s) => {
                // Various quotation marks: '"''""„"`«»
                let marks = [
                    '\u{0027}', '\u{0022}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{201E}', '\u{201B}',
                    '\u{0060}', '\u{00AB}', '\u{00BB}', '\u{2039}', '\u{203A}',
                ];
                let stripped: String = s.chars().filter(|c| !marks.contains(c)).collect();
                write!(f, "{}", slugify!(&stripped))?
            },
            v => upon_fmt::default(f, v)?,
        };
        Ok(())
    }

    fn pad(value: i64, width: usize) -> String {
        format!("{value:0width$}")
    }

    pub(crate) fn configure(engine: &mut Engine<'_>) {
        engine.add_formatter("slug", slug_formatter);
        engine.add_function("pad", pad);
    }
}
