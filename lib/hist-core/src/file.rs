use std::{
    collections::HashSet,
    fmt,
    fs::File,
    io::{BufReader, BufWriter, Write as _},
    path::Path,
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use snafu::ResultExt as _;
use tracing::debug;

use crate::{
    error::{DuplicateHistogram, HistogramError, Io, Serialization},
    histogram::Histogram,
};

const SEPARATOR: char = '/';

fn normalize_path(path: &str) -> Result<String, HistogramError> {
    let mut segments = Vec::new();
    for segment in path.split(SEPARATOR).filter(|s| !s.is_empty()) {
        if segment == "." || segment == ".." {
            return Err(HistogramError::InvalidPath {
                path: path.to_string(),
                reason: "relative segments are not allowed",
            });
        }
        segments.push(segment);
    }

    Ok(segments.join("/"))
}

/// A directory within a [`HistogramFile`].
///
/// A `Directory` is only a path: it does not borrow the file it was created from, so histogram managers can hold on to
/// it between booking and writing. The root directory has an empty path.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct Directory {
    path: String,
}

impl Directory {
    /// Returns the root directory.
    pub fn root() -> Self {
        Self::default()
    }

    /// Returns the `/`-separated path of this directory, relative to the file root.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns `true` if this is the root directory.
    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// Returns the directory at `path` below this one.
    ///
    /// `path` may contain several `/`-separated segments. Empty segments are ignored.
    ///
    /// # Errors
    ///
    /// If `path` contains `.` or `..` segments, an error is returned.
    pub fn subdirectory(&self, path: &str) -> Result<Directory, HistogramError> {
        let relative = normalize_path(path)?;
        let path = match (self.path.is_empty(), relative.is_empty()) {
            (_, true) => self.path.clone(),
            (true, false) => relative,
            (false, false) => format!("{}{}{}", self.path, SEPARATOR, relative),
        };

        Ok(Directory { path })
    }
}

impl fmt::Display for Directory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", SEPARATOR, self.path)
    }
}

/// An in-memory output file holding histograms organized in directories.
///
/// Directories and the histograms within them keep their insertion order, so a file written to disk lists histograms
/// in the order they were booked.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct HistogramFile {
    directories: IndexMap<String, IndexMap<String, Histogram>>,
}

impl HistogramFile {
    /// Creates a new, empty `HistogramFile`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the directory at `path`, along with any missing parents, and returns it.
    ///
    /// Creating a directory that already exists is a no-op.
    ///
    /// # Errors
    ///
    /// If `path` contains `.` or `..` segments, an error is returned.
    pub fn mkdir(&mut self, path: &str) -> Result<Directory, HistogramError> {
        let directory = Directory::root().subdirectory(path)?;
        self.ensure_directory(&directory);
        Ok(directory)
    }

    fn ensure_directory(&mut self, directory: &Directory) {
        let mut current = String::new();
        self.directories.entry(String::new()).or_default();
        for segment in directory.path().split(SEPARATOR).filter(|s| !s.is_empty()) {
            if !current.is_empty() {
                current.push(SEPARATOR);
            }
            current.push_str(segment);
            self.directories.entry(current.clone()).or_default();
        }
    }

    /// Stores `histogram` in `directory`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// If a histogram with the same name already exists in `directory`, an error is returned and the file is left
    /// unchanged.
    pub fn insert(&mut self, directory: &Directory, histogram: Histogram) -> Result<(), HistogramError> {
        self.ensure_directory(directory);

        let histograms = self.directories.entry(directory.path().to_string()).or_default();
        if histograms.contains_key(histogram.name()) {
            return DuplicateHistogram {
                directory: directory.to_string(),
                name: histogram.name(),
            }
            .fail();
        }

        debug!(directory = %directory, histogram = histogram.name(), "Stored histogram.");
        histograms.insert(histogram.name().to_string(), histogram);
        Ok(())
    }

    /// Stores every histogram in `histograms` in `directory`, or none of them.
    ///
    /// # Errors
    ///
    /// If any name is already taken in `directory`, or appears twice in `histograms`, an error is returned and the file
    /// is left unchanged.
    pub fn insert_all<I>(&mut self, directory: &Directory, histograms: I) -> Result<(), HistogramError>
    where
        I: IntoIterator<Item = Histogram>,
    {
        let histograms = histograms.into_iter().collect::<Vec<_>>();
        let existing = self.directories.get(directory.path());
        let mut names = HashSet::new();
        for histogram in &histograms {
            let taken = existing.is_some_and(|stored| stored.contains_key(histogram.name()));
            if taken || !names.insert(histogram.name()) {
                return DuplicateHistogram {
                    directory: directory.to_string(),
                    name: histogram.name(),
                }
                .fail();
            }
        }

        for histogram in histograms {
            self.insert(directory, histogram)?;
        }
        Ok(())
    }

    /// Looks up a histogram by its full path, such as `hh_3l/sel/evt/signal/numJets`.
    pub fn get(&self, path: &str) -> Option<&Histogram> {
        let path = normalize_path(path).ok()?;
        let (directory, name) = path.rsplit_once(SEPARATOR).unwrap_or(("", path.as_str()));
        self.directories.get(directory)?.get(name)
    }

    /// Returns `true` if the directory at `path` exists.
    pub fn contains_directory(&self, path: &str) -> bool {
        normalize_path(path).is_ok_and(|path| self.directories.contains_key(&path))
    }

    /// Returns an iterator over all directory paths, in creation order.
    pub fn directories(&self) -> impl Iterator<Item = &str> {
        self.directories.keys().map(String::as_str)
    }

    /// Returns an iterator over all histograms along with the path of their directory.
    pub fn histograms(&self) -> impl Iterator<Item = (&str, &Histogram)> {
        self.directories
            .iter()
            .flat_map(|(directory, histograms)| histograms.values().map(move |h| (directory.as_str(), h)))
    }

    /// Returns the total number of histograms in the file.
    pub fn len(&self) -> usize {
        self.directories.values().map(IndexMap::len).sum()
    }

    /// Returns `true` if the file holds no histograms.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes the file to `path` as JSON.
    ///
    /// # Errors
    ///
    /// If the file cannot be created or written, an error is returned.
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<(), HistogramError> {
        let path = path.as_ref();
        let file = File::create(path).context(Io { path })?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self).context(Serialization { path })?;
        writer.flush().context(Io { path })?;

        debug!(path = %path.display(), histograms = self.len(), "Wrote histogram file.");
        Ok(())
    }

    /// Reads a file previously written with [`write_json`][Self::write_json].
    ///
    /// # Errors
    ///
    /// If the file cannot be opened or is not a valid histogram file, an error is returned.
    pub fn read_json<P: AsRef<Path>>(path: P) -> Result<Self, HistogramError> {
        let path = path.as_ref();
        let file = File::open(path).context(Io { path })?;
        serde_json::from_reader(BufReader::new(file)).context(Serialization { path })
    }
}
