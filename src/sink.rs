use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use tracing::debug;

const COLUMN_WIDTH: usize = 12;

/// A row of a fixed-width, space-separated time series log.
pub trait Record: Sized {
    /// Column titles, written centred in the `#` header line.
    const COLUMNS: &'static [&'static str];

    fn elapsed_seconds(&self) -> f64;

    /// Appends this record's columns using [`push_float`] / [`push_count`].
    fn write_fields(&self, line: &mut String);

    fn from_fields(fields: &[&str]) -> Option<Self>;
}

pub fn push_float(line: &mut String, value: f64) {
    if !line.is_empty() {
        line.push(' ');
    }
    let _ = write!(line, "{value:>COLUMN_WIDTH$.3}");
}

pub fn push_count(line: &mut String, value: u64) {
    if !line.is_empty() {
        line.push(' ');
    }
    let _ = write!(line, "{value:>COLUMN_WIDTH$}");
}

pub fn header_line<R: Record>() -> String {
    let columns: Vec<String> = R::COLUMNS
        .iter()
        .map(|c| format!("{c:^COLUMN_WIDTH$}"))
        .collect();
    format!("# {}\n", columns.join(" "))
}

pub fn record_line<R: Record>(record: &R) -> String {
    let mut line = String::with_capacity(R::COLUMNS.len() * (COLUMN_WIDTH + 1));
    record.write_fields(&mut line);
    line.push('\n');
    line
}

/// Append-only log file. Every record goes out in a single `write` and is
/// flushed before `append` returns, so readers never see half a row.
pub struct LogWriter<R> {
    file: File,
    _record: PhantomData<fn(&R)>,
}

impl<R: Record> LogWriter<R> {
    pub fn create(path: &Path) -> io::Result<Self> {
        ensure_parent_dir(path)?;
        let mut file = File::create(path)?;
        file.write_all(header_line::<R>().as_bytes())?;
        file.flush()?;
        Ok(Self {
            file,
            _record: PhantomData,
        })
    }

    pub fn append(&mut self, record: &R) -> io::Result<()> {
        self.file.write_all(record_line(record).as_bytes())?;
        self.file.flush()
    }

    pub fn close(mut self) -> io::Result<()> {
        self.file.flush()
    }
}

fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Destination for one time series, written by a single producer.
pub trait SampleSink<R> {
    fn emit(&mut self, record: R) -> io::Result<()>;

    /// Flushes and closes. Further `emit` calls fail.
    fn finalize(&mut self) -> io::Result<()>;
}

/// Durable log and/or in-memory retention of a series. Records must arrive
/// in non-decreasing elapsed time.
pub struct TimeSeriesSink<R> {
    log: Option<LogWriter<R>>,
    series: Option<Vec<R>>,
    last_elapsed: Option<f64>,
    emitted: usize,
    finalized: bool,
}

impl<R: Record> TimeSeriesSink<R> {
    pub fn new(log: Option<LogWriter<R>>, retain: bool) -> Self {
        Self {
            log,
            series: retain.then(Vec::new),
            last_elapsed: None,
            emitted: 0,
            finalized: false,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(None, true)
    }

    /// Opens a log at `path` when given; keeps the series in memory when
    /// `retain` is set.
    pub fn open(path: Option<&Path>, retain: bool) -> io::Result<Self> {
        let log = path.map(LogWriter::create).transpose()?;
        Ok(Self::new(log, retain))
    }

    /// Retained records; empty when retention is off.
    pub fn series(&self) -> &[R] {
        self.series.as_deref().unwrap_or(&[])
    }

    pub fn into_series(self) -> Vec<R> {
        self.series.unwrap_or_default()
    }

    pub fn emitted(&self) -> usize {
        self.emitted
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}

impl<R: Record> SampleSink<R> for TimeSeriesSink<R> {
    fn emit(&mut self, record: R) -> io::Result<()> {
        if self.finalized {
            return Err(io::Error::other("time series sink already finalized"));
        }
        let elapsed = record.elapsed_seconds();
        if let Some(last) = self.last_elapsed
            && elapsed < last
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("record at {elapsed:.3}s arrived after {last:.3}s"),
            ));
        }
        self.last_elapsed = Some(elapsed);
        if let Some(log) = self.log.as_mut() {
            log.append(&record)?;
        }
        if let Some(series) = self.series.as_mut() {
            series.push(record);
        }
        self.emitted += 1;
        Ok(())
    }

    fn finalize(&mut self) -> io::Result<()> {
        self.finalized = true;
        match self.log.take() {
            Some(log) => log.close(),
            None => Ok(()),
        }
    }
}

/// Reads back a log written by [`LogWriter`]. Header, blank and unparsable
/// lines are skipped.
pub fn read_log<R: Record>(path: &Path) -> io::Result<Vec<R>> {
    let reader = BufReader::new(File::open(path)?);
    let mut out = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        match R::from_fields(&fields) {
            Some(record) => out.push(record),
            None => debug!(path = %path.display(), line = index + 1, "skipping unparsable log line"),
        }
    }
    Ok(out)
}

/// `run.log` -> `run_network.log`, in the same directory.
pub fn network_log_path(log: &Path) -> PathBuf {
    let stem = log
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "psrecord".to_string());
    log.with_file_name(format!("{stem}_network.log"))
}
