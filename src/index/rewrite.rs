//! Streaming rewriter for `index.yaml`.
//!
//! Helm clients treat the index as opaque text in some code paths, so a full
//! parse-and-redump (which rewrites quoting, key order and flow style) is not
//! an option for incremental maintenance. Instead the index is transformed in
//! a single line-oriented pass that understands just enough YAML structure to
//! locate the `entries:` block, chart name headers and version records, and
//! splices changes in place. Every unmodified line is copied byte-for-byte;
//! the only line ever rewritten is the root `generated:` timestamp.
//!
//! Memory use is one line plus at most one buffered version record,
//! independent of index size.

use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use super::{VersionRecord, timestamp_now};
use crate::error::RepoError;

/// Charts queued for insertion, deduplicated by `(name, version)`.
#[derive(Debug, Default)]
pub struct PendingCharts {
    charts: IndexMap<String, Vec<VersionRecord>>,
}

impl PendingCharts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a record for insertion. A record whose `(name, version)` is
    /// already pending is dropped silently; a record without `name` or
    /// `version` is rejected.
    pub fn insert(&mut self, record: VersionRecord) -> Result<(), RepoError> {
        let name = record
            .name()
            .ok_or_else(|| RepoError::MalformedArchive("record has no name".to_string()))?
            .to_string();
        let version = record
            .version()
            .ok_or_else(|| RepoError::MalformedArchive("record has no version".to_string()))?
            .to_string();

        let versions = self.charts.entry(name).or_default();
        if !versions.iter().any(|r| r.version() == Some(&version)) {
            versions.push(record);
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.charts.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&[VersionRecord]> {
        self.charts.get(name).map(|v| v.as_slice())
    }

    /// All pending `(name, version)` pairs.
    pub fn pairs(&self) -> Vec<(String, String)> {
        self.charts
            .iter()
            .flat_map(|(name, records)| {
                records
                    .iter()
                    .map(|r| (name.clone(), r.version().unwrap_or_default().to_string()))
            })
            .collect()
    }

    /// Drop a single pending version, removing the chart when it empties.
    pub fn remove_version(&mut self, name: &str, version: &str) {
        if let Some(records) = self.charts.get_mut(name) {
            records.retain(|r| r.version() != Some(version));
            if records.is_empty() {
                self.charts.shift_remove(name);
            }
        }
    }

    fn take(&mut self, name: &str) -> Option<Vec<VersionRecord>> {
        self.charts.shift_remove(name)
    }

    fn drain(&mut self) -> impl Iterator<Item = (String, Vec<VersionRecord>)> + use<> {
        std::mem::take(&mut self.charts).into_iter()
    }
}

/// What a delete pass removes from the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteTarget {
    /// Every version of a chart.
    Chart(String),
    /// One `(name, version)` pair.
    Version(String, String),
}

#[derive(Debug, Default)]
pub struct AddOutcome {
    /// `(name, version)` pairs actually written.
    pub added: Vec<(String, String)>,
}

#[derive(Debug, Default)]
pub struct DeleteOutcome {
    /// `(name, version)` pairs actually removed. Empty means no target
    /// matched and the output must not be committed.
    pub removed: Vec<(String, String)>,
}

/// One `(name, version, digest)` triple collected by the read-only scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedVersion {
    pub name: String,
    pub version: String,
    pub digest: String,
}

// ---------------------------------------------------------------------------
// Line model

/// One physical line of the index, terminator included.
#[derive(Debug)]
struct Line {
    raw: String,
    indent: usize,
}

impl Line {
    fn content(&self) -> &str {
        self.raw.trim_end_matches('\n').trim_end_matches('\r')
    }

    fn trimmed(&self) -> &str {
        &self.content()[self.indent..]
    }

    fn is_blank(&self) -> bool {
        self.content().trim().is_empty()
    }

    fn is_comment(&self) -> bool {
        !self.is_blank() && self.trimmed().starts_with('#')
    }
}

/// How a line participates in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    /// Blank or comment; never structural.
    Other,
    /// Non-blank line at column 0.
    RootKey,
    /// `name:` child of the `entries:` block.
    ChartHeader,
    /// `- ` line opening a version record.
    VersionStart,
    /// Scalar field at the record's top level.
    VersionField,
    /// Anything nested deeper inside a record.
    Nested,
}

/// A chart name header is an entries child ending in `:` that is neither the
/// `entries:` key itself nor a list item.
fn is_chart_header(trimmed: &str) -> bool {
    let t = trimmed.trim_end();
    t.ends_with(':') && t != "entries:" && !t.starts_with('-')
}

fn unquote(s: &str) -> &str {
    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

fn header_name(trimmed: &str) -> String {
    unquote(trimmed.trim_end().trim_end_matches(':').trim()).to_string()
}

/// `version: 1.0.1` (optionally behind a leading `- `) → `("version", "1.0.1")`.
fn scalar_field(trimmed: &str) -> Option<(&str, &str)> {
    let rest = trimmed.strip_prefix("- ").unwrap_or(trimmed);
    let (key, value) = rest.split_once(':')?;
    Some((key.trim(), unquote(value.trim())))
}

/// Dash and field indentation observed inside one chart block.
///
/// The first `- ` line fixes the dash indent for the block; record-level
/// scalar fields sit two columns deeper (the first field rides on the dash
/// line itself). A scalar value that coincidentally starts with `- ` always
/// sits deeper than the dash delimiter, which is what disambiguates it.
#[derive(Debug, Default)]
struct ChartScan {
    dash_indent: Option<usize>,
    field_indent: Option<usize>,
}

impl ChartScan {
    /// True when the line opens a new version record in this block.
    fn record_start(&mut self, line: &Line) -> bool {
        let t = line.trimmed();
        if t != "-" && !t.starts_with("- ") {
            return false;
        }
        match self.dash_indent {
            None => {
                self.dash_indent = Some(line.indent);
                self.field_indent = Some(line.indent + 2);
                true
            },
            Some(di) => line.indent == di,
        }
    }

    /// The record-level scalar field carried by this line, if any.
    fn field<'a>(&self, line: &'a Line) -> Option<(&'a str, &'a str)> {
        let t = line.trimmed();
        if t == "-" || t.starts_with("- ") {
            if Some(line.indent) == self.dash_indent {
                return scalar_field(t);
            }
            return None;
        }
        if Some(line.indent) == self.field_indent {
            return scalar_field(t);
        }
        None
    }

    fn is_field_line(&self, line: &Line) -> bool {
        let t = line.trimmed();
        !t.starts_with('-') && Some(line.indent) == self.field_indent
    }
}

/// Classify a line inside the entries block. `record_start` fixes the dash
/// indent as a side effect, so classification must happen exactly once per
/// line.
fn classify(line: &Line, child_indent: Option<usize>, scan: Option<&mut ChartScan>) -> LineKind {
    if line.is_blank() || line.is_comment() {
        return LineKind::Other;
    }
    if line.indent == 0 {
        return LineKind::RootKey;
    }
    if let Some(ci) = child_indent
        && line.indent == ci
        && is_chart_header(line.trimmed())
    {
        return LineKind::ChartHeader;
    }
    if let Some(scan) = scan {
        if scan.record_start(line) {
            return LineKind::VersionStart;
        }
        if scan.is_field_line(line) {
            return LineKind::VersionField;
        }
    }
    LineKind::Nested
}

fn is_generated_root(line: &Line) -> bool {
    line.indent == 0
        && (line.content() == "generated:" || line.content().starts_with("generated: "))
}

fn is_entries_root(line: &Line) -> bool {
    line.indent == 0 && line.content().trim_end() == "entries:"
}

// ---------------------------------------------------------------------------
// I/O plumbing

struct LineReader<R> {
    inner: R,
}

impl<R: AsyncBufRead + Unpin> LineReader<R> {
    fn new(inner: R) -> Self {
        Self { inner }
    }

    async fn next_line(&mut self) -> io::Result<Option<Line>> {
        let mut raw = String::new();
        let n = self.inner.read_line(&mut raw).await?;
        if n == 0 {
            return Ok(None);
        }
        let indent = raw.len() - raw.trim_start_matches(' ').len();
        Ok(Some(Line { raw, indent }))
    }
}

/// Writer that echoes original lines verbatim and terminates a dangling last
/// line before any synthesized insertion.
struct IndexWriter<W> {
    inner: W,
    needs_newline: bool,
}

impl<W: AsyncWrite + Unpin> IndexWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            needs_newline: false,
        }
    }

    async fn echo(&mut self, line: &Line) -> io::Result<()> {
        self.inner.write_all(line.raw.as_bytes()).await?;
        self.needs_newline = !line.raw.ends_with('\n');
        Ok(())
    }

    async fn emit(&mut self, text: &str) -> io::Result<()> {
        if self.needs_newline {
            self.inner.write_all(b"\n").await?;
            self.needs_newline = false;
        }
        self.inner.write_all(text.as_bytes()).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.inner.flush().await
    }
}

// ---------------------------------------------------------------------------
// Record rendering

fn yaml_error(e: serde_yaml::Error) -> RepoError {
    RepoError::Store(io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Render one record as an indented `- ` block, stamping `created` now.
fn render_record(record: &VersionRecord, dash_indent: usize) -> Result<String, RepoError> {
    let mut record = record.clone();
    if record.created.is_none() {
        record.created = Some(timestamp_now());
    }
    let yaml = serde_yaml::to_string(&record).map_err(yaml_error)?;

    let pad = " ".repeat(dash_indent);
    let mut out = String::new();
    for (i, line) in yaml.lines().enumerate() {
        out.push_str(&pad);
        out.push_str(if i == 0 { "- " } else { "  " });
        out.push_str(line);
        out.push('\n');
    }
    Ok(out)
}

fn generated_line() -> String {
    format!("generated: {}\n", timestamp_now())
}

// ---------------------------------------------------------------------------
// Add

struct AddBlock {
    name: String,
    scan: ChartScan,
    versions: Vec<String>,
}

/// Copy `input` to `output`, splicing the pending charts into the entries
/// block. Matched charts get their new versions appended right after the
/// existing ones; unmatched charts are appended as fresh blocks after the
/// last existing chart. Versions already present in the input are dropped.
pub async fn rewrite_add<R, W>(
    input: R,
    output: W,
    mut pending: PendingCharts,
) -> Result<AddOutcome, RepoError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = LineReader::new(input);
    let mut writer = IndexWriter::new(output);
    let mut outcome = AddOutcome::default();

    let mut saw_any_line = false;
    let mut saw_entries = false;
    let mut wrote_generated = false;
    let mut in_entries = false;
    let mut child_indent: Option<usize> = None;
    let mut block: Option<AddBlock> = None;

    while let Some(line) = reader.next_line().await? {
        saw_any_line = true;

        if !in_entries {
            if is_entries_root(&line) {
                in_entries = true;
                saw_entries = true;
                writer.echo(&line).await?;
            } else if is_generated_root(&line) {
                writer.emit(&generated_line()).await?;
                wrote_generated = true;
            } else {
                writer.echo(&line).await?;
            }
            continue;
        }

        if !line.is_blank() && !line.is_comment() && line.indent > 0 && child_indent.is_none() {
            child_indent = Some(line.indent);
        }

        match classify(&line, child_indent, block.as_mut().map(|b| &mut b.scan)) {
            LineKind::RootKey => {
                // The entries block ends here; splice before the next root key
                flush_add_block(&mut writer, &mut block, &mut pending, &mut outcome, child_indent)
                    .await?;
                emit_new_charts(&mut writer, &mut pending, &mut outcome, child_indent).await?;
                in_entries = false;
                if is_generated_root(&line) {
                    writer.emit(&generated_line()).await?;
                    wrote_generated = true;
                } else {
                    writer.echo(&line).await?;
                }
            },
            LineKind::ChartHeader => {
                flush_add_block(&mut writer, &mut block, &mut pending, &mut outcome, child_indent)
                    .await?;
                block = Some(AddBlock {
                    name: header_name(line.trimmed()),
                    scan: ChartScan::default(),
                    versions: Vec::new(),
                });
                writer.echo(&line).await?;
            },
            LineKind::VersionStart | LineKind::VersionField => {
                if let Some(b) = block.as_mut()
                    && let Some(("version", value)) = b.scan.field(&line)
                    && !value.is_empty()
                {
                    b.versions.push(value.to_string());
                }
                writer.echo(&line).await?;
            },
            LineKind::Nested | LineKind::Other => {
                writer.echo(&line).await?;
            },
        }
    }

    if in_entries {
        flush_add_block(&mut writer, &mut block, &mut pending, &mut outcome, child_indent).await?;
        emit_new_charts(&mut writer, &mut pending, &mut outcome, child_indent).await?;
    } else if !saw_entries {
        // No entries block at all; synthesize the skeleton
        if !saw_any_line {
            writer.emit("apiVersion: v1\n").await?;
        }
        writer.emit("entries:\n").await?;
        emit_new_charts(&mut writer, &mut pending, &mut outcome, child_indent).await?;
    }

    if !wrote_generated {
        writer.emit(&generated_line()).await?;
    }
    writer.flush().await?;
    Ok(outcome)
}

/// Close the current chart block, appending its pending versions after the
/// existing ones.
async fn flush_add_block<W: AsyncWrite + Unpin>(
    writer: &mut IndexWriter<W>,
    block: &mut Option<AddBlock>,
    pending: &mut PendingCharts,
    outcome: &mut AddOutcome,
    child_indent: Option<usize>,
) -> Result<(), RepoError> {
    let Some(b) = block.take() else {
        return Ok(());
    };
    let Some(records) = pending.take(&b.name) else {
        return Ok(());
    };

    let dash_indent = b.scan.dash_indent.unwrap_or(child_indent.unwrap_or(2));
    for record in records {
        let version = record.version().unwrap_or_default().to_string();
        // Existing versions win, including duplicated ones in malformed input
        if b.versions.contains(&version) {
            continue;
        }
        writer.emit(&render_record(&record, dash_indent)?).await?;
        outcome.added.push((b.name.clone(), version));
    }
    Ok(())
}

/// Append charts that matched no existing header as fresh blocks.
async fn emit_new_charts<W: AsyncWrite + Unpin>(
    writer: &mut IndexWriter<W>,
    pending: &mut PendingCharts,
    outcome: &mut AddOutcome,
    child_indent: Option<usize>,
) -> Result<(), RepoError> {
    let indent = child_indent.unwrap_or(2);
    for (name, records) in pending.drain() {
        writer
            .emit(&format!("{}{}:\n", " ".repeat(indent), name))
            .await?;
        for record in records {
            let version = record.version().unwrap_or_default().to_string();
            writer.emit(&render_record(&record, indent)?).await?;
            outcome.added.push((name.clone(), version));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Delete

struct RecordBuf {
    lines: Vec<Line>,
    version: Option<String>,
}

enum BlockMode {
    /// Chart untargeted: echo straight through.
    Pass,
    /// `(name, *)`: suppress the whole block, collecting versions.
    DropAll,
    /// Specific versions targeted: buffer per record, withhold the header
    /// until the first survivor.
    Filter {
        header: Line,
        pre: Vec<Line>,
        header_emitted: bool,
        doomed: HashSet<String>,
        record: Option<RecordBuf>,
    },
}

struct DeleteBlock {
    name: String,
    scan: ChartScan,
    mode: BlockMode,
}

/// Copy `input` to `output`, dropping the targeted version records. A chart
/// header is dropped along with its last record. Returns the pairs actually
/// removed; the caller must discard the output when none matched.
pub async fn rewrite_delete<R, W>(
    input: R,
    output: W,
    targets: &[DeleteTarget],
) -> Result<DeleteOutcome, RepoError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut wanted: HashMap<String, Option<HashSet<String>>> = HashMap::new();
    for target in targets {
        match target {
            DeleteTarget::Chart(name) => {
                wanted.insert(name.clone(), None);
            },
            DeleteTarget::Version(name, version) => {
                if let Some(set) = wanted
                    .entry(name.clone())
                    .or_insert_with(|| Some(HashSet::new()))
                {
                    set.insert(version.clone());
                }
            },
        }
    }

    let mut reader = LineReader::new(input);
    let mut writer = IndexWriter::new(output);
    let mut outcome = DeleteOutcome::default();

    let mut wrote_generated = false;
    let mut in_entries = false;
    let mut child_indent: Option<usize> = None;
    let mut block: Option<DeleteBlock> = None;

    while let Some(line) = reader.next_line().await? {
        if !in_entries {
            if is_entries_root(&line) {
                in_entries = true;
                writer.echo(&line).await?;
            } else if is_generated_root(&line) {
                writer.emit(&generated_line()).await?;
                wrote_generated = true;
            } else {
                writer.echo(&line).await?;
            }
            continue;
        }

        if !line.is_blank() && !line.is_comment() && line.indent > 0 && child_indent.is_none() {
            child_indent = Some(line.indent);
        }

        match classify(&line, child_indent, block.as_mut().map(|b| &mut b.scan)) {
            LineKind::RootKey => {
                flush_delete_block(&mut writer, &mut block, &mut outcome).await?;
                in_entries = false;
                if is_generated_root(&line) {
                    writer.emit(&generated_line()).await?;
                    wrote_generated = true;
                } else {
                    writer.echo(&line).await?;
                }
            },
            LineKind::ChartHeader => {
                flush_delete_block(&mut writer, &mut block, &mut outcome).await?;
                let name = header_name(line.trimmed());
                let mode = match wanted.get(&name) {
                    None => {
                        writer.echo(&line).await?;
                        BlockMode::Pass
                    },
                    Some(None) => BlockMode::DropAll,
                    Some(Some(set)) => BlockMode::Filter {
                        header: line,
                        pre: Vec::new(),
                        header_emitted: false,
                        doomed: set.clone(),
                        record: None,
                    },
                };
                block = Some(DeleteBlock {
                    name,
                    scan: ChartScan::default(),
                    mode,
                });
            },
            kind => {
                let Some(b) = block.as_mut() else {
                    // Content before any chart header; copy it through
                    writer.echo(&line).await?;
                    continue;
                };
                let DeleteBlock { name, scan, mode } = b;
                match mode {
                    BlockMode::Pass => writer.echo(&line).await?,
                    BlockMode::DropAll => {
                        if let Some(("version", value)) = scan.field(&line)
                            && !value.is_empty()
                        {
                            outcome.removed.push((name.clone(), value.to_string()));
                        }
                    },
                    BlockMode::Filter {
                        header,
                        pre,
                        header_emitted,
                        doomed,
                        record,
                    } => {
                        if kind == LineKind::VersionStart {
                            finish_filtered_record(
                                &mut writer,
                                name,
                                header,
                                pre,
                                header_emitted,
                                doomed,
                                record,
                                &mut outcome,
                            )
                            .await?;
                            *record = Some(RecordBuf {
                                lines: Vec::new(),
                                version: None,
                            });
                        }
                        match record {
                            Some(buf) => {
                                if let Some(("version", value)) = scan.field(&line)
                                    && !value.is_empty()
                                {
                                    buf.version = Some(value.to_string());
                                }
                                buf.lines.push(line);
                            },
                            None if *header_emitted => writer.echo(&line).await?,
                            None => pre.push(line),
                        }
                    },
                }
            },
        }
    }

    if in_entries {
        flush_delete_block(&mut writer, &mut block, &mut outcome).await?;
    }

    if !wrote_generated {
        writer.emit(&generated_line()).await?;
    }
    writer.flush().await?;
    Ok(outcome)
}

async fn flush_delete_block<W: AsyncWrite + Unpin>(
    writer: &mut IndexWriter<W>,
    block: &mut Option<DeleteBlock>,
    outcome: &mut DeleteOutcome,
) -> Result<(), RepoError> {
    let Some(mut b) = block.take() else {
        return Ok(());
    };
    if let BlockMode::Filter {
        header,
        pre,
        header_emitted,
        doomed,
        record,
    } = &mut b.mode
    {
        finish_filtered_record(
            writer,
            &b.name,
            header,
            pre,
            header_emitted,
            doomed,
            record,
            outcome,
        )
        .await?;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn finish_filtered_record<W: AsyncWrite + Unpin>(
    writer: &mut IndexWriter<W>,
    name: &str,
    header: &Line,
    pre: &mut Vec<Line>,
    header_emitted: &mut bool,
    doomed: &HashSet<String>,
    record: &mut Option<RecordBuf>,
    outcome: &mut DeleteOutcome,
) -> Result<(), RepoError> {
    let Some(buf) = record.take() else {
        return Ok(());
    };
    match buf.version {
        Some(version) if doomed.contains(&version) => {
            outcome.removed.push((name.to_string(), version));
        },
        _ => {
            if !*header_emitted {
                writer.echo(header).await?;
                for line in pre.drain(..) {
                    writer.echo(&line).await?;
                }
                *header_emitted = true;
            }
            for line in &buf.lines {
                writer.echo(line).await?;
            }
        },
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Read-only scan

/// Stream the index collecting every `(name, version, digest)` triple, without
/// loading the document. Used for collision checks before a rewrite.
pub async fn scan_versions<R>(input: R) -> Result<Vec<IndexedVersion>, RepoError>
where
    R: AsyncBufRead + Unpin,
{
    struct OpenRecord {
        version: Option<String>,
        digest: Option<String>,
    }

    let mut reader = LineReader::new(input);
    let mut found = Vec::new();

    let mut in_entries = false;
    let mut child_indent: Option<usize> = None;
    let mut chart: Option<(String, ChartScan)> = None;
    let mut open: Option<OpenRecord> = None;

    fn close_record(
        found: &mut Vec<IndexedVersion>,
        chart: &Option<(String, ChartScan)>,
        open: &mut Option<OpenRecord>,
    ) {
        if let (Some((name, _)), Some(record)) = (chart, open.take())
            && let Some(version) = record.version
        {
            found.push(IndexedVersion {
                name: name.clone(),
                version,
                digest: record.digest.unwrap_or_default(),
            });
        }
    }

    while let Some(line) = reader.next_line().await? {
        if !in_entries {
            if is_entries_root(&line) {
                in_entries = true;
            }
            continue;
        }

        if !line.is_blank() && !line.is_comment() && line.indent > 0 && child_indent.is_none() {
            child_indent = Some(line.indent);
        }

        match classify(&line, child_indent, chart.as_mut().map(|(_, s)| s)) {
            LineKind::RootKey => {
                close_record(&mut found, &chart, &mut open);
                chart = None;
                in_entries = false;
            },
            LineKind::ChartHeader => {
                close_record(&mut found, &chart, &mut open);
                chart = Some((header_name(line.trimmed()), ChartScan::default()));
            },
            LineKind::VersionStart => {
                close_record(&mut found, &chart, &mut open);
                open = Some(OpenRecord {
                    version: None,
                    digest: None,
                });
                if let (Some((_, scan)), Some(record)) = (&chart, open.as_mut())
                    && let Some((key, value)) = scan.field(&line)
                {
                    match key {
                        "version" if !value.is_empty() => record.version = Some(value.to_string()),
                        "digest" if !value.is_empty() => record.digest = Some(value.to_string()),
                        _ => {},
                    }
                }
            },
            LineKind::VersionField => {
                if let (Some((_, scan)), Some(record)) = (&chart, open.as_mut())
                    && let Some((key, value)) = scan.field(&line)
                {
                    match key {
                        "version" if !value.is_empty() => record.version = Some(value.to_string()),
                        "digest" if !value.is_empty() => record.digest = Some(value.to_string()),
                        _ => {},
                    }
                }
            },
            LineKind::Nested | LineKind::Other => {},
        }
    }
    close_record(&mut found, &chart, &mut open);

    Ok(found)
}
