//! Multi-format output generation.
//!
//! Every format shares one chunking algorithm: records are streamed line by
//! line into `<base><index><extension>` files inside the format directory,
//! switching to the next index once a chunk reaches the size ceiling. The
//! header goes only into chunk 0, the footer only into the last chunk.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::merge::MergedSets;
use crate::record::SourceMetadata;
use crate::utils::{format_bytes, format_count_with_separator};

pub const HOSTS_FOOTER: &str = "# END HOSTS LIST ### DO NOT EDIT THIS LINE AT ALL ###";
pub const HOSTS_DENY_FOOTER: &str = "# ##### END hosts.deny Block List # DO NOT EDIT #####";
pub const SUPERHOSTS_DENY_FOOTER: &str =
    "# ##### END Super hosts.deny Block List # DO NOT EDIT #####";

pub const HOSTS_TEMPLATE: &str = "hosts.template";
pub const HOSTS_WINDOWS_TEMPLATE: &str = "hosts.windows.template";
pub const HOSTS_DENY_TEMPLATE: &str = "hostsdeny.template";
pub const SUPERHOSTS_DENY_TEMPLATE: &str = "superhostsdeny.template";
pub const README_TEMPLATE: &str = "README_template.md";

const EMBEDDED_TEMPLATES: [(&str, &str); 5] = [
    (HOSTS_TEMPLATE, include_str!("../templates/hosts.template")),
    (
        HOSTS_WINDOWS_TEMPLATE,
        include_str!("../templates/hosts.windows.template"),
    ),
    (
        HOSTS_DENY_TEMPLATE,
        include_str!("../templates/hostsdeny.template"),
    ),
    (
        SUPERHOSTS_DENY_TEMPLATE,
        include_str!("../templates/superhostsdeny.template"),
    ),
    (README_TEMPLATE, include_str!("../templates/README_template.md")),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    Crlf,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::Crlf => "\r\n",
        }
    }

    /// Rewrite every line break of `text` to this convention
    pub fn normalize(self, text: &str) -> String {
        let unix = text.replace("\r\n", "\n");
        match self {
            LineEnding::Lf => unix,
            LineEnding::Crlf => unix.replace('\n', "\r\n"),
        }
    }
}

/// Which canonical sets feed a format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inputs {
    Domains,
    Ips,
    /// Domains first, then IPs
    Both,
}

/// Static description of one output format
#[derive(Debug, Clone, Copy)]
pub struct OutputFormat {
    pub directory: &'static str,
    pub base: &'static str,
    pub extension: &'static str,
    pub inputs: Inputs,
    pub prefix: &'static str,
    pub template: Option<&'static str>,
    pub footer: Option<&'static str>,
    pub line_ending: LineEnding,
}

impl OutputFormat {
    pub fn chunk_name(&self, index: usize) -> String {
        format!("{}{}{}", self.base, index, self.extension)
    }
}

pub const FORMATS: [OutputFormat; 7] = [
    OutputFormat {
        directory: "domains",
        base: "domains",
        extension: ".list",
        inputs: Inputs::Domains,
        prefix: "",
        template: None,
        footer: None,
        line_ending: LineEnding::Lf,
    },
    OutputFormat {
        directory: "ips",
        base: "ips",
        extension: ".list",
        inputs: Inputs::Ips,
        prefix: "",
        template: None,
        footer: None,
        line_ending: LineEnding::Lf,
    },
    OutputFormat {
        directory: "domains-dotted-format",
        base: "domains-dotted-format",
        extension: ".list",
        inputs: Inputs::Both,
        prefix: ".",
        template: None,
        footer: None,
        line_ending: LineEnding::Lf,
    },
    OutputFormat {
        directory: "hosts",
        base: "hosts",
        extension: "",
        inputs: Inputs::Domains,
        prefix: "0.0.0.0 ",
        template: Some(HOSTS_TEMPLATE),
        footer: Some(HOSTS_FOOTER),
        line_ending: LineEnding::Lf,
    },
    OutputFormat {
        directory: "hosts.windows",
        base: "hosts",
        extension: ".windows",
        inputs: Inputs::Domains,
        prefix: "127.0.0.1 ",
        template: Some(HOSTS_WINDOWS_TEMPLATE),
        footer: Some(HOSTS_FOOTER),
        line_ending: LineEnding::Crlf,
    },
    OutputFormat {
        directory: "hosts.deny",
        base: "hosts",
        extension: ".deny",
        inputs: Inputs::Ips,
        prefix: "ALL: ",
        template: Some(HOSTS_DENY_TEMPLATE),
        footer: Some(HOSTS_DENY_FOOTER),
        line_ending: LineEnding::Lf,
    },
    OutputFormat {
        directory: "superhosts.deny",
        base: "superhosts",
        extension: ".deny",
        inputs: Inputs::Both,
        prefix: "ALL: ",
        template: Some(SUPERHOSTS_DENY_TEMPLATE),
        footer: Some(SUPERHOSTS_DENY_FOOTER),
        line_ending: LineEnding::Lf,
    },
];

/// Embedded templates, optionally overridden from a directory
#[derive(Debug, Clone)]
pub struct Templates {
    templates: HashMap<&'static str, String>,
}

impl Templates {
    pub fn embedded() -> Self {
        Self {
            templates: EMBEDDED_TEMPLATES
                .iter()
                .map(|(name, content)| (*name, content.to_string()))
                .collect(),
        }
    }

    /// Load the embedded templates, replacing any that exist in `dir`
    pub fn load(dir: Option<&Path>) -> Result<Self> {
        let mut templates = Self::embedded();

        if let Some(dir) = dir {
            for (name, _) in EMBEDDED_TEMPLATES {
                let path = dir.join(name);
                if path.is_file() {
                    let content = fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read template {:?}", path))?;
                    debug!("Using template override {:?}", path);
                    templates.templates.insert(name, content);
                }
            }
        }

        Ok(templates)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.templates.get(name).map(String::as_str)
    }
}

/// Values substituted into header and summary templates
#[derive(Debug, Clone)]
pub struct HeaderValues {
    pub version: String,
    pub domain_count: usize,
    pub ip_count: usize,
}

impl HeaderValues {
    /// Replace every known placeholder in `template`
    pub fn render(&self, template: &str) -> String {
        let total = format_count_with_separator(self.domain_count + self.ip_count);
        let domains = format_count_with_separator(self.domain_count);
        let ips = format_count_with_separator(self.ip_count);

        template
            .replace("%%version%%", &self.version)
            .replace("%%lenHosts%%", &domains)
            .replace("%%lenIPHosts%%", &total)
            .replace("%%lenHostsIPs%%", &total)
            .replace("%%lenIPs%%", &ips)
            .replace("%%lenIP%%", &ips)
    }
}

/// Parameters of one chunked write
#[derive(Debug)]
pub struct ChunkSpec<'a> {
    pub format: &'a OutputFormat,
    pub directory: PathBuf,
    pub header: Option<String>,
    pub max_chunk_bytes: u64,
}

/// Files written for one format
#[derive(Debug, Clone)]
pub struct ChunkReport {
    pub directory: PathBuf,
    pub files: Vec<PathBuf>,
    pub records: usize,
}

struct ChunkWriter<'a> {
    spec: &'a ChunkSpec<'a>,
    index: usize,
    current: Option<(BufWriter<File>, u64)>,
    files: Vec<PathBuf>,
}

impl<'a> ChunkWriter<'a> {
    fn new(spec: &'a ChunkSpec<'a>) -> Self {
        Self {
            spec,
            index: 0,
            current: None,
            files: Vec::new(),
        }
    }

    fn open(&mut self) -> Result<()> {
        let path = self.spec.directory.join(self.spec.format.chunk_name(self.index));
        let file = File::create(&path).with_context(|| format!("Failed to create {:?}", path))?;
        self.files.push(path);
        self.current = Some((BufWriter::new(file), 0));
        Ok(())
    }

    /// Make sure a chunk with room is open, rotating when the current one is full
    fn ensure_open(&mut self) -> Result<()> {
        let full = match &self.current {
            Some((_, size)) => *size >= self.spec.max_chunk_bytes,
            None => true,
        };
        if !full {
            return Ok(());
        }

        if let Some((mut writer, _)) = self.current.take() {
            writer.flush()?;
            self.index += 1;
        }
        self.open()
    }

    fn write_raw(&mut self, data: &str) -> Result<()> {
        self.ensure_open()?;
        if let Some((writer, size)) = self.current.as_mut() {
            writer.write_all(data.as_bytes())?;
            *size += data.len() as u64;
        }
        Ok(())
    }

    /// Write to the current chunk without rotating, opening one only if none is open
    fn append_raw(&mut self, data: &str) -> Result<()> {
        if self.current.is_none() {
            self.open()?;
        }
        if let Some((writer, size)) = self.current.as_mut() {
            writer.write_all(data.as_bytes())?;
            *size += data.len() as u64;
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<PathBuf>> {
        if let Some((mut writer, _)) = self.current.take() {
            writer.flush()?;
        }
        Ok(self.files)
    }
}

/// Remove and recreate `dir`
fn reset_directory(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir).with_context(|| format!("Failed to clear {:?}", dir))?;
    }
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))
}

/// Write `lines` as chunks following `spec`.
///
/// The target directory is cleared first. Blank lines are skipped. A chunk
/// only exceeds the ceiling by the line that crossed it; the footer always
/// closes the last chunk that holds records.
pub fn generate_chunks<I>(spec: &ChunkSpec<'_>, lines: I) -> Result<ChunkReport>
where
    I: IntoIterator<Item = io::Result<String>>,
{
    reset_directory(&spec.directory)?;

    let eol = spec.format.line_ending.as_str();
    let mut writer = ChunkWriter::new(spec);

    if let Some(ref header) = spec.header {
        let mut header = spec.format.line_ending.normalize(header);
        if !header.is_empty() && !header.ends_with(eol) {
            header.push_str(eol);
        }
        writer.open()?;
        writer.write_raw(&header)?;
    }

    let mut records = 0;
    let mut line_buf = String::new();
    for line in lines {
        let line = line.context("Failed to read record")?;
        let record = line.trim();
        if record.is_empty() {
            continue;
        }

        line_buf.clear();
        line_buf.push_str(spec.format.prefix);
        line_buf.push_str(record);
        line_buf.push_str(eol);
        writer.write_raw(&line_buf)?;
        records += 1;
    }

    if let Some(footer) = spec.format.footer {
        writer.append_raw(&format!("{}{}", footer, eol))?;
    }

    Ok(ChunkReport {
        directory: spec.directory.clone(),
        files: writer.finish()?,
        records,
    })
}

/// Build the credit table rows from downloaded metadata documents.
///
/// Undecodable documents are logged and skipped. Rows are sorted
/// case-insensitively by source name.
pub fn build_credit_table(metadata_files: &[PathBuf], organization: &str) -> String {
    let mut entries: Vec<SourceMetadata> = metadata_files
        .iter()
        .filter_map(|path| {
            let content = match fs::read_to_string(path) {
                Ok(c) => c,
                Err(e) => {
                    warn!("Could not read metadata {:?}: {}", path, e);
                    return None;
                }
            };
            match serde_json::from_str::<SourceMetadata>(&content) {
                Ok(meta) => Some(meta),
                Err(e) => {
                    error!("Skipping undecodable metadata {:?}: {}", path, e);
                    None
                }
            }
        })
        .collect();

    entries.sort_by_key(|meta| meta.name.to_lowercase());

    entries
        .iter()
        .map(|meta| {
            format!(
                "| {} | [Link](https://github.com/{}/{}) | [Link]({}) |",
                meta.name, organization, meta.name, meta.raw_link
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Result of a full generation pass
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub formats: Vec<ChunkReport>,
    pub summary: PathBuf,
}

impl GenerationReport {
    pub fn file_count(&self) -> usize {
        self.formats.iter().map(|f| f.files.len()).sum::<usize>() + 1
    }
}

/// Writes every output format and the summary document.
pub struct OutputGenerator {
    root: PathBuf,
    templates: Templates,
    max_chunk_bytes: u64,
    organization: String,
    summary_filename: String,
}

impl OutputGenerator {
    pub fn new(
        root: impl Into<PathBuf>,
        templates: Templates,
        max_chunk_bytes: u64,
        organization: impl Into<String>,
        summary_filename: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            templates,
            max_chunk_bytes,
            organization: organization.into(),
            summary_filename: summary_filename.into(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let templates = Templates::load(config.output.templates_dir.as_deref())?;
        Ok(Self::new(
            &config.output.directory,
            templates,
            config.output.max_chunk_bytes,
            &config.sources.organization,
            &config.output.summary_filename,
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn generate_format(
        &self,
        format: &OutputFormat,
        sets: &MergedSets,
        values: &HeaderValues,
    ) -> Result<ChunkReport> {
        let header = format
            .template
            .and_then(|name| self.templates.get(name))
            .map(|template| values.render(template));

        let spec = ChunkSpec {
            format,
            directory: self.root.join(format.directory),
            header,
            max_chunk_bytes: self.max_chunk_bytes,
        };

        let report = match format.inputs {
            Inputs::Domains => generate_chunks(&spec, sets.domains.lines()?)?,
            Inputs::Ips => generate_chunks(&spec, sets.ips.lines()?)?,
            Inputs::Both => generate_chunks(&spec, sets.domains.lines()?.chain(sets.ips.lines()?))?,
        };

        let bytes: u64 = report
            .files
            .iter()
            .filter_map(|f| fs::metadata(f).ok())
            .map(|m| m.len())
            .sum();
        info!(
            "Generated {}/ ({} files, {})",
            format.directory,
            report.files.len(),
            format_bytes(bytes)
        );

        Ok(report)
    }

    /// Render the summary document with counts and the credit table
    pub fn generate_summary(
        &self,
        values: &HeaderValues,
        metadata_files: &[PathBuf],
    ) -> Result<PathBuf> {
        let template = self
            .templates
            .get(README_TEMPLATE)
            .context("Summary template missing")?;
        let credits = build_credit_table(metadata_files, &self.organization);
        let content = values
            .render(template)
            .replace("%%credit-table%%", &credits);

        let path = self.root.join(&self.summary_filename);
        fs::write(&path, content).with_context(|| format!("Failed to write {:?}", path))?;
        info!("Generated {}", self.summary_filename);
        Ok(path)
    }

    /// Write every format and the summary from the canonical sets
    pub fn generate_all(
        &self,
        sets: &MergedSets,
        metadata_files: &[PathBuf],
        version: &str,
    ) -> Result<GenerationReport> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("Failed to create output directory {:?}", self.root))?;

        let values = HeaderValues {
            version: version.to_string(),
            domain_count: sets.domains.count,
            ip_count: sets.ips.count,
        };

        let formats = FORMATS
            .iter()
            .map(|format| self.generate_format(format, sets, &values))
            .collect::<Result<Vec<_>>>()?;

        let summary = self.generate_summary(&values, metadata_files)?;

        Ok(GenerationReport { formats, summary })
    }
}
