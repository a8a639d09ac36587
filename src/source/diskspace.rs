use std::collections::{HashMap, HashSet};
use std::time::Duration;

use log::{debug, warn};
use regex::Regex;

use crate::config::ConfigSnapshot;
use crate::error::Result;
use crate::fields;
use crate::metric::{Metric, MetricKind};
use crate::plugin::Plugin;
use crate::process::{Command, ProcessError, ProcessResult};
use crate::source::MetricSource;

const NAME: &str = "diskspace";

const GIGABYTE: u64 = 1_073_741_824;

const DEFAULT_FILESYSTEMS: [&str; 12] = [
    "ext2", "ext3", "ext4", "xfs", "glusterfs", "rootfs", "nfs", "ntfs", "hfs", "fat32", "fat16",
    "btrfs",
];

/// One row of `df -P -T` output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DfRow {
    pub filesystem: String,
    pub fs_type: String,
    pub total: u64,
    pub used: u64,
    pub avail: u64,
    pub use_percent: u64,
    pub mountpoint: String,
}

/// Parse `df -P -T` output (either blocks or `-i` inodes).
///
/// Rows whose numbers cannot be read (e.g. `-` for filesystems without
/// inodes) are skipped. Mount points may contain spaces.
pub fn parse_df(text: &str) -> ProcessResult<Vec<DfRow>> {
    let mut lines = text.lines();
    let header = lines.next().ok_or(ProcessError::EmptyOutput)?;
    if !header.starts_with("Filesystem") {
        return Err(ProcessError::ParseError(format!("unexpected df header {:?}", header)));
    }

    let mut rows = Vec::new();
    for line in lines {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 7 {
            continue;
        }

        let number = |raw: &str| raw.trim_end_matches('%').parse::<u64>().ok();
        let (Some(total), Some(used), Some(avail), Some(use_percent)) = (
            number(tokens[2]),
            number(tokens[3]),
            number(tokens[4]),
            number(tokens[5]),
        ) else {
            debug!("Skipping df row {:?}", line);
            continue;
        };

        rows.push(DfRow {
            filesystem: tokens[0].to_string(),
            fs_type: tokens[1].to_string(),
            total,
            used,
            avail,
            use_percent,
            mountpoint: tokens[6..].join(" "),
        });
    }

    Ok(rows)
}

/// Key-safe name for a mount point: `/` becomes `root`, `/` and `.` become `_`
pub fn mountpoint_slug(mountpoint: &str) -> String {
    let slug = mountpoint.replace(['/', '.'], "_");
    if slug == "_" { "root".to_string() } else { slug }
}

/// Free, used and available space per mounted filesystem
#[derive(Debug)]
pub struct DiskspaceSource {
    enabled: bool,
    filesystems: HashSet<String>,
    exclude_filters: Vec<Regex>,
    df_command: String,
    command_timeout: Duration,
}

impl Default for DiskspaceSource {
    fn default() -> Self {
        Self {
            enabled: false,
            filesystems: DEFAULT_FILESYSTEMS.iter().map(|s| s.to_string()).collect(),
            exclude_filters: Vec::new(),
            df_command: "df".to_string(),
            command_timeout: Duration::from_secs(10),
        }
    }
}

impl DiskspaceSource {
    fn is_reported(&self, row: &DfRow) -> bool {
        self.filesystems.contains(&row.fs_type)
            && !self.exclude_filters.iter().any(|re| re.is_match(&row.mountpoint))
    }

    fn build_metrics(&self, space: &[DfRow], inodes: &[DfRow]) -> Vec<Metric> {
        let inodes_by_mount: HashMap<&str, &DfRow> =
            inodes.iter().map(|row| (row.mountpoint.as_str(), row)).collect();

        let mut report = Vec::new();
        for row in space.iter().filter(|row| self.is_reported(row)) {
            let free = row.total.saturating_sub(row.used);
            let mut values = vec![
                ("byte_avail", "B", row.avail),
                ("byte_free", "B", free),
                ("byte_used", "B", row.used),
                ("gigabyte_avail", "GB", row.avail / GIGABYTE),
                ("gigabyte_free", "GB", free / GIGABYTE),
                ("gigabyte_used", "GB", row.used / GIGABYTE),
            ];

            if let Some(inode) = inodes_by_mount.get(row.mountpoint.as_str()) {
                values.extend([
                    ("inodes_total", "Ino", inode.total),
                    ("inodes_used", "Ino", inode.used),
                    ("inodes_avail", "Ino", inode.avail),
                    ("inodes_use", "Ino", inode.use_percent),
                ]);
            }

            let slug = mountpoint_slug(&row.mountpoint);
            for (name, unit, value) in values {
                report.push(
                    Metric::new(
                        NAME,
                        NAME,
                        MetricKind::Gauge,
                        name,
                        value,
                        fields! { "mountpoint" => slug.as_str(), "unit" => unit, "name" => name },
                    )
                    .with_path(format!("diskspace.{}", slug)),
                );
            }
        }

        report
    }

    async fn df(&self, flag: &str) -> ProcessResult<Vec<DfRow>> {
        let output = Command::new(self.df_command.as_str())
            .args(["-P", "-T", flag])
            .env("LC_ALL", "C")
            .output(self.command_timeout)
            .await?;
        parse_df(&output)
    }
}

impl Plugin for DiskspaceSource {
    fn name(&self) -> &str {
        NAME
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn configure(&mut self, config: &ConfigSnapshot) {
        if let Some(filesystems) = config.get_list(NAME, "filesystems") {
            self.filesystems = filesystems.into_iter().collect();
        }

        if let Some(filters) = config.get_list(NAME, "exclude_filters") {
            self.exclude_filters = filters
                .iter()
                .filter_map(|filter| match Regex::new(filter) {
                    Ok(re) => Some(re),
                    Err(e) => {
                        warn!("Ignoring invalid diskspace exclude filter {:?}: {}", filter, e);
                        None
                    }
                })
                .collect();
        }

        if let Some(command) = config.get(NAME, "df_command") {
            self.df_command = command;
        }

        if let Some(secs) = config.get_parsed::<u64>(NAME, "command_timeout") {
            self.command_timeout = Duration::from_secs(secs.max(1));
        }
    }
}

#[async_trait::async_trait]
impl MetricSource for DiskspaceSource {
    async fn produce(&self) -> Result<Vec<Metric>> {
        let space = self.df("-B1").await?;

        let inodes = match self.df("-i").await {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Reading inode usage failed, reporting space only: {}", e);
                Vec::new()
            }
        };

        Ok(self.build_metrics(&space, &inodes))
    }
}
