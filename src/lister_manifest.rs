//! Manifest-file partition lister.
//!
//! A crawl release publishes a manifest with one data-file path per line,
//! e.g.
//!
//! ```text
//! common-crawl/crawl-data/CC-MAIN-2013-20/segments/1368696381249/warc/CC-MAIN-20130516092621-00000-ip-10-60-113-184.ec2.internal.warc.gz
//! ```
//!
//! The first `partition_depth` components of a line name its partition (5
//! for the layout above). Lines are filtered by `include_globs` before that
//! truncation. A manifest that does not exist yet lists nothing.

use anyhow::{Context, Result};
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::PathBuf;

use crate::config::DatasetConfig;
use crate::traits::PartitionLister;

pub struct ManifestLister {
    template: String,
    include_set: GlobSet,
    partition_depth: usize,
}

impl ManifestLister {
    pub fn new(config: &DatasetConfig) -> Result<Self> {
        let template = config
            .manifest
            .clone()
            .ok_or_else(|| anyhow::anyhow!("dataset.manifest is not configured"))?;

        Ok(Self {
            template,
            include_set: build_globset(&config.include_globs)?,
            partition_depth: config.partition_depth,
        })
    }

    pub fn manifest_path(&self, release: &str) -> PathBuf {
        PathBuf::from(self.template.replace("{release}", release))
    }

    fn partitions(&self, manifest: &str) -> Vec<String> {
        manifest
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && self.include_set.is_match(line))
            .filter_map(|line| partition_of(line, self.partition_depth))
            .collect()
    }
}

/// The partition path of a manifest line, or `None` if the line is too
/// short to contain one.
pub fn partition_of(line: &str, depth: usize) -> Option<String> {
    let parts: Vec<&str> = line.split('/').filter(|p| !p.is_empty()).collect();
    if depth == 0 || parts.len() < depth {
        return None;
    }
    Some(parts[..depth].join("/"))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[async_trait]
impl PartitionLister for ManifestLister {
    async fn list_partitions(&self, release: &str) -> Result<Vec<String>> {
        let path = self.manifest_path(release);

        let manifest = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(manifest = %path.display(), "manifest not found");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read manifest: {}", path.display()))
            }
        };

        Ok(self.partitions(&manifest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str = "common-crawl/crawl-data/CC-MAIN-2013-20/segments/1368696381249/warc/CC-MAIN-00000.warc.gz";

    fn config(manifest: &str, globs: &[&str]) -> DatasetConfig {
        DatasetConfig {
            root: "s3://aws-publicdatasets/common-crawl/crawl-data".into(),
            manifest: Some(manifest.into()),
            include_globs: globs.iter().map(|g| g.to_string()).collect(),
            partition_depth: 5,
        }
    }

    #[test]
    fn partition_is_leading_components() {
        assert_eq!(
            partition_of(LINE, 5).as_deref(),
            Some("common-crawl/crawl-data/CC-MAIN-2013-20/segments/1368696381249")
        );
        assert_eq!(partition_of("a/b", 5), None);
    }

    #[test]
    fn include_globs_filter_lines() {
        let lister = ManifestLister::new(&config("unused", &["**/*.warc.gz"])).unwrap();
        let manifest = format!("{}\n\ncommon-crawl/crawl-data/CC-MAIN-2013-20/segments/1/wat/x.wat.gz\n", LINE);
        let partitions = lister.partitions(&manifest);
        assert_eq!(partitions.len(), 1);
        assert!(partitions[0].ends_with("1368696381249"));
    }

    #[test]
    fn manifest_path_substitutes_release() {
        let lister = ManifestLister::new(&config("/data/{release}.paths", &["**"])).unwrap();
        assert_eq!(
            lister.manifest_path("CC-MAIN-2014-49"),
            PathBuf::from("/data/CC-MAIN-2014-49.paths")
        );
    }

    #[tokio::test]
    async fn missing_manifest_lists_nothing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let template = format!("{}/{{release}}.paths", tmp.path().display());
        let lister = ManifestLister::new(&config(&template, &["**"])).unwrap();
        assert!(lister.list_partitions("CC-MAIN-2099-01").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reads_manifest_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("R.paths"), format!("{}\n{}\n", LINE, LINE)).unwrap();
        let template = format!("{}/{{release}}.paths", tmp.path().display());
        let lister = ManifestLister::new(&config(&template, &["**"])).unwrap();

        let partitions = lister.list_partitions("R").await.unwrap();
        assert_eq!(partitions.len(), 2);
        assert_eq!(partitions[0], partitions[1]);
    }
}
