use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{default_records, PolicyStore, Result};
use crate::schema::{rule_catalog, PolicyRecord, RuleMeta};

const API_VERSION: &str = "v1";
const KIND: &str = "PolicyCatalog";

#[derive(Serialize)]
struct CatalogDocumentRef<'a> {
    #[serde(rename = "apiVersion")]
    api_version: &'static str,
    kind: &'static str,
    rule_meta: &'static [RuleMeta],
    policies: &'a [PolicyRecord],
}

/// `rule_meta` is informational on read; the catalog is built in.
#[derive(Deserialize)]
struct CatalogDocument {
    #[serde(rename = "apiVersion", default)]
    api_version: String,
    #[serde(default)]
    policies: Vec<PolicyRecord>,
}

/// YAML-document policy store.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("policies.yml");
        self.path.with_file_name(format!(".{}.tmp", name))
    }
}

impl PolicyStore for FileStore {
    fn init(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        if !self.path.exists() {
            let records = default_records();
            self.write_records(&records)?;
            info!(path = %self.path.display(), count = records.len(), "seeded default policy catalog");
        }
        Ok(())
    }

    fn read_records(&self) -> Result<Vec<PolicyRecord>> {
        let contents = fs::read_to_string(&self.path)?;
        let doc: CatalogDocument = serde_yaml::from_str(&contents)?;
        if !doc.api_version.is_empty() && doc.api_version != API_VERSION {
            warn!(
                path = %self.path.display(),
                api_version = %doc.api_version,
                "unexpected policy document version"
            );
        }
        Ok(doc.policies)
    }

    /// Writes to a dot-prefixed `.tmp` sibling first, then renames over the
    /// final path so readers and the watcher never see a partial document.
    fn write_records(&self, records: &[PolicyRecord]) -> Result<()> {
        let doc = CatalogDocumentRef {
            api_version: API_VERSION,
            kind: KIND,
            rule_meta: rule_catalog(),
            policies: records,
        };
        let yaml = serde_yaml::to_string(&doc)?;
        let tmp = self.tmp_path();
        fs::write(&tmp, yaml)?;
        fs::rename(&tmp, &self.path)?;
        info!(path = %self.path.display(), count = records.len(), "wrote policy catalog");
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
