use crate::error::StoreError;
use crate::model::{AppSettings, AttendanceRecord, School, Student, User};
use crate::store::{index_by_id, index_records, Staged, Store};
use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const SNAPSHOT_VERSION: &str = "2.0";
pub const BUNDLE_FORMAT_V2: &str = "attendance-backup-v2";
const MANIFEST_ENTRY: &str = "manifest.json";
const SNAPSHOT_ENTRY: &str = "snapshot.json";

/// Self-describing dump of every collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub schools: Vec<School>,
    pub students: Vec<Student>,
    pub records: Vec<AttendanceRecord>,
    pub settings: AppSettings,
    pub users: Vec<User>,
    pub backup_date: DateTime<Utc>,
    pub version: String,
}

impl Snapshot {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// Settings were a bare object in older backups; a one-element list is
// accepted too.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SettingsDoc {
    One(AppSettings),
    Many(Vec<AppSettings>),
}

/// Every top-level collection is optional; absent ones are left untouched.
#[derive(Debug, Deserialize)]
struct RestoreDocument {
    schools: Option<Vec<School>>,
    students: Option<Vec<Student>>,
    records: Option<Vec<AttendanceRecord>>,
    settings: Option<SettingsDoc>,
    users: Option<Vec<User>>,
    version: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("backup is not valid JSON: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("backup must be a JSON object")]
    NotAnObject,

    #[error("backup contents do not match the expected shape: {0}")]
    Shape(#[source] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreSummary {
    pub collections: Vec<&'static str>,
    pub version: Option<String>,
}

pub fn create_backup(store: &Store) -> Snapshot {
    Snapshot {
        schools: store.schools().cloned().collect(),
        students: store.students(None),
        records: store.records(None),
        settings: store.settings().clone(),
        users: store.users().cloned().collect(),
        backup_date: Utc::now(),
        version: SNAPSHOT_VERSION.to_string(),
    }
}

/// Parses the whole blob first; nothing is written unless every recognized
/// collection decoded. The recognized collections present are then replaced
/// in one backend write.
pub fn try_restore_backup(store: &mut Store, blob: &str) -> Result<RestoreSummary, BackupError> {
    let value: serde_json::Value = serde_json::from_str(blob).map_err(BackupError::Parse)?;
    if !value.is_object() {
        return Err(BackupError::NotAnObject);
    }
    let doc: RestoreDocument = serde_json::from_value(value).map_err(BackupError::Shape)?;

    let mut summary = RestoreSummary {
        version: doc.version,
        ..RestoreSummary::default()
    };
    let mut staged = Staged::default();
    if let Some(v) = doc.schools {
        staged.schools = Some(index_by_id(v, |s| s.id.as_str()));
        summary.collections.push("schools");
    }
    if let Some(v) = doc.students {
        staged.students = Some(index_by_id(v, |s| s.id.as_str()));
        summary.collections.push("students");
    }
    if let Some(mut v) = doc.records {
        // Older blobs carry no school id; take it from the restored roster,
        // else from the one already stored.
        for rec in v.iter_mut().filter(|r| r.school_id.is_empty()) {
            let owner = match &staged.students {
                Some(students) => students.get(&rec.student_id),
                None => store.student(&rec.student_id),
            };
            if let Some(student) = owner {
                rec.school_id = student.school_id.clone();
            }
        }
        staged.records = Some(index_records(v));
        summary.collections.push("records");
    }
    if let Some(s) = doc.settings {
        let settings = match s {
            SettingsDoc::One(s) => Some(s),
            SettingsDoc::Many(v) => v.into_iter().next(),
        };
        if let Some(s) = settings {
            staged.settings = Some(s);
            summary.collections.push("settings");
        }
    }
    if let Some(v) = doc.users {
        staged.users = Some(index_by_id(v, |u| u.id.as_str()));
        summary.collections.push("users");
    }

    store.commit(staged)?;
    tracing::info!(
        collections = ?summary.collections,
        version = summary.version.as_deref().unwrap_or("unknown"),
        "backup restored"
    );
    Ok(summary)
}

/// Boolean form: false on any parse or write failure, with no collection
/// changed.
pub fn restore_backup(store: &mut Store, blob: &str) -> bool {
    match try_restore_backup(store, blob) {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "failed to restore backup");
            false
        }
    }
}

/// Erases every collection. No backup is taken first.
pub fn clear_all_data(store: &mut Store) -> Result<(), StoreError> {
    store.clear_all()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub bundle_format_detected: String,
    pub restored: RestoreSummary,
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

pub fn export_backup_bundle(store: &Store, out_path: &Path) -> anyhow::Result<ExportSummary> {
    let snapshot = create_backup(store)
        .to_json()
        .context("failed to serialize snapshot")?;
    let digest = sha256_hex(snapshot.as_bytes());

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let manifest = json!({
        "format": BUNDLE_FORMAT_V2,
        "version": SNAPSHOT_VERSION,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": Utc::now().to_rfc3339(),
        "sha256": digest,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(SNAPSHOT_ENTRY, opts)
        .context("failed to start snapshot entry")?;
    zip.write_all(snapshot.as_bytes())
        .context("failed to write snapshot entry")?;

    zip.finish().context("failed to finalize zip bundle")?;
    tracing::info!(path = %out_path.to_string_lossy(), "backup bundle exported");

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V2.to_string(),
        entry_count: 2,
        sha256: digest,
    })
}

/// Accepts a zip bundle or a bare JSON snapshot file.
pub fn import_backup_bundle(store: &mut Store, in_path: &Path) -> anyhow::Result<ImportSummary> {
    if !is_zip_file(in_path)? {
        let text = std::fs::read_to_string(in_path)
            .with_context(|| format!("failed to read backup {}", in_path.to_string_lossy()))?;
        let restored = try_restore_backup(store, &text)?;
        return Ok(ImportSummary {
            bundle_format_detected: "plain-json".to_string(),
            restored,
        });
    }

    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT_V2 {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }

    let mut snapshot = String::new();
    archive
        .by_name(SNAPSHOT_ENTRY)
        .context("bundle missing snapshot.json")?
        .read_to_string(&mut snapshot)
        .context("failed to read snapshot.json")?;

    if let Some(expected) = manifest.get("sha256").and_then(|v| v.as_str()) {
        let actual = sha256_hex(snapshot.as_bytes());
        if actual != expected {
            return Err(anyhow!(
                "snapshot checksum mismatch: manifest {}, bundle {}",
                expected,
                actual
            ));
        }
    }

    let restored = try_restore_backup(store, &snapshot)?;
    Ok(ImportSummary {
        bundle_format_detected: BUNDLE_FORMAT_V2.to_string(),
        restored,
    })
}

fn is_zip_file(path: &Path) -> anyhow::Result<bool> {
    let mut f = File::open(path)
        .with_context(|| format!("failed to open input file {}", path.to_string_lossy()))?;
    let mut sig = [0u8; 4];
    let read = f.read(&mut sig).context("failed to read file signature")?;
    if read < 4 {
        return Ok(false);
    }
    Ok(sig == [0x50, 0x4B, 0x03, 0x04])
}
