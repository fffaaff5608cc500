//! Collection store.
//!
//! Entities live in indexed in-memory maps: `id -> entity` for schools, users
//! and students, `(studentId, date) -> record` for attendance. The flat
//! `load`/`save` of whole JSON arrays only happens at the
//! [`CollectionBackend`] boundary, and in-memory state is swapped in only after
//! the backend accepted the write.

use crate::error::StoreError;
use crate::model::{AppSettings, AttendanceRecord, RecordKey, School, Student, User};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Schools,
    Users,
    Students,
    Records,
    Settings,
}

impl Collection {
    pub fn key(self) -> &'static str {
        match self {
            Collection::Schools => "schools",
            Collection::Users => "users",
            Collection::Students => "students",
            Collection::Records => "records",
            Collection::Settings => "settings",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Durable storage seen as whole serialized collections.
pub trait CollectionBackend {
    fn load(&self, collection: Collection) -> anyhow::Result<Option<String>>;

    /// Overwrites every collection in `batch`. Either all of them land or none.
    fn save(&mut self, batch: &[(Collection, String)]) -> anyhow::Result<()>;

    fn clear(&mut self) -> anyhow::Result<()>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    collections: HashMap<Collection, String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(&self, collection: Collection) -> Option<&str> {
        self.collections.get(&collection).map(|s| s.as_str())
    }
}

impl CollectionBackend for MemoryBackend {
    fn load(&self, collection: Collection) -> anyhow::Result<Option<String>> {
        Ok(self.collections.get(&collection).cloned())
    }

    fn save(&mut self, batch: &[(Collection, String)]) -> anyhow::Result<()> {
        for (collection, payload) in batch {
            self.collections.insert(*collection, payload.clone());
        }
        Ok(())
    }

    fn clear(&mut self) -> anyhow::Result<()> {
        self.collections.clear();
        Ok(())
    }
}

/// Replacement collections waiting for [`Store::commit`]. A `None` field
/// leaves that collection untouched.
#[derive(Debug, Default, Clone)]
pub struct Staged {
    pub schools: Option<BTreeMap<String, School>>,
    pub users: Option<BTreeMap<String, User>>,
    pub students: Option<BTreeMap<String, Student>>,
    pub records: Option<BTreeMap<RecordKey, AttendanceRecord>>,
    pub settings: Option<AppSettings>,
}

impl Staged {
    pub fn is_empty(&self) -> bool {
        self.schools.is_none()
            && self.users.is_none()
            && self.students.is_none()
            && self.records.is_none()
            && self.settings.is_none()
    }
}

pub fn index_by_id<T, F>(items: Vec<T>, id: F) -> BTreeMap<String, T>
where
    F: Fn(&T) -> &str,
{
    items.into_iter().map(|it| (id(&it).to_string(), it)).collect()
}

/// Later entries win when two records share a `(studentId, date)` key.
pub fn index_records(records: Vec<AttendanceRecord>) -> BTreeMap<RecordKey, AttendanceRecord> {
    records.into_iter().map(|r| (r.key(), r)).collect()
}

pub struct Store {
    backend: Box<dyn CollectionBackend + Send>,
    schools: BTreeMap<String, School>,
    users: BTreeMap<String, User>,
    students: BTreeMap<String, Student>,
    records: BTreeMap<RecordKey, AttendanceRecord>,
    settings: AppSettings,
}

impl Store {
    pub fn open<B>(backend: B) -> Result<Self, StoreError>
    where
        B: CollectionBackend + Send + 'static,
    {
        let schools: Vec<School> = load_list(&backend, Collection::Schools)?;
        let users: Vec<User> = load_list(&backend, Collection::Users)?;
        let students: Vec<Student> = load_list(&backend, Collection::Students)?;
        let records: Vec<AttendanceRecord> = load_list(&backend, Collection::Records)?;
        let settings = match backend.load(Collection::Settings)? {
            Some(text) => serde_json::from_str(&text).map_err(|source| StoreError::Decode {
                collection: Collection::Settings,
                source,
            })?,
            None => AppSettings::default(),
        };

        tracing::debug!(
            schools = schools.len(),
            users = users.len(),
            students = students.len(),
            records = records.len(),
            "store loaded"
        );

        Ok(Self {
            backend: Box::new(backend),
            schools: index_by_id(schools, |s| s.id.as_str()),
            users: index_by_id(users, |u| u.id.as_str()),
            students: index_by_id(students, |s| s.id.as_str()),
            records: index_records(records),
            settings,
        })
    }

    pub fn in_memory() -> Self {
        Self {
            backend: Box::new(MemoryBackend::new()),
            schools: BTreeMap::new(),
            users: BTreeMap::new(),
            students: BTreeMap::new(),
            records: BTreeMap::new(),
            settings: AppSettings::default(),
        }
    }

    pub fn school(&self, id: &str) -> Option<&School> {
        self.schools.get(id)
    }

    pub fn schools(&self) -> impl Iterator<Item = &School> {
        self.schools.values()
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.get(id)
    }

    /// Case-insensitive exact match.
    pub fn user_by_username(&self, username: &str) -> Option<&User> {
        let wanted = username.to_lowercase();
        self.users
            .values()
            .find(|u| u.username.to_lowercase() == wanted)
    }

    pub fn student(&self, id: &str) -> Option<&Student> {
        self.students.get(id)
    }

    /// Roster read, optionally limited to one school.
    pub fn students(&self, school_id: Option<&str>) -> Vec<Student> {
        self.students
            .values()
            .filter(|s| school_id.map(|id| s.school_id == id).unwrap_or(true))
            .cloned()
            .collect()
    }

    /// Attendance read, optionally limited to one school. A school-scoped read
    /// drops records whose student is no longer on that school's roster.
    pub fn records(&self, school_id: Option<&str>) -> Vec<AttendanceRecord> {
        match school_id {
            None => self.records.values().cloned().collect(),
            Some(id) => self
                .records
                .values()
                .filter(|r| r.school_id == id && self.is_enrolled(&r.student_id, id))
                .cloned()
                .collect(),
        }
    }

    /// Full history for one student, oldest first.
    pub fn records_for_student(&self, student_id: &str) -> Vec<AttendanceRecord> {
        let lo = (student_id.to_string(), NaiveDate::MIN);
        let hi = (student_id.to_string(), NaiveDate::MAX);
        self.records.range(lo..=hi).map(|(_, r)| r.clone()).collect()
    }

    pub fn record(&self, student_id: &str, date: NaiveDate) -> Option<&AttendanceRecord> {
        self.records.get(&(student_id.to_string(), date))
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn is_enrolled(&self, student_id: &str, school_id: &str) -> bool {
        self.students
            .get(student_id)
            .map(|s| s.school_id == school_id)
            .unwrap_or(false)
    }

    pub fn staged_schools(&self) -> BTreeMap<String, School> {
        self.schools.clone()
    }

    pub fn staged_users(&self) -> BTreeMap<String, User> {
        self.users.clone()
    }

    pub fn staged_students(&self) -> BTreeMap<String, Student> {
        self.students.clone()
    }

    pub fn staged_records(&self) -> BTreeMap<RecordKey, AttendanceRecord> {
        self.records.clone()
    }

    /// Serializes every staged collection, hands the batch to the backend in
    /// one call, then swaps the in-memory indexes.
    pub fn commit(&mut self, staged: Staged) -> Result<(), StoreError> {
        if staged.is_empty() {
            return Ok(());
        }

        let mut batch: Vec<(Collection, String)> = Vec::new();
        if let Some(m) = &staged.schools {
            batch.push((Collection::Schools, encode_list(Collection::Schools, m.values())?));
        }
        if let Some(m) = &staged.users {
            batch.push((Collection::Users, encode_list(Collection::Users, m.values())?));
        }
        if let Some(m) = &staged.students {
            batch.push((Collection::Students, encode_list(Collection::Students, m.values())?));
        }
        if let Some(m) = &staged.records {
            batch.push((Collection::Records, encode_list(Collection::Records, m.values())?));
        }
        if let Some(s) = &staged.settings {
            let text = serde_json::to_string(s).map_err(|source| StoreError::Encode {
                collection: Collection::Settings,
                source,
            })?;
            batch.push((Collection::Settings, text));
        }

        self.backend.save(&batch)?;

        let names: Vec<&str> = batch.iter().map(|(c, _)| c.key()).collect();
        tracing::debug!(collections = ?names, "collections committed");

        if let Some(m) = staged.schools {
            self.schools = m;
        }
        if let Some(m) = staged.users {
            self.users = m;
        }
        if let Some(m) = staged.students {
            self.students = m;
        }
        if let Some(m) = staged.records {
            self.records = m;
        }
        if let Some(s) = staged.settings {
            self.settings = s;
        }
        Ok(())
    }

    /// Erases every collection, settings included. Irreversible.
    pub fn clear_all(&mut self) -> Result<(), StoreError> {
        self.backend.clear()?;
        self.schools.clear();
        self.users.clear();
        self.students.clear();
        self.records.clear();
        self.settings = AppSettings::default();
        tracing::warn!("all collections cleared");
        Ok(())
    }
}

fn load_list<T, B>(backend: &B, collection: Collection) -> Result<Vec<T>, StoreError>
where
    T: DeserializeOwned,
    B: CollectionBackend + ?Sized,
{
    match backend.load(collection)? {
        Some(text) => {
            serde_json::from_str(&text).map_err(|source| StoreError::Decode { collection, source })
        }
        None => Ok(Vec::new()),
    }
}

fn encode_list<'a, T, I>(collection: Collection, items: I) -> Result<String, StoreError>
where
    T: Serialize + 'a,
    I: Iterator<Item = &'a T>,
{
    let items: Vec<&T> = items.collect();
    serde_json::to_string(&items).map_err(|source| StoreError::Encode { collection, source })
}
