//! Document-style JSON collections on disk.
//!
//! Each collection is one JSON file holding an object keyed by document id.
//! Users and equipment templates are stored this way. Writes replace the
//! whole file; the last writer wins.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::models::{EquipmentTemplate, User, UserRole};

pub const USERS_FILE: &str = "users.json";
pub const TEMPLATES_FILE: &str = "equipment_templates.json";

/// A record that can be kept in a `DocumentStore`.
pub trait Document: Serialize + DeserializeOwned + Clone {
    fn id(&self) -> &str;
}

impl Document for User {
    fn id(&self) -> &str {
        &self.uid
    }
}

impl Document for EquipmentTemplate {
    fn id(&self) -> &str {
        &self.id
    }
}

pub struct DocumentStore<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

pub type UserStore = DocumentStore<User>;
pub type TemplateStore = DocumentStore<EquipmentTemplate>;

impl<T: Document> DocumentStore<T> {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, T>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", self.path.display()))
    }

    fn write_all(&self, docs: &BTreeMap<String, T>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(docs)?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<T>> {
        Ok(self.read_all()?.into_values().collect())
    }

    pub fn get(&self, id: &str) -> Result<Option<T>> {
        Ok(self.read_all()?.remove(id))
    }

    pub fn find(&self, predicate: impl Fn(&T) -> bool) -> Result<Option<T>> {
        Ok(self.read_all()?.into_values().find(|doc| predicate(doc)))
    }

    /// Insert or replace a document.
    pub fn upsert(&self, doc: &T) -> Result<()> {
        let mut docs = self.read_all()?;
        docs.insert(doc.id().to_string(), doc.clone());
        self.write_all(&docs)?;
        debug!(id = doc.id(), path = %self.path.display(), "Document saved");
        Ok(())
    }

    /// Returns the removed document, if any.
    pub fn delete(&self, id: &str) -> Result<Option<T>> {
        let mut docs = self.read_all()?;
        let removed = docs.remove(id);
        if removed.is_some() {
            self.write_all(&docs)?;
            debug!(id, path = %self.path.display(), "Document deleted");
        }
        Ok(removed)
    }

    /// Apply `change` to one document and save it. Returns the updated document.
    pub fn update(&self, id: &str, change: impl FnOnce(&mut T)) -> Result<Option<T>> {
        let mut docs = self.read_all()?;
        let Some(doc) = docs.get_mut(id) else {
            return Ok(None);
        };
        change(doc);
        let updated = doc.clone();
        self.write_all(&docs)?;
        Ok(Some(updated))
    }
}

// ===== User administration =====

impl DocumentStore<User> {
    pub fn find_by_personal_number(&self, personal_number: &str) -> Result<Option<User>> {
        self.find(|u| u.personal_number == personal_number)
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.trim().to_lowercase();
        self.find(|u| u.email.to_lowercase() == email)
    }

    pub fn set_role(&self, uid: &str, role: UserRole) -> Result<Option<User>> {
        self.update(uid, |u| u.role = role)
    }

    pub fn set_active(&self, uid: &str, active: bool) -> Result<Option<User>> {
        self.update(uid, |u| u.is_active = active)
    }

    /// Users sorted by last then first name.
    pub fn list_sorted(&self) -> Result<Vec<User>> {
        let mut users = self.list()?;
        users.sort_by(|a, b| {
            crate::utils::cmp_ignore_case(&a.last_name, &b.last_name)
                .then_with(|| crate::utils::cmp_ignore_case(&a.first_name, &b.first_name))
        });
        Ok(users)
    }
}

// ===== Equipment templates =====

impl DocumentStore<EquipmentTemplate> {
    /// Validate and save a template, refreshing its update time.
    pub fn save_template(&self, template: &EquipmentTemplate) -> Result<()> {
        let errors = template.validate();
        if !errors.is_empty() {
            anyhow::bail!("Invalid equipment template: {}", errors.join("; "));
        }
        let duplicate = self.find(|t| {
            t.id != template.id && t.name.trim().eq_ignore_ascii_case(template.name.trim())
        })?;
        if duplicate.is_some() {
            anyhow::bail!("A template named '{}' already exists", template.name.trim());
        }

        let mut template = template.clone();
        template.updated_at = Utc::now();
        self.upsert(&template)
    }

    /// Templates sorted by name.
    pub fn list_sorted(&self) -> Result<Vec<EquipmentTemplate>> {
        let mut templates = self.list()?;
        templates.sort_by(|a, b| crate::utils::cmp_ignore_case(&a.name, &b.name));
        Ok(templates)
    }
}
