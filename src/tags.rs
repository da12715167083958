use crate::app::errors::AppError;
use crate::bookmarks::double_option;
use crate::storage::{CsvTable, OwnedRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const NAME_MAX_CHARS: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: u64,
    pub owner_id: u64,
    pub name: String,
    pub slug: String,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OwnedRecord for Tag {
    fn id(&self) -> u64 {
        self.id
    }

    fn owner_id(&self) -> u64 {
        self.owner_id
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagCreate {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub color: Option<Option<String>>,
}

/// Lowercase ascii, runs of anything else collapse into a single `-`
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    for ch in value.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }

    slug.trim_end_matches('-').to_string()
}

pub(crate) fn validate_name(name: &str) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::Validation("The name field is required.".into()));
    }
    validate_len("name", name)
}

pub(crate) fn validate_len(field: &str, value: &str) -> Result<(), AppError> {
    if value.chars().count() > NAME_MAX_CHARS {
        return Err(AppError::Validation(format!(
            "The {field} field must not be greater than {NAME_MAX_CHARS} characters."
        )));
    }
    Ok(())
}

fn ensure_unique_slug(
    rows: &[Tag],
    owner: u64,
    slug: &str,
    ignore: Option<u64>,
) -> Result<(), AppError> {
    let taken = rows
        .iter()
        .any(|t| t.owner_id == owner && t.slug == slug && Some(t.id) != ignore);

    if taken {
        return Err(AppError::Validation("The name has already been taken.".into()));
    }
    Ok(())
}

/// Per-user tags. Bookmarks reference them by id.
#[derive(Debug, Clone)]
pub struct TagStore {
    table: CsvTable<Tag>,
}

impl TagStore {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        Ok(Self {
            table: CsvTable::load(path)?,
        })
    }

    /// Sorted by name
    pub fn list(&self, owner: u64) -> Vec<Tag> {
        let mut tags = self.table.owned_by(owner);
        tags.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        tags
    }

    pub fn get(&self, owner: u64, id: u64) -> Result<Tag, AppError> {
        self.table.get(owner, id)
    }

    pub fn create(&self, owner: u64, input: TagCreate) -> Result<Tag, AppError> {
        validate_name(&input.name)?;
        if let Some(color) = &input.color {
            validate_len("color", color)?;
        }

        let name = input.name.trim().to_string();
        let slug = slugify(&name);

        self.table.mutate(|rows| {
            ensure_unique_slug(rows, owner, &slug, None)?;

            let now = Utc::now();
            let tag = Tag {
                id: CsvTable::next_id(rows),
                owner_id: owner,
                name,
                slug,
                color: input.color,
                created_at: now,
                updated_at: now,
            };
            rows.push(tag.clone());

            Ok(tag)
        })
    }

    pub fn update(&self, owner: u64, id: u64, input: TagUpdate) -> Result<Tag, AppError> {
        if let Some(name) = &input.name {
            validate_name(name)?;
        }
        if let Some(Some(color)) = &input.color {
            validate_len("color", color)?;
        }

        self.table.mutate(|rows| {
            let idx = crate::storage::position(rows, owner, id)?;

            if let Some(name) = input.name {
                let name = name.trim().to_string();
                let slug = slugify(&name);
                ensure_unique_slug(rows, owner, &slug, Some(id))?;
                rows[idx].name = name;
                rows[idx].slug = slug;
            }
            if let Some(color) = input.color {
                rows[idx].color = color;
            }
            rows[idx].updated_at = Utc::now();

            Ok(rows[idx].clone())
        })
    }

    pub fn delete(&self, owner: u64, id: u64) -> Result<Tag, AppError> {
        self.table.mutate(|rows| {
            let idx = crate::storage::position(rows, owner, id)?;
            Ok(rows.remove(idx))
        })
    }
}
