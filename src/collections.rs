use crate::app::errors::AppError;
use crate::bookmarks::double_option;
use crate::storage::{position, CsvTable, OwnedRecord};
use crate::tags::{slugify, validate_len, validate_name};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_ICON: &str = "folder";
pub const DEFAULT_COLOR: &str = "slate";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: u64,
    pub owner_id: u64,
    pub name: String,
    pub slug: String,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OwnedRecord for Collection {
    fn id(&self) -> u64 {
        self.id
    }

    fn owner_id(&self) -> u64 {
        self.owner_id
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionCreate {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CollectionUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub icon: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub color: Option<Option<String>>,
    #[serde(default)]
    pub order: Option<i64>,
}

/// First free slug for `name`: `reading`, then `reading-1`, `reading-2`, ...
fn unique_slug(rows: &[Collection], owner: u64, name: &str, ignore: Option<u64>) -> String {
    let base = slugify(name);
    let taken = |slug: &str| {
        rows.iter()
            .any(|c| c.owner_id == owner && c.slug == slug && Some(c.id) != ignore)
    };

    if !taken(&base) {
        return base;
    }

    let mut counter = 1;
    loop {
        let candidate = format!("{base}-{counter}");
        if !taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

fn validate_optional(field: &str, value: &Option<String>) -> Result<(), AppError> {
    match value {
        Some(value) => validate_len(field, value),
        None => Ok(()),
    }
}

/// Per-user folders. A bookmark sits in at most one.
#[derive(Debug, Clone)]
pub struct CollectionStore {
    table: CsvTable<Collection>,
}

impl CollectionStore {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        Ok(Self {
            table: CsvTable::load(path)?,
        })
    }

    /// Sorted by `order`, then id
    pub fn list(&self, owner: u64) -> Vec<Collection> {
        let mut collections = self.table.owned_by(owner);
        collections.sort_by_key(|c| (c.order, c.id));
        collections
    }

    pub fn get(&self, owner: u64, id: u64) -> Result<Collection, AppError> {
        self.table.get(owner, id)
    }

    pub fn create(&self, owner: u64, input: CollectionCreate) -> Result<Collection, AppError> {
        validate_name(&input.name)?;
        validate_optional("icon", &input.icon)?;
        validate_optional("color", &input.color)?;

        let name = input.name.trim().to_string();

        self.table.mutate(|rows| {
            let order = rows
                .iter()
                .filter(|c| c.owner_id == owner)
                .map(|c| c.order + 1)
                .max()
                .unwrap_or(0);

            let now = Utc::now();
            let collection = Collection {
                id: CsvTable::next_id(rows),
                owner_id: owner,
                slug: unique_slug(rows, owner, &name, None),
                name,
                icon: Some(input.icon.unwrap_or_else(|| DEFAULT_ICON.to_string())),
                color: Some(input.color.unwrap_or_else(|| DEFAULT_COLOR.to_string())),
                order,
                created_at: now,
                updated_at: now,
            };
            rows.push(collection.clone());

            Ok(collection)
        })
    }

    pub fn update(
        &self,
        owner: u64,
        id: u64,
        input: CollectionUpdate,
    ) -> Result<Collection, AppError> {
        if let Some(name) = &input.name {
            validate_name(name)?;
        }
        if let Some(icon) = &input.icon {
            validate_optional("icon", icon)?;
        }
        if let Some(color) = &input.color {
            validate_optional("color", color)?;
        }

        self.table.mutate(|rows| {
            let idx = position(rows, owner, id)?;

            if let Some(name) = input.name {
                let name = name.trim().to_string();
                if name != rows[idx].name {
                    let slug = unique_slug(rows, owner, &name, Some(id));
                    rows[idx].slug = slug;
                    rows[idx].name = name;
                }
            }
            if let Some(icon) = input.icon {
                rows[idx].icon = icon;
            }
            if let Some(color) = input.color {
                rows[idx].color = color;
            }
            if let Some(order) = input.order {
                rows[idx].order = order;
            }
            rows[idx].updated_at = Utc::now();

            Ok(rows[idx].clone())
        })
    }

    pub fn delete(&self, owner: u64, id: u64) -> Result<Collection, AppError> {
        self.table.mutate(|rows| {
            let idx = position(rows, owner, id)?;
            Ok(rows.remove(idx))
        })
    }
}
