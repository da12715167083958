use crate::app::errors::AppError;
use crate::metadata::normalize::validate_url;
use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::{
    collections::HashSet,
    fmt,
    hash::Hash,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Instant,
};

pub const TITLE_MAX_CHARS: usize = 255;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookmarkStatus {
    #[default]
    Active,
    Archived,
    Trashed,
}

impl BookmarkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookmarkStatus::Active => "active",
            BookmarkStatus::Archived => "archived",
            BookmarkStatus::Trashed => "trashed",
        }
    }
}

impl fmt::Display for BookmarkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookmarkStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(BookmarkStatus::Active),
            "archived" => Ok(BookmarkStatus::Archived),
            "trashed" => Ok(BookmarkStatus::Trashed),
            other => Err(anyhow!("unknown bookmark status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: u64,
    pub owner_id: u64,

    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub favicon: Option<String>,
    pub image_url: Option<String>,

    /// None means uncategorized
    pub collection_id: Option<u64>,
    /// Tag ids
    pub tags: Vec<u64>,

    pub is_favorite: bool,
    pub status: BookmarkStatus,
    pub order: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Hash for Bookmark {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

impl PartialEq for Bookmark {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BookmarkCreate {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<u64>>,
}

/// Partial update. For nullable fields `Some(None)` clears the value,
/// `None` leaves it untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookmarkUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub favicon: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub image_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub collection_id: Option<Option<u64>>,
    #[serde(default)]
    pub is_favorite: Option<bool>,
    /// Replaces the whole tag list when present
    #[serde(default)]
    pub tags: Option<Vec<u64>>,
}

pub(crate) fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    #[default]
    All,
    Favorites,
    Archive,
    Trash,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ListQuery {
    #[serde(default)]
    pub view: View,
    #[serde(default)]
    pub collection: Option<u64>,
    #[serde(default)]
    pub tag: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrderUpdate {
    pub id: u64,
    pub order: i64,
}

fn validate_title(title: &str) -> Result<(), AppError> {
    if title.trim().is_empty() {
        return Err(AppError::Validation("The title field is required.".into()));
    }
    if title.chars().count() > TITLE_MAX_CHARS {
        return Err(AppError::Validation(format!(
            "The title field must not be greater than {TITLE_MAX_CHARS} characters."
        )));
    }
    Ok(())
}

/// Drop repeated ids, keeping first-seen order
pub fn dedup_tags(tags: Vec<u64>) -> Vec<u64> {
    let mut seen = HashSet::new();
    tags.into_iter().filter(|t| seen.insert(*t)).collect()
}

impl BookmarkCreate {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_title(&self.title)?;
        validate_url(&self.url).map_err(AppError::Validation)?;
        Ok(())
    }
}

impl BookmarkUpdate {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(url) = &self.url {
            validate_url(url).map_err(AppError::Validation)?;
        }
        Ok(())
    }

    fn apply(self, bmark: &mut Bookmark) {
        if let Some(title) = self.title {
            bmark.title = title.trim().to_string();
        }
        if let Some(url) = self.url {
            bmark.url = url.trim().to_string();
        }
        if let Some(description) = self.description {
            bmark.description = description;
        }
        if let Some(favicon) = self.favicon {
            bmark.favicon = favicon;
        }
        if let Some(image_url) = self.image_url {
            bmark.image_url = image_url;
        }
        if let Some(collection_id) = self.collection_id {
            bmark.collection_id = collection_id;
        }
        if let Some(is_favorite) = self.is_favorite {
            bmark.is_favorite = is_favorite;
        }
        if let Some(tags) = self.tags {
            bmark.tags = dedup_tags(tags);
        }
    }
}

impl View {
    pub fn matches(&self, bmark: &Bookmark) -> bool {
        match self {
            View::All => bmark.status == BookmarkStatus::Active,
            View::Favorites => bmark.is_favorite && bmark.status != BookmarkStatus::Trashed,
            View::Archive => bmark.status == BookmarkStatus::Archived,
            View::Trash => bmark.status == BookmarkStatus::Trashed,
        }
    }
}

/// Every operation acts on behalf of `owner`. Touching another owner's row
/// is `AppError::Forbidden`, an unknown id is `AppError::NotFound`.
pub trait BookmarkManager: Send + Sync {
    fn list(&self, owner: u64, query: ListQuery) -> Result<Vec<Bookmark>, AppError>;
    fn get(&self, owner: u64, id: u64) -> Result<Bookmark, AppError>;
    fn create(&self, owner: u64, bookmark: BookmarkCreate) -> Result<Bookmark, AppError>;
    fn update(&self, owner: u64, id: u64, update: BookmarkUpdate) -> Result<Bookmark, AppError>;
    fn delete(&self, owner: u64, id: u64) -> Result<(), AppError>;
    fn set_status(&self, owner: u64, id: u64, status: BookmarkStatus)
        -> Result<Bookmark, AppError>;
    /// Rows not owned by `owner` are skipped. Returns how many rows changed.
    fn reorder(&self, owner: u64, updates: Vec<OrderUpdate>) -> Result<usize, AppError>;
    /// Move the owner's bookmarks out of a deleted collection
    fn detach_collection(&self, owner: u64, collection_id: u64) -> Result<usize, AppError>;
    /// Remove a deleted tag from the owner's bookmarks
    fn detach_tag(&self, owner: u64, tag_id: u64) -> Result<usize, AppError>;
}

#[derive(Debug, Clone, Default)]
pub struct BackendCsv {
    list: Arc<RwLock<Vec<Bookmark>>>,
    path: PathBuf,
}

const CSV_HEADERS: [&str; 14] = [
    "id",
    "owner_id",
    "url",
    "title",
    "description",
    "favicon",
    "image_url",
    "collection_id",
    "tags",
    "is_favorite",
    "status",
    "order",
    "created_at",
    "updated_at",
];

fn opt_string(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_timestamp(value: &str) -> anyhow::Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

fn parse_record(record: &csv::StringRecord) -> anyhow::Result<Bookmark> {
    let field = |idx: usize| {
        record
            .get(idx)
            .ok_or_else(|| anyhow!("couldnt get record {}", CSV_HEADERS[idx]))
    };

    let collection_id = field(7)?;
    let tags = field(8)?;

    Ok(Bookmark {
        id: field(0)?.parse::<u64>()?,
        owner_id: field(1)?.parse::<u64>()?,
        url: field(2)?.to_string(),
        title: field(3)?.to_string(),
        description: opt_string(field(4)?),
        favicon: opt_string(field(5)?),
        image_url: opt_string(field(6)?),
        collection_id: if collection_id.is_empty() {
            None
        } else {
            Some(collection_id.parse::<u64>()?)
        },
        tags: tags
            .split(',')
            .filter(|t| !t.is_empty())
            .map(str::parse::<u64>)
            .collect::<Result<_, _>>()?,
        is_favorite: field(9)?.parse::<bool>()?,
        status: field(10)?.parse::<BookmarkStatus>()?,
        order: field(11)?.parse::<i64>()?,
        created_at: parse_timestamp(field(12)?)?,
        updated_at: parse_timestamp(field(13)?)?,
    })
}

impl BackendCsv {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if let Err(err) = std::fs::metadata(path) {
            match err.kind() {
                ErrorKind::NotFound => {
                    log::info!("Creating new database at {}", path.display());
                    let mut csv_wrt = csv::Writer::from_path(path)?;
                    csv_wrt.write_record(CSV_HEADERS)?;
                    csv_wrt.flush()?;
                }
                _ => Err(err)?,
            }
        }

        let now = Instant::now();
        let mut csv_reader = csv::Reader::from_path(path)?;

        let mut bmarks = vec![];
        for record in csv_reader.records() {
            bmarks.push(parse_record(&record?)?);
        }

        log::debug!(
            "took {}ms to read csv",
            now.elapsed().as_micros() as f64 / 1000.0
        );

        Ok(BackendCsv {
            list: Arc::new(RwLock::new(bmarks)),
            path: path.to_path_buf(),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Bookmark>> {
        self.list.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Bookmark>> {
        self.list.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f` to a copy of the rows and swap it in once it's on disk.
    /// The write guard is held throughout so writers can't interleave.
    fn mutate<R>(
        &self,
        f: impl FnOnce(&mut Vec<Bookmark>) -> Result<R, AppError>,
    ) -> Result<R, AppError> {
        let mut bmarks = self.write();

        let mut next = bmarks.clone();
        let result = f(&mut next)?;
        self.save(&next)?;
        *bmarks = next;

        Ok(result)
    }

    fn save(&self, bmarks: &[Bookmark]) -> Result<(), AppError> {
        let mut temp_path = self.path.clone().into_os_string();
        temp_path.push("-tmp");

        let mut csv_wrt = csv::Writer::from_path(&temp_path)?;
        csv_wrt.write_record(CSV_HEADERS)?;
        for bmark in bmarks.iter() {
            let row: [String; 14] = [
                bmark.id.to_string(),
                bmark.owner_id.to_string(),
                bmark.url.clone(),
                bmark.title.clone(),
                bmark.description.clone().unwrap_or_default(),
                bmark.favicon.clone().unwrap_or_default(),
                bmark.image_url.clone().unwrap_or_default(),
                bmark
                    .collection_id
                    .map(|id| id.to_string())
                    .unwrap_or_default(),
                bmark
                    .tags
                    .iter()
                    .map(u64::to_string)
                    .collect::<Vec<_>>()
                    .join(","),
                bmark.is_favorite.to_string(),
                bmark.status.to_string(),
                bmark.order.to_string(),
                bmark.created_at.to_rfc3339(),
                bmark.updated_at.to_rfc3339(),
            ];
            csv_wrt.write_record(&row)?;
        }
        csv_wrt.flush()?;
        std::fs::rename(&temp_path, &self.path)?;

        Ok(())
    }

    /// Find an owned bookmark's position
    fn position(bmarks: &[Bookmark], owner: u64, id: u64) -> Result<usize, AppError> {
        let idx = bmarks
            .iter()
            .position(|b| b.id == id)
            .ok_or(AppError::NotFound)?;

        if bmarks[idx].owner_id != owner {
            log::warn!("owner {owner} attempted to access bookmark {id}");
            return Err(AppError::Forbidden);
        }

        Ok(idx)
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BookmarkManager for BackendCsv {
    fn list(&self, owner: u64, query: ListQuery) -> Result<Vec<Bookmark>, AppError> {
        let bmarks = self.read();

        let mut output = bmarks
            .iter()
            .filter(|b| b.owner_id == owner)
            .filter(|b| query.view.matches(b))
            .filter(|b| query.collection.is_none() || b.collection_id == query.collection)
            .filter(|b| query.tag.map_or(true, |tag| b.tags.contains(&tag)))
            .cloned()
            .collect::<Vec<_>>();

        output.sort_by_key(|b| (b.order, b.id));

        Ok(output)
    }

    fn get(&self, owner: u64, id: u64) -> Result<Bookmark, AppError> {
        let bmarks = self.read();
        let idx = Self::position(&bmarks, owner, id)?;
        Ok(bmarks[idx].clone())
    }

    fn create(&self, owner: u64, bmark_create: BookmarkCreate) -> Result<Bookmark, AppError> {
        bmark_create.validate()?;

        self.mutate(|bmarks| {
            let id = bmarks.iter().map(|b| b.id).max().unwrap_or(0) + 1;
            let now = Utc::now();

            let bmark = Bookmark {
                id,
                owner_id: owner,
                title: bmark_create.title.trim().to_string(),
                url: bmark_create.url.trim().to_string(),
                description: bmark_create.description,
                favicon: bmark_create.favicon,
                image_url: bmark_create.image_url,
                collection_id: bmark_create.collection_id,
                tags: dedup_tags(bmark_create.tags.unwrap_or_default()),
                is_favorite: false,
                status: BookmarkStatus::Active,
                order: 0,
                created_at: now,
                updated_at: now,
            };

            bmarks.push(bmark.clone());

            Ok(bmark)
        })
    }

    fn update(&self, owner: u64, id: u64, bmark_update: BookmarkUpdate) -> Result<Bookmark, AppError> {
        bmark_update.validate()?;

        self.mutate(|bmarks| {
            let idx = Self::position(bmarks, owner, id)?;

            let bmark = &mut bmarks[idx];
            bmark_update.apply(bmark);
            bmark.updated_at = Utc::now();

            Ok(bmark.clone())
        })
    }

    fn delete(&self, owner: u64, id: u64) -> Result<(), AppError> {
        self.mutate(|bmarks| {
            let idx = Self::position(bmarks, owner, id)?;
            bmarks.remove(idx);
            Ok(())
        })
    }

    fn set_status(
        &self,
        owner: u64,
        id: u64,
        status: BookmarkStatus,
    ) -> Result<Bookmark, AppError> {
        self.mutate(|bmarks| {
            let idx = Self::position(bmarks, owner, id)?;

            let bmark = &mut bmarks[idx];
            if bmark.status != status {
                log::debug!("bookmark {id}: {} -> {status}", bmark.status);
                bmark.status = status;
                bmark.updated_at = Utc::now();
            }

            Ok(bmark.clone())
        })
    }

    fn reorder(&self, owner: u64, updates: Vec<OrderUpdate>) -> Result<usize, AppError> {
        self.mutate(|bmarks| {
            let mut count = 0;
            for update in updates {
                if let Some(bmark) = bmarks
                    .iter_mut()
                    .find(|b| b.id == update.id && b.owner_id == owner)
                {
                    bmark.order = update.order;
                    count += 1;
                }
            }

            Ok(count)
        })
    }

    fn detach_collection(&self, owner: u64, collection_id: u64) -> Result<usize, AppError> {
        self.mutate(|bmarks| {
            let now = Utc::now();
            let mut count = 0;
            for bmark in bmarks
                .iter_mut()
                .filter(|b| b.owner_id == owner && b.collection_id == Some(collection_id))
            {
                bmark.collection_id = None;
                bmark.updated_at = now;
                count += 1;
            }

            Ok(count)
        })
    }

    fn detach_tag(&self, owner: u64, tag_id: u64) -> Result<usize, AppError> {
        self.mutate(|bmarks| {
            let mut count = 0;
            for bmark in bmarks
                .iter_mut()
                .filter(|b| b.owner_id == owner && b.tags.contains(&tag_id))
            {
                bmark.tags.retain(|t| *t != tag_id);
                count += 1;
            }

            Ok(count)
        })
    }
}
