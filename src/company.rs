//! Admin curated bookmarks shared read-only with every user, plus the
//! per-user favorite flags on them.

use crate::app::errors::AppError;
use crate::metadata::normalize::validate_url;
use crate::storage::{read_records, write_records};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeSet, HashSet},
    path::{Path, PathBuf},
    sync::{Arc, PoisonError, RwLock},
};

const BOOKMARKS_FILE: &str = "company_bookmarks.csv";
const FAVORITES_FILE: &str = "company_favorites.csv";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyBookmark {
    pub id: u64,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub favicon: Option<String>,
    pub image_url: Option<String>,
}

/// One row of the admin form. Rows without a known id are created.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanyBookmarkInput {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub favicon: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompanyBookmarkView {
    #[serde(flatten)]
    pub bookmark: CompanyBookmark,
    pub is_favorite: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
struct FavoriteRecord {
    user_id: u64,
    company_bookmark_id: u64,
}

#[derive(Debug, Clone, Default)]
struct CompanyState {
    bookmarks: Vec<CompanyBookmark>,
    favorites: BTreeSet<FavoriteRecord>,
}

#[derive(Debug, Clone)]
pub struct CompanyStore {
    state: Arc<RwLock<CompanyState>>,
    dir: PathBuf,
}

impl CompanyBookmarkInput {
    fn validate(&self, idx: usize) -> Result<(), AppError> {
        if self.title.trim().is_empty() {
            return Err(AppError::Validation(format!(
                "The bookmarks.{idx}.title field is required."
            )));
        }
        validate_url(&self.url)
            .map_err(|_| AppError::Validation(format!("The bookmarks.{idx}.url field must be a valid URL.")))?;
        Ok(())
    }
}

impl CompanyStore {
    pub fn load(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;

        let bookmarks = read_records::<CompanyBookmark>(&dir.join(BOOKMARKS_FILE))?;
        let favorites = read_records::<FavoriteRecord>(&dir.join(FAVORITES_FILE))?
            .into_iter()
            .collect();

        log::debug!("loaded {} company bookmarks", bookmarks.len());

        Ok(Self {
            state: Arc::new(RwLock::new(CompanyState {
                bookmarks,
                favorites,
            })),
            dir,
        })
    }

    fn save(&self, state: &CompanyState) -> Result<(), AppError> {
        write_records(&self.dir.join(BOOKMARKS_FILE), &state.bookmarks)?;
        write_records(&self.dir.join(FAVORITES_FILE), &state.favorites)?;
        Ok(())
    }

    /// Edit a copy of the state, persist it, then publish it
    fn mutate<R>(
        &self,
        f: impl FnOnce(&mut CompanyState) -> Result<R, AppError>,
    ) -> Result<R, AppError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        let mut next = state.clone();
        let result = f(&mut next)?;
        self.save(&next)?;
        *state = next;

        Ok(result)
    }

    /// Admin listing, ordered by id
    pub fn list(&self) -> Vec<CompanyBookmark> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let mut bookmarks = state.bookmarks.clone();
        bookmarks.sort_by_key(|b| b.id);
        bookmarks
    }

    /// Listing as seen by one user
    pub fn list_for(&self, owner: u64) -> Vec<CompanyBookmarkView> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let mut views = state
            .bookmarks
            .iter()
            .map(|bookmark| CompanyBookmarkView {
                is_favorite: state.favorites.contains(&FavoriteRecord {
                    user_id: owner,
                    company_bookmark_id: bookmark.id,
                }),
                bookmark: bookmark.clone(),
            })
            .collect::<Vec<_>>();
        views.sort_by_key(|v| v.bookmark.id);
        views
    }

    /// Replace the whole list with what the admin submitted.
    ///
    /// Rows missing from `inputs` are deleted along with their favorites,
    /// rows with a known id are updated in place, the rest are created.
    pub fn replace_all(
        &self,
        inputs: Vec<CompanyBookmarkInput>,
    ) -> Result<Vec<CompanyBookmark>, AppError> {
        for (idx, input) in inputs.iter().enumerate() {
            input.validate(idx)?;
        }

        let bookmarks = self.mutate(|state| {
            // ids of removed rows are not handed out again in the same pass
            let mut next_id = state.bookmarks.iter().map(|b| b.id).max().unwrap_or(0) + 1;

            let incoming: HashSet<u64> = inputs.iter().filter_map(|i| i.id).collect();
            state.bookmarks.retain(|b| incoming.contains(&b.id));
            let kept: HashSet<u64> = state.bookmarks.iter().map(|b| b.id).collect();
            state
                .favorites
                .retain(|f| kept.contains(&f.company_bookmark_id));

            for input in inputs {
                let known = input
                    .id
                    .filter(|id| state.bookmarks.iter().any(|b| b.id == *id));

                let id = match known {
                    Some(id) => id,
                    None => {
                        let id = next_id;
                        next_id += 1;
                        id
                    }
                };

                let bookmark = CompanyBookmark {
                    id,
                    title: input.title.trim().to_string(),
                    url: input.url.trim().to_string(),
                    description: input.description,
                    favicon: input.favicon,
                    image_url: input.image_url,
                };

                match state.bookmarks.iter_mut().find(|b| b.id == id) {
                    Some(slot) => *slot = bookmark,
                    None => state.bookmarks.push(bookmark),
                }
            }

            let mut bookmarks = state.bookmarks.clone();
            bookmarks.sort_by_key(|b| b.id);
            Ok(bookmarks)
        })?;

        log::info!("company bookmarks replaced ({} rows)", bookmarks.len());

        Ok(bookmarks)
    }

    /// Flip a user's favorite flag. Returns the new state.
    pub fn toggle_favorite(&self, owner: u64, id: u64) -> Result<bool, AppError> {
        self.mutate(|state| {
            if !state.bookmarks.iter().any(|b| b.id == id) {
                return Err(AppError::NotFound);
            }

            let record = FavoriteRecord {
                user_id: owner,
                company_bookmark_id: id,
            };

            let is_favorite = if state.favorites.remove(&record) {
                false
            } else {
                state.favorites.insert(record);
                true
            };

            Ok(is_favorite)
        })
    }
}
