pub mod errors;

use anyhow::Context;
use homedir::my_home;
use std::path::PathBuf;
use std::sync::Arc;

use crate::{
    bookmarks::{self, Bookmark, BookmarkCreate, BookmarkManager, BookmarkUpdate},
    collections::{Collection, CollectionStore},
    company::CompanyStore,
    config::Config,
    metadata::{normalize::validate_url, MetadataResult, Resolver},
    tags::{Tag, TagStore},
};
use errors::AppError;

/// Where everything lives on disk
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub base_path: PathBuf,
    pub bookmarks_path: PathBuf,
    pub collections_path: PathBuf,
    pub tags_path: PathBuf,
}

impl AppPaths {
    pub fn from_env() -> anyhow::Result<Self> {
        let base_path = match std::env::var("LINKSHELF_BASE_PATH") {
            Ok(path) => PathBuf::from(path),
            Err(_) => {
                let home = my_home()
                    .context("could not determine home directory")?
                    .context("home directory path is empty")?;
                home.join(".local/share/linkshelf")
            }
        };

        Ok(Self::new(base_path))
    }

    pub fn new(base_path: PathBuf) -> Self {
        Self {
            bookmarks_path: base_path.join("bookmarks.csv"),
            collections_path: base_path.join("collections.csv"),
            tags_path: base_path.join("tags.csv"),
            base_path,
        }
    }
}

/// Stores a bookmark can point into
pub struct Taxonomy {
    pub collections: CollectionStore,
    pub tags: TagStore,
}

impl Taxonomy {
    pub fn load(paths: &AppPaths) -> anyhow::Result<Self> {
        Ok(Self {
            collections: CollectionStore::load(&paths.collections_path)?,
            tags: TagStore::load(&paths.tags_path)?,
        })
    }
}

pub struct App {
    bmark_mgr: Arc<dyn BookmarkManager>,
    taxonomy: Taxonomy,
    company: CompanyStore,
    resolver: Arc<Resolver>,
    config: Arc<Config>,
}

impl App {
    pub fn load(paths: &AppPaths) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&paths.base_path)
            .context("failed to create application base directory")?;

        let config = Config::load_with(&paths.base_path)?;
        let bmark_mgr = bookmarks::BackendCsv::load(&paths.bookmarks_path)?;
        let taxonomy = Taxonomy::load(paths)?;
        let company = CompanyStore::load(&paths.base_path)?;

        Ok(Self::new_with(config, Arc::new(bmark_mgr), taxonomy, company))
    }

    pub fn new_with(
        config: Config,
        bmark_mgr: Arc<dyn BookmarkManager>,
        taxonomy: Taxonomy,
        company: CompanyStore,
    ) -> Self {
        let resolver = Arc::new(Resolver::new(&config.resolver));

        Self {
            bmark_mgr,
            taxonomy,
            company,
            resolver,
            config: Arc::new(config),
        }
    }

    pub fn bookmarks(&self) -> &dyn BookmarkManager {
        self.bmark_mgr.as_ref()
    }

    pub fn collections(&self) -> &CollectionStore {
        &self.taxonomy.collections
    }

    pub fn tags(&self) -> &TagStore {
        &self.taxonomy.tags
    }

    pub fn company(&self) -> &CompanyStore {
        &self.company
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Validate a url from a form and resolve its metadata.
    ///
    /// Blocks for up to the sum of both tier timeouts.
    pub fn interrogate_url(&self, url: Option<&str>) -> Result<MetadataResult, AppError> {
        let url = url.unwrap_or_default().trim();
        validate_url(url).map_err(AppError::Validation)?;

        let result = self.resolver.resolve(url)?;
        Ok(result)
    }

    /// Unknown ids and ids owned by someone else are rejected alike
    fn check_references(
        &self,
        owner: u64,
        collection_id: Option<u64>,
        tags: Option<&[u64]>,
    ) -> Result<(), AppError> {
        if let Some(id) = collection_id {
            if self.taxonomy.collections.get(owner, id).is_err() {
                return Err(AppError::Validation(
                    "The selected collection id is invalid.".into(),
                ));
            }
        }

        for (idx, id) in tags.unwrap_or_default().iter().enumerate() {
            if self.taxonomy.tags.get(owner, *id).is_err() {
                return Err(AppError::Validation(format!(
                    "The selected tags.{idx} is invalid."
                )));
            }
        }

        Ok(())
    }

    pub fn create_bookmark(
        &self,
        owner: u64,
        bmark_create: BookmarkCreate,
    ) -> Result<Bookmark, AppError> {
        bmark_create.validate()?;
        self.check_references(
            owner,
            bmark_create.collection_id,
            bmark_create.tags.as_deref(),
        )?;

        self.bmark_mgr.create(owner, bmark_create)
    }

    pub fn update_bookmark(
        &self,
        owner: u64,
        id: u64,
        bmark_update: BookmarkUpdate,
    ) -> Result<Bookmark, AppError> {
        bmark_update.validate()?;
        // ownership of the bookmark itself is checked before its references
        self.bmark_mgr.get(owner, id)?;
        self.check_references(
            owner,
            bmark_update.collection_id.flatten(),
            bmark_update.tags.as_deref(),
        )?;

        self.bmark_mgr.update(owner, id, bmark_update)
    }

    /// Delete a collection. Its bookmarks become uncategorized.
    pub fn delete_collection(&self, owner: u64, id: u64) -> Result<Collection, AppError> {
        let collection = self.taxonomy.collections.delete(owner, id)?;
        let moved = self.bmark_mgr.detach_collection(owner, id)?;
        log::debug!("collection {id} deleted, {moved} bookmarks uncategorized");

        Ok(collection)
    }

    /// Delete a tag and drop it from every bookmark carrying it
    pub fn delete_tag(&self, owner: u64, id: u64) -> Result<Tag, AppError> {
        let tag = self.taxonomy.tags.delete(owner, id)?;
        let detached = self.bmark_mgr.detach_tag(owner, id)?;
        log::debug!("tag {id} deleted, detached from {detached} bookmarks");

        Ok(tag)
    }
}
