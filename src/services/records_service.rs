use crate::error::AppResult;
use crate::models::{InstallationRecord, Photo};
use crate::photos::{merge_diagram, merge_photos};
use crate::storage::{query, Listing, RecordListing, RecordStore, SortKey, StoredRecord};

/// Store a new record
#[derive(Debug, Clone)]
pub struct SaveRecordCommand {
    pub record: InstallationRecord,
}

/// Overwrite an existing record. Photos and diagram are merged onto the
/// stored ones rather than taken from `record`.
#[derive(Debug, Clone)]
pub struct UpdateRecordCommand {
    pub filename: String,
    pub record: InstallationRecord,
    pub new_photos: Vec<Photo>,
    pub new_diagram: Option<Photo>,
}

#[derive(Debug, Clone)]
pub struct DeleteRecordCommand {
    pub filename: String,
}

#[derive(Debug, Clone, Default)]
pub struct ListRecordsQuery {
    pub search: Option<String>,
    pub sort: SortKey,
}

pub struct RecordsService<S: RecordStore> {
    store: S,
}

impl<S: RecordStore> RecordsService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the new filename
    pub fn save(&self, command: SaveRecordCommand) -> AppResult<String> {
        let mut record = command.record;
        record.refresh_derived();
        self.store.save(&mut record)
    }

    pub fn show(&self, filename: &str) -> AppResult<InstallationRecord> {
        self.store.load(filename)
    }

    /// Returns the record as written
    pub fn update(&self, command: UpdateRecordCommand) -> AppResult<InstallationRecord> {
        let stored = self.store.load(&command.filename)?;

        let mut record = command.record;
        record.photos = merge_photos(&stored.photos, &command.new_photos);
        record.diagram = merge_diagram(stored.diagram, command.new_diagram);
        record.created_at = stored.created_at;
        record.refresh_derived();

        tracing::debug!(
            "Merged photos: file={}, stored={}, submitted={}, result={}",
            command.filename,
            stored.photos.len(),
            command.new_photos.len(),
            record.photos.len()
        );

        self.store.update(&command.filename, &mut record)?;
        Ok(record)
    }

    pub fn delete(&self, command: DeleteRecordCommand) -> AppResult<()> {
        self.store.delete(&command.filename)
    }

    /// Summaries matching the search term, in the requested order. Files
    /// that could not be read come back as warnings.
    pub fn list(&self, query: &ListRecordsQuery) -> AppResult<RecordListing> {
        let listing = self.store.list()?;

        let mut items = match query.search.as_deref() {
            Some(term) => query::search(listing.items, term),
            None => listing.items,
        };
        query::sort(&mut items, query.sort);

        Ok(RecordListing {
            items,
            warnings: listing.warnings,
        })
    }

    /// Every readable record with its filename, newest first
    pub fn export(&self) -> AppResult<Listing<StoredRecord>> {
        self.store.load_all()
    }
}
