//! Service layer API for document workflow operations
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use crate::audit::AuditEvent;
use crate::blob::{BlobStore, SledBlobStore};
use crate::config::WorkflowConfig;
use crate::document::{Document, normalize_order_ref};
use crate::error::{Result, WorkflowError};
use crate::permission::{Area, StageArea, View};
use crate::policy::{Actor, Capability, Visibility};
use crate::query::{SearchQuery, Summary, TaskReport};
use crate::repository::{DocumentRepository, SledRepository};
use crate::state::DeliveryState;
use crate::types::{ActorId, FileRef};

pub struct WorkflowService<R, B> {
    repository: R,
    blobs: B,
    config: WorkflowConfig,
    // one mutex per order reference in use; mutations on a document run under it
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl WorkflowService<SledRepository, SledBlobStore> {
    /// Documents and blobs in their own trees of the same sled database.
    pub fn open(instance: Arc<sled::Db>, config: WorkflowConfig) -> Result<Self> {
        let repository = SledRepository::new(&instance)?;
        let blobs = SledBlobStore::new(&instance)?;
        Ok(Self::new(repository, blobs, config))
    }
}

impl<R: DocumentRepository, B: BlobStore> WorkflowService<R, B> {
    pub fn new(repository: R, blobs: B, config: WorkflowConfig) -> Self {
        Self {
            repository,
            blobs,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn blobs(&self) -> &B {
        &self.blobs
    }

    /// Runs `f` while holding the lock of `order_ref`. The table entry is
    /// dropped again once no other caller holds or waits on it.
    fn with_lock<T>(&self, order_ref: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(order_ref.to_string()).or_default())
        };

        let outcome = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            debug!(%order_ref, "Acquired document lock");
            f()
        };

        // clones are only taken under the table lock, so a count of one here
        // means nobody else holds or waits on this entry
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        drop(lock);
        if locks
            .get(order_ref)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(order_ref);
        }

        outcome
    }

    /// Load, mutate and store one document while holding its lock.
    ///
    /// `apply` works on a copy; only when it succeeds is the copy written
    /// back, so a failed operation leaves nothing behind.
    fn update_document<T>(
        &self,
        order_ref: &str,
        apply: impl FnOnce(&mut Document) -> Result<T>,
    ) -> Result<(Document, T)> {
        let order_ref = normalize_order_ref(order_ref)?;
        self.with_lock(&order_ref, || {
            let mut document = self.load(&order_ref)?;
            let outcome = apply(&mut document)?;
            self.repository.put(&document)?;
            Ok((document, outcome))
        })
    }

    fn load(&self, order_ref: &str) -> Result<Document> {
        self.repository
            .get_by_order_ref(order_ref)?
            .ok_or_else(|| WorkflowError::NotFound(format!("order {order_ref}")))
    }

    fn discard_blob(&self, file: &FileRef) {
        match self.blobs.delete(&file.id) {
            Ok(true) => debug!(file_id = %file.id, "Deleted blob"),
            Ok(false) => warn!(file_id = %file.id, "Blob was already gone"),
            Err(e) => warn!(file_id = %file.id, error = %e, "Failed to delete blob"),
        }
    }

    /// Register a new document whose main file is already stored.
    pub fn create_document(
        &self,
        order_ref: &str,
        main_file: FileRef,
        actor: &Actor,
    ) -> Result<Document> {
        actor.ensure(Capability::RegisterDocument)?;

        let document = Document::register(order_ref, main_file, actor.id)?;
        self.with_lock(&document.order_ref, || self.repository.insert(&document))?;

        info!(
            order_ref = %document.order_ref,
            document_id = %document.id,
            actor = actor.id,
            "Document registered"
        );
        Ok(document)
    }

    /// Upload the main file, then register the document. The upload is
    /// rolled back if registration fails.
    pub fn register_document(
        &self,
        order_ref: &str,
        bytes: &[u8],
        file_name: &str,
        actor: &Actor,
    ) -> Result<Document> {
        actor.ensure(Capability::RegisterDocument)?;
        let order_ref = normalize_order_ref(order_ref)?;
        if self.repository.get_by_order_ref(&order_ref)?.is_some() {
            return Err(WorkflowError::ValidationConflict(format!(
                "order reference {order_ref} is already registered"
            )));
        }

        let main_file = self.blobs.upload(bytes, file_name)?;
        self.create_document(&order_ref, main_file.clone(), actor)
            .inspect_err(|_| self.discard_blob(&main_file))
    }

    /// Attach an already stored file to `area`.
    pub fn attach(
        &self,
        order_ref: &str,
        area: StageArea,
        file: FileRef,
        actor: &Actor,
        is_new_version: bool,
    ) -> Result<Document> {
        actor.ensure(Capability::Attach(area))?;

        let file_name = file.name.clone();
        let stage_order = self.config.stage_order;
        let (document, ()) = self.update_document(order_ref, |doc| {
            doc.apply_attachment(area, file, actor.id, is_new_version, stage_order)
        })?;

        info!(
            order_ref = %document.order_ref,
            %area,
            file = %file_name,
            is_new_version,
            state = %document.state,
            actor = actor.id,
            "Attachment stored"
        );
        Ok(document)
    }

    /// Upload `bytes` and attach the result. Nothing is recorded unless the
    /// upload succeeds, and the upload is rolled back if the attach fails.
    pub fn attach_upload(
        &self,
        order_ref: &str,
        area: StageArea,
        bytes: &[u8],
        file_name: &str,
        actor: &Actor,
        is_new_version: bool,
    ) -> Result<Document> {
        actor.ensure(Capability::Attach(area))?;
        self.load(&normalize_order_ref(order_ref)?)?;

        let file = self.blobs.upload(bytes, file_name)?;
        self.attach(order_ref, area, file.clone(), actor, is_new_version)
            .inspect_err(|_| self.discard_blob(&file))
    }

    /// Remove one attachment version by file id. The stored file is deleted
    /// after the removal has been recorded.
    pub fn remove_attachment(
        &self,
        order_ref: &str,
        area: StageArea,
        file: &FileRef,
        actor: &Actor,
    ) -> Result<Document> {
        actor.ensure(Capability::RemoveAttachment(area))?;

        let (document, removed) = self.update_document(order_ref, |doc| {
            doc.apply_removal(area, &file.id, actor.id)
        })?;
        if !document.references(&removed.id) {
            self.discard_blob(&removed);
        }

        info!(
            order_ref = %document.order_ref,
            %area,
            file = %removed.name,
            actor = actor.id,
            "Attachment removed"
        );
        Ok(document)
    }

    pub fn set_delivery_state(
        &self,
        order_ref: &str,
        delivery_state: DeliveryState,
        actor: &Actor,
    ) -> Result<Document> {
        actor.ensure(Capability::UpdateDeliveryState)?;

        let requires_completion = self.config.delivery_requires_completion;
        let (document, ()) = self.update_document(order_ref, |doc| {
            doc.apply_delivery_state(delivery_state, actor.id, requires_completion)
        })?;

        info!(
            order_ref = %document.order_ref,
            %delivery_state,
            actor = actor.id,
            "Delivery status updated"
        );
        Ok(document)
    }

    /// Delete a document with its history, and every file it references.
    /// Returns `false` when no such document exists.
    pub fn delete_document(&self, order_ref: &str, actor: &Actor) -> Result<bool> {
        actor.ensure(Capability::DeleteOrder)?;

        let order_ref = normalize_order_ref(order_ref)?;
        let deleted = self.with_lock(&order_ref, || {
            match self.repository.get_by_order_ref(&order_ref)? {
                Some(document) => self.repository.delete(&document.id),
                None => Ok(None),
            }
        })?;
        let Some(document) = deleted else {
            return Ok(false);
        };

        for file in document.file_refs() {
            self.discard_blob(file);
        }

        info!(
            %order_ref,
            document_id = %document.id,
            actor = actor.id,
            "Document deleted"
        );
        Ok(true)
    }

    pub fn get_by_order_ref(&self, order_ref: &str) -> Result<Document> {
        self.load(&normalize_order_ref(order_ref)?)
    }

    /// Documents the actor may see, oldest first.
    pub fn list_documents(&self, actor: &Actor) -> Result<Vec<Document>> {
        let visibility = Visibility::for_actor(actor, self.config.visibility);
        let documents: Vec<_> = self
            .repository
            .list()?
            .into_iter()
            .filter(|d| visibility.admits(d))
            .collect();

        debug!(actor = actor.id, ?visibility, count = documents.len(), "Listed documents");
        Ok(documents)
    }

    pub fn history(&self, order_ref: &str) -> Result<Vec<AuditEvent>> {
        Ok(self.get_by_order_ref(order_ref)?.history.events().to_vec())
    }

    pub fn latest_attachment(&self, order_ref: &str, area: StageArea) -> Result<Option<FileRef>> {
        Ok(self.get_by_order_ref(order_ref)?.latest(area).cloned())
    }

    pub fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>> {
        self.blobs.fetch(file_id)
    }

    pub fn search(&self, actor: &Actor, query: &SearchQuery) -> Result<Vec<Document>> {
        actor.ensure(Capability::AccessAny(View::Search))?;

        Ok(self
            .list_documents(actor)?
            .into_iter()
            .filter(|d| query.matches(d))
            .collect())
    }

    pub fn summary(&self, actor: &Actor) -> Result<Summary> {
        actor.ensure(Capability::AccessAny(View::Reports))?;

        Ok(Summary::from_documents(&self.list_documents(actor)?))
    }

    /// Advanced summary, optionally narrowed to the documents one actor
    /// registered. Narrowing by creator needs the Sales advanced reports flag.
    pub fn summary_for(&self, actor: &Actor, created_by: Option<ActorId>) -> Result<Summary> {
        actor.ensure(Capability::AnyAdvancedReports)?;
        if created_by.is_some() {
            actor.ensure(Capability::AdvancedReports(Area::Sales))?;
        }

        let documents = self.list_documents(actor)?;
        Ok(Summary::from_documents(
            documents
                .iter()
                .filter(|d| created_by.is_none_or(|id| d.created_by == id)),
        ))
    }

    /// Personal counts over the documents the actor can see.
    pub fn task_report(&self, actor: &Actor) -> Result<TaskReport> {
        actor.ensure(Capability::AccessAny(View::Reports))?;

        Ok(TaskReport::for_actor(&self.list_documents(actor)?, actor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::MemoryBlobStore;
    use crate::permission::{Permission, PermissionSet};
    use crate::repository::MemoryRepository;
    use crate::state::DocumentState;

    type MemoryService = WorkflowService<MemoryRepository, MemoryBlobStore>;

    fn service() -> MemoryService {
        WorkflowService::new(
            MemoryRepository::new(),
            MemoryBlobStore::new(),
            WorkflowConfig::default(),
        )
    }

    fn actor(id: u64, permissions: &[Permission]) -> Actor {
        Actor::new(id, permissions.iter().copied().collect::<PermissionSet>())
    }

    #[test]
    fn create_and_attach_through_the_service() {
        let service = service();
        let sales = actor(1, &[Permission::RegisterDocument]);
        let purchasing = actor(2, &[Permission::Attach(StageArea::Purchasing)]);

        let doc = service
            .register_document("OC-1", b"main", "A.pdf", &sales)
            .unwrap();
        assert_eq!(doc.state, DocumentState::PendingPurchasing);

        let doc = service
            .attach_upload("OC-1", StageArea::Purchasing, b"quote", "B.pdf", &purchasing, false)
            .unwrap();
        assert_eq!(doc.state, DocumentState::PendingBilling);
        assert_eq!(service.blobs().len(), 2);
        assert_eq!(
            service
                .latest_attachment("OC-1", StageArea::Purchasing)
                .unwrap()
                .map(|f| f.name),
            Some("B.pdf".to_string())
        );
    }

    #[test]
    fn failed_attach_rolls_back_the_upload() {
        let service = service();
        let sales = actor(1, &[Permission::RegisterDocument]);
        let operations = actor(3, &[Permission::Attach(StageArea::Operations)]);
        service
            .register_document("OC-1", b"main", "A.pdf", &sales)
            .unwrap();

        let err = service
            .attach_upload("OC-1", StageArea::Operations, b"x", "C.pdf", &operations, false)
            .unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(service.blobs().len(), 1);
        assert_eq!(service.history("OC-1").unwrap().len(), 1);
    }

    #[test]
    fn attach_upload_to_unknown_order_uploads_nothing() {
        let service = service();
        let purchasing = actor(2, &[Permission::Attach(StageArea::Purchasing)]);

        let err = service
            .attach_upload("OC-404", StageArea::Purchasing, b"x", "B.pdf", &purchasing, false)
            .unwrap_err();

        assert!(err.is_not_found());
        assert!(service.blobs().is_empty());
    }

    #[test]
    fn duplicate_registration_keeps_the_first_upload_only() {
        let service = service();
        let sales = actor(1, &[Permission::RegisterDocument]);
        service
            .register_document("OC-1", b"main", "A.pdf", &sales)
            .unwrap();

        let err = service
            .register_document(" OC-1 ", b"other", "Z.pdf", &sales)
            .unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(service.blobs().len(), 1);
        assert_eq!(service.get_by_order_ref("OC-1").unwrap().main_file.name, "A.pdf");
    }

    fn lock_entries(service: &MemoryService) -> usize {
        service.locks.lock().unwrap().len()
    }

    #[test]
    fn lock_table_keeps_no_idle_entries() {
        let service = service();
        let admin = actor(1, &Permission::all());
        let file = FileRef::new("file_x", "x.pdf");

        for i in 0..1000 {
            let err = service
                .attach(&format!("OC-NOPE-{i}"), StageArea::Purchasing, file.clone(), &admin, false)
                .unwrap_err();
            assert!(err.is_not_found());
        }
        assert_eq!(lock_entries(&service), 0);

        service
            .register_document("OC-1", b"main", "A.pdf", &admin)
            .unwrap();
        service
            .attach_upload("OC-1", StageArea::Purchasing, b"q", "B.pdf", &admin, false)
            .unwrap();
        assert_eq!(lock_entries(&service), 0);

        assert!(service.delete_document("OC-1", &admin).unwrap());
        assert!(!service.delete_document("OC-1", &admin).unwrap());
        assert_eq!(lock_entries(&service), 0);
    }

    #[test]
    fn removal_keeps_a_blob_the_document_still_references() {
        let service = service();
        let admin = actor(1, &Permission::all());
        let mut doc = service
            .register_document("OC-1", b"main", "A.pdf", &admin)
            .unwrap();
        let main = doc.main_file.clone();

        // a row holding the main file twice, as rows stored without the attach check could
        doc.attachments.append(StageArea::Purchasing, main.clone());
        service.repository.put(&doc).unwrap();

        let doc = service
            .remove_attachment("OC-1", StageArea::Purchasing, &main, &admin)
            .unwrap();
        assert!(doc.attachments.is_empty(StageArea::Purchasing));
        assert_eq!(service.fetch_file(&main.id).unwrap(), b"main");
    }

    #[test]
    fn advanced_summary_gates_the_creator_filter() {
        let service = service();
        let admin = actor(1, &Permission::all());
        let sales = actor(2, &[Permission::RegisterDocument]);
        let billing_lead = actor(3, &[Permission::AdvancedReports(Area::Billing)]);

        service.register_document("OC-1", b"m", "A.pdf", &sales).unwrap();
        service.register_document("OC-2", b"m", "A.pdf", &admin).unwrap();

        assert_eq!(service.summary_for(&admin, None).unwrap().total, 2);
        assert_eq!(service.summary_for(&admin, Some(2)).unwrap().total, 1);
        assert_eq!(service.summary_for(&admin, Some(99)).unwrap().total, 0);

        assert_eq!(service.summary_for(&billing_lead, None).unwrap().total, 2);
        assert!(matches!(
            service.summary_for(&billing_lead, Some(2)),
            Err(WorkflowError::PermissionDenied {
                capability: Capability::AdvancedReports(Area::Sales),
                ..
            })
        ));
        assert!(
            service
                .summary_for(&sales, None)
                .unwrap_err()
                .is_permission_denied()
        );
    }

    #[test]
    fn task_report_through_the_service() {
        let service = service();
        let sales = actor(
            1,
            &[
                Permission::RegisterDocument,
                Permission::Access(View::Reports, Area::Sales),
            ],
        );
        let purchasing = actor(
            2,
            &[
                Permission::Attach(StageArea::Purchasing),
                Permission::Access(View::Reports, Area::Purchasing),
            ],
        );

        service.register_document("OC-1", b"m", "A.pdf", &sales).unwrap();
        service.register_document("OC-2", b"m", "A.pdf", &sales).unwrap();

        let report = service.task_report(&purchasing).unwrap();
        assert_eq!(report.pending_for_my_areas, 2);
        assert_eq!(report.attached_by_me, 0);

        service
            .attach_upload("OC-1", StageArea::Purchasing, b"q", "B.pdf", &purchasing, false)
            .unwrap();
        let report = service.task_report(&purchasing).unwrap();
        assert_eq!(report.pending_for_my_areas, 1);
        assert_eq!(report.attached_by_me, 1);

        let report = service.task_report(&sales).unwrap();
        assert_eq!((report.own_completed, report.own_pending), (0, 2));

        assert!(
            service
                .task_report(&actor(3, &[Permission::RegisterDocument]))
                .unwrap_err()
                .is_permission_denied()
        );
    }
}
