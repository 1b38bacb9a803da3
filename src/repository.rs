//! Document storage behind a small repository interface.
//!
//! Reads always hand back owned snapshots; nothing returned from a
//! repository aliases stored state.
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use sled::Transactional;
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionResult};

use crate::document::Document;
use crate::error::{Result, WorkflowError};

pub const DOCUMENTS_TREE: &str = "documents";
pub const ORDER_REFS_TREE: &str = "order_refs";

pub trait DocumentRepository: Send + Sync {
    fn get(&self, id: &str) -> Result<Option<Document>>;

    fn get_by_order_ref(&self, order_ref: &str) -> Result<Option<Document>>;

    /// Stores a new document. Fails with `ValidationConflict` if another
    /// document already holds the same order reference.
    fn insert(&self, document: &Document) -> Result<()>;

    /// Overwrites an existing document row.
    fn put(&self, document: &Document) -> Result<()>;

    /// Removes a document and its order-reference entry, returning what was stored.
    fn delete(&self, id: &str) -> Result<Option<Document>>;

    /// All documents, oldest first.
    fn list(&self) -> Result<Vec<Document>>;
}

fn duplicate(order_ref: &str) -> WorkflowError {
    WorkflowError::ValidationConflict(format!("order reference {order_ref} is already registered"))
}

fn sort_by_creation(documents: &mut [Document]) {
    documents.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

fn flatten<T>(result: TransactionResult<T, WorkflowError>) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(TransactionError::Abort(e)) => Err(e),
        Err(TransactionError::Storage(e)) => Err(e.into()),
    }
}

/// One CBOR row per document keyed by id, plus an order-reference index.
/// Rows and index entries change together inside sled transactions.
#[derive(Clone)]
pub struct SledRepository {
    documents: sled::Tree,
    order_refs: sled::Tree,
}

impl SledRepository {
    pub fn new(db: &sled::Db) -> Result<Self> {
        Ok(Self {
            documents: db.open_tree(DOCUMENTS_TREE)?,
            order_refs: db.open_tree(ORDER_REFS_TREE)?,
        })
    }
}

impl DocumentRepository for SledRepository {
    fn get(&self, id: &str) -> Result<Option<Document>> {
        self.documents
            .get(id.as_bytes())?
            .map(|bytes| Document::decode(&bytes))
            .transpose()
    }

    fn get_by_order_ref(&self, order_ref: &str) -> Result<Option<Document>> {
        match self.order_refs.get(order_ref.as_bytes())? {
            Some(id) => self
                .documents
                .get(id)?
                .map(|bytes| Document::decode(&bytes))
                .transpose(),
            None => Ok(None),
        }
    }

    fn insert(&self, document: &Document) -> Result<()> {
        let row = document.encode()?;

        let result: TransactionResult<(), WorkflowError> = (&self.documents, &self.order_refs)
            .transaction(|(documents, order_refs)| {
                if order_refs.get(document.order_ref.as_bytes())?.is_some() {
                    return Err(ConflictableTransactionError::Abort(duplicate(
                        &document.order_ref,
                    )));
                }
                order_refs.insert(document.order_ref.as_bytes(), document.id.as_bytes())?;
                documents.insert(document.id.as_bytes(), row.clone())?;
                Ok(())
            });

        flatten(result)
    }

    fn put(&self, document: &Document) -> Result<()> {
        self.documents
            .insert(document.id.as_bytes(), document.encode()?)?;
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<Option<Document>> {
        let result: TransactionResult<Option<Document>, WorkflowError> =
            (&self.documents, &self.order_refs).transaction(|(documents, order_refs)| {
                let Some(row) = documents.remove(id.as_bytes())? else {
                    return Ok(None);
                };
                let document = Document::decode(&row).map_err(ConflictableTransactionError::Abort)?;
                order_refs.remove(document.order_ref.as_bytes())?;
                Ok(Some(document))
            });

        flatten(result)
    }

    fn list(&self) -> Result<Vec<Document>> {
        let mut documents = self
            .documents
            .iter()
            .values()
            .map(|row| Document::decode(&row?))
            .collect::<Result<Vec<_>>>()?;
        sort_by_creation(&mut documents);
        Ok(documents)
    }
}

#[derive(Default)]
struct MemoryState {
    documents: HashMap<String, Document>,
    order_refs: HashMap<String, String>,
}

/// In-memory repository for tests and embedding without a database.
#[derive(Default)]
pub struct MemoryRepository {
    state: RwLock<MemoryState>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentRepository for MemoryRepository {
    fn get(&self, id: &str) -> Result<Option<Document>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Ok(state.documents.get(id).cloned())
    }

    fn get_by_order_ref(&self, order_ref: &str) -> Result<Option<Document>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Ok(state
            .order_refs
            .get(order_ref)
            .and_then(|id| state.documents.get(id))
            .cloned())
    }

    fn insert(&self, document: &Document) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.order_refs.contains_key(&document.order_ref) {
            return Err(duplicate(&document.order_ref));
        }
        state
            .order_refs
            .insert(document.order_ref.clone(), document.id.clone());
        state
            .documents
            .insert(document.id.clone(), document.clone());
        Ok(())
    }

    fn put(&self, document: &Document) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state
            .documents
            .insert(document.id.clone(), document.clone());
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<Option<Document>> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let removed = state.documents.remove(id);
        if let Some(document) = &removed {
            state.order_refs.remove(&document.order_ref);
        }
        Ok(removed)
    }

    fn list(&self) -> Result<Vec<Document>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let mut documents: Vec<_> = state.documents.values().cloned().collect();
        sort_by_creation(&mut documents);
        Ok(documents)
    }
}
