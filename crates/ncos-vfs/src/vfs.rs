//! The VFS service.
//!
//! `Vfs` owns the live node map (the single-writer, in-memory image of the
//! metadata store), a content overlay used when the content store refuses a
//! write, and the search index. All methods take `&self`; no `RefCell`
//! borrow is held across an `.await`.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::rc::Rc;

use ncos_bus::{
    channels, now_millis, AuditEntry, AuditOutcome, ErrorReport, EventBus, FsChange, KernelEvent,
};

use crate::dir_store::DirStore;
use crate::error::{StorageErrorKind, VfsError};
use crate::index::{SearchHit, SearchIndex};
use crate::memory::MemoryStore;
use crate::storage::StorageUsage;
use crate::store::{ContentStore, MetadataStore};
use crate::types::{
    guess_mime, validate_name, ExternalHandle, FileEntry, Node, NodeId, ROOT_ID,
};

/// Virtual filesystem over a metadata store and a content store.
pub struct Vfs {
    nodes: RefCell<BTreeMap<NodeId, Node>>,
    /// Content the content store failed to accept, kept for this session
    overlay: RefCell<HashMap<NodeId, Vec<u8>>>,
    index: RefCell<SearchIndex>,
    meta: Rc<dyn MetadataStore>,
    content: Rc<dyn ContentStore>,
    bus: EventBus,
    storage_failures: Cell<u64>,
}

impl Vfs {
    /// Create a VFS over explicit stores. Call [`Vfs::load`] before use.
    pub fn new(meta: Rc<dyn MetadataStore>, content: Rc<dyn ContentStore>, bus: EventBus) -> Self {
        Self {
            nodes: RefCell::new(BTreeMap::new()),
            overlay: RefCell::new(HashMap::new()),
            index: RefCell::new(SearchIndex::new()),
            meta,
            content,
            bus,
            storage_failures: Cell::new(0),
        }
    }

    /// A VFS backed by a fresh [`MemoryStore`].
    pub async fn in_memory(bus: EventBus) -> Self {
        let store = Rc::new(MemoryStore::new());
        let meta: Rc<dyn MetadataStore> = store.clone();
        let content: Rc<dyn ContentStore> = store;
        let vfs = Self::new(meta, content, bus);
        vfs.load().await;
        vfs
    }

    /// A VFS backed by a [`DirStore`] rooted at `root`.
    pub async fn on_disk(root: impl Into<PathBuf>, bus: EventBus) -> Result<Self, VfsError> {
        let store = Rc::new(DirStore::open(root).await?);
        let meta: Rc<dyn MetadataStore> = store.clone();
        let content: Rc<dyn ContentStore> = store;
        let vfs = Self::new(meta, content, bus);
        vfs.load().await;
        Ok(vfs)
    }

    /// Load the node map from the metadata store, recreate root if absent
    /// and rebuild the search index. Returns the number of live nodes.
    ///
    /// An unreadable metadata store is reported and the session starts with
    /// an empty tree.
    pub async fn load(&self) -> usize {
        let loaded = match self.meta.load_all().await {
            Ok(nodes) => nodes,
            Err(e) => {
                self.storage_failed("load", ROOT_ID, &e);
                Vec::new()
            }
        };

        {
            let mut map = self.nodes.borrow_mut();
            map.clear();
            map.extend(loaded.into_iter().map(|n| (n.id.clone(), n)));
        }
        self.ensure_root().await;
        self.rebuild_index().await;

        let count = self.nodes.borrow().len();
        log::info!(target: "vfs", "loaded {} nodes", count);
        count
    }

    async fn ensure_root(&self) {
        if self.nodes.borrow().contains_key(ROOT_ID) {
            return;
        }
        let root = Node::root(now_millis());
        self.nodes
            .borrow_mut()
            .insert(ROOT_ID.to_string(), root.clone());
        self.persist_node(&root).await;
        log::debug!(target: "vfs", "created root");
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Direct children of `parent_id`, sorted by name.
    pub fn list_nodes(&self, parent_id: &str) -> Result<Vec<Node>, VfsError> {
        let map = self.nodes.borrow();
        if !map.contains_key(parent_id) {
            return Err(VfsError::NotFound(parent_id.to_string()));
        }
        let mut children: Vec<Node> = map
            .values()
            .filter(|n| n.parent_id.as_deref() == Some(parent_id))
            .cloned()
            .collect();
        children.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(children)
    }

    pub fn get_node(&self, id: &str) -> Result<Node, VfsError> {
        self.nodes
            .borrow()
            .get(id)
            .cloned()
            .ok_or_else(|| VfsError::NotFound(id.to_string()))
    }

    pub fn exists(&self, id: &str) -> bool {
        self.nodes.borrow().contains_key(id)
    }

    /// Every live node, ordered by id.
    pub fn nodes(&self) -> Vec<Node> {
        self.nodes.borrow().values().cloned().collect()
    }

    /// Every mount node.
    pub fn mounts(&self) -> Vec<Node> {
        self.nodes
            .borrow()
            .values()
            .filter(|n| n.is_mount())
            .cloned()
            .collect()
    }

    /// Search names and content excerpts.
    pub fn search(&self, query: &str) -> Vec<SearchHit> {
        self.index.borrow().search(query)
    }

    pub fn usage(&self) -> StorageUsage {
        StorageUsage::from_nodes(self.nodes.borrow().values())
    }

    /// Number of store operations that failed this session.
    pub fn storage_failures(&self) -> u64 {
        self.storage_failures.get()
    }

    /// Metadata plus content. Folders and mounts carry no content.
    ///
    /// Missing or unreadable content is logged and read as empty.
    pub async fn read_file(&self, id: &str) -> Result<FileEntry, VfsError> {
        let node = self.get_node(id)?;
        if !node.is_file() {
            return Ok(FileEntry {
                node,
                content: None,
            });
        }
        let content = self.load_content(id).await;
        Ok(FileEntry {
            node,
            content: Some(content),
        })
    }

    async fn load_content(&self, id: &str) -> Vec<u8> {
        if let Some(bytes) = self.overlay.borrow().get(id) {
            return bytes.clone();
        }
        match self.content.read(id).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => {
                log::warn!(target: "vfs", "content missing for {}, reading as empty", id);
                Vec::new()
            }
            Err(e) => {
                log::warn!(target: "vfs", "content unreadable for {}, reading as empty", id);
                self.storage_failed("read content", id, &e);
                Vec::new()
            }
        }
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Create a file under `parent_id`. Sibling names need not be unique.
    pub async fn create_file(
        &self,
        parent_id: &str,
        name: &str,
        content: &[u8],
    ) -> Result<Node, VfsError> {
        validate_name(name)?;
        self.check_container(parent_id)?;

        let node = Node::file(
            allocate_id("node"),
            parent_id.to_string(),
            name.to_string(),
            content.len() as u64,
            now_millis(),
        );
        self.nodes
            .borrow_mut()
            .insert(node.id.clone(), node.clone());
        self.index.borrow_mut().add(&node, content);

        self.persist_node(&node).await;
        self.persist_content(&node.id, content).await;

        log::debug!(target: "vfs", "created file {} ({})", node.id, node.name);
        self.notify(FsChange::Created, vec![node.id.clone()]);
        Ok(node)
    }

    /// Create a folder under `parent_id`.
    pub async fn create_folder(&self, parent_id: &str, name: &str) -> Result<Node, VfsError> {
        validate_name(name)?;
        self.check_container(parent_id)?;

        let node = Node::folder(
            allocate_id("node"),
            Some(parent_id.to_string()),
            name.to_string(),
            now_millis(),
        );
        self.nodes
            .borrow_mut()
            .insert(node.id.clone(), node.clone());
        self.index.borrow_mut().add(&node, &[]);

        self.persist_node(&node).await;

        log::debug!(target: "vfs", "created folder {} ({})", node.id, node.name);
        self.notify(FsChange::Created, vec![node.id.clone()]);
        Ok(node)
    }

    /// Overwrite a file's content.
    pub async fn update_file(&self, id: &str, content: &[u8]) -> Result<Node, VfsError> {
        let node = {
            let mut map = self.nodes.borrow_mut();
            let node = map
                .get_mut(id)
                .ok_or_else(|| VfsError::NotFound(id.to_string()))?;
            if !node.is_file() {
                return Err(VfsError::NotAFile(id.to_string()));
            }
            node.size = content.len() as u64;
            node.modified = now_millis();
            node.clone()
        };
        self.index.borrow_mut().add(&node, content);

        self.persist_content(id, content).await;
        self.persist_node(&node).await;

        self.notify(FsChange::Updated, vec![node.id.clone()]);
        Ok(node)
    }

    /// Delete a node. Folders and mounts are deleted with all descendants.
    ///
    /// Returns every removed id, descendants before their parents.
    pub async fn delete_node(&self, id: &str) -> Result<Vec<NodeId>, VfsError> {
        if id == ROOT_ID {
            return Err(VfsError::RootProtected);
        }
        if !self.exists(id) {
            return Err(VfsError::NotFound(id.to_string()));
        }

        let removed = self.remove_subtree(id).await;
        log::debug!(target: "vfs", "deleted {} ({} nodes)", id, removed.len());
        self.notify(FsChange::Deleted, removed.clone());
        Ok(removed)
    }

    /// Reparent a node. Content is not touched.
    pub async fn move_node(&self, id: &str, new_parent_id: &str) -> Result<Node, VfsError> {
        if id == ROOT_ID {
            return Err(VfsError::RootProtected);
        }
        self.get_node(id)?;
        self.check_container(new_parent_id)?;
        if id == new_parent_id || self.is_descendant(new_parent_id, id) {
            return Err(VfsError::InvalidMove(format!(
                "{} cannot be moved into {}",
                id, new_parent_id
            )));
        }

        let node = {
            let mut map = self.nodes.borrow_mut();
            let node = map
                .get_mut(id)
                .ok_or_else(|| VfsError::NotFound(id.to_string()))?;
            node.parent_id = Some(new_parent_id.to_string());
            node.modified = now_millis();
            node.clone()
        };
        self.persist_node(&node).await;

        self.notify(FsChange::Moved, vec![node.id.clone()]);
        Ok(node)
    }

    /// Rename a node. Files get their content type re-guessed.
    pub async fn rename_node(&self, id: &str, name: &str) -> Result<Node, VfsError> {
        if id == ROOT_ID {
            return Err(VfsError::RootProtected);
        }
        validate_name(name)?;

        let node = {
            let mut map = self.nodes.borrow_mut();
            let node = map
                .get_mut(id)
                .ok_or_else(|| VfsError::NotFound(id.to_string()))?;
            node.name = name.to_string();
            if node.is_file() {
                node.mime = Some(guess_mime(name).to_string());
            }
            node.modified = now_millis();
            node.clone()
        };
        self.index.borrow_mut().rename(id, name);
        self.persist_node(&node).await;

        self.notify(FsChange::Renamed, vec![node.id.clone()]);
        Ok(node)
    }

    /// Attach external storage as a mount node under root.
    ///
    /// Only the reference is stored; nothing is copied.
    pub async fn mount_drive(&self, handle: ExternalHandle) -> Result<Node, VfsError> {
        validate_name(&handle.name)?;

        let node = Node::mount(allocate_id("mount"), handle, now_millis());
        self.nodes
            .borrow_mut()
            .insert(node.id.clone(), node.clone());
        self.index.borrow_mut().add(&node, &[]);
        self.persist_node(&node).await;

        log::info!(target: "vfs", "mounted {} as {}", node.name, node.id);
        self.notify(FsChange::Mounted, vec![node.id.clone()]);
        Ok(node)
    }

    /// Detach a mount and drop everything created beneath it.
    pub async fn unmount_drive(&self, id: &str) -> Result<Vec<NodeId>, VfsError> {
        let node = self.get_node(id)?;
        if !node.is_mount() {
            return Err(VfsError::NotAMount(id.to_string()));
        }

        let removed = self.remove_subtree(id).await;
        log::info!(target: "vfs", "unmounted {}", id);
        self.notify(FsChange::Unmounted, removed.clone());
        Ok(removed)
    }

    /// Rebuild the search index from the live node map. Returns the number
    /// of indexed nodes.
    pub async fn rebuild_index(&self) -> usize {
        let nodes = self.nodes();
        let mut fresh = SearchIndex::new();
        for node in &nodes {
            let content = if node.is_file() {
                self.load_content(&node.id).await
            } else {
                Vec::new()
            };
            fresh.add(node, &content);
        }
        let count = fresh.len();
        *self.index.borrow_mut() = fresh;
        count
    }

    /// Replace the whole tree with `nodes` (import / snapshot restore).
    ///
    /// Content of files that survive the replacement is kept; content of
    /// dropped files is deleted.
    pub async fn replace_all(&self, nodes: Vec<Node>) {
        let incoming: BTreeMap<NodeId, Node> =
            nodes.into_iter().map(|n| (n.id.clone(), n)).collect();
        let dropped: Vec<NodeId> = self
            .nodes
            .borrow()
            .keys()
            .filter(|id| !incoming.contains_key(*id))
            .cloned()
            .collect();

        for id in &dropped {
            self.overlay.borrow_mut().remove(id);
        }
        *self.nodes.borrow_mut() = incoming;

        if let Err(e) = self.meta.clear().await {
            self.storage_failed("clear", ROOT_ID, &e);
        }
        for node in self.nodes() {
            self.persist_node(&node).await;
        }
        for id in &dropped {
            if let Err(e) = self.content.delete(id).await {
                self.storage_failed("delete content", id, &e);
            }
        }

        self.ensure_root().await;
        self.rebuild_index().await;

        let ids = self.nodes.borrow().keys().cloned().collect();
        self.notify(FsChange::Updated, ids);
    }

    /// Clear both stores, the index and the overlay, then recreate root.
    pub async fn wipe(&self) {
        self.nodes.borrow_mut().clear();
        self.overlay.borrow_mut().clear();
        self.index.borrow_mut().clear();

        if let Err(e) = self.meta.clear().await {
            self.storage_failed("clear", ROOT_ID, &e);
        }
        if let Err(e) = self.content.clear().await {
            self.storage_failed("clear content", ROOT_ID, &e);
        }
        self.ensure_root().await;
        self.rebuild_index().await;

        log::warn!(target: "vfs", "filesystem wiped");
        self.notify(FsChange::Wiped, Vec::new());
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn check_container(&self, id: &str) -> Result<(), VfsError> {
        match self.nodes.borrow().get(id) {
            Some(n) if n.is_folder() || n.is_mount() => Ok(()),
            Some(_) => Err(VfsError::NotADirectory(id.to_string())),
            None => Err(VfsError::NotFound(id.to_string())),
        }
    }

    /// Whether `candidate` lies beneath `ancestor`.
    fn is_descendant(&self, candidate: &str, ancestor: &str) -> bool {
        let map = self.nodes.borrow();
        let mut current = map.get(candidate).and_then(|n| n.parent_id.clone());
        // Bounded walk so a corrupt parent chain cannot loop forever
        for _ in 0..=map.len() {
            let Some(id) = current else {
                return false;
            };
            if id == ancestor {
                return true;
            }
            current = map.get(&id).and_then(|n| n.parent_id.clone());
        }
        false
    }

    /// Ids of `id` and all its descendants, children before parents.
    fn subtree(&self, id: &str) -> Vec<NodeId> {
        let map = self.nodes.borrow();
        let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
        for node in map.values() {
            if let Some(parent) = node.parent_id.as_deref() {
                children.entry(parent).or_default().push(node.id.as_str());
            }
        }

        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if order.len() > map.len() {
                break;
            }
            order.push(current.to_string());
            if let Some(kids) = children.get(current) {
                stack.extend(kids.iter().copied());
            }
        }
        order.reverse();
        order
    }

    async fn remove_subtree(&self, id: &str) -> Vec<NodeId> {
        let ids = self.subtree(id);
        {
            let mut map = self.nodes.borrow_mut();
            let mut overlay = self.overlay.borrow_mut();
            let mut index = self.index.borrow_mut();
            for id in &ids {
                map.remove(id);
                overlay.remove(id);
                index.remove(id);
            }
        }

        for id in &ids {
            if let Err(e) = self.content.delete(id).await {
                self.storage_failed("delete content", id, &e);
            }
            if let Err(e) = self.meta.delete(id).await {
                self.storage_failed("delete", id, &e);
            }
        }
        ids
    }

    async fn persist_node(&self, node: &Node) {
        if let Err(e) = self.meta.put(node).await {
            self.storage_failed("write metadata", &node.id, &e);
        }
    }

    async fn persist_content(&self, id: &str, content: &[u8]) {
        match self.content.write(id, content).await {
            Ok(()) => {
                self.overlay.borrow_mut().remove(id);
            }
            Err(e) => {
                self.overlay
                    .borrow_mut()
                    .insert(id.to_string(), content.to_vec());
                self.storage_failed("write content", id, &e);
            }
        }
    }

    /// Log, audit and publish a store failure. The live map stays authoritative.
    fn storage_failed(&self, op: &str, id: &str, err: &VfsError) {
        self.storage_failures.set(self.storage_failures.get() + 1);
        log::error!(target: "vfs", "{} failed for {}: {}", op, id, err);

        let details = match err {
            VfsError::Storage {
                kind: StorageErrorKind::Unavailable,
                ..
            } => "store unavailable, keeping in memory".to_string(),
            other => other.to_string(),
        };
        self.bus.record_audit(
            AuditEntry::new(format!("vfs.{}", op.replace(' ', "_")), "vfs", id, AuditOutcome::Error)
                .with_details(details),
        );
        self.bus.publish(
            channels::ERR_STORAGE,
            KernelEvent::Error(ErrorReport::new("vfs", format!("{} failed for {}: {}", op, id, err))),
        );
    }

    fn notify(&self, change: FsChange, ids: Vec<NodeId>) {
        self.bus
            .publish(channels::FS_CHANGE, KernelEvent::FsChanged { change, ids });
    }
}

fn allocate_id(prefix: &str) -> NodeId {
    format!("{}-{}", prefix, uuid::Uuid::new_v4().simple())
}
