use crate::db::TrieDb;
use crate::errors::TrieError;
use crate::nibbles::{bytes_to_nibbles, common_prefix_len, nibbles_to_bytes, Nibbles};
use crate::node::{compute_root_hash, empty_branch_children, load_node, resolve, Node, NodeRef};
use chain_crypto::Hash;
use std::rc::Rc;

/// Incremental Patricia Merkle trie. Mutations thread through a [`TrieDb`]
/// so hash-referenced subtrees are loaded lazily and only nodes that are
/// touched are re-encoded. The db handle is reference-counted rather than
/// borrowed so a `Trie` can be owned long-lived by, say, an account entry
/// without threading a lifetime parameter through every structure above it.
pub struct Trie {
    db: Rc<dyn TrieDb>,
    root: NodeRef,
}

impl Trie {
    /// Open the trie rooted at `root_hash`, or an empty trie if `None`.
    pub fn new(root_hash: Option<Hash>, db: Rc<dyn TrieDb>) -> Self {
        let root = match root_hash {
            Some(h) if h != chain_crypto::EMPTY_TRIE_ROOT => NodeRef::Hash(h),
            _ => NodeRef::Empty,
        };
        Trie { db, root }
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, TrieError> {
        get(&self.root, &bytes_to_nibbles(key), self.db.as_ref())
    }

    /// Insert `value` at `key`, or delete the key if `value` is `None` —
    /// mirrors the combined update entry point the original engine exposes.
    pub fn update(&mut self, key: &[u8], value: Option<Vec<u8>>) -> Result<(), TrieError> {
        match value {
            Some(value) => self.insert(key, value),
            None => self.delete(key),
        }
    }

    pub fn insert(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), TrieError> {
        let nibbles = bytes_to_nibbles(key);
        let root = std::mem::replace(&mut self.root, NodeRef::Empty);
        self.root = insert(root, &nibbles, value, self.db.as_ref())?;
        Ok(())
    }

    pub fn delete(&mut self, key: &[u8]) -> Result<(), TrieError> {
        let nibbles = bytes_to_nibbles(key);
        let root = std::mem::replace(&mut self.root, NodeRef::Empty);
        self.root = delete(root, &nibbles, self.db.as_ref())?;
        Ok(())
    }

    /// Root hash without persisting any pending nodes.
    pub fn hash(&self) -> Result<Hash, TrieError> {
        compute_root_hash(&self.root, None)
    }

    /// Persist every dirty node to `db` and return the new root hash. After
    /// this call the in-memory root collapses to a single hash reference.
    pub fn commit(&mut self) -> Result<Hash, TrieError> {
        let hash = compute_root_hash(&self.root, Some(self.db.as_ref()))?;
        self.root = NodeRef::Hash(hash);
        Ok(hash)
    }

    pub fn root_ref(&self) -> &NodeRef {
        &self.root
    }

    /// Every key/value pair in the trie, in key order. Used where a caller
    /// needs every leaf (e.g. replaying a block's transactions), not a
    /// single lookup.
    pub fn entries(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>, TrieError> {
        let mut out = Vec::new();
        walk(&self.root, Vec::new(), self.db.as_ref(), &mut out)?;
        Ok(out)
    }
}

fn walk(
    node_ref: &NodeRef,
    prefix: Nibbles,
    db: &dyn TrieDb,
    out: &mut Vec<(Vec<u8>, Vec<u8>)>,
) -> Result<(), TrieError> {
    match resolve(node_ref, db)? {
        None => Ok(()),
        Some(Node::Leaf(key, value)) => {
            let mut path = prefix;
            path.extend_from_slice(&key);
            out.push((nibbles_to_bytes(&path), value));
            Ok(())
        }
        Some(Node::Extension(key, child)) => {
            let mut path = prefix;
            path.extend_from_slice(&key);
            walk(&child, path, db, out)
        }
        Some(Node::Branch(children, value)) => {
            if let Some(value) = value {
                out.push((nibbles_to_bytes(&prefix), value));
            }
            for (i, child) in children.iter().enumerate() {
                let mut path = prefix.clone();
                path.push(i as u8);
                walk(child, path, db, out)?;
            }
            Ok(())
        }
    }
}

fn get(node_ref: &NodeRef, key: &[u8], db: &dyn TrieDb) -> Result<Option<Vec<u8>>, TrieError> {
    match resolve(node_ref, db)? {
        None => Ok(None),
        Some(Node::Leaf(k, v)) => Ok(if k == key { Some(v) } else { None }),
        Some(Node::Extension(prefix, child)) => {
            if key.len() >= prefix.len() && key[..prefix.len()] == prefix[..] {
                get(&child, &key[prefix.len()..], db)
            } else {
                Ok(None)
            }
        }
        Some(Node::Branch(children, value)) => {
            if key.is_empty() {
                Ok(value)
            } else {
                get(&children[key[0] as usize], &key[1..], db)
            }
        }
    }
}

fn insert(
    node_ref: NodeRef,
    key: &[u8],
    value: Vec<u8>,
    db: &dyn TrieDb,
) -> Result<NodeRef, TrieError> {
    match node_ref {
        NodeRef::Empty => Ok(NodeRef::leaf(key.to_vec(), value)),
        NodeRef::Hash(h) => {
            let node = load_node(&h, db)?;
            insert_into_node(node, key, value, db)
        }
        NodeRef::Embedded(node) => insert_into_node(*node, key, value, db),
    }
}

fn insert_into_node(
    node: Node,
    key: &[u8],
    value: Vec<u8>,
    db: &dyn TrieDb,
) -> Result<NodeRef, TrieError> {
    match node {
        Node::Leaf(existing_key, existing_value) => {
            insert_into_leaf(existing_key, existing_value, key, value)
        }
        Node::Extension(prefix, child) => insert_into_extension(prefix, child, key, value, db),
        Node::Branch(children, branch_value) => {
            insert_into_branch(children, branch_value, key, value, db)
        }
    }
}

fn insert_into_leaf(
    existing_key: Nibbles,
    existing_value: Vec<u8>,
    key: &[u8],
    value: Vec<u8>,
) -> Result<NodeRef, TrieError> {
    let common = common_prefix_len(&existing_key, key);
    if common == existing_key.len() && common == key.len() {
        return Ok(NodeRef::leaf(existing_key, value));
    }

    let mut children = empty_branch_children();
    let mut branch_value = None;

    let existing_rest = &existing_key[common..];
    if existing_rest.is_empty() {
        branch_value = Some(existing_value);
    } else {
        let idx = existing_rest[0] as usize;
        children[idx] = NodeRef::leaf(existing_rest[1..].to_vec(), existing_value);
    }

    let new_rest = &key[common..];
    if new_rest.is_empty() {
        branch_value = Some(value);
    } else {
        let idx = new_rest[0] as usize;
        children[idx] = NodeRef::leaf(new_rest[1..].to_vec(), value);
    }

    let branch = NodeRef::branch(children, branch_value);
    if common == 0 {
        Ok(branch)
    } else {
        Ok(NodeRef::extension(existing_key[..common].to_vec(), branch))
    }
}

fn insert_into_extension(
    prefix: Nibbles,
    child: NodeRef,
    key: &[u8],
    value: Vec<u8>,
    db: &dyn TrieDb,
) -> Result<NodeRef, TrieError> {
    let common = common_prefix_len(&prefix, key);
    if common == prefix.len() {
        let new_child = insert(child, &key[common..], value, db)?;
        return Ok(NodeRef::extension(prefix, new_child));
    }

    let mut children = empty_branch_children();
    let mut branch_value = None;

    let existing_rest = &prefix[common..];
    let rest = &existing_rest[1..];
    let idx = existing_rest[0] as usize;
    children[idx] = if rest.is_empty() {
        child
    } else {
        NodeRef::extension(rest.to_vec(), child)
    };

    let new_rest = &key[common..];
    if new_rest.is_empty() {
        branch_value = Some(value);
    } else {
        let idx = new_rest[0] as usize;
        children[idx] = NodeRef::leaf(new_rest[1..].to_vec(), value);
    }

    let branch = NodeRef::branch(children, branch_value);
    if common == 0 {
        Ok(branch)
    } else {
        Ok(NodeRef::extension(prefix[..common].to_vec(), branch))
    }
}

fn insert_into_branch(
    mut children: Box<[NodeRef; 16]>,
    branch_value: Option<Vec<u8>>,
    key: &[u8],
    value: Vec<u8>,
    db: &dyn TrieDb,
) -> Result<NodeRef, TrieError> {
    if key.is_empty() {
        Ok(NodeRef::branch(children, Some(value)))
    } else {
        let idx = key[0] as usize;
        let existing = std::mem::replace(&mut children[idx], NodeRef::Empty);
        children[idx] = insert(existing, &key[1..], value, db)?;
        Ok(NodeRef::branch(children, branch_value))
    }
}

fn delete(node_ref: NodeRef, key: &[u8], db: &dyn TrieDb) -> Result<NodeRef, TrieError> {
    match node_ref {
        NodeRef::Empty => Ok(NodeRef::Empty),
        NodeRef::Hash(h) => {
            let node = load_node(&h, db)?;
            delete_from_node(node, key, db)
        }
        NodeRef::Embedded(node) => delete_from_node(*node, key, db),
    }
}

fn delete_from_node(node: Node, key: &[u8], db: &dyn TrieDb) -> Result<NodeRef, TrieError> {
    match node {
        Node::Leaf(k, v) => {
            if k == key {
                Ok(NodeRef::Empty)
            } else {
                Ok(NodeRef::leaf(k, v))
            }
        }
        Node::Extension(prefix, child) => {
            if key.len() < prefix.len() || key[..prefix.len()] != prefix[..] {
                return Ok(NodeRef::extension(prefix, child));
            }
            let new_child = delete(child, &key[prefix.len()..], db)?;
            merge_after_extension_delete(prefix, new_child, db)
        }
        Node::Branch(children, value) => {
            if key.is_empty() {
                if value.is_none() {
                    return Ok(NodeRef::branch(children, value));
                }
                collapse_branch(children, None, db)
            } else {
                let idx = key[0] as usize;
                let mut children = children;
                let existing = std::mem::replace(&mut children[idx], NodeRef::Empty);
                children[idx] = delete(existing, &key[1..], db)?;
                collapse_branch(children, value, db)
            }
        }
    }
}

/// After deleting inside an extension's child, merge a now-collapsed child
/// back into a single short node where possible so extensions never point
/// at another extension or a now-empty subtree.
fn merge_after_extension_delete(
    prefix: Nibbles,
    new_child: NodeRef,
    db: &dyn TrieDb,
) -> Result<NodeRef, TrieError> {
    match new_child {
        NodeRef::Empty => Ok(NodeRef::Empty),
        other => match resolve(&other, db)? {
            Some(Node::Leaf(ck, cv)) => {
                let mut merged = prefix;
                merged.extend_from_slice(&ck);
                Ok(NodeRef::leaf(merged, cv))
            }
            Some(Node::Extension(ck, cc)) => {
                let mut merged = prefix;
                merged.extend_from_slice(&ck);
                Ok(NodeRef::extension(merged, cc))
            }
            Some(Node::Branch(bc, bv)) => Ok(NodeRef::extension(prefix, NodeRef::branch(bc, bv))),
            None => Ok(NodeRef::Empty),
        },
    }
}

/// After a branch slot changes, simplify: a branch with no children and a
/// value becomes a leaf; one with a single remaining child and no value
/// merges that child's prefix nibble in, becoming a leaf or extension.
fn collapse_branch(
    mut children: Box<[NodeRef; 16]>,
    value: Option<Vec<u8>>,
    db: &dyn TrieDb,
) -> Result<NodeRef, TrieError> {
    let mut only_idx = None;
    let mut count = 0;
    for (i, child) in children.iter().enumerate() {
        if !child.is_empty() {
            count += 1;
            only_idx = Some(i);
        }
    }

    if count == 0 {
        return match value {
            Some(v) => Ok(NodeRef::leaf(Vec::new(), v)),
            None => Ok(NodeRef::Empty),
        };
    }

    if count == 1 && value.is_none() {
        let idx = only_idx.unwrap();
        let only_child = std::mem::replace(&mut children[idx], NodeRef::Empty);
        return match resolve(&only_child, db)? {
            Some(Node::Leaf(ck, cv)) => {
                let mut merged = vec![idx as u8];
                merged.extend_from_slice(&ck);
                Ok(NodeRef::leaf(merged, cv))
            }
            Some(Node::Extension(ck, cc)) => {
                let mut merged = vec![idx as u8];
                merged.extend_from_slice(&ck);
                Ok(NodeRef::extension(merged, cc))
            }
            Some(Node::Branch(bc, bv)) => Ok(NodeRef::extension(
                vec![idx as u8],
                NodeRef::branch(bc, bv),
            )),
            None => Ok(NodeRef::Empty),
        };
    }

    Ok(NodeRef::branch(children, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::KvTrieDb;
    use chain_kv::MemoryKv;

    fn new_db() -> Rc<dyn TrieDb> {
        Rc::new(KvTrieDb::new(Rc::new(MemoryKv::new()), b"trie/"))
    }

    #[test]
    fn empty_trie_hash_is_the_well_known_constant() {
        let db = new_db();
        let trie = Trie::new(None, db);
        assert_eq!(trie.hash().unwrap(), chain_crypto::EMPTY_TRIE_ROOT);
    }

    #[test]
    fn insert_then_get_round_trips() {
        let db = new_db();
        let mut trie = Trie::new(None, db);
        trie.insert(b"alice", b"100".to_vec()).unwrap();
        trie.insert(b"bob", b"200".to_vec()).unwrap();
        assert_eq!(trie.get(b"alice").unwrap(), Some(b"100".to_vec()));
        assert_eq!(trie.get(b"bob").unwrap(), Some(b"200".to_vec()));
        assert_eq!(trie.get(b"carol").unwrap(), None);
    }

    #[test]
    fn overwrite_existing_key() {
        let db = new_db();
        let mut trie = Trie::new(None, db);
        trie.insert(b"alice", b"100".to_vec()).unwrap();
        trie.insert(b"alice", b"150".to_vec()).unwrap();
        assert_eq!(trie.get(b"alice").unwrap(), Some(b"150".to_vec()));
    }

    #[test]
    fn root_is_order_independent() {
        let mut trie_a = Trie::new(None, new_db());
        trie_a.insert(b"alice", b"100".to_vec()).unwrap();
        trie_a.insert(b"bob", b"200".to_vec()).unwrap();
        trie_a.insert(b"carol", b"300".to_vec()).unwrap();

        let mut trie_b = Trie::new(None, new_db());
        trie_b.insert(b"carol", b"300".to_vec()).unwrap();
        trie_b.insert(b"alice", b"100".to_vec()).unwrap();
        trie_b.insert(b"bob", b"200".to_vec()).unwrap();

        assert_eq!(trie_a.hash().unwrap(), trie_b.hash().unwrap());
    }

    #[test]
    fn delete_removes_key_and_collapses() {
        let db = new_db();
        let mut trie = Trie::new(None, db);
        trie.insert(b"alice", b"100".to_vec()).unwrap();
        trie.insert(b"bob", b"200".to_vec()).unwrap();
        trie.delete(b"bob").unwrap();
        assert_eq!(trie.get(b"bob").unwrap(), None);
        assert_eq!(trie.get(b"alice").unwrap(), Some(b"100".to_vec()));
    }

    #[test]
    fn delete_all_keys_returns_empty_root() {
        let db = new_db();
        let mut trie = Trie::new(None, db);
        trie.insert(b"only", b"key".to_vec()).unwrap();
        trie.delete(b"only").unwrap();
        assert_eq!(trie.hash().unwrap(), chain_crypto::EMPTY_TRIE_ROOT);
    }

    #[test]
    fn commit_then_reload_from_hash_preserves_data() {
        let db = new_db();
        let root_hash = {
            let mut trie = Trie::new(None, Rc::clone(&db));
            trie.insert(b"alice", b"100".to_vec()).unwrap();
            trie.insert(b"bob", b"200".to_vec()).unwrap();
            trie.commit().unwrap()
        };

        let reloaded = Trie::new(Some(root_hash), db);
        assert_eq!(reloaded.get(b"alice").unwrap(), Some(b"100".to_vec()));
        assert_eq!(reloaded.get(b"bob").unwrap(), Some(b"200".to_vec()));
    }

    #[test]
    fn entries_returns_every_key_value_pair() {
        let db = new_db();
        let mut trie = Trie::new(None, db);
        trie.insert(b"alice", b"100".to_vec()).unwrap();
        trie.insert(b"bob", b"200".to_vec()).unwrap();
        trie.insert(b"carol", b"300".to_vec()).unwrap();

        let mut entries = trie.entries().unwrap();
        entries.sort();
        assert_eq!(
            entries,
            vec![
                (b"alice".to_vec(), b"100".to_vec()),
                (b"bob".to_vec(), b"200".to_vec()),
                (b"carol".to_vec(), b"300".to_vec()),
            ]
        );
    }

    #[test]
    fn update_dispatches_to_insert_or_delete() {
        let db = new_db();
        let mut trie = Trie::new(None, db);
        trie.update(b"alice", Some(b"1".to_vec())).unwrap();
        assert_eq!(trie.get(b"alice").unwrap(), Some(b"1".to_vec()));
        trie.update(b"alice", None).unwrap();
        assert_eq!(trie.get(b"alice").unwrap(), None);
    }

    #[test]
    fn many_keys_insert_delete_converges_to_empty() {
        let db = new_db();
        let mut trie = Trie::new(None, db);
        let keys: Vec<String> = (0..64).map(|i| format!("key-{i}")).collect();
        for k in &keys {
            trie.insert(k.as_bytes(), k.as_bytes().to_vec()).unwrap();
        }
        for k in &keys {
            assert_eq!(trie.get(k.as_bytes()).unwrap(), Some(k.as_bytes().to_vec()));
        }
        for k in &keys {
            trie.delete(k.as_bytes()).unwrap();
        }
        assert_eq!(trie.hash().unwrap(), chain_crypto::EMPTY_TRIE_ROOT);
    }
}
