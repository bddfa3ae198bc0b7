//! A sample object graph holding handles at several depths.
//!
//! Mirrors what a binding layer keeps alive between frames: a scene with a
//! name-keyed texture table and a tree of nodes shared behind `Arc<Mutex>`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use revslab_pointers::{Handle, Markable, Marker, Pointers};

use crate::{Body, Mesh, Texture};

/// One node of a [`Scene`] tree.
pub struct SceneNode {
    pub mesh: Handle<Mesh>,
    pub body: Option<Handle<Body>>,
    pub children: Vec<Arc<Mutex<SceneNode>>>,
}

impl Markable for SceneNode {
    fn mark(&self, marker: &mut Marker<'_>) {
        self.mesh.mark(marker);
        self.body.mark(marker);
        self.children.mark(marker);
    }
}

/// Root of the sample graph.
#[derive(Default)]
pub struct Scene {
    pub name: String,
    pub textures: HashMap<String, Handle<Texture>>,
    pub roots: Vec<Arc<Mutex<SceneNode>>>,
}

impl Markable for Scene {
    fn mark(&self, marker: &mut Marker<'_>) {
        self.name.mark(marker);
        self.textures.mark(marker);
        self.roots.mark(marker);
    }
}

impl Scene {
    /// Build a scene of `depth` levels with `fanout` children per node.
    ///
    /// Every node owns a fresh mesh; every other node also owns a body.
    /// One texture is registered per level.
    pub fn build(pointers: &Pointers, depth: usize, fanout: usize) -> Self {
        fn node(
            pointers: &Pointers,
            level: usize,
            depth: usize,
            fanout: usize,
            id: &mut u64,
        ) -> Arc<Mutex<SceneNode>> {
            *id += 1;
            let mesh = pointers.alloc::<Mesh>([*id, level as u64]);
            let body = (*id % 2 == 0).then(|| pointers.alloc::<Body>([1, *id, 0]));
            let children = if level + 1 < depth {
                (0..fanout)
                    .map(|_| node(pointers, level + 1, depth, fanout, id))
                    .collect()
            } else {
                Vec::new()
            };
            Arc::new(Mutex::new(SceneNode {
                mesh,
                body,
                children,
            }))
        }

        let mut id = 0;
        let textures = (0..depth)
            .map(|level| {
                let texture = pointers.alloc::<Texture>([level as u64]);
                (format!("level-{level}"), texture)
            })
            .collect();
        let roots = if depth == 0 {
            Vec::new()
        } else {
            vec![node(pointers, 0, depth, fanout, &mut id)]
        };
        Self {
            name: "sample".to_string(),
            textures,
            roots,
        }
    }

    /// Number of managed handles reachable from this scene.
    pub fn handle_count(&self) -> usize {
        fn count(node: &Arc<Mutex<SceneNode>>) -> usize {
            let node = node.lock().unwrap();
            1 + usize::from(node.body.is_some()) + node.children.iter().map(count).sum::<usize>()
        }
        self.textures.len() + self.roots.iter().map(count).sum::<usize>()
    }

    /// Detach and return the first root's first child subtree.
    pub fn prune(&mut self) -> Option<Arc<Mutex<SceneNode>>> {
        let root = self.roots.first()?;
        let mut root = root.lock().unwrap();
        if root.children.is_empty() {
            None
        } else {
            Some(root.children.remove(0))
        }
    }
}
