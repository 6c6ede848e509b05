use std::collections::{HashMap, HashSet};

use crate::api::{Comment, CommentId};

/// Threads have no depth limit: every walk over nodes, dropping included, uses an explicit stack
#[derive(Debug, Eq, PartialEq)]
pub struct CommentNode {
    pub comment: Comment,

    /// In the order the persistence service returned them
    pub replies: Vec<CommentNode>,
}

impl CommentNode {
    /// Number of comments in this subtree, self included
    pub fn count(&self) -> usize {
        let mut res = 0;
        let mut todo = vec![self];
        while let Some(n) = todo.pop() {
            res += 1;
            todo.extend(n.replies.iter());
        }
        res
    }

    pub fn find_in<'a>(nodes: &'a [CommentNode], id: &CommentId) -> Option<&'a CommentNode> {
        let mut todo = nodes.iter().rev().collect::<Vec<_>>();
        while let Some(n) = todo.pop() {
            if n.comment.id == *id {
                return Some(n);
            }
            todo.extend(n.replies.iter().rev());
        }
        None
    }
}

impl Clone for CommentNode {
    fn clone(&self) -> CommentNode {
        CommentNode {
            comment: self.comment.clone(),
            replies: clone_forest(&self.replies),
        }
    }
}

impl Drop for CommentNode {
    fn drop(&mut self) {
        let mut todo = std::mem::take(&mut self.replies);
        while let Some(mut n) = todo.pop() {
            todo.append(&mut n.replies);
        }
    }
}

/// Post-order copy: replies are cloned before the node they belong to
fn clone_forest(nodes: &[CommentNode]) -> Vec<CommentNode> {
    let mut todo = nodes.iter().rev().map(|n| (n, false)).collect::<Vec<_>>();
    let mut done: Vec<CommentNode> = Vec::new();
    while let Some((node, replies_done)) = todo.pop() {
        if replies_done {
            let replies = done.split_off(done.len() - node.replies.len());
            done.push(CommentNode {
                comment: node.comment.clone(),
                replies,
            });
        } else {
            todo.push((node, true));
            todo.extend(node.replies.iter().rev().map(|r| (r, false)));
        }
    }
    done
}

/// Groups the flat, parent-linked list returned by the persistence service into a forest.
///
/// Comments whose parent is not in the list are shown as top-level comments.
/// Comments that are their own ancestor cannot be placed and are dropped.
pub fn assemble(flat: Vec<Comment>) -> Vec<CommentNode> {
    let total = flat.len();
    let ids = flat.iter().map(|c| c.id).collect::<HashSet<_>>();
    let mut roots = Vec::new();
    let mut children: HashMap<CommentId, Vec<Comment>> = HashMap::new();
    for c in flat {
        match c.parent_comment_id {
            None => roots.push(c),
            Some(parent) if parent != c.id && ids.contains(&parent) => {
                children.entry(parent).or_default().push(c)
            }
            Some(parent) => {
                tracing::warn!(comment=?c.id, ?parent, "comment parent is not in thread, showing it top-level");
                roots.push(c)
            }
        }
    }

    // Removing from `children` while descending guarantees every comment is placed at most once
    let res = roots
        .into_iter()
        .map(|c| build(c, &mut children))
        .collect::<Vec<_>>();

    if !children.is_empty() {
        let placed = res.iter().map(|n| n.count()).sum::<usize>();
        tracing::warn!(
            dropped = total - placed,
            "some comments are part of a parent cycle and cannot be shown"
        );
    }
    res
}

/// Comment whose replies are being built
struct Pending {
    comment: Comment,
    todo: std::vec::IntoIter<Comment>,
    replies: Vec<CommentNode>,
}

impl Pending {
    fn new(comment: Comment, children: &mut HashMap<CommentId, Vec<Comment>>) -> Pending {
        Pending {
            todo: children
                .remove(&comment.id)
                .unwrap_or_default()
                .into_iter(),
            comment,
            replies: Vec::new(),
        }
    }
}

fn build(root: Comment, children: &mut HashMap<CommentId, Vec<Comment>>) -> CommentNode {
    let mut current = Pending::new(root, children);
    let mut ancestors: Vec<Pending> = Vec::new();
    loop {
        match current.todo.next() {
            Some(reply) => {
                let reply = Pending::new(reply, children);
                ancestors.push(std::mem::replace(&mut current, reply));
            }
            None => {
                let node = CommentNode {
                    comment: current.comment,
                    replies: current.replies,
                };
                match ancestors.pop() {
                    Some(parent) => {
                        current = parent;
                        current.replies.push(node);
                    }
                    None => return node,
                }
            }
        }
    }
}
