//! Mutation to invalidation-plan mapping.
//!
//! Pure: given a mutation, decide which namespaces and which exact keys go
//! stale. Execution lives in the coordinator.

use std::collections::BTreeSet;
use std::fmt;

use uuid::Uuid;

use super::keys;

/// A completed write that may have made cached reads stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    PostCreated { post_id: Uuid },
    PostUpdated { post_id: Uuid },
    PostDeleted { post_id: Uuid },
    PostsBulkDeleted { post_ids: Vec<Uuid> },
    CommentCreated { post_id: Uuid },
    CommentUpdated { post_id: Uuid },
    CommentDeleted { post_id: Uuid },
    ViewRegistered { post_id: Uuid },
    LikeToggled { post_id: Uuid },
    UserCreated { user_id: Uuid },
    UserUpdated { user_id: Uuid },
    UserDeleted {
        user_id: Uuid,
        /// Posts that lost the user's comments or likes.
        touched_posts: Vec<Uuid>,
    },
}

impl Mutation {
    pub fn kind(&self) -> &'static str {
        match self {
            Mutation::PostCreated { .. } => "post.create",
            Mutation::PostUpdated { .. } => "post.update",
            Mutation::PostDeleted { .. } => "post.delete",
            Mutation::PostsBulkDeleted { .. } => "post.bulk_delete",
            Mutation::CommentCreated { .. } => "comment.create",
            Mutation::CommentUpdated { .. } => "comment.update",
            Mutation::CommentDeleted { .. } => "comment.delete",
            Mutation::ViewRegistered { .. } => "post.view",
            Mutation::LikeToggled { .. } => "post.like",
            Mutation::UserCreated { .. } => "user.create",
            Mutation::UserUpdated { .. } => "user.update",
            Mutation::UserDeleted { .. } => "user.delete",
        }
    }
}

/// The set of cache entries a mutation makes stale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationPlan {
    /// Namespaces purged wholesale (list caches keyed by arbitrary params).
    pub namespaces: BTreeSet<&'static str>,
    /// Exact keys purged individually.
    pub keys: BTreeSet<String>,
}

impl InvalidationPlan {
    pub fn for_mutation(mutation: &Mutation) -> Self {
        let mut plan = Self::default();
        match mutation {
            Mutation::PostCreated { .. } => plan.post_listings(),
            Mutation::PostUpdated { post_id } => {
                plan.post_listings();
                plan.keys.insert(keys::post_detail(*post_id));
            }
            Mutation::PostDeleted { post_id } => {
                plan.post_listings();
                plan.post_removed(*post_id);
            }
            Mutation::PostsBulkDeleted { post_ids } => {
                plan.post_listings();
                for post_id in post_ids {
                    plan.post_removed(*post_id);
                }
            }
            Mutation::CommentCreated { post_id }
            | Mutation::CommentUpdated { post_id }
            | Mutation::CommentDeleted { post_id } => {
                plan.keys.insert(keys::post_comments(*post_id));
                plan.keys.insert(keys::post_detail(*post_id));
            }
            // Engagement counters stay stale in list caches until TTL expiry;
            // only the single post's detail entry is refreshed.
            Mutation::ViewRegistered { post_id } | Mutation::LikeToggled { post_id } => {
                plan.keys.insert(keys::post_detail(*post_id));
            }
            Mutation::UserCreated { .. } | Mutation::UserUpdated { .. } => {
                plan.namespaces.insert(keys::ADMIN_USERS_LIST);
            }
            Mutation::UserDeleted { touched_posts, .. } => {
                plan.namespaces.insert(keys::ADMIN_USERS_LIST);
                for post_id in touched_posts {
                    plan.keys.insert(keys::post_comments(*post_id));
                    plan.keys.insert(keys::post_detail(*post_id));
                }
            }
        }
        plan
    }

    fn post_listings(&mut self) {
        self.namespaces.insert(keys::POST_LIST);
        self.keys.insert(keys::all_posts());
    }

    fn post_removed(&mut self, post_id: Uuid) {
        self.keys.insert(keys::post_detail(post_id));
        self.keys.insert(keys::post_comments(post_id));
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty() && self.keys.is_empty()
    }
}

impl fmt::Display for InvalidationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "namespaces={:?} keys={:?}",
            self.namespaces.iter().collect::<Vec<_>>(),
            self.keys.iter().collect::<Vec<_>>()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    #[test]
    fn create_post_purges_listings_only() {
        let plan = InvalidationPlan::for_mutation(&Mutation::PostCreated { post_id: id(1) });
        assert_eq!(plan.namespaces, BTreeSet::from([keys::POST_LIST]));
        assert_eq!(plan.keys, BTreeSet::from([keys::all_posts()]));
    }

    #[test]
    fn update_post_adds_detail() {
        let plan = InvalidationPlan::for_mutation(&Mutation::PostUpdated { post_id: id(1) });
        assert_eq!(plan.namespaces, BTreeSet::from([keys::POST_LIST]));
        assert_eq!(
            plan.keys,
            BTreeSet::from([keys::all_posts(), keys::post_detail(id(1))])
        );
    }

    #[test]
    fn delete_post_adds_comments() {
        let plan = InvalidationPlan::for_mutation(&Mutation::PostDeleted { post_id: id(1) });
        assert_eq!(
            plan.keys,
            BTreeSet::from([
                keys::all_posts(),
                keys::post_detail(id(1)),
                keys::post_comments(id(1)),
            ])
        );
    }

    #[test]
    fn bulk_delete_purges_listings_once() {
        let plan = InvalidationPlan::for_mutation(&Mutation::PostsBulkDeleted {
            post_ids: vec![id(1), id(2)],
        });
        assert_eq!(plan.namespaces.len(), 1);
        assert_eq!(plan.keys.len(), 5);
        assert!(plan.keys.contains(&keys::post_comments(id(2))));
    }

    #[test]
    fn comment_mutations_touch_comments_and_detail() {
        for mutation in [
            Mutation::CommentCreated { post_id: id(7) },
            Mutation::CommentUpdated { post_id: id(7) },
            Mutation::CommentDeleted { post_id: id(7) },
        ] {
            let plan = InvalidationPlan::for_mutation(&mutation);
            assert!(plan.namespaces.is_empty());
            assert_eq!(
                plan.keys,
                BTreeSet::from([keys::post_comments(id(7)), keys::post_detail(id(7))])
            );
        }
    }

    #[test]
    fn engagement_never_reaches_listings() {
        for mutation in [
            Mutation::ViewRegistered { post_id: id(3) },
            Mutation::LikeToggled { post_id: id(3) },
        ] {
            let plan = InvalidationPlan::for_mutation(&mutation);
            assert!(plan.namespaces.is_empty());
            assert_eq!(plan.keys, BTreeSet::from([keys::post_detail(id(3))]));
        }
    }

    #[test]
    fn user_mutations_purge_admin_user_lists() {
        let plan = InvalidationPlan::for_mutation(&Mutation::UserUpdated { user_id: id(9) });
        assert_eq!(plan.namespaces, BTreeSet::from([keys::ADMIN_USERS_LIST]));
        assert!(plan.keys.is_empty());
    }

    #[test]
    fn user_delete_refreshes_posts_that_lost_engagement() {
        let plan = InvalidationPlan::for_mutation(&Mutation::UserDeleted {
            user_id: id(9),
            touched_posts: vec![id(1), id(2)],
        });
        assert_eq!(plan.namespaces, BTreeSet::from([keys::ADMIN_USERS_LIST]));
        assert_eq!(
            plan.keys,
            BTreeSet::from([
                keys::post_comments(id(1)),
                keys::post_detail(id(1)),
                keys::post_comments(id(2)),
                keys::post_detail(id(2)),
            ])
        );
        assert!(!plan.keys.contains(&keys::all_posts()));
    }
}
