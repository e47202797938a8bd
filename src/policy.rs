//! Access-control and authorization rules for posts.
//!
//! Two gates live here:
//! - the read gate (`can_view_full_content`), shared by the list and the
//!   single-post endpoints so both always reach the same decision;
//! - the write gate (`can_mutate`), shared by update and delete.
//!
//! The functions are pure. Handlers decide how a denial is presented.

use crate::{
    auth::AuthUser,
    models::{Post, Role, SubscriptionStatus},
};

/// Replaces the body of a paid post in listings, and is the message of the
/// 403 returned for a single paid post.
pub const PAID_CONTENT_PLACEHOLDER: &str = "Contenu réservé aux abonnés payants";

/// can_view_full_content
///
/// Free posts are visible to everyone. Paid posts require a resolved identity
/// that is either an admin or on the `Paid`/`Premium` tier.
pub fn can_view_full_content(identity: Option<&AuthUser>, post: &Post) -> bool {
    if !post.is_paid {
        return true;
    }

    let Some(user) = identity else {
        return false;
    };

    match user.role {
        Role::Admin => return true,
        Role::Standard => {}
    }

    match user.subscription_status {
        SubscriptionStatus::Paid | SubscriptionStatus::Premium => true,
        SubscriptionStatus::Free => false,
    }
}

/// can_mutate
///
/// Update and delete are allowed for the post's author and for admins.
pub fn can_mutate(identity: &AuthUser, post: &Post) -> bool {
    match identity.role {
        Role::Admin => true,
        Role::Standard => identity.id == post.author_id,
    }
}

/// redact_for_listing
///
/// List presentation of the read gate: a denied post keeps its metadata but
/// its content is swapped for the placeholder.
pub fn redact_for_listing(identity: Option<&AuthUser>, post: Post) -> Post {
    if can_view_full_content(identity, &post) {
        post
    } else {
        Post {
            content: PAID_CONTENT_PLACEHOLDER.to_string(),
            ..post
        }
    }
}
