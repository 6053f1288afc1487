//! Split joining members into moderation candidates and exempt members.

use std::collections::{BTreeSet, HashSet};

use super::{JoinEvent, MemberRef};

/// Result of classifying one join event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Members subject to raid and heuristic evaluation, in arrival order.
    pub candidates: Vec<MemberRef>,
    /// The bot itself, admins and whitelisted members, in arrival order.
    pub ignored: Vec<MemberRef>,
}

/// Classify the members of a join event.
///
/// A member is ignored iff it is the bot itself, a configured admin, or on the
/// whitelist while the whitelist is enabled.
pub fn classify(
    event: &JoinEvent,
    self_id: u64,
    admin_ids: &HashSet<u64>,
    whitelist: &BTreeSet<u64>,
    whitelist_enabled: bool,
) -> Classification {
    let (ignored, candidates) = event
        .members
        .iter()
        .cloned()
        .partition(|m| is_exempt(m.id, self_id, admin_ids, whitelist, whitelist_enabled));

    Classification { candidates, ignored }
}

/// Whether a member is never moderated: the bot itself, an admin, or a
/// whitelisted member while the whitelist is enabled.
pub fn is_exempt(
    member_id: u64,
    self_id: u64,
    admin_ids: &HashSet<u64>,
    whitelist: &BTreeSet<u64>,
    whitelist_enabled: bool,
) -> bool {
    member_id == self_id
        || admin_ids.contains(&member_id)
        || (whitelist_enabled && whitelist.contains(&member_id))
}
