use crate::types::Member;

/// One-directional cohort visibility: a viewer consulting a level they have
/// already passed sees every active member; otherwise only members who have
/// reached the viewed level. Pure function of two order integers.
pub fn visible_members(
    viewer_level_order: i64,
    viewed_level_order: i64,
    members: Vec<Member>,
) -> Vec<Member> {
    if viewer_level_order > viewed_level_order {
        return members;
    }
    members
        .into_iter()
        .filter(|member| member.level_order >= viewed_level_order)
        .collect()
}
