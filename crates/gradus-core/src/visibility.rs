use crate::types::enums::UnknownProgressionPolicy;
use crate::types::{LearnerId, Message, MessageId, PromotionId, Standing};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Which rung of the visibility ladder matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum VisibilityRule {
    System,
    OwnMessage,
    DirectRecipient,
    ReplyToViewer,
    TeacherSender,
    CohortNotAhead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    Visible(VisibilityRule),
    Hidden,
}

impl Visibility {
    pub fn is_visible(self) -> bool {
        matches!(self, Self::Visible(_))
    }
}

#[derive(Debug, Clone)]
pub struct ViewerContext {
    pub learner_id: LearnerId,
    pub promotion_id: Option<PromotionId>,
    pub standing: Standing,
}

/// Everything the ladder needs to know about the other participants of the
/// stream: which messages the viewer authored, which senders teach the
/// formation, and each sender's standing (absent when unresolvable).
#[derive(Debug, Clone, Default)]
pub struct StreamContext {
    pub authored_by_viewer: HashSet<MessageId>,
    pub teachers: HashSet<LearnerId>,
    pub sender_standings: HashMap<LearnerId, Standing>,
}

/// Ordered, short-circuiting visibility decision; first match wins.
pub fn decide(
    message: &Message,
    viewer: &ViewerContext,
    stream: &StreamContext,
    policy: UnknownProgressionPolicy,
) -> Visibility {
    if message.is_system {
        return Visibility::Visible(VisibilityRule::System);
    }
    if message.sender_id == viewer.learner_id {
        return Visibility::Visible(VisibilityRule::OwnMessage);
    }
    if message.receiver_id.as_ref() == Some(&viewer.learner_id) {
        return Visibility::Visible(VisibilityRule::DirectRecipient);
    }
    if let Some(reply_to) = &message.reply_to {
        if stream.authored_by_viewer.contains(reply_to) {
            return Visibility::Visible(VisibilityRule::ReplyToViewer);
        }
    }
    if stream.teachers.contains(&message.sender_id) {
        return Visibility::Visible(VisibilityRule::TeacherSender);
    }

    let same_promotion = match (&message.promotion_id, &viewer.promotion_id) {
        (Some(sender_promo), Some(viewer_promo)) => sender_promo == viewer_promo,
        _ => false,
    };
    if same_promotion {
        let sender = match stream.sender_standings.get(&message.sender_id) {
            Some(standing) => *standing,
            // A sender with no resolvable progression sits at order zero,
            // which makes the message visible. Kept behind a named policy.
            None => match policy {
                UnknownProgressionPolicy::FailOpen => Standing::ZERO,
                UnknownProgressionPolicy::FailClosed => return Visibility::Hidden,
            },
        };
        let not_ahead = sender.level_order < viewer.standing.level_order
            || (sender.level_order == viewer.standing.level_order
                && sender.lesson_order <= viewer.standing.lesson_order);
        if not_ahead {
            return Visibility::Visible(VisibilityRule::CohortNotAhead);
        }
    }

    Visibility::Hidden
}

/// Filters a chronologically ordered stream down to what the viewer may see,
/// preserving the input order.
pub fn filter_messages(
    messages: Vec<Message>,
    viewer: &ViewerContext,
    stream: &StreamContext,
    policy: UnknownProgressionPolicy,
) -> Vec<Message> {
    messages
        .into_iter()
        .filter(|message| decide(message, viewer, stream, policy).is_visible())
        .collect()
}
