// service/conversation.rs
use std::collections::HashMap;

use uuid::Uuid;

use crate::models::{
    chatmodel::{Conversation, Message, ThreadKey, Viewer},
    jobmodel::Job,
};

struct Group<'a> {
    latest: &'a Message,
    unread: i64,
}

/// Groups the viewer's messages into one conversation per thread key.
///
/// `jobs` only needs to contain the jobs referenced by `messages`; a missing
/// job falls back to the latest message's counterpart and no title.
/// The result is ordered newest-first by last message.
pub fn aggregate_conversations(
    messages: &[Message],
    jobs: &[Job],
    viewer: &Viewer,
) -> Vec<Conversation> {
    let jobs_by_id: HashMap<Uuid, &Job> = jobs.iter().map(|job| (job.id, job)).collect();
    let mut groups: HashMap<ThreadKey, Group<'_>> = HashMap::new();

    for message in messages {
        let unread = i64::from(message.is_unread_for(viewer));
        groups
            .entry(message.thread_key())
            .and_modify(|group| {
                if message.recency() > group.latest.recency() {
                    group.latest = message;
                }
                group.unread += unread;
            })
            .or_insert(Group {
                latest: message,
                unread,
            });
    }

    let mut conversations: Vec<Conversation> = groups
        .into_iter()
        .map(|(thread_key, group)| {
            let job = thread_key.job_id().and_then(|id| jobs_by_id.get(&id).copied());
            let other_user_id = match job {
                Some(job) if job.requester_id != viewer.id => Some(job.requester_id),
                Some(job) => job
                    .provider_id
                    .or_else(|| group.latest.counterpart_of(viewer.id)),
                None => group.latest.counterpart_of(viewer.id),
            };

            Conversation {
                thread_key,
                job_id: thread_key.job_id(),
                job_title: job.map(|job| job.title.clone()),
                other_user_id,
                last_message: group.latest.clone(),
                last_message_time: group.latest.created_at,
                unread_count: group.unread,
            }
        })
        .collect();

    conversations.sort_by(|a, b| b.last_message.recency().cmp(&a.last_message.recency()));
    conversations
}
