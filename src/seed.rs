use uuid::Uuid;

use crate::feedback::FeedbackWorkflow;
use crate::queries::QueryWorkflow;

/// Demo accounts referenced by the seed rows. They only need to exist in the
/// identity gateway for the rows to be reachable through the API.
pub const DEMO_STUDENT: &str = "3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2";
pub const DEMO_FACULTY: &str = "0c22f1f1-9184-4fd4-9b21-28c68a6a89dc";

pub struct SeedSummary {
    pub queries: usize,
    pub flagged: usize,
    pub addressed: usize,
}

/// Submits a handful of realistic queries through the workflows, flags two of the
/// answers and has faculty reply to one of them.
pub async fn seed(
    queries: &QueryWorkflow,
    feedback: &FeedbackWorkflow,
) -> anyhow::Result<SeedSummary> {
    let student = Uuid::parse_str(DEMO_STUDENT)?;
    let faculty = Uuid::parse_str(DEMO_FACULTY)?;

    let texts = [
        "What are the library hours during exam week?",
        "When does course registration open?",
        "Is there a spaceship launch schedule for the astronomy club?",
        "How do I request an official transcript?",
    ];

    let mut submitted = Vec::with_capacity(texts.len());
    for text in texts {
        submitted.push(queries.submit(student, text).await?);
    }

    let unanswered = feedback
        .flag(
            submitted[2].id,
            student,
            "The answer did not mention the astronomy club at all.",
        )
        .await?;
    let outdated = feedback
        .flag(
            submitted[0].id,
            student,
            "Exam week hours changed this semester.",
        )
        .await?;

    feedback
        .respond(
            outdated.id,
            faculty,
            "Thanks, the library stays open until midnight during exam week.",
        )
        .await?;

    tracing::info!(pending_feedback = %unanswered.id, "Seed data ready");

    Ok(SeedSummary {
        queries: submitted.len(),
        flagged: 2,
        addressed: 1,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::responder::KeywordResponder;
    use crate::store::{MemoryStore, Store};

    #[tokio::test]
    async fn seed_leaves_one_pending_item() {
        let store = Arc::new(MemoryStore::new());
        let responder = Arc::new(KeywordResponder::builtin().unwrap());
        let queries = QueryWorkflow::new(store.clone(), responder);
        let feedback = FeedbackWorkflow::new(store.clone());

        let summary = seed(&queries, &feedback).await.unwrap();
        assert_eq!(summary.queries, 4);

        let pending = feedback.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);

        let student = Uuid::parse_str(DEMO_STUDENT).unwrap();
        assert_eq!(store.queries_for_user(student).await.unwrap().len(), 4);
    }
}
