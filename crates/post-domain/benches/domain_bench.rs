use common::AggregateId;
use criterion::{Criterion, criterion_group, criterion_main};
use event_store::{AppendOptions, EventEnvelope, InMemoryEventStore, Version, store::EventStore};
use post_domain::{Aggregate, CommentId, DomainEvent, Post, PostEvent, PostService, SystemClock};

fn make_envelope(aggregate_id: AggregateId, version: i64, event: &PostEvent) -> EventEnvelope {
    EventEnvelope::builder()
        .aggregate_id(aggregate_id)
        .aggregate_type("Post")
        .event_type(event.event_type())
        .version(Version::new(version))
        .payload(event)
        .unwrap()
        .build()
        .unwrap()
}

/// One PostCreated followed by `comments` CommentAdded events.
fn commented_history(post_id: AggregateId, comments: i64) -> Vec<EventEnvelope> {
    let created = PostEvent::post_created(post_id, "alice", "hello", chrono::Utc::now());
    let mut events = vec![make_envelope(post_id, 0, &created)];
    for v in 1..=comments {
        let comment = format!("comment {v}");
        let added = PostEvent::comment_added(post_id, CommentId::new(), comment, "bob");
        events.push(make_envelope(post_id, v, &added));
    }
    events
}

fn bench_create_post(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("domain/create_post", |b| {
        b.iter(|| {
            rt.block_on(async {
                let service = PostService::new(InMemoryEventStore::new());
                service
                    .create_post(AggregateId::new(), "alice", "hello")
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_add_comment(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = PostService::new(InMemoryEventStore::new());
    let post_id = AggregateId::new();
    rt.block_on(async { service.create_post(post_id, "alice", "hello").await.unwrap() });

    c.bench_function("domain/add_comment", |b| {
        b.iter(|| {
            rt.block_on(async {
                service
                    .add_comment(post_id, "benchmark comment", "bob")
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_full_command_cycle(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("domain/full_create_comment_edit_delete", |b| {
        b.iter(|| {
            rt.block_on(async {
                let service = PostService::new(InMemoryEventStore::new());
                let post_id = AggregateId::new();
                service.create_post(post_id, "alice", "hello").await.unwrap();

                let comment_id = service
                    .add_comment(post_id, "first", "bob")
                    .await
                    .unwrap()
                    .output;
                service
                    .edit_comment(post_id, comment_id, "first (edited)", "bob")
                    .await
                    .unwrap();

                service.delete_post(post_id, "alice").await.unwrap();
            });
        });
    });
}

fn bench_replay(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    for comments in [50, 100] {
        let store = InMemoryEventStore::new();
        let post_id = AggregateId::new();
        rt.block_on(async {
            store
                .append(commented_history(post_id, comments), AppendOptions::expect_new())
                .await
                .unwrap();
        });

        c.bench_function(&format!("domain/replay_{}_events", comments + 1), |b| {
            b.iter(|| {
                rt.block_on(async {
                    let events = store.get_events_for_aggregate(post_id).await.unwrap();
                    let mut post = Post::default();
                    post.replay(events).unwrap();
                });
            });
        });
    }
}

fn bench_replay_shuffled(c: &mut Criterion) {
    let post_id = AggregateId::new();
    let mut history = commented_history(post_id, 100);
    history.reverse();

    c.bench_function("domain/replay_101_events_reversed", |b| {
        b.iter(|| {
            let mut post = Post::default();
            post.replay(history.clone()).unwrap();
        });
    });
}

fn bench_raise_on_live_post(c: &mut Criterion) {
    let clock = SystemClock;

    c.bench_function("domain/raise_10_comments", |b| {
        b.iter(|| {
            let mut post = Post::new(AggregateId::new(), "alice", "hello", &clock).unwrap();
            for i in 0..10 {
                post.add_comment(format!("comment {i}"), "bob").unwrap();
            }
            post.mark_changes_as_committed();
        });
    });
}

criterion_group!(
    benches,
    bench_create_post,
    bench_add_comment,
    bench_full_command_cycle,
    bench_replay,
    bench_replay_shuffled,
    bench_raise_on_live_post,
);
criterion_main!(benches);
