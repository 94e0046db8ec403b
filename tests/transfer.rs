//! End-to-end transfers across real threads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rand::Rng;

use handoff::{
    BoundedBlockingQueue, Consumer, Pipeline, Producer, QueueError, QueueState, TransferConfig,
};

const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

fn shared_queue<T>(capacity: usize) -> Arc<BoundedBlockingQueue<T>> {
    Arc::new(BoundedBlockingQueue::new(capacity).unwrap())
}

// =============================================================================
// Concrete scenarios
// =============================================================================

#[test]
fn test_capacity_three_ten_items_one_consumer() {
    let queue = shared_queue(3);
    let source: Vec<i32> = (0..10).collect();

    let producer = Producer::new(source.clone(), Arc::clone(&queue)).spawn().unwrap();
    let consumer = Consumer::new(Arc::clone(&queue)).spawn().unwrap();

    let produced = producer.join_timeout(JOIN_TIMEOUT).unwrap();
    let received = consumer.join_timeout(JOIN_TIMEOUT).unwrap();

    assert_eq!(produced.produced, 10);
    assert_eq!(received.items, vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
}

#[test]
fn test_all_items_transferred_single_consumer() {
    let queue = shared_queue(3);
    let source: Vec<i32> = (0..20).collect();

    let producer = Producer::new(source.clone(), Arc::clone(&queue)).spawn().unwrap();
    let consumer = Consumer::new(Arc::clone(&queue)).spawn().unwrap();

    producer.join_timeout(JOIN_TIMEOUT).unwrap();
    let report = consumer.join_timeout(JOIN_TIMEOUT).unwrap();

    assert_eq!(report.items, source);
    assert_eq!(queue.state(), QueueState::ClosedEmpty);
}

#[test]
fn test_closed_empty_queue_rejects_get_and_put() {
    let queue = BoundedBlockingQueue::new(1).unwrap();
    queue.close();

    assert_eq!(queue.get().unwrap_err(), QueueError::ClosedEmpty);
    assert_eq!(queue.put(42).unwrap_err(), QueueError::Closed);
}

#[test]
fn test_multiple_consumers_share_work() {
    let queue = shared_queue(5);
    let source: Vec<i32> = (0..50).collect();

    let producer = Producer::new(source.clone(), Arc::clone(&queue)).spawn().unwrap();
    let first = Consumer::new(Arc::clone(&queue)).name("consumer-1").spawn().unwrap();
    let second = Consumer::new(Arc::clone(&queue)).name("consumer-2").spawn().unwrap();

    producer.join_timeout(JOIN_TIMEOUT).unwrap();
    let first = first.join_timeout(JOIN_TIMEOUT).unwrap();
    let second = second.join_timeout(JOIN_TIMEOUT).unwrap();

    let mut combined: Vec<i32> = first.items.iter().chain(&second.items).copied().collect();
    combined.sort_unstable();
    assert_eq!(combined, source);

    // Each consumer sees its share in the order it was produced.
    for items in [&first.items, &second.items] {
        assert!(items.windows(2).all(|pair| pair[0] < pair[1]));
    }
}

// =============================================================================
// Invariants under contention
// =============================================================================

#[test]
fn test_size_never_exceeds_capacity() {
    const CAPACITY: usize = 4;
    let queue = shared_queue(CAPACITY);
    let done = Arc::new(AtomicBool::new(false));

    let observer = {
        let queue = Arc::clone(&queue);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut max_seen = 0;
            while !done.load(Ordering::Acquire) {
                max_seen = max_seen.max(queue.size());
            }
            max_seen
        })
    };

    let producer = Producer::new((0..2_000).collect::<Vec<u32>>(), Arc::clone(&queue))
        .spawn()
        .unwrap();
    let consumers: Vec<_> = (0..3)
        .map(|i| {
            Consumer::new(Arc::clone(&queue))
                .name(format!("consumer-{i}"))
                .spawn()
                .unwrap()
        })
        .collect();

    producer.join_timeout(JOIN_TIMEOUT).unwrap();
    let total: usize = consumers
        .into_iter()
        .map(|c| c.join_timeout(JOIN_TIMEOUT).unwrap().items.len())
        .sum();
    done.store(true, Ordering::Release);

    assert_eq!(total, 2_000);
    assert!(observer.join().unwrap() <= CAPACITY);
}

#[test]
fn test_close_drains_before_terminal_with_slow_consumers() {
    let queue = shared_queue(8);
    for i in 0..8 {
        queue.put(i).unwrap();
    }
    queue.close();

    let consumers: Vec<_> = (0..2)
        .map(|i| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                let mut received = Vec::new();
                loop {
                    match queue.get() {
                        Ok(item) => received.push(item),
                        Err(err) => {
                            assert!(err.is_terminal(), "consumer {i} saw {err}");
                            break;
                        }
                    }
                    thread::sleep(Duration::from_millis(rng.gen_range(0..3)));
                }
                received
            })
        })
        .collect();

    let mut all: Vec<i32> = consumers
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .collect();
    all.sort_unstable();
    assert_eq!(all, (0..8).collect::<Vec<_>>());
}

#[test]
fn test_jittered_consumers_lose_nothing() {
    let queue = shared_queue(2);
    let source: Vec<u16> = (0..200).collect();

    let producer = Producer::new(source.clone(), Arc::clone(&queue)).spawn().unwrap();
    let workers: Vec<_> = (0..4)
        .map(|_| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                let mut received = Vec::new();
                for item in queue.drain() {
                    received.push(item);
                    if rng.gen_bool(0.1) {
                        thread::sleep(Duration::from_micros(rng.gen_range(10..200)));
                    }
                }
                received
            })
        })
        .collect();

    producer.join_timeout(JOIN_TIMEOUT).unwrap();
    let mut all: Vec<u16> = workers
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .collect();
    all.sort_unstable();
    assert_eq!(all, source);
}

#[test]
fn test_second_producer_fails_after_first_closes() {
    let queue = shared_queue(16);

    Producer::new(vec![1, 2, 3], Arc::clone(&queue)).run().unwrap();
    let err = Producer::new(vec![4, 5], Arc::clone(&queue))
        .spawn()
        .unwrap()
        .join_timeout(JOIN_TIMEOUT)
        .unwrap_err();

    assert_eq!(err.queue_error(), Some(&QueueError::Closed));
    let drained: Vec<i32> = queue.drain().collect();
    assert_eq!(drained, vec![1, 2, 3]);
}

// =============================================================================
// Pipeline
// =============================================================================

#[test]
fn test_pipeline_from_toml_one_producer_two_consumers() {
    let config = TransferConfig::from_toml_str(
        r#"
        capacity = 5
        items = 50
        consumers = 2
        "#,
    )
    .unwrap();
    let items = config.items;

    let outcome = Pipeline::new(config)
        .unwrap()
        .run((0..items).collect::<Vec<_>>())
        .unwrap();

    assert_eq!(outcome.consumers.len(), 2);
    assert_eq!(outcome.merged_sorted(), (0..50).collect::<Vec<_>>());
}

#[test]
fn test_pipeline_many_producers_many_consumers() {
    let config = TransferConfig {
        capacity: 3,
        producers: 4,
        consumers: 3,
        ..TransferConfig::default()
    };

    let source: Vec<String> = (0..120).map(|i| format!("item-{i:03}")).collect();
    let outcome = Pipeline::new(config).unwrap().run(source.clone()).unwrap();

    let mut expected = source;
    expected.sort();
    assert_eq!(outcome.produced(), 120);
    assert_eq!(outcome.merged_sorted(), expected);
}
