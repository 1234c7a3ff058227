//! Merge and broadcast properties over real producer workers.

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use std::ops::Range;

use vigil_worker::{Broadcaster, IterProducer, ProducerWorker, RunContext, Worker, merge};

type RangeProducer = ProducerWorker<u32, IterProducer<Range<u32>>>;

fn producers(sizes: &[u32]) -> Vec<RangeProducer> {
  sizes
    .iter()
    .enumerate()
    .map(|(i, n)| {
      let base = i as u32 * 1000;
      ProducerWorker::from_items(base..base + n)
    })
    .collect()
}

async fn merged_items(sizes: &[u32]) -> Vec<u32> {
  let ctx = RunContext::standalone(CancellationToken::new());
  let mut workers = producers(sizes);
  let outputs = workers.iter_mut().map(|w| w.output()).collect();
  for worker in &mut workers {
    let _ = worker.run(&ctx);
  }
  merge(outputs).collect().await
}

#[tokio::test]
async fn test_merge_yields_union_of_all_producers() {
  let cases: &[&[u32]] = &[&[], &[0], &[1], &[100], &[0, 50, 100], &[7, 0, 13], &[100, 100, 100]];

  for sizes in cases {
    let mut got = merged_items(sizes).await;
    got.sort_unstable();

    let mut expected: Vec<u32> = sizes
      .iter()
      .enumerate()
      .flat_map(|(i, n)| {
        let base = i as u32 * 1000;
        base..base + n
      })
      .collect();
    expected.sort_unstable();

    assert_eq!(got, expected, "sizes {sizes:?}");
  }
}

#[tokio::test]
async fn test_merge_preserves_order_within_each_producer() {
  let got = merged_items(&[60, 60, 60]).await;
  for i in 0..3u32 {
    let from_one: Vec<u32> = got.iter().copied().filter(|x| x / 1000 == i).collect();
    let expected: Vec<u32> = (i * 1000..i * 1000 + 60).collect();
    assert_eq!(from_one, expected);
  }
}

#[tokio::test]
async fn test_broadcast_delivers_in_order_to_every_subscriber() {
  for (k, m) in [(0u32, 1usize), (1, 3), (100, 5)] {
    let mut broadcaster = Broadcaster::new(ProducerWorker::from_items(0..k));
    let subscribers: Vec<_> = (0..m).map(|_| broadcaster.subscribe()).collect();
    let _errors = broadcaster.run(&RunContext::standalone(CancellationToken::new()));

    for subscriber in subscribers {
      let items: Vec<u32> = subscriber.collect().await;
      assert_eq!(items, (0..k).collect::<Vec<_>>());
    }
  }
}
