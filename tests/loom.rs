#![allow(missing_docs)]
#![cfg(feature = "loom")]

use cpg::latch::ArrivalCounter;
use loom::{
    cell::UnsafeCell,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
};

/// Output slot of each parent, indexed by parent number.
struct Outputs(Vec<UnsafeCell<u32>>);

// SAFETY: each slot is written by its own parent only, and read only by the
// thread that observed the last arrival.
unsafe impl Sync for Outputs {}

/// Spawn `parents` threads that each publish an output and arrive. The thread
/// observing the last arrival sums every output, like a child node reading
/// all of its parents' results.
fn model_join(parents: usize) {
    loom::model(move || {
        let counter = Arc::new(ArrivalCounter::new(parents));
        let outputs = Arc::new(Outputs((0..parents).map(|_| UnsafeCell::new(0)).collect()));
        let released = Arc::new(AtomicUsize::new(0));
        let sums = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..parents)
            .map(|idx| {
                let (counter, outputs, released, sums) = (
                    counter.clone(),
                    outputs.clone(),
                    released.clone(),
                    sums.clone(),
                );
                thread::spawn(move || {
                    // SAFETY: slot `idx` belongs to this thread until it arrives.
                    outputs.0[idx].with_mut(|ptr| unsafe { *ptr = 1 << idx });
                    if counter.arrive() {
                        released.fetch_add(1, Ordering::Relaxed);
                        let sum: u32 = outputs
                            .0
                            .iter()
                            // SAFETY: every parent has arrived, no writer is left.
                            .map(|slot| slot.with(|ptr| unsafe { *ptr }))
                            .sum();
                        sums.store(sum as usize, Ordering::Relaxed);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Exactly one parent releases the child, and it sees every output.
        assert_eq!(released.load(Ordering::Relaxed), 1);
        assert_eq!(sums.load(Ordering::Relaxed), (1 << parents) - 1);
        assert_eq!(counter.parents_total(), parents);
    });
}

#[test]
fn loom_two_parents_release_once_with_visibility() {
    model_join(2);
}

#[test]
fn loom_three_parents_release_once_with_visibility() {
    model_join(3);
}

#[test]
fn loom_inline_parent_and_forked_parent() {
    loom::model(|| {
        // Graph:
        //   A(inline)   B(forked)
        //        \       /
        //           C
        // A runs on the calling thread, B on a spawned one; C must run once,
        // on whichever thread arrives last, after both outputs are written.
        let counter = Arc::new(ArrivalCounter::new(2));
        let outputs = Arc::new(Outputs(vec![UnsafeCell::new(0), UnsafeCell::new(0)]));
        let runs = Arc::new(AtomicUsize::new(0));

        let run_child = {
            let outputs = outputs.clone();
            let runs = runs.clone();
            move || {
                // SAFETY: both parents have arrived.
                let sum: u32 = outputs.0.iter().map(|slot| slot.with(|ptr| unsafe { *ptr })).sum();
                assert_eq!(sum, 11);
                runs.fetch_add(1, Ordering::Relaxed);
            }
        };

        let forked = {
            let (counter, outputs, run_child) = (counter.clone(), outputs.clone(), run_child.clone());
            thread::spawn(move || {
                // SAFETY: slot 1 belongs to B.
                outputs.0[1].with_mut(|ptr| unsafe { *ptr = 10 });
                if counter.arrive() {
                    run_child();
                }
            })
        };
        // SAFETY: slot 0 belongs to A.
        outputs.0[0].with_mut(|ptr| unsafe { *ptr = 1 });
        if counter.arrive() {
            run_child();
        }
        forked.join().unwrap();

        assert_eq!(runs.load(Ordering::Relaxed), 1);
    });
}
