use std::mem;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;

use crate::pivot::pivot_sample;
use crate::scheduler::{DoneSignal, Workers};
use crate::smallsort::pinsert;
use crate::{SortKey, Tuning};

/// Partitions `v` around `pv`: on return `v[..k]` orders `<= pv` and `v[k..]`
/// orders `>= pv`. Assumes `v.len() >= 2`.
pub(crate) fn partition_one<T: SortKey>(v: &mut [T], pv: T) -> usize {
    let (mut l, mut h) = (0, v.len() - 1);
    loop {
        if v[h] < pv {
            // avoid unnecessary comparisons
            loop {
                if pv < v[l] {
                    v.swap(l, h);
                    break;
                }
                l += 1;
                if l >= h {
                    return l + 1;
                }
            }
        } else if pv < v[l] {
            // extend ranges in balance
            loop {
                h -= 1;
                if l >= h {
                    return l;
                }
                if v[h] < pv {
                    v.swap(l, h);
                    break;
                }
            }
        }
        l += 1;
        h -= 1;
        if l >= h {
            break;
        }
    }
    if l == h && v[h] < pv {
        // classify mid element
        l += 1;
    }
    l
}

/// Classifies the outer segments `low` and `high` against `pv`, swapping
/// straddlers across the (already classified) slab between them, until one
/// segment runs out. Returns `(a, b)`: `low[..a]` and `high[b..]` are the
/// still unclassified tails, at most one of them non-empty. Assumes both
/// segments are non-empty.
pub(crate) fn partition_dual<T: SortKey>(low: &mut [T], high: &mut [T], pv: T) -> (usize, usize) {
    let (mut a, mut b) = (low.len(), 0);
    loop {
        if high[b] < pv {
            // avoid unnecessary comparisons
            loop {
                if pv < low[a - 1] {
                    mem::swap(&mut low[a - 1], &mut high[b]);
                    break;
                }
                a -= 1;
                if a == 0 {
                    return (a, b);
                }
            }
        } else if pv < low[a - 1] {
            // extend ranges in balance
            loop {
                b += 1;
                if b >= high.len() {
                    return (a, b);
                }
                if high[b] < pv {
                    mem::swap(&mut low[a - 1], &mut high[b]);
                    break;
                }
            }
        }
        a -= 1;
        b += 1;
        if a == 0 || b >= high.len() {
            return (a, b);
        }
    }
}

/// Concurrent dual partitioning of a very long range: the middle half of the
/// inner range goes to a helper thread while this task classifies the outer
/// quarters against the same median-of-8 pivot, then the at most one leftover
/// gap is closed against the helper's boundary. Returns `k` with
/// `v[..k] <= pivot <= v[k..]`. Assumes `v.len() >= 2 * (max_len_recursive + 1)`.
pub(crate) fn cdualpar<T: SortKey>(v: &mut [T]) -> usize {
    let pv = pivot_sample(v, 4);
    let n = v.len();

    let inner = &mut v[4..n - 4];
    let inner_len = inner.len();
    let half = inner_len >> 1;
    let (a, b) = (half >> 1, usize::midpoint(half, inner_len));

    let (low, rest) = inner.split_at_mut(a);
    let (mid, high) = rest.split_at_mut(b - a);

    let (m, rem_low, rem_high) = thread::scope(|s| {
        let helper = s.spawn(move || partition_one(mid, pv));
        let (rem_low, rem_high) = partition_dual(low, high, pv);
        (helper.join().unwrap(), rem_low, rem_high)
    });

    // helper boundary in inner coordinates
    let mut k = a + m;

    let inner = &mut v[4..n - 4];
    // only one gap is possible
    let mut i = rem_low;
    while i > 0 {
        // gap left in low range?
        i -= 1;
        if pv < inner[i] {
            k -= 1;
            inner.swap(i, k);
        }
    }
    let mut i = b + rem_high;
    while i < inner_len {
        // gap left in high range?
        if inner[i] < pv {
            inner.swap(i, k);
            k += 1;
        }
        i += 1;
    }

    k + 4
}

/// Sorts ranges in `(max_len_insertion, max_len_recursive]`: quicksort with a
/// median-of-4 pivot, recursing on the shorter side and iterating on the
/// longer one.
pub(crate) fn short<T: SortKey>(mut v: &mut [T], tuning: Tuning) {
    loop {
        let pv = pivot_sample(v, 2);
        let n = v.len();
        let k = partition_one(&mut v[2..n - 2], pv) + 2;

        let (low, high) = v.split_at_mut(k);
        let (shorter, longer) = if k < n - k { (low, high) } else { (high, low) };

        if shorter.len() > tuning.max_len_insertion {
            short(shorter, tuning); // recurse on the shorter range
            v = longer;
            continue;
        }
        pinsert(shorter, tuning.max_len_insertion);

        if longer.len() > tuning.max_len_insertion {
            v = longer;
            continue;
        }
        pinsert(longer, tuning.max_len_insertion); // two insertion ranges
        return;
    }
}

/// Worker body: sorts its range, then retires from the pool, signaling the
/// entry task when it was the last one out.
fn glong<'scope, T: SortKey>(v: &'scope mut [T], w: Workers<'scope, '_>, tuning: Tuning) {
    let _leaving = w.leave_guard();
    long(v, Some(w), tuning);
}

/// Sorts ranges longer than `max_len_recursive` around a median-of-6 pivot.
/// Iterates on the longer side; the shorter side is insertion-sorted, recursed
/// on, or handed to a new worker when both sides are long and the pool has
/// room.
pub(crate) fn long<'scope, T: SortKey>(
    mut v: &'scope mut [T],
    w: Option<Workers<'scope, '_>>,
    tuning: Tuning,
) {
    loop {
        let pv = pivot_sample(v, 3);
        let n = v.len();
        let k = partition_one(&mut v[3..n - 3], pv) + 3;

        let (low, high) = v.split_at_mut(k);
        let (shorter, longer) = if k < n - k { (low, high) } else { (high, low) };

        // at least one not-long range?
        if shorter.len() <= tuning.max_len_recursive {
            if shorter.len() > tuning.max_len_insertion {
                short(shorter, tuning);
            } else {
                pinsert(shorter, tuning.max_len_insertion);
            }

            if longer.len() > tuning.max_len_recursive {
                v = longer;
                continue;
            }
            short(longer, tuning); // longer.len() > max_len_insertion holds here
            return;
        }

        match w {
            Some(w) if !w.is_full(tuning.max_workers) => {
                // new worker takes the longer range, this task keeps the shorter
                w.add();
                w.scope.spawn(move || glong(longer, w, tuning));
                v = shorter;
            }
            _ => {
                long(shorter, w, tuning); // recurse on the shorter range
                v = longer;
            }
        }
    }
}

/// Scheduler-side entry loop: repeatedly dual-partitions the remaining long
/// range, handing the shorter side to a new worker (or a cheaper path) each
/// round, while the range stays long and the pool has room.
fn concurrent_entry<'scope, T: SortKey>(
    mut v: &'scope mut [T],
    w: Workers<'scope, '_>,
    tuning: Tuning,
) {
    loop {
        let k = cdualpar(v);
        let n = v.len();

        let (low, high) = v.split_at_mut(k);
        let (shorter, longer) = if k < n - k { (low, high) } else { (high, low) };

        // hand off the shorter range
        if shorter.len() > tuning.max_len_recursive {
            w.add();
            w.scope.spawn(move || glong(shorter, w, tuning));
        } else if shorter.len() > tuning.max_len_insertion {
            short(shorter, tuning);
        } else {
            pinsert(shorter, tuning.max_len_insertion);
        }

        v = longer;
        // longer range big enough for another dual partition? pool full?
        if v.len() < 2 * (tuning.max_len_recursive + 1) || w.is_full(tuning.max_workers) {
            break;
        }
    }

    long(v, Some(w), tuning); // v.len() > max_len_recursive holds here
}

/// Entry dispatch for slice sorting. Expects normalized tuning.
pub(crate) fn sort_slice<T: SortKey>(v: &mut [T], tuning: Tuning) {
    let n = v.len();
    if n < 2 * (tuning.max_len_recursive + 1) || tuning.max_workers <= 1 {
        // single-task sorting
        if n > tuning.max_len_recursive {
            long(v, None, tuning);
        } else if n > tuning.max_len_insertion {
            short(v, tuning);
        } else if n > 1 {
            pinsert(v, tuning.max_len_insertion);
        }
        return;
    }

    let live = AtomicU32::new(1); // live workers, this task included
    let done = DoneSignal::new();

    thread::scope(|s| {
        let w = Workers::new(s, &live, &done);
        concurrent_entry(&mut *v, w, tuning);

        if live.fetch_sub(1, Ordering::AcqRel) != 1 {
            // not the last worker out, wait for the completion signal
            done.wait();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::prelude::*;
    use rand_xorshift::XorShiftRng;

    fn check_boundary(v: &[i32], k: usize, pv: i32) {
        assert!(v[..k].iter().all(|x| *x <= pv), "k {k} pv {pv}");
        assert!(v[k..].iter().all(|x| *x >= pv), "k {k} pv {pv}");
    }

    #[test]
    fn partition_one_boundary() {
        let mut rng = XorShiftRng::seed_from_u64(99);
        for len in 2..130usize {
            for _ in 0..20 {
                let mut v: Vec<i32> = (0..len).map(|_| rng.gen_range(-20..20)).collect();
                let pv = v[rng.gen_range(0..len)];
                let mut original = v.clone();

                let k = partition_one(&mut v, pv);

                assert!(k <= v.len());
                check_boundary(&v, k, pv);

                original.sort_unstable();
                let mut permuted = v.clone();
                permuted.sort_unstable();
                assert_eq!(permuted, original);
            }
        }
    }

    #[test]
    fn partition_one_all_equal() {
        let mut v = vec![5i32; 64];
        let k = partition_one(&mut v, 5);
        check_boundary(&v, k, 5);
    }

    #[test]
    fn partition_dual_consumes_one_side() {
        let mut rng = XorShiftRng::seed_from_u64(7);
        for _ in 0..200 {
            let low_len = rng.gen_range(1..40);
            let high_len = rng.gen_range(1..40);
            let mut low: Vec<i32> = (0..low_len).map(|_| rng.gen_range(-9..9)).collect();
            let mut high: Vec<i32> = (0..high_len).map(|_| rng.gen_range(-9..9)).collect();
            let pv = rng.gen_range(-9..9);

            let (a, b) = partition_dual(&mut low, &mut high, pv);

            assert!(a == 0 || b == high.len());
            // everything outside the returned tails is classified
            assert!(low[a..].iter().all(|x| *x <= pv));
            assert!(high[..b].iter().all(|x| *x >= pv));
        }
    }

    #[test]
    fn cdualpar_boundary() {
        let mut rng = XorShiftRng::seed_from_u64(1234);
        for len in [900, 1201, 5000] {
            let mut v: Vec<i32> = (0..len).map(|_| rng.gen_range(-1000..1000)).collect();
            let mut original = v.clone();

            let k = cdualpar(&mut v);

            assert!(k <= v.len());
            assert!(v[..k].iter().copied().fold(i32::MIN, i32::max)
                <= v[k..].iter().copied().fold(i32::MAX, i32::min));

            original.sort_unstable();
            let mut permuted = v.clone();
            permuted.sort_unstable();
            assert_eq!(permuted, original);
        }
    }
}
