use std::mem;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc;
use std::thread;

use crate::scheduler::{DoneSignal, Workers};
use crate::Tuning;

/// Order-and-exchange capability over an indexed collection.
///
/// `less` must impose a strict order on the element indices (like `<`); a
/// comparator that violates this can leave the collection unsorted but never
/// touches indices outside `[0, n)`. Exchanges may move companion data along
/// with the compared key, which is what makes this entry point useful for
/// struct-of-arrays layouts.
///
/// During a concurrent sort several workers drive the capability at once, each
/// restricted to its own index range, so implementations need interior
/// mutability but no locking.
pub trait LessSwap {
    /// Strict order test between the elements at `i` and `k`.
    fn less(&self, i: usize, k: usize) -> bool;

    /// Exchanges the elements at `r` and `s`.
    fn swap(&self, r: usize, s: usize);

    /// Fused form the engine drives: exchanges `r` with `s` iff the element at
    /// `i` orders before the element at `k`. `r == s` requests a compare
    /// without an exchange.
    #[inline]
    fn less_swap(&self, i: usize, k: usize, r: usize, s: usize) -> bool {
        if self.less(i, k) {
            if r != s {
                self.swap(r, s);
            }
            true
        } else {
            false
        }
    }
}

/// Engine thresholds for one call, derived from [`Tuning`].
#[derive(Copy, Clone)]
struct Bounds {
    mli: usize,
    mlr: usize,
    max_workers: u32,
}

/// Insertion sort of `[lo, hi]`, preceded by a half-range pair sweep that
/// shortens the average shift distance. Assumes `lo < hi`.
fn insertion<C: LessSwap>(c: &C, lo: usize, hi: usize) {
    let (mut l, mut h) = (usize::midpoint(lo, hi - 1), hi + 1);
    while l > lo {
        l -= 1;
        h -= 1;
        c.less_swap(h, l, h, l);
    }

    let mut h = lo;
    loop {
        let mut l = h;
        while c.less_swap(l + 1, l, l + 1, l) {
            if l == lo {
                break;
            }
            l -= 1;
        }
        h += 1;
        if h >= hi {
            break;
        }
    }
}

/// Arranges median-of-5 of `[l, h]` so that positions `l, l+1` order below the
/// pivot and `h-1, h` above it; the sentinels assist pivoting of the two
/// sub-ranges in later calls. Returns `(l', pv, h')` for [`partition`].
/// Assumes `l + 5 < h`.
fn pivot5<C: LessSwap>(c: &C, l: usize, h: usize) -> (usize, usize, usize) {
    let (mut e, cm) = (l, usize::midpoint(l, h));
    c.less_swap(h, l, h, l);
    let l = l + 1;
    let h = h - 1;
    let (mut b, mut d) = (h, l);
    c.less_swap(h, l, h, l);

    if c.less_swap(h + 1, h, 0, 0) {
        mem::swap(&mut d, &mut e);
        b += 1;
    }
    c.less_swap(cm, e, cm, e);

    if c.less_swap(b, cm, b, cm) {
        d = e;
    }
    c.less_swap(cm, d, cm, d);

    (l + 1, cm, h - 1)
}

/// Arranges median-of-9 of `[l, h]` with two ordered sentinels at each end,
/// over the sample positions `{mid(l,m)-1, l, l+1, mid(l,m), m, mid(m,h),
/// h-1, h, mid(m,h)+1}` for `m = mid(l,h)`. Returns `(l', pv, h')` for
/// [`partition`]. Assumes `l + 11 < h`.
fn pivot9<C: LessSwap>(c: &C, l: usize, h: usize) -> (usize, usize, usize) {
    let m = usize::midpoint(l, h);
    let mut s = [0usize; 9];
    s[1] = l;
    s[2] = l + 1;
    s[4] = m;
    s[6] = h - 1;
    s[7] = h;
    s[3] = usize::midpoint(l, m);
    s[5] = usize::midpoint(m, h);
    s[0] = s[3] - 1;
    s[8] = s[5] + 1;

    let mut i = 2;
    loop {
        // seed sort via s
        c.less_swap(s[i + 6], s[i], s[i + 6], s[i]);
        if i == 0 {
            break;
        }
        i -= 1;
    }
    c.less_swap(s[1], s[0], s[1], s[0]);
    for i in 2..s.len() {
        let mut r = s[i];
        let mut k = i - 1;
        while c.less_swap(r, s[k], r, s[k]) {
            r = s[k];
            if k == 0 {
                break;
            }
            k -= 1;
        }
    }
    (s[3] + 1, s[4], s[5] - 1)
}

/// Partitions `[l, h]` around the element at `pv`: returns `k` such that
/// positions below `k` order `<=` the pivot and positions from `k` on order
/// `>=` it. The first phase converges the cursors on the pivot position and
/// bumps them past it; the second phase resolves what is left between them.
/// Assumes `l < pv < h`.
fn partition<C: LessSwap>(c: &C, mut l: usize, pv: usize, mut h: usize) -> usize {
    'converged: {
        loop {
            if c.less_swap(h, pv, 0, 0) {
                // avoid unnecessary comparisons
                loop {
                    if c.less_swap(pv, l, h, l) {
                        break;
                    }
                    l += 1;
                    if l >= pv {
                        // until pv & avoid it
                        l += 1;
                        break 'converged;
                    }
                }
            } else if c.less_swap(pv, l, 0, 0) {
                // extend ranges in balance
                loop {
                    h -= 1;
                    if pv >= h {
                        // until pv & avoid it
                        h -= 1;
                        break 'converged;
                    }
                    if c.less_swap(h, pv, h, l) {
                        break;
                    }
                }
            }
            l += 1;
            h -= 1;
            if l >= pv {
                l += 1;
                break;
            }
            if pv >= h {
                h -= 1;
                break 'converged;
            }
        }
        if pv >= h {
            h -= 1;
        }
    }

    while l < h {
        if c.less_swap(h, pv, 0, 0) {
            // avoid unnecessary comparisons
            loop {
                if c.less_swap(pv, l, h, l) {
                    break;
                }
                l += 1;
                if l >= h {
                    return l + 1;
                }
            }
        } else if c.less_swap(pv, l, 0, 0) {
            // extend ranges in balance
            loop {
                h -= 1;
                if l >= h {
                    return l;
                }
                if c.less_swap(h, pv, h, l) {
                    break;
                }
            }
        }
        l += 1;
        h -= 1;
    }
    if l == h && c.less_swap(h, pv, 0, 0) {
        // classify mid element
        l += 1;
    }
    l
}

/// Rearranges `[l, a]` and `[b, h]` into `<=` and `>=` the element at `pv`;
/// the gap `(a, b)` between them is already classified. The gap expands until
/// one of the intervals is fully consumed. Returns the final `(a, b)`.
/// Assumes `1 <= l <= a < pv < b <= h`.
fn dpartition<C: LessSwap>(
    c: &C,
    l: usize,
    mut a: usize,
    pv: usize,
    mut b: usize,
    h: usize,
) -> (usize, usize) {
    loop {
        if c.less_swap(b, pv, 0, 0) {
            // avoid unnecessary comparisons
            loop {
                if c.less_swap(pv, a, b, a) {
                    break;
                }
                a -= 1;
                if a < l {
                    return (a, b);
                }
            }
        } else if c.less_swap(pv, a, 0, 0) {
            // extend ranges in balance
            loop {
                b += 1;
                if b > h {
                    return (a, b);
                }
                if c.less_swap(b, pv, b, a) {
                    break;
                }
            }
        }
        a -= 1;
        b += 1;
        if a < l || b > h {
            return (a, b);
        }
    }
}

/// Partitions `[lo, hi]` around a median-of-9 pivot, splitting the work with a
/// helper worker when the range is long and the pool has room: the helper
/// partitions the central slab while this task classifies the two outer slabs,
/// then the at most one remaining gap is closed against the helper's boundary
/// `m`. When a gap-close exchange lands on the pivot's storage position, the
/// pivot index moves with it. Returns the combined boundary.
fn dualpar<'scope, C: LessSwap + Sync>(
    c: &'scope C,
    w: Option<Workers<'scope, '_>>,
    lo: usize,
    hi: usize,
    bounds: Bounds,
) -> usize {
    let (a, mut pv, b) = pivot9(c, lo, hi);

    // range long enough for dual partitioning? worker available?
    let mut m = 0;
    let mut boundary_rx = None;
    match w {
        Some(w) if hi - lo >= 8 * bounds.mlr && !w.is_full(bounds.max_workers) => {
            w.add();
            let (tx, rx) = mpsc::channel();
            w.scope.spawn(move || {
                let _ = tx.send(partition(c, a, pv, b));
                // the caller is still registered, so this is never last
                if w.remove() == 0 {
                    panic!("parasort: dual partition counter underflow");
                }
            });
            boundary_rx = Some(rx);
        }
        _ => m = partition(c, a, pv, b),
    }

    let (mut a, mut b) = dpartition(c, lo + 2, a - 3, pv, b + 3, hi - 2);
    if let Some(rx) = boundary_rx {
        m = rx.recv().expect("parasort: central slab worker lost");
    }

    // only one gap is possible
    while a >= lo + 2 {
        // gap left in low range?
        if c.less_swap(pv, a, m - 1, a) {
            m -= 1;
            if m == pv {
                // swapped pivot when closing gap
                pv = a;
            }
        }
        a -= 1;
    }
    while b <= hi - 2 {
        // gap left in high range?
        if c.less_swap(b, pv, b, m) {
            if m == pv {
                // swapped pivot when closing gap
                pv = b;
            }
            m += 1;
        }
        b += 1;
    }
    m
}

/// Worker body: sorts its range, then retires from the pool, signaling the
/// entry task when it was the last one out.
fn gsrt<'scope, C: LessSwap + Sync>(
    c: &'scope C,
    w: Workers<'scope, '_>,
    lo: usize,
    hi: usize,
    bounds: Bounds,
) {
    let _leaving = w.leave_guard();
    srt(c, Some(w), lo, hi, bounds);
}

/// Recursive sort driver over `[lo, hi]`: short ranges partition around a
/// median-of-5 pivot, long ones go through [`dualpar`]. The longer sub-range
/// is iterated (or handed to a new worker), the shorter one recursed on, which
/// bounds the recursion depth logarithmically. Assumes `hi - lo >= bounds.mli`.
fn srt<'scope, C: LessSwap + Sync>(
    c: &'scope C,
    w: Option<Workers<'scope, '_>>,
    mut lo: usize,
    mut hi: usize,
    bounds: Bounds,
) {
    loop {
        let k = if hi - lo < 4 * bounds.mli {
            let (a, pv, b) = pivot5(c, lo, hi);
            partition(c, a, pv, b)
        } else {
            dualpar(c, w, lo, hi, bounds)
        };
        let mut h = k - 1;
        let mut l = k;

        if h - lo < hi - l {
            // make [lo, h] the longer range
            mem::swap(&mut h, &mut hi);
            mem::swap(&mut l, &mut lo);
        }

        // at least one short range?
        if hi - l < bounds.mli {
            insertion(c, l, hi);

            if h - lo < bounds.mli {
                // two short ranges?
                insertion(c, lo, h);
                return;
            }
            hi = h;
            continue;
        }

        // range long enough for a new worker? pool full?
        match w {
            Some(w) if hi - l >= bounds.mlr && !w.is_full(bounds.max_workers) => {
                // new worker takes the longer range, this task keeps the shorter
                w.add();
                w.scope.spawn(move || gsrt(c, w, lo, h, bounds));
                lo = l;
            }
            _ => {
                srt(c, w, l, hi, bounds); // recurse on the shorter range
                hi = h;
            }
        }
    }
}

/// Exchange network for 2..=4 elements, driven purely through `less_swap`.
fn exchange_small<C: LessSwap>(c: &C, n: usize) {
    match n {
        2 => {
            c.less_swap(1, 0, 1, 0);
        }
        3 => {
            c.less_swap(1, 0, 1, 0);
            c.less_swap(2, 1, 2, 1);
            c.less_swap(1, 0, 1, 0);
        }
        _ => {
            c.less_swap(1, 0, 1, 0);
            c.less_swap(3, 2, 3, 2);
            c.less_swap(2, 0, 2, 0);
            c.less_swap(3, 1, 3, 1);
            c.less_swap(2, 1, 2, 1);
        }
    }
}

/// Entry dispatch for collection sorting. Expects normalized tuning.
pub(crate) fn sort_collection<C: LessSwap + Sync>(n: usize, c: &C, tuning: Tuning) {
    if n < 2 {
        return;
    }
    if n <= 4 {
        exchange_small(c, n);
        return;
    }

    // the comparator engine runs insertion up to half the slice threshold
    let bounds = Bounds {
        mli: tuning.max_len_insertion >> 1,
        mlr: tuning.max_len_recursive,
        max_workers: tuning.max_workers,
    };

    let hi = n - 1;
    if hi > 2 * bounds.mlr && bounds.max_workers > 1 {
        let live = AtomicU32::new(1); // live workers, this task included
        let done = DoneSignal::new();

        thread::scope(|s| {
            let w = Workers::new(s, &live, &done);
            srt(c, Some(w), 0, hi, bounds);

            if live.fetch_sub(1, Ordering::AcqRel) != 1 {
                // not the last worker out, wait for the completion signal
                done.wait();
            }
        });
        return;
    }
    if hi >= bounds.mli {
        srt(c, None, 0, hi, bounds);
        return;
    }
    insertion(c, 0, hi);
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicI32;

    use rand::prelude::*;
    use rand_xorshift::XorShiftRng;

    struct AtomicSlice(Vec<AtomicI32>);

    impl AtomicSlice {
        fn new(v: &[i32]) -> Self {
            Self(v.iter().copied().map(AtomicI32::new).collect())
        }

        fn to_vec(&self) -> Vec<i32> {
            self.0.iter().map(|v| v.load(Ordering::Relaxed)).collect()
        }
    }

    impl LessSwap for AtomicSlice {
        fn less(&self, i: usize, k: usize) -> bool {
            self.0[i].load(Ordering::Relaxed) < self.0[k].load(Ordering::Relaxed)
        }

        fn swap(&self, r: usize, s: usize) {
            let a = self.0[r].load(Ordering::Relaxed);
            let b = self.0[s].swap(a, Ordering::Relaxed);
            self.0[r].store(b, Ordering::Relaxed);
        }
    }

    fn check_sorted_permutation(c: &AtomicSlice, original: &[i32]) {
        let got = c.to_vec();
        let mut expected = original.to_vec();
        expected.sort_unstable();
        assert_eq!(got, expected);
    }

    #[test]
    fn exchange_small_networks() {
        // every value combination over n symbols, duplicates included
        for n in 2..=4usize {
            for id in 0..n.pow(n as u32) {
                let mut x = id;
                let case: Vec<i32> = (0..n)
                    .map(|_| {
                        let digit = (x % n) as i32;
                        x /= n;
                        digit
                    })
                    .collect();
                let c = AtomicSlice::new(&case);
                exchange_small(&c, n);
                check_sorted_permutation(&c, &case);
            }
        }
    }

    #[test]
    fn insertion_matches_std() {
        let mut rng = XorShiftRng::seed_from_u64(5150);
        for len in 2..=64usize {
            let v: Vec<i32> = (0..len).map(|_| rng.gen_range(-30..30)).collect();
            let c = AtomicSlice::new(&v);
            insertion(&c, 0, len - 1);
            check_sorted_permutation(&c, &v);
        }
    }

    #[test]
    fn partition_splits_around_pivot() {
        let mut rng = XorShiftRng::seed_from_u64(60);
        for len in 13..200usize {
            let v: Vec<i32> = (0..len).map(|_| rng.gen_range(-40..40)).collect();
            let c = AtomicSlice::new(&v);

            let (a, pv, b) = pivot9(&c, 0, len - 1);
            let pivot = c.0[pv].load(Ordering::Relaxed);
            let k = partition(&c, a, pv, b);

            let got = c.to_vec();
            assert!(got[..k].iter().all(|x| *x <= pivot));
            assert!(got[k..].iter().all(|x| *x >= pivot));

            let mut expected = v.clone();
            expected.sort_unstable();
            let mut permuted = got;
            permuted.sort_unstable();
            assert_eq!(permuted, expected);
        }
    }

    #[test]
    fn sort_collection_matches_std() {
        let mut rng = XorShiftRng::seed_from_u64(777);
        let tuning = Tuning::default().normalized();
        for len in [0, 1, 2, 3, 4, 5, 7, 12, 40, 100, 500, 3000] {
            let v: Vec<i32> = (0..len).map(|_| rng.gen_range(-500..500)).collect();
            let c = AtomicSlice::new(&v);
            sort_collection(len, &c, tuning);
            check_sorted_permutation(&c, &v);
        }
    }
}
