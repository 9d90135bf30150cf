use crate::smallsort::insertion;
use crate::SortKey;

/// Positions of `2n` equidistant samples in a range of `len` elements,
/// centered so the overhang at both ends is balanced. Returns the last sample
/// index `d = 2n - 1`, the distance `s` between samples, and the last/first
/// sample positions `h` and `l`. Assumes `len > 4 * n`.
pub(crate) fn sample_layout(len: usize, n: usize) -> (usize, usize, usize, usize) {
    let d = 2 * n - 1;
    let s = len / (2 * n);
    let l = (len - s * d) >> 1;
    (d, s, l + s * d, l)
}

/// Selects `2n` equidistant samples from `v`, sorts them in a stack buffer and
/// moves them to `n` slots at each end of the range, so `v[..n]` orders below
/// and `v[len - n..]` orders above every later pivot comparison. Returns the
/// pivot: the midpoint of the two central samples. Only `v[n..len - n]` is
/// left for the caller to partition. Assumes `1 <= n <= 4` and
/// `v.len() > 4 * n`.
pub(crate) fn pivot_sample<T: SortKey>(v: &mut [T], n: usize) -> T {
    let (d, s, h, l) = sample_layout(v.len(), n);

    let mut sample = [v[0]; 8];
    let (mut i, mut k) = (d, h);
    loop {
        sample[i] = v[k];
        if i == 0 {
            break;
        }
        i -= 1;
        k -= s;
    }
    insertion(&mut sample[..=d]);

    // Move the sorted samples to the two ends, displacing the values found
    // there into the vacated sample slots.
    let (mut lo, mut hi) = (0, v.len());
    let (mut l, mut h, mut d) = (l, h, d);
    loop {
        hi -= 1;
        v[h] = v[hi];
        v[hi] = sample[d];
        v[l] = v[lo];
        v[lo] = sample[lo];
        l += s;
        h -= s;
        lo += 1;
        d -= 1;
        if d < lo {
            break;
        }
    }

    T::mid_value(sample[n - 1], sample[n])
}
