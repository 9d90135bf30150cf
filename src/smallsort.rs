use crate::SortKey;

/// Pair sweep ahead of insertion sort: swap-orders `v[h]` against
/// `v[h - step]` for `step = (max_len_insertion + 1) / 3`, which cuts the
/// average shift distance of the insertion pass that follows. Ranges shorter
/// than the step are left untouched.
pub(crate) fn presort<T: SortKey>(v: &mut [T], max_len_insertion: usize) {
    let step = (max_len_insertion + 1) / 3;
    let (mut l, mut h) = (0, step);
    while h < v.len() {
        if v[h] < v[l] {
            v.swap(l, h);
        }
        l += 1;
        h += 1;
    }
}

/// Shift-based insertion sort.
pub(crate) fn insertion<T: SortKey>(v: &mut [T]) {
    for h in 1..v.len() {
        let val = v[h];
        if val < v[h - 1] {
            let mut l = h;
            loop {
                v[l] = v[l - 1];
                l -= 1;
                if l == 0 || !(val < v[l - 1]) {
                    break;
                }
            }
            v[l] = val;
        }
    }
}

/// Pair sweep plus insertion: the short-range fallback.
pub(crate) fn pinsert<T: SortKey>(v: &mut [T], max_len_insertion: usize) {
    presort(v, max_len_insertion);
    insertion(v);
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::prelude::*;
    use rand_xorshift::XorShiftRng;

    #[test]
    fn insertion_sorts() {
        let mut v: [u32; 0] = [];
        insertion(&mut v);

        let mut v = [3u32];
        insertion(&mut v);
        assert_eq!(v, [3]);

        let mut v = [5i32, -2, 5, 0, 1, -2];
        insertion(&mut v);
        assert_eq!(v, [-2, -2, 0, 1, 5, 5]);
    }

    #[test]
    fn pinsert_matches_std() {
        let mut rng = XorShiftRng::seed_from_u64(314);
        for len in 0..=96 {
            let mut v: Vec<i32> = (0..len).map(|_| rng.gen_range(-50..50)).collect();
            let mut expected = v.clone();
            expected.sort_unstable();

            pinsert(&mut v, 96);
            assert_eq!(v, expected);
        }
    }

    #[test]
    fn presort_is_a_permutation() {
        let mut rng = XorShiftRng::seed_from_u64(42);
        let mut v: Vec<i32> = (0..80).map(|_| rng.gen()).collect();
        let mut original = v.clone();

        presort(&mut v, 48);

        original.sort_unstable();
        let mut permuted = v.clone();
        permuted.sort_unstable();
        assert_eq!(permuted, original);
    }
}
