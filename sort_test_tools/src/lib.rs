pub trait Sort {
    fn name() -> String;

    fn sort<T>(v: &mut [T])
    where
        T: parasort::SortKey;
}

pub mod patterns;
